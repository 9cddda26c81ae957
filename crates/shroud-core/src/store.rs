//! Loading and persisting the security settings document
//!
//! Reading follows document relocation with a bounded, cycle-safe walk.
//! Writing goes through a uniquely named temporary file in the target's
//! directory and replaces the target atomically, so a concurrent reader
//! never observes a partially written document. Writers are not serialized;
//! the last successful write wins.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::SecuritySettings;

/// Maximum number of documents a relocation chain may traverse
const MAX_RELOCATIONS: usize = 5;

/// Extension of the backup sibling written by [`write`] with `backup = true`
const BACKUP_EXTENSION: &str = "bak";

/// Read the settings document at `path`, following relocation.
///
/// A missing file yields `Ok(None)`; an unparsable file is an error. A
/// relocation chain that revisits a document or exceeds the hop bound fails
/// naming every visited path.
pub fn read(path: &Path) -> Result<Option<SecuritySettings>> {
    let mut visited = Vec::new();
    read_following(&mut visited, path.to_path_buf())
}

/// Read the settings document at `path` without following relocation.
pub fn read_document(path: &Path) -> Result<Option<SecuritySettings>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::Io(e)),
    };
    let settings: SecuritySettings = serde_yaml_ng::from_str(&content)?;
    Ok(Some(settings))
}

fn read_following(visited: &mut Vec<PathBuf>, path: PathBuf) -> Result<Option<SecuritySettings>> {
    if visited.contains(&path) {
        visited.push(path);
        return Err(Error::relocation_cycle(std::mem::take(visited)));
    }
    visited.push(path.clone());
    if visited.len() > MAX_RELOCATIONS {
        return Err(Error::relocation_depth(std::mem::take(visited)));
    }

    let Some(settings) = read_document(&path)? else {
        return Ok(None);
    };

    if let Some(relocation) = &settings.relocation {
        let target = path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(relocation);
        debug!(from = %path.display(), to = %target.display(), "following relocation");
        return read_following(visited, target);
    }
    Ok(Some(settings))
}

/// Persist `settings` to `path`, replacing any existing document.
///
/// The document is serialized to a uniquely named temporary file next to the
/// target and moved into place; when the move is not supported the content
/// is copied instead. With `backup = true` an existing target is first
/// copied to a `.bak` sibling. The temporary file does not survive the call,
/// whatever the outcome.
pub fn write(path: &Path, settings: &SecuritySettings, backup: bool) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| Error::configuration("target file must have a parent directory"))?;
    fs::create_dir_all(parent)?;

    let mut stamped = settings.clone();
    stamped.model_version = Some(env!("CARGO_PKG_VERSION").to_string());
    stamped.model_encoding = Some("UTF-8".to_string());
    let content = serde_yaml_ng::to_string(&stamped)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".shroud-")
        .suffix(".tmp")
        .tempfile_in(parent)?;
    temp.write_all(content.as_bytes())?;
    temp.flush()?;

    if backup && path.is_file() {
        let backup_path = backup_path(path);
        debug!(target = %path.display(), backup = %backup_path.display(), "backing up document");
        fs::copy(path, backup_path)?;
    }

    // Atomic rename where the filesystem supports it; the temp file is
    // removed on drop if either branch fails.
    match temp.persist(path) {
        Ok(_) => Ok(()),
        Err(persist_error) => {
            let temp = persist_error.file;
            fs::copy(temp.path(), path)?;
            temp.close()?;
            Ok(())
        }
    }
}

/// The `.bak` sibling used for backups of `path`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(BACKUP_EXTENSION);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_raw(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_read_missing_file_is_absent() {
        let dir = TempDir::new().unwrap();
        let result = read(&dir.path().join("missing.yaml")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_read_unparsable_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write_raw(&dir, "settings.yaml", "defaultDispatcher: [not, a, string");
        assert!(matches!(read(&path), Err(Error::Yaml(_))));
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.yaml");

        let mut settings = SecuritySettings::with_default_dispatcher("master");
        settings.set_configuration("master", &[("source", "env:MASTER")]);
        write(&path, &settings, false).unwrap();

        let loaded = read(&path).unwrap().unwrap();
        assert_eq!(loaded.default_dispatcher.as_deref(), Some("master"));
        assert_eq!(
            loaded.configuration("master").unwrap().get("source"),
            Some(&"env:MASTER".to_string())
        );
        // store-written metadata
        assert_eq!(loaded.model_version.as_deref(), Some(env!("CARGO_PKG_VERSION")));
        assert_eq!(loaded.model_encoding.as_deref(), Some("UTF-8"));
    }

    #[test]
    fn test_write_leaves_no_temporary_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.yaml");
        write(&path, &SecuritySettings::default(), false).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["settings.yaml".to_string()]);
    }

    #[test]
    fn test_write_with_backup_keeps_prior_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.yaml");

        let first = SecuritySettings::with_default_dispatcher("legacy");
        write(&path, &first, false).unwrap();
        let prior = fs::read_to_string(&path).unwrap();

        let second = SecuritySettings::with_default_dispatcher("master");
        write(&path, &second, true).unwrap();

        let backup = fs::read_to_string(backup_path(&path)).unwrap();
        assert_eq!(backup, prior);
        assert!(backup.contains("legacy"));
        let current = read(&path).unwrap().unwrap();
        assert_eq!(current.default_dispatcher.as_deref(), Some("master"));
    }

    #[test]
    fn test_backup_not_written_without_prior_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.yaml");
        write(&path, &SecuritySettings::default(), true).unwrap();
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn test_single_hop_relocation_resolves_target_content() {
        let dir = TempDir::new().unwrap();
        write_raw(&dir, "real.yaml", "defaultDispatcher: master\n");
        let entry = write_raw(&dir, "entry.yaml", "relocation: real.yaml\n");

        let settings = read(&entry).unwrap().unwrap();
        assert_eq!(settings.default_dispatcher.as_deref(), Some("master"));
        assert!(settings.relocation.is_none());
    }

    #[test]
    fn test_relocation_to_self_is_a_cycle() {
        let dir = TempDir::new().unwrap();
        let path = write_raw(&dir, "loop.yaml", "relocation: loop.yaml\n");

        match read(&path) {
            Err(Error::RelocationCycle { visited }) => {
                assert!(visited.iter().any(|p| p.ends_with("loop.yaml")));
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_two_document_cycle_names_both_paths() {
        let dir = TempDir::new().unwrap();
        let a = write_raw(&dir, "a.yaml", "relocation: b.yaml\n");
        write_raw(&dir, "b.yaml", "relocation: a.yaml\n");

        match read(&a) {
            Err(Error::RelocationCycle { visited }) => {
                let joined = visited
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<String>();
                assert!(joined.contains("a.yaml"));
                assert!(joined.contains("b.yaml"));
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_relocation_chain_beyond_bound_is_too_deep() {
        let dir = TempDir::new().unwrap();
        // 0 -> 1 -> 2 -> 3 -> 4 -> 5, six documents for a five-hop bound
        for i in 0..5 {
            write_raw(
                &dir,
                &format!("doc{i}.yaml"),
                &format!("relocation: doc{}.yaml\n", i + 1),
            );
        }
        write_raw(&dir, "doc5.yaml", "defaultDispatcher: master\n");

        match read(&dir.path().join("doc0.yaml")) {
            Err(Error::RelocationDepth { visited }) => {
                assert_eq!(visited.len(), MAX_RELOCATIONS + 1);
            }
            other => panic!("expected depth error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_relocation_target_is_absent() {
        let dir = TempDir::new().unwrap();
        let entry = write_raw(&dir, "entry.yaml", "relocation: gone.yaml\n");
        assert!(read(&entry).unwrap().is_none());
    }
}
