//! Flat file master source
//!
//! Reference: `file:$fileName`. Meant for files on carriers that bring
//! their own protection (an encrypted pen drive or partition); do not point
//! it at unprotected storage. Lines starting with `#` are comments; the
//! first remaining line, trimmed, is the master secret. The path must be
//! absolute after `~` expansion.

use std::path::PathBuf;

use shroud_core::{Error, Result, SecretString, ValidationResponse};

use crate::sources::{MasterSource, Scheme};

pub struct FileSource {
    scheme: Scheme,
}

impl FileSource {
    pub const NAME: &'static str = "file";

    pub fn new() -> Self {
        Self {
            scheme: Scheme::new(Self::NAME),
        }
    }

    fn read_secret(&self, raw_path: &str) -> Result<Option<String>> {
        let expanded = shellexpand::tilde(raw_path);
        let path = PathBuf::from(expanded.as_ref());
        if !path.is_absolute() || !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::configuration(format!("failed to read file '{raw_path}': {e}")))?;
        Ok(first_payload_line(&content))
    }
}

impl Default for FileSource {
    fn default() -> Self {
        Self::new()
    }
}

fn first_payload_line(content: &str) -> Option<String> {
    content
        .lines()
        .find(|line| !line.starts_with('#'))
        .map(|line| line.trim().to_string())
}

impl MasterSource for FileSource {
    fn handle(&self, reference: &str) -> Result<Option<SecretString>> {
        let Some(raw_path) = self.scheme.strip(reference) else {
            return Ok(None);
        };
        match self.read_secret(raw_path)? {
            Some(value) => Ok(Some(SecretString::new(value))),
            None => Err(Error::configuration(format!(
                "file '{raw_path}' not found or is not readable"
            ))),
        }
    }

    fn validate(&self, reference: &str) -> Option<ValidationResponse> {
        let raw_path = self.scheme.strip(reference)?;
        let builder = ValidationResponse::builder("file-source").valid(true);
        Some(match self.read_secret(raw_path) {
            Ok(Some(_)) => builder.info("configured file exists and is readable").build(),
            _ => builder
                .warning("configured file does not exist or is not readable")
                .build(),
        })
    }

    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "File (file name should be edited; use absolute path)"
    }

    fn config_template(&self) -> Option<String> {
        Some(format!("{}:$fileName", Self::NAME))
    }
}
