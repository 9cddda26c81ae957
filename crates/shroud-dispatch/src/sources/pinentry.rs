//! Interactive prompt master source
//!
//! Reference: `pinentry-prompt:$pinentryPath`. Collects the master secret
//! through a secure pinentry dialogue; nothing is cached here, wrap in a
//! [`MemoizingSource`](crate::sources::MemoizingSource) to prompt once per
//! process.

use std::path::Path;
use std::time::Duration;

use shroud_core::{Error, Result, SecretString, ValidationResponse};

use crate::protocol::{Outcome, PinEntry};
use crate::sources::{MasterSource, Scheme};

/// How long the dialogue stays up before classifying as timed out
const PROMPT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct PinEntrySource {
    scheme: Scheme,
}

impl PinEntrySource {
    pub const NAME: &'static str = "pinentry-prompt";

    pub fn new() -> Self {
        Self {
            scheme: Scheme::new(Self::NAME),
        }
    }
}

impl Default for PinEntrySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MasterSource for PinEntrySource {
    fn handle(&self, reference: &str) -> Result<Option<SecretString>> {
        let Some(program) = self.scheme.strip(reference) else {
            return Ok(None);
        };
        let outcome = PinEntry::new(program)
            .timeout(PROMPT_TIMEOUT)
            .key_info("shroud/masterSecret")
            .title("Master Secret")
            .description("Please enter the master secret protecting your configuration")
            .prompt("Master secret")
            .ok_label("Ok")
            .cancel_label("Cancel")
            .get_pin()?;
        match outcome {
            Outcome::Success(payload) => Ok(Some(SecretString::new(payload))),
            Outcome::Canceled => Err(Error::configuration("user canceled the operation")),
            Outcome::Timeout => Err(Error::configuration("prompt timed out")),
            Outcome::NotConfirmed => Err(Error::configuration("entry not confirmed")),
            Outcome::Failed(detail) => Err(Error::configuration(format!("prompt failed: {detail}"))),
        }
    }

    fn validate(&self, reference: &str) -> Option<ValidationResponse> {
        let program = self.scheme.strip(reference)?;
        let path = Path::new(program);
        let builder = ValidationResponse::builder("pinentry-source");
        Some(if !path.exists() {
            builder.error("configured pinentry command not found").build()
        } else if !is_executable(path) {
            builder
                .error("configured pinentry command is not executable")
                .build()
        } else {
            builder
                .info("configured pinentry command exists and is executable")
                .valid(true)
                .build()
        })
    }

    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Secure pinentry prompt (pinentry path should be edited)"
    }

    fn config_template(&self) -> Option<String> {
        Some(format!("{}:$pinentryPath", Self::NAME))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use shroud_core::Level;

    #[test]
    fn test_foreign_scheme_is_not_mine() {
        let source = PinEntrySource::new();
        assert!(source.handle("env:MASTER").unwrap().is_none());
        assert!(source.validate("env:MASTER").is_none());
    }

    #[test]
    fn test_validate_missing_command_is_an_error() {
        let source = PinEntrySource::new();
        let response = source
            .validate("pinentry-prompt:/definitely/not/here")
            .unwrap();
        assert!(!response.is_valid());
        assert_eq!(response.messages(Level::Error).len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_executable_command_is_valid() {
        let source = PinEntrySource::new();
        let response = source.validate("pinentry-prompt:/bin/sh").unwrap();
        assert!(response.is_valid());
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_non_executable_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("pinentry");
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        // default permissions have no execute bit inside the tempdir
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(0o644);
        std::fs::set_permissions(&path, perms).unwrap();

        let source = PinEntrySource::new();
        let reference = format!("pinentry-prompt:{}", path.display());
        let response = source.validate(&reference).unwrap();
        assert!(!response.is_valid());
    }
}
