//! Environment variable master source
//!
//! Reference: `env:$VARIABLE_NAME`

use shroud_core::{Error, Result, SecretString, ValidationResponse};
use tracing::debug;

use crate::sources::{MasterSource, Scheme};

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Master source reading an environment variable.
///
/// The lookup function is injected at construction so tests can supply a
/// fixed environment instead of mutating process state.
pub struct EnvSource {
    scheme: Scheme,
    lookup: Lookup,
}

impl EnvSource {
    pub const NAME: &'static str = "env";

    /// Create a source reading the process environment
    pub fn new() -> Self {
        Self::with_lookup(|name| std::env::var(name).ok())
    }

    /// Create a source reading from the given lookup function
    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            scheme: Scheme::new(Self::NAME),
            lookup: Box::new(lookup),
        }
    }
}

impl Default for EnvSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MasterSource for EnvSource {
    fn handle(&self, reference: &str) -> Result<Option<SecretString>> {
        let Some(variable) = self.scheme.strip(reference) else {
            return Ok(None);
        };
        match (self.lookup)(variable) {
            Some(value) => {
                debug!(variable, "resolved master secret from environment");
                Ok(Some(SecretString::new(value)))
            }
            None => Err(Error::configuration(format!(
                "environment variable '{variable}' not found"
            ))),
        }
    }

    fn validate(&self, reference: &str) -> Option<ValidationResponse> {
        let variable = self.scheme.strip(reference)?;
        let builder = ValidationResponse::builder("env-source").valid(true);
        Some(if (self.lookup)(variable).is_some() {
            builder.info("configured environment variable exists").build()
        } else {
            builder
                .warning("configured environment variable does not exist")
                .build()
        })
    }

    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Environment variable (variable name should be edited)"
    }

    fn config_template(&self) -> Option<String> {
        Some(format!("{}:$VARIABLE_NAME", Self::NAME))
    }
}
