//! Master secret sources
//!
//! A source turns an opaque reference string like `env:MASTER_PASSWORD`
//! into the master secret. Sources are consulted in declaration order and
//! the first one that recognizes a reference wins.
//!
//! Contract: `Ok(None)` means exclusively "this reference is not mine". A
//! source whose scheme matched but which cannot obtain the secret must
//! return an error; conflating the two breaks the resolution chain.

pub mod env;
pub mod file;
pub mod gpg_agent;
pub mod pinentry;

use std::collections::HashMap;
use std::sync::Mutex;

use shroud_core::{Result, SecretString, ValidationResponse};

pub use env::EnvSource;
pub use file::FileSource;
pub use gpg_agent::GpgAgentSource;
pub use pinentry::PinEntrySource;

/// A pluggable backend resolving a master secret reference
pub trait MasterSource: Send + Sync {
    /// Resolve `reference` to the master secret.
    ///
    /// Returns `Ok(Some(secret))` on success, `Ok(None)` when the reference
    /// is not addressed to this source, and `Err` when the reference is
    /// addressed to this source but the secret cannot be obtained.
    fn handle(&self, reference: &str) -> Result<Option<SecretString>>;

    /// Validate `reference` against this source. Returns `None` when the
    /// reference is not addressed to this source.
    fn validate(&self, reference: &str) -> Option<ValidationResponse>;

    /// Registry name of this source, also its scheme
    fn name(&self) -> &str;

    /// Human description of this source, for configuration UIs
    fn description(&self) -> &str;

    /// Reference template offered to users, e.g. `env:$VARIABLE_NAME`
    fn config_template(&self) -> Option<String> {
        None
    }
}

/// The `scheme:` prefix by which a source recognizes its references
#[derive(Debug, Clone)]
pub struct Scheme {
    prefix: String,
}

impl Scheme {
    pub fn new(name: &str) -> Self {
        Self {
            prefix: format!("{name}:"),
        }
    }

    /// Strip the scheme prefix, returning the remainder when it matches
    pub fn strip<'a>(&self, reference: &'a str) -> Option<&'a str> {
        reference.strip_prefix(&self.prefix)
    }

    /// The scheme name without the trailing colon
    pub fn name(&self) -> &str {
        &self.prefix[..self.prefix.len() - 1]
    }
}

/// Resolve `reference` against `sources` in declaration order.
///
/// Short-circuits at the first source claiming the reference; an error from
/// a matching source propagates immediately.
pub fn resolve(
    sources: &[Box<dyn MasterSource>],
    reference: &str,
) -> Result<Option<SecretString>> {
    for source in sources {
        if let Some(secret) = source.handle(reference)? {
            return Ok(Some(secret));
        }
    }
    Ok(None)
}

/// Decorator caching resolved secrets by reference for the process
/// lifetime.
///
/// The lock is held across the delegate call, so concurrent callers never
/// re-invoke a possibly expensive backend (an interactive prompt, an agent
/// query) for the same reference. Cached values are never invalidated.
pub struct MemoizingSource {
    inner: Box<dyn MasterSource>,
    cache: Mutex<HashMap<String, SecretString>>,
}

impl MemoizingSource {
    pub fn new(inner: Box<dyn MasterSource>) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

impl MasterSource for MemoizingSource {
    fn handle(&self, reference: &str) -> Result<Option<SecretString>> {
        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(secret) = cache.get(reference) {
            return Ok(Some(secret.clone()));
        }
        let resolved = self.inner.handle(reference)?;
        if let Some(secret) = &resolved {
            cache.insert(reference.to_string(), secret.clone());
        }
        Ok(resolved)
    }

    fn validate(&self, reference: &str) -> Option<ValidationResponse> {
        self.inner.validate(reference)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn config_template(&self) -> Option<String> {
        self.inner.config_template()
    }
}

/// Decorator that only delegates when an extra predicate on the reference
/// holds; otherwise the reference is treated as not addressed to the inner
/// source.
pub struct MatchingSource {
    predicate: Box<dyn Fn(&str) -> bool + Send + Sync>,
    inner: Box<dyn MasterSource>,
}

impl MatchingSource {
    pub fn new(
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
        inner: Box<dyn MasterSource>,
    ) -> Self {
        Self {
            predicate: Box::new(predicate),
            inner,
        }
    }
}

impl MasterSource for MatchingSource {
    fn handle(&self, reference: &str) -> Result<Option<SecretString>> {
        if (self.predicate)(reference) {
            self.inner.handle(reference)
        } else {
            Ok(None)
        }
    }

    fn validate(&self, reference: &str) -> Option<ValidationResponse> {
        if (self.predicate)(reference) {
            self.inner.validate(reference)
        } else {
            None
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn config_template(&self) -> Option<String> {
        self.inner.config_template()
    }
}
