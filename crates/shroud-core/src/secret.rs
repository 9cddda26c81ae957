//! Secret value hygiene
//!
//! Secret material lives in [`SecretString`]: zeroed on drop, redacted in
//! `Debug` and `Display` output so it cannot leak through logs or error
//! messages.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// A string that is automatically zeroed on drop and never printed
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretString {
    inner: String,
}

impl SecretString {
    /// Create a new secret string
    pub fn new(value: String) -> Self {
        Self { inner: value }
    }

    /// Expose the secret value (use with caution)
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Convert into the contained String, consuming self without zeroing
    pub fn into_string(mut self) -> String {
        std::mem::take(&mut self.inner)
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the secret is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString([REDACTED {} bytes])", self.len())
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}
