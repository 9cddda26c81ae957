//! Error types for shroud-core

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using shroud-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for Shroud
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration problem: missing document, missing default dispatcher,
    /// invalid wiring
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A dispatcher or source name that is not registered
    #[error("no dispatcher exists with name '{name}'")]
    UnknownDispatcher { name: String },

    /// Relocation chain revisited an already-seen document
    #[error("configuration relocation forms a cycle: {}", format_paths(.visited))]
    RelocationCycle { visited: Vec<PathBuf> },

    /// Relocation chain exceeded the hop bound
    #[error("configuration relocation is too deep: {}", format_paths(.visited))]
    RelocationDepth { visited: Vec<PathBuf> },

    /// Malformed protected string or attribute block
    #[error("malformed protected string: {message}")]
    Format { message: String },

    /// Cipher failure: provider fault, bad key or corrupt input
    #[error("crypto error: {message}")]
    Crypto {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Line protocol violation: unexpected response, malformed greeting
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Document parsing error
    #[error("invalid configuration document: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an unknown dispatcher error
    pub fn unknown_dispatcher(name: impl Into<String>) -> Self {
        Self::UnknownDispatcher { name: name.into() }
    }

    /// Create a relocation cycle error naming the visited documents
    pub fn relocation_cycle(visited: Vec<PathBuf>) -> Self {
        Self::RelocationCycle { visited }
    }

    /// Create a relocation depth error naming the visited documents
    pub fn relocation_depth(visited: Vec<PathBuf>) -> Self {
        Self::RelocationDepth { visited }
    }

    /// Create a format error
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Create a crypto error without an underlying cause
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
            source: None,
        }
    }

    /// Create a crypto error wrapping an underlying cause
    pub fn crypto_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Crypto {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
