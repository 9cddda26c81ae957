//! # shroud-core
//!
//! Core library for Shroud providing:
//! - The persisted security settings document and its accessors
//! - Document loading with relocation resolution and atomic persistence
//! - The recursive validation report tree
//! - Error types shared across the workspace
//! - A zeroizing secret string wrapper

pub mod error;
pub mod model;
pub mod secret;
pub mod store;
pub mod validation;

pub use error::{Error, Result};
pub use model::{ConfigBlock, ConfigProperty, SecuritySettings};
pub use secret::SecretString;
pub use validation::{Level, ValidationResponse};
