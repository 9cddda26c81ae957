//! # shroud-dispatch
//!
//! Protects configuration secrets as shield-framed "protected strings",
//! decoupling how a value is protected from where it is consumed:
//! - **Wire codec**: classifies and frames protected strings
//! - **Dispatchers**: pluggable encryption strategies (master secret,
//!   source lookup, legacy migration)
//! - **Master sources**: pluggable backends resolving a secret reference
//!   (environment, file, pinentry prompt, gpg agent), composable with
//!   memoizing and predicate decorators
//! - **Line protocol client**: passphrase retrieval over a helper
//!   subprocess or a local agent socket
//! - **Registry facade**: routes encrypt/decrypt calls and aggregates
//!   configuration validation
//!
//! Everything runs synchronously on the caller's thread; retry policy
//! belongs to callers.

pub mod cipher;
pub mod codec;
pub mod dispatcher;
pub mod dispatchers;
pub mod protocol;
pub mod registry;
pub mod sources;

pub use cipher::{default_ciphers, Cipher};
pub use codec::Classification;
pub use dispatcher::{Attributes, Dispatcher, DispatcherConfig, DispatcherMeta, EncryptPayload, FieldInfo};
pub use dispatchers::{LegacyDispatcher, LookupDispatcher, MasterDispatcher};
pub use protocol::{Outcome, PinEntry};
pub use registry::{DispatcherInfo, DispatcherRegistry};
pub use sources::{
    EnvSource, FileSource, GpgAgentSource, MasterSource, MatchingSource, MemoizingSource,
    PinEntrySource,
};
