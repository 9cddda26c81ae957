//! The pluggable encryption strategy contract

use std::collections::HashMap;

use shroud_core::{Result, SecretString, ValidationResponse};

/// Attribute map travelling with a protected string
pub type Attributes = HashMap<String, String>;

/// Per-dispatcher configuration flattened from the settings document
pub type DispatcherConfig = HashMap<String, String>;

/// What a dispatcher hands back from [`Dispatcher::encrypt`]: the encrypted
/// body plus the attributes that must travel with it. Implementations
/// return at least the attributes they were given and may add more.
#[derive(Debug, Clone)]
pub struct EncryptPayload {
    pub attributes: Attributes,
    pub encrypted: String,
}

impl EncryptPayload {
    pub fn new(attributes: Attributes, encrypted: impl Into<String>) -> Self {
        Self {
            attributes,
            encrypted: encrypted.into(),
        }
    }
}

/// A named, stateless encryption strategy.
///
/// Dispatchers are constructed once at startup and registered under a
/// unique name; the registry routes protected strings to them by that name.
pub trait Dispatcher: Send + Sync {
    /// Encrypt `plaintext`. `config` is this dispatcher's configuration
    /// block from the settings document, empty when none is configured.
    fn encrypt(
        &self,
        plaintext: &str,
        attributes: &Attributes,
        config: &DispatcherConfig,
    ) -> Result<EncryptPayload>;

    /// Decrypt `body`, the payload between the attribute block and the
    /// closing shield.
    fn decrypt(
        &self,
        body: &str,
        attributes: &Attributes,
        config: &DispatcherConfig,
    ) -> Result<SecretString>;

    /// Validate this dispatcher's configuration block. Never fails; problems
    /// become report entries.
    fn validate_configuration(&self, config: &DispatcherConfig) -> ValidationResponse;
}

/// Human-facing metadata attached to a dispatcher at registration time.
///
/// Metadata is an explicit registration value rather than an optional
/// capability of the dispatcher itself; registrations without metadata are
/// presented as needing manual configuration.
#[derive(Debug, Clone)]
pub struct DispatcherMeta {
    /// Display name shown to users
    pub display_name: String,
    /// Hidden dispatchers exist for migration purposes and are not offered
    /// for new configurations
    pub hidden: bool,
    /// Configuration fields this dispatcher understands
    pub fields: Vec<FieldInfo>,
}

impl DispatcherMeta {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            hidden: false,
            fields: Vec::new(),
        }
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn field(mut self, field: FieldInfo) -> Self {
        self.fields.push(field);
        self
    }
}

/// Descriptor of one configuration field
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// Key used in the configuration block
    pub key: String,
    /// Whether the field may be omitted
    pub optional: bool,
    /// Value template offered to the user, if any
    pub default_value: Option<String>,
    /// Human description
    pub description: String,
    /// Accepted values, when the field is an enumeration; each option's
    /// `key` is the value to store and `description` explains it
    pub options: Vec<FieldInfo>,
}

impl FieldInfo {
    pub fn new(key: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            optional: false,
            default_value: None,
            description: description.into(),
            options: Vec::new(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_options(mut self, options: Vec<FieldInfo>) -> Self {
        self.options = options;
        self
    }
}
