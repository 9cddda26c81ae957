//! The persisted security settings document

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root of the persisted security settings document.
///
/// The document names the default dispatcher, optionally relocates to
/// another document, and carries one configuration block per dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SecuritySettings {
    /// Model version stamped by the store on write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,

    /// Character encoding stamped by the store on write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_encoding: Option<String>,

    /// Name of the dispatcher used when the caller names none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_dispatcher: Option<String>,

    /// Relative path of the document holding the real content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relocation: Option<String>,

    /// Per-dispatcher configuration blocks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configurations: Vec<ConfigBlock>,
}

/// A named configuration block, one per dispatcher
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigBlock {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<ConfigProperty>,
}

/// A single name/value property within a configuration block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigProperty {
    pub name: String,
    pub value: String,
}

impl SecuritySettings {
    /// Create an empty document with the given default dispatcher
    pub fn with_default_dispatcher(name: impl Into<String>) -> Self {
        Self {
            default_dispatcher: Some(name.into()),
            ..Self::default()
        }
    }

    /// Flatten the configuration block with the given name into a property
    /// map. Returns `None` when no block with that name exists; an existing
    /// block with no properties yields an empty map.
    pub fn configuration(&self, name: &str) -> Option<HashMap<String, String>> {
        self.configurations.iter().find(|c| c.name == name).map(|c| {
            c.properties
                .iter()
                .map(|p| (p.name.clone(), p.value.clone()))
                .collect()
        })
    }

    /// Replace or insert the configuration block with the given name
    pub fn set_configuration(&mut self, name: impl Into<String>, properties: &[(&str, &str)]) {
        let name = name.into();
        let block = ConfigBlock {
            name: name.clone(),
            properties: properties
                .iter()
                .map(|(n, v)| ConfigProperty {
                    name: (*n).to_string(),
                    value: (*v).to_string(),
                })
                .collect(),
        };
        if let Some(existing) = self.configurations.iter_mut().find(|c| c.name == name) {
            *existing = block;
        } else {
            self.configurations.push(block);
        }
    }
}
