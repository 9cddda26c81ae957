//! Dispatcher registry and facade
//!
//! The registry owns the name → dispatcher table, resolves the default
//! dispatcher from the settings document, prepares per-dispatcher
//! configuration and frames results through the wire codec. It is built
//! once at startup and immutable afterwards.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use shroud_core::{store, Error, Result, SecretString, SecuritySettings, ValidationResponse};
use tracing::debug;

use crate::codec::{self, Classification, DISPATCHER_NAME_ATTR, DISPATCHER_VERSION_ATTR, WIRE_VERSION};
use crate::dispatcher::{Attributes, Dispatcher, DispatcherConfig, DispatcherMeta};
use crate::dispatchers::LegacyDispatcher;

struct Registration {
    dispatcher: Box<dyn Dispatcher>,
    meta: Option<DispatcherMeta>,
}

/// One row of [`DispatcherRegistry::available_dispatchers`]
#[derive(Debug, Clone)]
pub struct DispatcherInfo {
    pub name: String,
    pub meta: DispatcherMeta,
}

/// The secret protection facade
pub struct DispatcherRegistry {
    dispatchers: HashMap<String, Registration>,
    config_path: PathBuf,
}

impl DispatcherRegistry {
    /// Create an empty registry persisting its document at `config_path`
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            dispatchers: HashMap::new(),
            config_path: config_path.into(),
        }
    }

    /// Register `dispatcher` under `name` without metadata
    pub fn register(
        mut self,
        name: impl Into<String>,
        dispatcher: impl Dispatcher + 'static,
    ) -> Self {
        self.dispatchers.insert(
            name.into(),
            Registration {
                dispatcher: Box::new(dispatcher),
                meta: None,
            },
        );
        self
    }

    /// Register `dispatcher` under `name` with registration metadata
    pub fn register_with_meta(
        mut self,
        name: impl Into<String>,
        meta: DispatcherMeta,
        dispatcher: impl Dispatcher + 'static,
    ) -> Self {
        self.dispatchers.insert(
            name.into(),
            Registration {
                dispatcher: Box::new(dispatcher),
                meta: Some(meta),
            },
        );
        self
    }

    /// Path of the settings document backing this registry
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Encrypt `plaintext` into a protected string.
    ///
    /// Already-protected input is returned unchanged. The caller's
    /// attribute map is never mutated; when it names no dispatcher, the
    /// document's default dispatcher is used, and its absence is fatal.
    pub fn encrypt(&self, plaintext: &str, attributes: &Attributes) -> Result<String> {
        if !matches!(codec::classify(plaintext)?, Classification::Plaintext) {
            return Ok(plaintext.to_string());
        }

        let settings = self.read_configuration()?;
        let mut attributes = attributes.clone();
        if !attributes.contains_key(DISPATCHER_NAME_ATTR) {
            let settings = settings
                .as_ref()
                .ok_or_else(|| Error::configuration("no configuration found"))?;
            let default = settings.default_dispatcher.clone().ok_or_else(|| {
                Error::configuration("no default dispatcher set in configuration")
            })?;
            attributes.insert(DISPATCHER_NAME_ATTR.to_string(), default);
        }

        let name = attributes[DISPATCHER_NAME_ATTR].clone();
        let registration = self.registration(&name)?;
        let config = dispatcher_config(settings.as_ref(), &name);
        debug!(dispatcher = %name, "encrypting value");
        let payload = registration.dispatcher.encrypt(plaintext, &attributes, &config)?;

        let mut result: BTreeMap<String, String> = payload.attributes.into_iter().collect();
        // the registry owns the routing attributes on output
        if let Some(returned) = result.get(DISPATCHER_NAME_ATTR) {
            if returned != &name {
                return Err(Error::configuration(format!(
                    "dispatcher '{name}' illegally returned dispatcher name attribute '{returned}'"
                )));
            }
        }
        result.insert(DISPATCHER_NAME_ATTR.to_string(), name);
        result.insert(DISPATCHER_VERSION_ATTR.to_string(), WIRE_VERSION.to_string());
        Ok(codec::encode(&result, &payload.encrypted))
    }

    /// Decrypt a protected string.
    ///
    /// Input that is not protected passes through unchanged. Legacy values
    /// route to the well-known legacy dispatcher.
    pub fn decrypt(&self, value: &str) -> Result<SecretString> {
        let attributes = match codec::classify(value)? {
            Classification::Plaintext => return Ok(SecretString::from(value)),
            Classification::Current { attributes } => attributes,
            Classification::Legacy { mut attributes } => {
                attributes.insert(
                    DISPATCHER_NAME_ATTR.to_string(),
                    LegacyDispatcher::NAME.to_string(),
                );
                attributes
            }
        };
        let attributes: Attributes = attributes.into_iter().collect();
        let name = attributes[DISPATCHER_NAME_ATTR].clone();
        let registration = self.registration(&name)?;
        let settings = self.read_configuration()?;
        let config = dispatcher_config(settings.as_ref(), &name);
        let body = codec::body(codec::unshield(value));
        debug!(dispatcher = %name, "decrypting value");
        registration.dispatcher.decrypt(body, &attributes, &config)
    }

    /// Read the settings document, following relocation
    pub fn read_configuration(&self) -> Result<Option<SecuritySettings>> {
        store::read(&self.config_path)
    }

    /// Persist the settings document, keeping a backup of the prior one
    pub fn write_configuration(&self, settings: &SecuritySettings) -> Result<()> {
        store::write(&self.config_path, settings, true)
    }

    /// Validate the whole configuration into a diagnostic tree.
    ///
    /// Never fails: problems become ERROR-level entries. The legacy
    /// dispatcher check at the end is informational and does not affect
    /// overall validity.
    pub fn validate_configuration(&self) -> ValidationResponse {
        let mut builder = ValidationResponse::builder("dispatcher-registry");
        let mut valid = false;

        match self.read_configuration() {
            Err(e) => {
                builder = builder.error(e.to_string());
            }
            Ok(None) => {
                builder = builder.error(format!(
                    "no configuration file found on path {}",
                    self.config_path.display()
                ));
            }
            Ok(Some(settings)) => {
                builder = builder.info(format!(
                    "configuration file present on path {}",
                    self.config_path.display()
                ));
                match &settings.default_dispatcher {
                    None => {
                        builder = builder.error("no default dispatcher set in configuration");
                    }
                    Some(default) => {
                        builder = builder.info("default dispatcher configured");
                        match self.dispatchers.get(default) {
                            None => {
                                builder = builder
                                    .error("configured default dispatcher not present in system");
                            }
                            Some(registration) => {
                                let config = dispatcher_config(Some(&settings), default);
                                let response =
                                    registration.dispatcher.validate_configuration(&config);
                                if response.is_valid() {
                                    valid = true;
                                    builder = builder
                                        .info("configured default dispatcher configuration is valid");
                                } else {
                                    builder = builder.error(
                                        "configured default dispatcher configuration is invalid",
                                    );
                                }
                                builder = builder.subsystem(response);
                            }
                        }
                    }
                }
            }
        }

        // transparent-fallback check; informational only
        match self.dispatchers.get(LegacyDispatcher::NAME) {
            None => {
                builder = builder.info("legacy dispatcher not present in system");
            }
            Some(registration) => {
                builder = builder.info("legacy dispatcher present in system");
                let settings = self.read_configuration().ok().flatten();
                let config = dispatcher_config(settings.as_ref(), LegacyDispatcher::NAME);
                let response = registration.dispatcher.validate_configuration(&config);
                if response.is_valid() {
                    builder = builder
                        .info("legacy dispatcher is operational; transparent fallback possible");
                } else {
                    builder = builder.warning(
                        "legacy dispatcher not operational; transparent fallback not possible",
                    );
                }
                builder = builder.subsystem(response);
            }
        }

        builder.valid(valid).build()
    }

    /// Enumerate registered dispatchers with their metadata, sorted by
    /// name. Registrations without metadata are marked as needing manual
    /// configuration.
    pub fn available_dispatchers(&self) -> Vec<DispatcherInfo> {
        let mut infos: Vec<DispatcherInfo> = self
            .dispatchers
            .iter()
            .map(|(name, registration)| DispatcherInfo {
                name: name.clone(),
                meta: registration.meta.clone().unwrap_or_else(|| {
                    DispatcherMeta::new(format!("{name} (needs manual configuration)"))
                }),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    fn registration(&self, name: &str) -> Result<&Registration> {
        self.dispatchers
            .get(name)
            .ok_or_else(|| Error::unknown_dispatcher(name))
    }
}

/// The dispatcher's configuration block, empty when none is configured
fn dispatcher_config(settings: Option<&SecuritySettings>, name: &str) -> DispatcherConfig {
    settings
        .and_then(|s| s.configuration(name))
        .unwrap_or_default()
}
