//! Master secret dispatcher
//!
//! Encrypts with a cipher keyed by a secret resolved through the source
//! chain. Config block: `source` (the master secret reference) and `cipher`
//! (the cipher used for new values). The cipher chosen at encrypt time
//! travels in the `cipher` attribute, so changing the configured cipher
//! later never breaks stored values.

use std::collections::HashMap;

use shroud_core::{Error, Result, SecretString, ValidationResponse};

use crate::cipher::Cipher;
use crate::dispatcher::{
    Attributes, Dispatcher, DispatcherConfig, DispatcherMeta, EncryptPayload, FieldInfo,
};
use crate::sources::{self, MasterSource};

/// Config key naming the master secret reference
const CONF_SOURCE: &str = "source";
/// Config key naming the cipher for new values
const CONF_CIPHER: &str = "cipher";
/// Attribute carrying the cipher a value was encrypted with
const CIPHER_ATTR: &str = "cipher";

pub struct MasterDispatcher {
    ciphers: HashMap<String, Box<dyn Cipher>>,
    sources: Vec<Box<dyn MasterSource>>,
}

impl MasterDispatcher {
    pub const NAME: &'static str = "master";

    /// Create a dispatcher over the given cipher table and source chain.
    /// Sources are consulted in the order given.
    pub fn new(
        ciphers: HashMap<String, Box<dyn Cipher>>,
        sources: Vec<Box<dyn MasterSource>>,
    ) -> Self {
        Self { ciphers, sources }
    }

    /// Registration metadata enumerating sources and ciphers as options
    pub fn meta(&self) -> DispatcherMeta {
        let source_options = self
            .sources
            .iter()
            .map(|s| {
                let mut field = FieldInfo::new(s.name(), s.description());
                if let Some(template) = s.config_template() {
                    field = field.with_default(template);
                }
                field
            })
            .collect();
        let cipher_options = {
            let mut names: Vec<&String> = self.ciphers.keys().collect();
            names.sort();
            names
                .into_iter()
                .map(|name| FieldInfo::new(name, name))
                .collect()
        };
        DispatcherMeta::new("Master Secret Dispatcher")
            .field(
                FieldInfo::new(CONF_SOURCE, "Source of the master secret")
                    .with_options(source_options),
            )
            .field(
                FieldInfo::new(CONF_CIPHER, "Cipher to use with the master secret")
                    .with_options(cipher_options),
            )
    }

    fn master_secret(&self, config: &DispatcherConfig) -> Result<SecretString> {
        let reference = config.get(CONF_SOURCE).ok_or_else(|| {
            Error::configuration(format!("invalid configuration: missing '{CONF_SOURCE}'"))
        })?;
        sources::resolve(&self.sources, reference)?.ok_or_else(|| {
            Error::configuration(format!("no source handled the reference: {reference}"))
        })
    }

    fn require_cipher(&self, name: &str) -> Result<&dyn Cipher> {
        self.ciphers
            .get(name)
            .map(|c| c.as_ref())
            .ok_or_else(|| Error::configuration(format!("no cipher exists with name '{name}'")))
    }
}

impl Dispatcher for MasterDispatcher {
    fn encrypt(
        &self,
        plaintext: &str,
        attributes: &Attributes,
        config: &DispatcherConfig,
    ) -> Result<EncryptPayload> {
        let cipher_name = config.get(CONF_CIPHER).ok_or_else(|| {
            Error::configuration(format!("invalid configuration: missing '{CONF_CIPHER}'"))
        })?;
        let secret = self.master_secret(config)?;
        let encrypted = self
            .require_cipher(cipher_name)?
            .encrypt(plaintext, secret.expose())?;

        let mut attributes = attributes.clone();
        attributes.insert(CIPHER_ATTR.to_string(), cipher_name.clone());
        Ok(EncryptPayload::new(attributes, encrypted))
    }

    fn decrypt(
        &self,
        body: &str,
        attributes: &Attributes,
        config: &DispatcherConfig,
    ) -> Result<SecretString> {
        // the cipher that actually produced the value, not today's default
        let cipher_name = attributes.get(CIPHER_ATTR).ok_or_else(|| {
            Error::format(format!("malformed attributes: missing '{CIPHER_ATTR}'"))
        })?;
        let secret = self.master_secret(config)?;
        self.require_cipher(cipher_name)?.decrypt(body, secret.expose())
    }

    fn validate_configuration(&self, config: &DispatcherConfig) -> ValidationResponse {
        let mut builder = ValidationResponse::builder("master-dispatcher");
        let mut cipher_ok = false;
        match config.get(CONF_CIPHER) {
            None => builder = builder.error("cipher configuration missing"),
            Some(name) if !self.ciphers.contains_key(name) => {
                builder = builder.error("configured cipher not supported");
            }
            Some(_) => {
                builder = builder.info("configured cipher supported");
                cipher_ok = true;
            }
        }

        let mut source_ok = false;
        match config.get(CONF_SOURCE) {
            None => builder = builder.error("source configuration missing"),
            Some(reference) => {
                let response = self.sources.iter().find_map(|s| s.validate(reference));
                match response {
                    None => builder = builder.error("configured source reference not handled"),
                    Some(response) => {
                        if response.is_valid() {
                            builder = builder.info("configured source reference valid");
                            source_ok = true;
                        } else {
                            builder = builder.error("configured source reference invalid");
                        }
                        builder = builder.subsystem(response);
                    }
                }
            }
        }

        builder.valid(cipher_ok && source_ok).build()
    }
}
