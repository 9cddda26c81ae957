//! Lookup-only dispatcher
//!
//! Performs no cryptography: the "ciphertext" is itself a master source
//! reference. Encrypt validates that the given plaintext resolves through
//! the source chain and stores it unmodified; decrypt resolves it.

use shroud_core::{Error, Result, SecretString, ValidationResponse};

use crate::dispatcher::{
    Attributes, Dispatcher, DispatcherConfig, DispatcherMeta, EncryptPayload,
};
use crate::sources::{self, MasterSource};

pub struct LookupDispatcher {
    sources: Vec<Box<dyn MasterSource>>,
}

impl LookupDispatcher {
    pub const NAME: &'static str = "lookup";

    pub fn new(sources: Vec<Box<dyn MasterSource>>) -> Self {
        Self { sources }
    }

    pub fn meta(&self) -> DispatcherMeta {
        DispatcherMeta::new("Source Lookup Dispatcher")
    }
}

impl Dispatcher for LookupDispatcher {
    fn encrypt(
        &self,
        plaintext: &str,
        attributes: &Attributes,
        config: &DispatcherConfig,
    ) -> Result<EncryptPayload> {
        // just make sure the given string is a resolvable reference
        self.decrypt(plaintext, attributes, config)?;
        Ok(EncryptPayload::new(attributes.clone(), plaintext))
    }

    fn decrypt(
        &self,
        body: &str,
        _attributes: &Attributes,
        _config: &DispatcherConfig,
    ) -> Result<SecretString> {
        sources::resolve(&self.sources, body)?
            .ok_or_else(|| Error::configuration(format!("no master source found for: {body}")))
    }

    fn validate_configuration(&self, _config: &DispatcherConfig) -> ValidationResponse {
        // nothing to check without a reference at hand; references live in
        // the protected values themselves, not in the config block
        ValidationResponse::builder("lookup-dispatcher")
            .info("source lookup dispatcher needs no configuration")
            .valid(true)
            .build()
    }
}
