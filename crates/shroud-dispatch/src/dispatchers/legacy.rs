//! Legacy dispatcher, for migration only
//!
//! Decrypt-only: values protected by the historical scheme stay readable,
//! while encryption with it is rejected as insecure. The cipher is a
//! byte-compatible reproduction of the historical format:
//! `base64( salt[8] ‖ padLen[1] ‖ ciphertext ‖ pad[padLen] )`, AES-128-CBC
//! with PKCS#7 padding, key and IV stretched from the passphrase and salt
//! by iterated SHA-256.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};
use shroud_core::{Error, Result, SecretString, ValidationResponse};

use crate::codec;
use crate::dispatcher::{
    Attributes, Dispatcher, DispatcherConfig, DispatcherMeta, EncryptPayload,
};

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Config key holding the legacy master password, plaintext or
/// shield-wrapped under [`MASTER_SEED`]
const CONF_MASTER: &str = "master";

/// Fixed seed phrase encrypting the stored master password
const MASTER_SEED: &str = "security.master";

const SALT_SIZE: usize = 8;
const SPICE_SIZE: usize = 16;

pub struct LegacyDispatcher;

impl LegacyDispatcher {
    pub const NAME: &'static str = "legacy";

    pub fn new() -> Self {
        Self
    }

    pub fn meta(&self) -> DispatcherMeta {
        DispatcherMeta::new("LEGACY (for migration purposes only; can only decrypt)").hidden()
    }

    /// The master password from the config block, unwrapping a
    /// shield-framed value with the seed phrase
    fn master_password(&self, config: &DispatcherConfig) -> Result<SecretString> {
        let raw = config.get(CONF_MASTER).ok_or_else(|| {
            Error::configuration("legacy master password could not be obtained")
        })?;
        if raw.starts_with(codec::SHIELD_BEGIN) && raw.ends_with(codec::SHIELD_END) {
            decrypt64(codec::unshield(raw), MASTER_SEED)
        } else {
            Ok(SecretString::from(raw.as_str()))
        }
    }
}

impl Default for LegacyDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher for LegacyDispatcher {
    fn encrypt(
        &self,
        _plaintext: &str,
        _attributes: &Attributes,
        _config: &DispatcherConfig,
    ) -> Result<EncryptPayload> {
        Err(Error::configuration(format!(
            "{} dispatcher must not be used for encryption; it is inherently insecure and broken",
            Self::NAME
        )))
    }

    fn decrypt(
        &self,
        body: &str,
        _attributes: &Attributes,
        config: &DispatcherConfig,
    ) -> Result<SecretString> {
        let master = self.master_password(config)?;
        decrypt64(body, master.expose())
    }

    fn validate_configuration(&self, config: &DispatcherConfig) -> ValidationResponse {
        let builder = ValidationResponse::builder("legacy-dispatcher");
        if !config.contains_key(CONF_MASTER) {
            return builder
                .error("legacy configuration does not contain a master password")
                .build();
        }
        match self.master_password(config) {
            Ok(_) => builder
                .info("legacy master password successfully obtained")
                .valid(true)
                .build(),
            Err(_) => builder.error("legacy master password decryption failed").build(),
        }
    }
}

/// Decrypt a payload of the historical format with `passphrase`
fn decrypt64(payload: &str, passphrase: &str) -> Result<SecretString> {
    let data = BASE64
        .decode(payload.trim())
        .map_err(|e| Error::crypto_with("payload is not valid base64", e))?;
    if data.len() < SALT_SIZE + 1 {
        return Err(Error::crypto("payload too short"));
    }
    let salt = &data[..SALT_SIZE];
    let pad_len = data[SALT_SIZE] as usize;
    if data.len() < SALT_SIZE + 1 + pad_len {
        return Err(Error::crypto("payload shorter than its padding"));
    }
    let ciphertext = &data[SALT_SIZE + 1..data.len() - pad_len];
    if ciphertext.is_empty() || ciphertext.len() % SPICE_SIZE != 0 {
        return Err(Error::crypto("ciphertext is not block aligned"));
    }

    let (key, iv) = derive_key_iv(passphrase.as_bytes(), salt);
    let plaintext = Aes128CbcDec::new(&key.into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::crypto("decryption failed: wrong passphrase or corrupt input"))?;
    let text = String::from_utf8(plaintext)
        .map_err(|e| Error::crypto_with("decrypted value is not valid UTF-8", e))?;
    Ok(SecretString::new(text))
}

/// Stretch `passphrase` and `salt` into an AES-128 key and IV.
///
/// Iterated digest: each round hashes the previous (truncated) digest, the
/// passphrase and the first eight salt bytes; output is the concatenated
/// digests cut to 32 bytes. One SHA-256 round fills both halves, but the
/// loop is kept so the stretch stays byte-compatible as written.
fn derive_key_iv(passphrase: &[u8], salt: &[u8]) -> ([u8; SPICE_SIZE], [u8; SPICE_SIZE]) {
    let mut key_and_iv = [0u8; SPICE_SIZE * 2];
    let mut filled = 0usize;
    let mut hasher = Sha256::new();
    while filled < key_and_iv.len() {
        hasher.update(passphrase);
        hasher.update(&salt[..SALT_SIZE.min(salt.len())]);
        let digest = hasher.finalize_reset();
        let take = (key_and_iv.len() - filled).min(digest.len());
        key_and_iv[filled..filled + take].copy_from_slice(&digest[..take]);
        filled += take;
        if filled < key_and_iv.len() {
            hasher = Sha256::new();
            hasher.update(&digest[..take]);
        }
    }
    let mut key = [0u8; SPICE_SIZE];
    let mut iv = [0u8; SPICE_SIZE];
    key.copy_from_slice(&key_and_iv[..SPICE_SIZE]);
    iv.copy_from_slice(&key_and_iv[SPICE_SIZE..]);
    (key, iv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    // fixture produced by the historical scheme: "supersecret" under
    // passphrase "masterPw", salt 0102030405060708
    const PROTECTED_VALUE: &str = "AQIDBAUGBwgHwacoZabTenasjmwQR0268wAAAAAAAAA=";
    // "masterPw" under the seed phrase, salt 090a0b0c0d0e0f10
    const PROTECTED_MASTER: &str = "CQoLDA0ODxAHXxqSxQy7j5DKhWcqWaeRAAAAAAAAAAA=";

    fn config_with_plain_master() -> DispatcherConfig {
        HashMap::from([(CONF_MASTER.to_string(), "masterPw".to_string())])
    }

    fn config_with_wrapped_master() -> DispatcherConfig {
        HashMap::from([(
            CONF_MASTER.to_string(),
            format!("{{{PROTECTED_MASTER}}}"),
        )])
    }

    #[test]
    fn test_decrypt64_known_vector() {
        let plain = decrypt64(PROTECTED_VALUE, "masterPw").unwrap();
        assert_eq!(plain.expose(), "supersecret");
    }

    #[test]
    fn test_decrypt64_wrong_passphrase_fails() {
        assert!(matches!(
            decrypt64(PROTECTED_VALUE, "wrongPw"),
            Err(Error::Crypto { .. })
        ));
    }

    #[test]
    fn test_decrypt64_garbage_fails() {
        for payload in ["@@@", "AAAA", ""] {
            assert!(matches!(
                decrypt64(payload, "masterPw"),
                Err(Error::Crypto { .. })
            ));
        }
    }

    #[test]
    fn test_decrypt_with_plaintext_master() {
        let dispatcher = LegacyDispatcher::new();
        let plain = dispatcher
            .decrypt(PROTECTED_VALUE, &HashMap::new(), &config_with_plain_master())
            .unwrap();
        assert_eq!(plain.expose(), "supersecret");
    }

    #[test]
    fn test_decrypt_with_shield_wrapped_master() {
        let dispatcher = LegacyDispatcher::new();
        let plain = dispatcher
            .decrypt(PROTECTED_VALUE, &HashMap::new(), &config_with_wrapped_master())
            .unwrap();
        assert_eq!(plain.expose(), "supersecret");
    }

    #[test]
    fn test_encryption_is_rejected() {
        let dispatcher = LegacyDispatcher::new();
        let err = dispatcher
            .encrypt("anything", &HashMap::new(), &config_with_plain_master())
            .unwrap_err();
        assert!(err.to_string().contains("insecure"));
    }

    #[test]
    fn test_missing_master_fails() {
        let dispatcher = LegacyDispatcher::new();
        let err = dispatcher
            .decrypt(PROTECTED_VALUE, &HashMap::new(), &HashMap::new())
            .unwrap_err();
        assert!(err.to_string().contains("master password"));
    }

    #[test]
    fn test_validate_reports_operational_state() {
        let dispatcher = LegacyDispatcher::new();
        assert!(dispatcher
            .validate_configuration(&config_with_wrapped_master())
            .is_valid());
        assert!(!dispatcher.validate_configuration(&HashMap::new()).is_valid());

        let broken = HashMap::from([(CONF_MASTER.to_string(), "{AAAA}".to_string())]);
        assert!(!dispatcher.validate_configuration(&broken).is_valid());
    }
}
