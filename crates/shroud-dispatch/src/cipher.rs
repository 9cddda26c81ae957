//! Symmetric cipher strategies for the master dispatcher
//!
//! Both ciphers derive a 256-bit key from the master passphrase with
//! HKDF-SHA256 over a random per-value salt and emit
//! `base64(salt || nonce || ciphertext)`. The cipher identifier is recorded
//! as an attribute at encrypt time, so values stay decryptable after the
//! configured default cipher changes.

use std::collections::HashMap;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::Aes256Gcm;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chacha20poly1305::ChaCha20Poly1305;
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use shroud_core::{Error, Result, SecretString};
use zeroize::Zeroizing;

/// Key size in bytes (256 bits)
const KEY_SIZE: usize = 32;

/// Salt prepended to every payload (HKDF input)
const SALT_SIZE: usize = 16;

/// AEAD nonce size in bytes (96 bits)
const NONCE_SIZE: usize = 12;

/// Registry name of [`AesGcmCipher`]
pub const AES_GCM: &str = "aes-256-gcm";

/// Registry name of [`ChaChaCipher`]
pub const CHACHA20_POLY1305: &str = "chacha20-poly1305";

/// A symmetric cipher keyed by a passphrase.
///
/// Implementations fail with a `Crypto` error on provider faults, bad keys
/// or corrupt input; they never panic on malformed payloads.
pub trait Cipher: Send + Sync {
    /// Encrypt `plaintext` under `passphrase`, returning the wire payload
    fn encrypt(&self, plaintext: &str, passphrase: &str) -> Result<String>;

    /// Decrypt a wire payload produced by [`Cipher::encrypt`]
    fn decrypt(&self, payload: &str, passphrase: &str) -> Result<SecretString>;
}

/// AES-256-GCM cipher
pub struct AesGcmCipher;

impl Cipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &str, passphrase: &str) -> Result<String> {
        seal(plaintext, passphrase, |key, nonce, data| {
            let cipher = Aes256Gcm::new_from_slice(key)
                .map_err(|e| Error::crypto(format!("failed to create cipher: {e}")))?;
            cipher
                .encrypt(nonce.into(), data)
                .map_err(|e| Error::crypto(format!("encryption failed: {e}")))
        })
    }

    fn decrypt(&self, payload: &str, passphrase: &str) -> Result<SecretString> {
        open(payload, passphrase, |key, nonce, data| {
            let cipher = Aes256Gcm::new_from_slice(key)
                .map_err(|e| Error::crypto(format!("failed to create cipher: {e}")))?;
            cipher
                .decrypt(nonce.into(), data)
                .map_err(|_| Error::crypto("decryption failed: wrong passphrase or corrupt input"))
        })
    }
}

/// ChaCha20-Poly1305 cipher
pub struct ChaChaCipher;

impl Cipher for ChaChaCipher {
    fn encrypt(&self, plaintext: &str, passphrase: &str) -> Result<String> {
        seal(plaintext, passphrase, |key, nonce, data| {
            let cipher = ChaCha20Poly1305::new_from_slice(key)
                .map_err(|e| Error::crypto(format!("failed to create cipher: {e}")))?;
            cipher
                .encrypt(nonce.into(), data)
                .map_err(|e| Error::crypto(format!("encryption failed: {e}")))
        })
    }

    fn decrypt(&self, payload: &str, passphrase: &str) -> Result<SecretString> {
        open(payload, passphrase, |key, nonce, data| {
            let cipher = ChaCha20Poly1305::new_from_slice(key)
                .map_err(|e| Error::crypto(format!("failed to create cipher: {e}")))?;
            cipher
                .decrypt(nonce.into(), data)
                .map_err(|_| Error::crypto("decryption failed: wrong passphrase or corrupt input"))
        })
    }
}

/// The ciphers available to dispatchers, keyed by registry name
pub fn default_ciphers() -> HashMap<String, Box<dyn Cipher>> {
    let mut ciphers: HashMap<String, Box<dyn Cipher>> = HashMap::new();
    ciphers.insert(AES_GCM.to_string(), Box::new(AesGcmCipher));
    ciphers.insert(CHACHA20_POLY1305.to_string(), Box::new(ChaChaCipher));
    ciphers
}

fn seal<F>(plaintext: &str, passphrase: &str, aead: F) -> Result<String>
where
    F: FnOnce(&[u8], &[u8; NONCE_SIZE], &[u8]) -> Result<Vec<u8>>,
{
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    let mut nonce = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce);

    let key = derive_key(passphrase, &salt)?;
    let ciphertext = aead(&key[..], &nonce, plaintext.as_bytes())?;

    let mut combined = Vec::with_capacity(SALT_SIZE + NONCE_SIZE + ciphertext.len());
    combined.extend_from_slice(&salt);
    combined.extend_from_slice(&nonce);
    combined.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(combined))
}

fn open<F>(payload: &str, passphrase: &str, aead: F) -> Result<SecretString>
where
    F: FnOnce(&[u8], &[u8; NONCE_SIZE], &[u8]) -> Result<Vec<u8>>,
{
    let combined = BASE64
        .decode(payload)
        .map_err(|e| Error::crypto_with("payload is not valid base64", e))?;
    if combined.len() < SALT_SIZE + NONCE_SIZE {
        return Err(Error::crypto("payload too short"));
    }
    let (salt, rest) = combined.split_at(SALT_SIZE);
    let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);
    let nonce: &[u8; NONCE_SIZE] = nonce.try_into().expect("split at nonce size");

    let key = derive_key(passphrase, salt)?;
    let plaintext = aead(&key[..], nonce, ciphertext)?;
    let text = String::from_utf8(plaintext)
        .map_err(|e| Error::crypto_with("decrypted value is not valid UTF-8", e))?;
    Ok(SecretString::new(text))
}

fn derive_key(passphrase: &str, salt: &[u8]) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    let hkdf = Hkdf::<Sha256>::new(Some(salt), passphrase.as_bytes());
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    hkdf.expand(b"shroud.cipher.key", &mut key[..])
        .map_err(|e| Error::crypto(format!("key derivation failed: {e}")))?;
    Ok(key)
}
