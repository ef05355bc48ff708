//! Configuration secret encryption
//!
//! Seals single string values with AES-256-GCM under a key derived per value
//! with scrypt from versioned raw key material. See [`envelope`] for the
//! wire format.

pub mod envelope;
pub mod keys;

use std::sync::Arc;

use aes_gcm::{
    Aes256Gcm, Nonce, Tag,
    aead::{AeadInPlace, KeyInit},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rand::RngCore;
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{ConfigError, ConfigResult};

pub use envelope::{
    Envelope, FORMAT_VERSION, HEADER_LENGTH, IV_LENGTH, MIN_ENVELOPE_LENGTH, SALT_LENGTH,
    SealInfo, TAG_LENGTH, inspect, is_sealed,
};
pub use keys::{
    DEFAULT_KEY_VERSION, EnvKeyProvider, KEY_ENV_VAR, KEY_VERSION_ENV_VAR, KeyProvider,
    StaticKeyProvider, key_env_var,
};

/// Length of derived AES keys
pub const DERIVED_KEY_LENGTH: usize = 32;

/// scrypt cost parameters
///
/// Not stored in the envelope: every reader must use the same parameters as
/// the writer. The default matches the common interactive profile
/// (N = 2^14, r = 8, p = 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            log_n: 14,
            r: 8,
            p: 1,
        }
    }
}

impl KdfParams {
    pub fn new(log_n: u8, r: u32, p: u32) -> Self {
        Self { log_n, r, p }
    }
}

/// Seals and opens configuration secrets
///
/// Stateless apart from the injected key provider; clones share it.
#[derive(Clone)]
pub struct Encryptor {
    keys: Arc<dyn KeyProvider>,
    kdf: KdfParams,
}

impl std::fmt::Debug for Encryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encryptor")
            .field("current_version", &self.keys.current_version())
            .field("versions", &self.keys.versions())
            .field("kdf", &self.kdf)
            .finish()
    }
}

impl Encryptor {
    pub fn new(keys: Arc<dyn KeyProvider>) -> Self {
        Self {
            keys,
            kdf: KdfParams::default(),
        }
    }

    /// Use non-default scrypt cost parameters
    pub fn with_kdf_params(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn current_version(&self) -> u8 {
        self.keys.current_version()
    }

    pub fn key_provider(&self) -> &Arc<dyn KeyProvider> {
        &self.keys
    }

    /// Seal with the provider's current key version
    pub fn seal(&self, plaintext: &str) -> ConfigResult<String> {
        self.seal_with_version(plaintext, self.keys.current_version())
    }

    /// Seal with an explicit key version
    ///
    /// An empty plaintext yields an empty string without touching any key.
    pub fn seal_with_version(&self, plaintext: &str, key_version: u8) -> ConfigResult<String> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let material = self
            .keys
            .key_material(key_version)
            .ok_or(ConfigError::KeyMaterialMissing {
                version: key_version,
            })?;

        let mut salt = [0u8; SALT_LENGTH];
        let mut iv = [0u8; IV_LENGTH];
        let mut rng = rand::rng();
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut iv);

        let key = self.derive_key(&material, &salt)?;
        let cipher = Aes256Gcm::new_from_slice(key.as_slice())
            .map_err(|e| ConfigError::EncryptionFailed(e.to_string()))?;

        let mut buffer = plaintext.as_bytes().to_vec();
        let tag = cipher
            .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut buffer)
            .map_err(|e| ConfigError::EncryptionFailed(e.to_string()))?;

        let envelope = Envelope::assemble(key_version, &salt, &iv, tag.as_slice(), &buffer);
        debug!(
            key_version,
            plaintext_length = plaintext.len(),
            "Sealed configuration value"
        );
        Ok(envelope.encode())
    }

    /// Open a sealed value
    ///
    /// An empty input yields an empty string. Tag mismatch, truncation,
    /// malformed base64, an unconfigured key version and non UTF-8 output
    /// all fail with `AuthenticationFailed`; no partial plaintext is ever
    /// returned.
    pub fn open(&self, sealed: &str) -> ConfigResult<String> {
        if sealed.is_empty() {
            return Ok(String::new());
        }

        let envelope = Envelope::decode(sealed).ok_or(ConfigError::AuthenticationFailed)?;
        if envelope.format_version() != FORMAT_VERSION {
            return Err(ConfigError::UnsupportedFormatVersion(
                envelope.format_version(),
            ));
        }

        let key_version = envelope.key_version();
        // The key version byte is unauthenticated header data, so a missing
        // key reads the same as any other decryption failure
        let Some(material) = self.keys.key_material(key_version) else {
            debug!(key_version, "No key material for envelope key version");
            return Err(ConfigError::AuthenticationFailed);
        };

        let key = self.derive_key(&material, envelope.salt())?;
        let cipher = Aes256Gcm::new_from_slice(key.as_slice())
            .map_err(|_| ConfigError::AuthenticationFailed)?;

        let mut buffer = Zeroizing::new(envelope.ciphertext().to_vec());
        cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(envelope.iv()),
                b"",
                &mut buffer,
                Tag::from_slice(envelope.tag()),
            )
            .map_err(|_| ConfigError::AuthenticationFailed)?;

        let plaintext =
            String::from_utf8(buffer.to_vec()).map_err(|_| ConfigError::AuthenticationFailed)?;
        debug!(key_version, "Opened configuration value");
        Ok(plaintext)
    }

    /// Re-seal under `new_key_version`. Fails exactly like `open` when the
    /// input cannot be opened.
    pub fn rotate(&self, sealed: &str, new_key_version: u8) -> ConfigResult<String> {
        let plaintext = Zeroizing::new(self.open(sealed)?);
        self.seal_with_version(&plaintext, new_key_version)
    }

    pub fn is_sealed(&self, value: &str) -> bool {
        is_sealed(value)
    }

    pub fn inspect(&self, value: &str) -> SealInfo {
        inspect(value)
    }

    /// `seal` on the blocking pool
    pub async fn seal_async(&self, plaintext: &str) -> ConfigResult<String> {
        let version = self.keys.current_version();
        self.seal_with_version_async(plaintext, version).await
    }

    /// `seal_with_version` on the blocking pool
    pub async fn seal_with_version_async(
        &self,
        plaintext: &str,
        key_version: u8,
    ) -> ConfigResult<String> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }
        let this = self.clone();
        let plaintext = Zeroizing::new(plaintext.to_string());
        run_blocking(move || this.seal_with_version(&plaintext, key_version)).await
    }

    /// `open` on the blocking pool
    pub async fn open_async(&self, sealed: &str) -> ConfigResult<String> {
        if sealed.is_empty() {
            return Ok(String::new());
        }
        let this = self.clone();
        let sealed = sealed.to_string();
        run_blocking(move || this.open(&sealed)).await
    }

    /// `rotate` on the blocking pool
    pub async fn rotate_async(&self, sealed: &str, new_key_version: u8) -> ConfigResult<String> {
        let this = self.clone();
        let sealed = sealed.to_string();
        run_blocking(move || this.rotate(&sealed, new_key_version)).await
    }

    fn derive_key(
        &self,
        material: &[u8],
        salt: &[u8],
    ) -> ConfigResult<Zeroizing<[u8; DERIVED_KEY_LENGTH]>> {
        let params = scrypt::Params::new(self.kdf.log_n, self.kdf.r, self.kdf.p, DERIVED_KEY_LENGTH)
            .map_err(|e| ConfigError::EncryptionFailed(format!("invalid scrypt params: {}", e)))?;
        let mut key = Zeroizing::new([0u8; DERIVED_KEY_LENGTH]);
        scrypt::scrypt(material, salt, &params, key.as_mut_slice())
            .map_err(|e| ConfigError::EncryptionFailed(format!("key derivation failed: {}", e)))?;
        Ok(key)
    }
}

async fn run_blocking<T, F>(f: F) -> ConfigResult<T>
where
    F: FnOnce() -> ConfigResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ConfigError::EncryptionFailed(format!("crypto task failed: {}", e)))?
}

/// Generate fresh random key material (32 bytes, base64) for a key variable
pub fn generate_key_material() -> String {
    let mut key = Zeroizing::new([0u8; DERIVED_KEY_LENGTH]);
    rand::rng().fill_bytes(key.as_mut_slice());
    BASE64.encode(key.as_slice())
}
