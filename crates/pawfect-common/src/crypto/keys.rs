//! Key material providers
//!
//! A provider maps a one-byte key version to raw key material. The raw
//! material is never used as a cipher key directly; every sealed value
//! derives its own key from it with a fresh salt.

use std::collections::BTreeMap;

use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::traits::{EnvSource, ProcessEnv};

/// Environment variable holding key material for version 1
pub const KEY_ENV_VAR: &str = "CONFIG_ENCRYPTION_KEY";

/// Environment variable selecting the version used for new seals
pub const KEY_VERSION_ENV_VAR: &str = "CONFIG_ENCRYPTION_KEY_VERSION";

/// Version used when nothing else is configured
pub const DEFAULT_KEY_VERSION: u8 = 1;

/// Name of the variable carrying material for `version`
pub fn key_env_var(version: u8) -> String {
    format!("{}_V{}", KEY_ENV_VAR, version)
}

/// Source of raw key material, indexed by key version
pub trait KeyProvider: Send + Sync {
    /// Version used by `seal` when the caller does not pick one
    fn current_version(&self) -> u8;

    /// Raw material for `version`, or `None` when it is not configured
    fn key_material(&self, version: u8) -> Option<Zeroizing<Vec<u8>>>;

    /// All configured versions, ascending
    fn versions(&self) -> Vec<u8>;
}

/// Provider backed by an explicit version map
pub struct StaticKeyProvider {
    keys: BTreeMap<u8, Zeroizing<Vec<u8>>>,
    current: u8,
}

impl StaticKeyProvider {
    /// Single key registered as version 1
    pub fn single(material: impl AsRef<[u8]>) -> Self {
        Self::new(DEFAULT_KEY_VERSION).with_key(DEFAULT_KEY_VERSION, material)
    }

    /// Empty provider whose current version is `current`
    pub fn new(current: u8) -> Self {
        Self {
            keys: BTreeMap::new(),
            current,
        }
    }

    pub fn with_key(mut self, version: u8, material: impl AsRef<[u8]>) -> Self {
        self.keys
            .insert(version, Zeroizing::new(material.as_ref().to_vec()));
        self
    }

    pub fn with_current(mut self, version: u8) -> Self {
        self.current = version;
        self
    }
}

impl KeyProvider for StaticKeyProvider {
    fn current_version(&self) -> u8 {
        self.current
    }

    fn key_material(&self, version: u8) -> Option<Zeroizing<Vec<u8>>> {
        self.keys.get(&version).cloned()
    }

    fn versions(&self) -> Vec<u8> {
        self.keys.keys().copied().collect()
    }
}

/// Provider that snapshots key material from the environment once
///
/// Version 1 reads `CONFIG_ENCRYPTION_KEY` (or `CONFIG_ENCRYPTION_KEY_V1`),
/// version n reads `CONFIG_ENCRYPTION_KEY_V{n}`. The current version comes
/// from `CONFIG_ENCRYPTION_KEY_VERSION`, defaulting to the highest configured
/// version. Nothing is re-read after construction.
pub struct EnvKeyProvider {
    inner: StaticKeyProvider,
}

impl EnvKeyProvider {
    /// Snapshot the process environment
    pub fn from_env() -> Self {
        Self::from_source(&ProcessEnv)
    }

    pub fn from_source(env: &dyn EnvSource) -> Self {
        let mut keys = BTreeMap::new();

        let v1 = env
            .var(KEY_ENV_VAR)
            .filter(|v| !v.is_empty())
            .or_else(|| env.var(&key_env_var(1)).filter(|v| !v.is_empty()));
        if let Some(material) = v1 {
            keys.insert(1u8, Zeroizing::new(material.into_bytes()));
        }
        for version in 2..=u8::MAX {
            if let Some(material) = env.var(&key_env_var(version)).filter(|v| !v.is_empty()) {
                keys.insert(version, Zeroizing::new(material.into_bytes()));
            }
        }

        let highest = keys.keys().next_back().copied();
        let current = match env.var(KEY_VERSION_ENV_VAR) {
            Some(raw) => match raw.trim().parse::<u8>() {
                Ok(v) if v > 0 => v,
                _ => {
                    warn!(
                        value = %raw,
                        "Ignoring invalid {}, falling back to highest configured key version",
                        KEY_VERSION_ENV_VAR
                    );
                    highest.unwrap_or(DEFAULT_KEY_VERSION)
                }
            },
            None => highest.unwrap_or(DEFAULT_KEY_VERSION),
        };

        if keys.is_empty() {
            warn!("No configuration encryption keys found in the environment");
        } else if !keys.contains_key(&current) {
            warn!(
                current,
                "Current encryption key version has no key material; sealing will fail"
            );
        }
        debug!(
            versions = ?keys.keys().collect::<Vec<_>>(),
            current,
            "Loaded configuration encryption keys"
        );

        Self {
            inner: StaticKeyProvider { keys, current },
        }
    }
}

impl KeyProvider for EnvKeyProvider {
    fn current_version(&self) -> u8 {
        self.inner.current_version()
    }

    fn key_material(&self, version: u8) -> Option<Zeroizing<Vec<u8>>> {
        self.inner.key_material(version)
    }

    fn versions(&self) -> Vec<u8> {
        self.inner.versions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MapEnv;

    #[test]
    fn test_static_provider() {
        let provider = StaticKeyProvider::new(2)
            .with_key(1, "old-key")
            .with_key(2, "new-key");
        assert_eq!(provider.current_version(), 2);
        assert_eq!(provider.versions(), vec![1, 2]);
        assert_eq!(
            provider.key_material(1).as_deref().map(Vec::as_slice),
            Some(b"old-key".as_slice())
        );
        assert!(provider.key_material(3).is_none());
    }

    #[test]
    fn test_env_provider_reads_versions() {
        let env = MapEnv::new()
            .with(KEY_ENV_VAR, "first")
            .with(key_env_var(2), "second");
        let provider = EnvKeyProvider::from_source(&env);
        assert_eq!(provider.versions(), vec![1, 2]);
        assert_eq!(provider.current_version(), 2);
        assert_eq!(
            provider.key_material(2).as_deref().map(Vec::as_slice),
            Some(b"second".as_slice())
        );
    }

    #[test]
    fn test_env_provider_v1_alias() {
        let env = MapEnv::new().with(key_env_var(1), "aliased");
        let provider = EnvKeyProvider::from_source(&env);
        assert_eq!(provider.versions(), vec![1]);
        assert_eq!(provider.current_version(), 1);
    }

    #[test]
    fn test_env_provider_explicit_current() {
        let env = MapEnv::new()
            .with(KEY_ENV_VAR, "first")
            .with(key_env_var(2), "second")
            .with(KEY_VERSION_ENV_VAR, "1");
        let provider = EnvKeyProvider::from_source(&env);
        assert_eq!(provider.current_version(), 1);
    }

    #[test]
    fn test_env_provider_invalid_current_falls_back() {
        let env = MapEnv::new()
            .with(KEY_ENV_VAR, "first")
            .with(KEY_VERSION_ENV_VAR, "zero");
        let provider = EnvKeyProvider::from_source(&env);
        assert_eq!(provider.current_version(), 1);
    }

    #[test]
    fn test_env_provider_empty() {
        let provider = EnvKeyProvider::from_source(&MapEnv::new());
        assert!(provider.versions().is_empty());
        assert_eq!(provider.current_version(), DEFAULT_KEY_VERSION);
        assert!(provider.key_material(1).is_none());
    }

    #[test]
    fn test_env_provider_ignores_empty_values() {
        let env = MapEnv::new().with(KEY_ENV_VAR, "");
        let provider = EnvKeyProvider::from_source(&env);
        assert!(provider.versions().is_empty());
    }
}
