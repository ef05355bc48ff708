//! Read-time configuration resolution
//!
//! Produces ready-to-use configuration for internal consumers: persisted
//! values win, then environment variables, then hard-coded defaults.
//! Sensitive values come back decrypted, so a `ResolvedConfig` must never be
//! handed to an HTTP response; use [`ResolvedConfig::masked`] for display.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use pawfect_common::{ConfigError, ConfigResult, EnvSource, ProcessEnv};

use crate::model::path;
use crate::model::{EmailServiceSettings, SubsystemSchema};
use crate::service::store::{ConfigStore, mask};
use crate::service::validation::parse_env_value;

/// Subsystem holding the outbound email settings
pub const EMAIL_SUBSYSTEM: &str = "analytics";

/// Where a resolved field value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    Persisted,
    Environment,
    Default,
}

/// Fully merged configuration of one subsystem
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub subsystem: String,
    pub values: Value,
    /// Source of each schema field, by dotted path
    pub sources: BTreeMap<String, ValueSource>,
    #[serde(skip)]
    sensitive_paths: Vec<String>,
}

impl std::fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("subsystem", &self.subsystem)
            .field("values", &mask(&self.values, &self.sensitive_paths))
            .field("sources", &self.sources)
            .finish()
    }
}

impl ResolvedConfig {
    pub fn get(&self, field: &str) -> Option<&Value> {
        path::get(&self.values, field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn source(&self, field: &str) -> Option<ValueSource> {
        self.sources.get(field).copied()
    }

    pub fn sensitive_paths(&self) -> &[String] {
        &self.sensitive_paths
    }

    /// Display-safe copy: every non-empty sensitive value, whatever its
    /// source, is replaced with the sentinel.
    pub fn masked(&self) -> Self {
        Self {
            values: mask(&self.values, &self.sensitive_paths),
            ..self.clone()
        }
    }

    /// Deserialize the object at `field` into a typed settings struct
    pub fn section<T: DeserializeOwned>(&self, field: &str) -> ConfigResult<T> {
        let value = self
            .get(field)
            .cloned()
            .ok_or_else(|| ConfigError::NotFound(format!("{}.{}", self.subsystem, field)))?;
        serde_json::from_value(value)
            .map_err(|e| ConfigError::validation(format!("{}.{}", self.subsystem, field), e.to_string()))
    }
}

/// Resolves subsystem configuration for internal use
pub struct ConfigService {
    store: Arc<ConfigStore>,
    env: Arc<dyn EnvSource>,
}

impl ConfigService {
    pub fn new(store: Arc<ConfigStore>, env: Arc<dyn EnvSource>) -> Self {
        Self { store, env }
    }

    /// Resolver reading the real process environment
    pub fn with_process_env(store: Arc<ConfigStore>) -> Self {
        Self::new(store, Arc::new(ProcessEnv))
    }

    /// Resolve a subsystem
    ///
    /// A missing or inactive record is not an error: every field falls back
    /// to its environment variable or default. Failures to open a persisted
    /// secret propagate unchanged.
    pub async fn resolve(&self, subsystem: &str) -> ConfigResult<ResolvedConfig> {
        let record = self.store.find_stored(subsystem, false).await?;
        let schema = self.store.registry().get(subsystem);

        let (values, sensitive_paths) = match record {
            Some(record) => {
                let sensitive =
                    self.store
                        .effective_sensitive_paths(subsystem, &record.sensitive_paths);
                let values = self
                    .open_sensitive(subsystem, record.data, record.is_encrypted, &sensitive)
                    .await?;
                (values, sensitive)
            }
            None => {
                debug!(subsystem, "No persisted configuration, using fallbacks");
                (
                    json!({}),
                    self.store.effective_sensitive_paths(subsystem, &[]),
                )
            }
        };

        Ok(self.apply_fallbacks(subsystem, schema, values, sensitive_paths))
    }

    /// Resolve, or log the failure and return the environment/default
    /// configuration
    pub async fn resolve_or_default(&self, subsystem: &str) -> ResolvedConfig {
        match self.resolve(subsystem).await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(
                    subsystem,
                    error = %e,
                    "Failed to resolve configuration, falling back to environment and defaults"
                );
                let schema = self.store.registry().get(subsystem);
                let sensitive = self.store.effective_sensitive_paths(subsystem, &[]);
                self.apply_fallbacks(subsystem, schema, json!({}), sensitive)
            }
        }
    }

    /// SMTP settings for the email sender
    pub async fn email_settings(&self) -> ConfigResult<EmailServiceSettings> {
        self.resolve(EMAIL_SUBSYSTEM)
            .await?
            .section("emailService")
    }

    async fn open_sensitive(
        &self,
        subsystem: &str,
        mut data: Value,
        record_encrypted: bool,
        sensitive_paths: &[String],
    ) -> ConfigResult<Value> {
        let encryptor = self.store.encryptor();
        for sensitive in sensitive_paths {
            let Some(stored) = path::get(&data, sensitive)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
            else {
                continue;
            };

            // Only the record flag says a value is ciphertext; legacy plaintext
            // can look like an envelope
            if record_encrypted {
                let plaintext = encryptor.open_async(&stored).await?;
                path::set(&mut data, sensitive, Value::String(plaintext));
            } else {
                warn!(
                    subsystem,
                    field = %sensitive,
                    "Sensitive value is stored as plaintext; run a key rotation to seal it"
                );
            }
        }
        Ok(data)
    }

    fn apply_fallbacks(
        &self,
        subsystem: &str,
        schema: Option<&SubsystemSchema>,
        mut values: Value,
        sensitive_paths: Vec<String>,
    ) -> ResolvedConfig {
        let mut sources = BTreeMap::new();

        if let Some(schema) = schema {
            for spec in &schema.fields {
                if path::get(&values, &spec.path).is_some_and(|v| !path::is_blank(v)) {
                    sources.insert(spec.path.clone(), ValueSource::Persisted);
                    continue;
                }

                let from_env = spec
                    .env_var
                    .as_deref()
                    .and_then(|name| self.env.var(name))
                    .and_then(|raw| parse_env_value(spec, &raw));

                let (value, source) = match from_env {
                    Some(value) => (value, ValueSource::Environment),
                    None => (spec.default.clone(), ValueSource::Default),
                };
                path::set(&mut values, &spec.path, value);
                sources.insert(spec.path.clone(), source);
            }
        }

        ResolvedConfig {
            subsystem: subsystem.to_string(),
            values,
            sources,
            sensitive_paths,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pawfect_common::crypto::{KdfParams, StaticKeyProvider};
    use pawfect_common::{Encryptor, MapEnv, SENSITIVE_SENTINEL};
    use pawfect_persistence::{Category, ConfigPersistence, ConfigRecordStorageData, MemoryPersistService};

    use crate::model::{SchemaRegistry, SetOptions};

    fn encryptor(material: &str) -> Encryptor {
        Encryptor::new(Arc::new(StaticKeyProvider::single(material)))
            .with_kdf_params(KdfParams::new(4, 8, 1))
    }

    fn setup(env: MapEnv) -> (Arc<ConfigStore>, ConfigService, Arc<MemoryPersistService>) {
        let persistence = Arc::new(MemoryPersistService::new());
        let store = Arc::new(ConfigStore::new(
            persistence.clone(),
            encryptor("resolver-key"),
            Arc::new(SchemaRegistry::builtin()),
        ));
        let service = ConfigService::new(store.clone(), Arc::new(env));
        (store, service, persistence)
    }

    #[tokio::test]
    async fn test_resolve_opens_persisted_secret() {
        let (store, service, _) = setup(MapEnv::new());
        store
            .set(
                "analytics",
                json!({"emailService": {"host": "smtp.example.com", "port": 587, "user": "a@b.com", "password": "hunter2"}}),
                "admin",
                SetOptions::new(),
            )
            .await
            .unwrap();

        let resolved = service.resolve("analytics").await.unwrap();
        assert_eq!(resolved.get_str("emailService.password"), Some("hunter2"));
        assert_eq!(resolved.get_str("emailService.host"), Some("smtp.example.com"));
        assert_eq!(
            resolved.source("emailService.password"),
            Some(ValueSource::Persisted)
        );
        // Unset fields fall back to defaults
        assert_eq!(
            resolved.get_str("emailService.from"),
            Some("noreply@pawfectmatch.com")
        );
        assert_eq!(
            resolved.source("emailService.secure"),
            Some(ValueSource::Default)
        );
    }

    #[tokio::test]
    async fn test_resolve_without_record_uses_env_then_defaults() {
        let env = MapEnv::new()
            .with("EMAIL_HOST", "smtp.env.com")
            .with("EMAIL_PORT", "2525")
            .with("EMAIL_SECURE", "true")
            .with("EMAIL_PASS", "env-secret");
        let (_, service, _) = setup(env);

        let resolved = service.resolve("analytics").await.unwrap();
        assert_eq!(resolved.get_str("emailService.host"), Some("smtp.env.com"));
        assert_eq!(resolved.get("emailService.port"), Some(&json!(2525)));
        assert_eq!(resolved.get("emailService.secure"), Some(&json!(true)));
        assert_eq!(resolved.get_str("emailService.password"), Some("env-secret"));
        assert_eq!(
            resolved.source("emailService.host"),
            Some(ValueSource::Environment)
        );
        assert_eq!(
            resolved.get_str("emailService.from"),
            Some("noreply@pawfectmatch.com")
        );
        assert_eq!(
            resolved.source("emailService.from"),
            Some(ValueSource::Default)
        );
    }

    #[tokio::test]
    async fn test_invalid_env_value_falls_back_to_default() {
        let (_, service, _) = setup(MapEnv::new().with("EMAIL_PORT", "not-a-port"));
        let resolved = service.resolve("analytics").await.unwrap();
        assert_eq!(resolved.get("emailService.port"), Some(&json!(587)));
        assert_eq!(
            resolved.source("emailService.port"),
            Some(ValueSource::Default)
        );
    }

    #[tokio::test]
    async fn test_blank_persisted_value_falls_back() {
        let (store, service, _) = setup(MapEnv::new().with("EMAIL_HOST", "smtp.env.com"));
        store
            .set(
                "analytics",
                json!({"emailService": {"user": "a@b.com"}}),
                "admin",
                SetOptions::new(),
            )
            .await
            .unwrap();
        let resolved = service.resolve("analytics").await.unwrap();
        assert_eq!(resolved.get_str("emailService.host"), Some("smtp.env.com"));
        assert_eq!(resolved.get_str("emailService.user"), Some("a@b.com"));
    }

    #[tokio::test]
    async fn test_resolve_propagates_wrong_key() {
        let (store, _, persistence) = setup(MapEnv::new());
        store
            .set(
                "stripe",
                json!({"secretKey": "sk_live_1"}),
                "admin",
                SetOptions::new(),
            )
            .await
            .unwrap();

        let other_store = Arc::new(ConfigStore::new(
            persistence,
            encryptor("a-different-key"),
            Arc::new(SchemaRegistry::builtin()),
        ));
        let service = ConfigService::new(other_store, Arc::new(MapEnv::new()));
        let err = service.resolve("stripe").await.unwrap_err();
        assert!(matches!(err, ConfigError::AuthenticationFailed));
        assert!(err.is_crypto_failure());

        // The display-level helper degrades to env/defaults
        let fallback = service.resolve_or_default("stripe").await;
        assert_eq!(fallback.get_str("secretKey"), Some(""));
        assert_eq!(fallback.source("secretKey"), Some(ValueSource::Default));
    }

    #[tokio::test]
    async fn test_resolve_detects_tampered_format_byte() {
        let (store, service, persistence) = setup(MapEnv::new());
        store
            .set("maps", json!({"apiKey": "AIza-1"}), "admin", SetOptions::new())
            .await
            .unwrap();

        // Corrupt the envelope so it no longer looks sealed
        let mut stored = persistence.config_find_one("maps", false).await.unwrap().unwrap();
        stored.data["apiKey"] = json!("definitely not an envelope");
        persistence.import_record(stored);

        assert!(service.resolve("maps").await.is_err());
    }

    #[tokio::test]
    async fn test_legacy_plaintext_passes_through() {
        let (_, service, persistence) = setup(MapEnv::new());
        persistence.import_record(ConfigRecordStorageData {
            key: "sms".to_string(),
            data: json!({"accountSid": "AC1", "authToken": "legacy-token"}),
            is_encrypted: false,
            category: Category::Sms,
            version: 1,
            is_active: true,
            updated_by: "migration".to_string(),
            sensitive_paths: vec![],
            created_time: 0,
            modified_time: 0,
        });
        let resolved = service.resolve("sms").await.unwrap();
        assert_eq!(resolved.get_str("authToken"), Some("legacy-token"));
    }

    #[tokio::test]
    async fn test_legacy_value_shaped_like_envelope_passes_through() {
        let (_, service, persistence) = setup(MapEnv::new());
        let lookalike = encryptor("some-other-system").seal("x").unwrap();
        assert!(pawfect_common::crypto::is_sealed(&lookalike));
        persistence.import_record(ConfigRecordStorageData {
            key: "sms".to_string(),
            data: json!({"accountSid": "AC1", "authToken": lookalike.clone()}),
            is_encrypted: false,
            category: Category::Sms,
            version: 1,
            is_active: true,
            updated_by: "migration".to_string(),
            sensitive_paths: vec![],
            created_time: 0,
            modified_time: 0,
        });
        let resolved = service.resolve("sms").await.unwrap();
        assert_eq!(resolved.get_str("authToken"), Some(lookalike.as_str()));
    }

    #[tokio::test]
    async fn test_unknown_subsystem() {
        let (store, service, _) = setup(MapEnv::new());
        let empty = service.resolve("push").await.unwrap();
        assert_eq!(empty.values, json!({}));
        assert!(empty.sources.is_empty());

        store
            .set(
                "push",
                json!({"serverKey": "fcm-secret", "enabled": true}),
                "admin",
                SetOptions::new().sensitive_path("serverKey"),
            )
            .await
            .unwrap();
        let resolved = service.resolve("push").await.unwrap();
        assert_eq!(
            resolved.values,
            json!({"serverKey": "fcm-secret", "enabled": true})
        );
    }

    #[tokio::test]
    async fn test_masked_and_debug_hide_secrets() {
        let (_, service, _) = setup(MapEnv::new().with("EMAIL_PASS", "env-secret"));
        let resolved = service.resolve("analytics").await.unwrap();

        let masked = resolved.masked();
        assert_eq!(
            masked.get_str("emailService.password"),
            Some(SENSITIVE_SENTINEL)
        );
        assert!(!format!("{:?}", resolved).contains("env-secret"));
    }

    #[tokio::test]
    async fn test_email_settings() {
        let (store, service, _) = setup(MapEnv::new());
        store
            .set(
                "analytics",
                json!({"emailService": {"host": "smtp.example.com", "port": 465, "secure": true, "user": "a@b.com", "password": "hunter2"}}),
                "admin",
                SetOptions::new(),
            )
            .await
            .unwrap();
        let settings = service.email_settings().await.unwrap();
        assert_eq!(
            settings,
            EmailServiceSettings {
                host: "smtp.example.com".to_string(),
                port: 465,
                secure: true,
                user: "a@b.com".to_string(),
                password: "hunter2".to_string(),
                from: "noreply@pawfectmatch.com".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_inactive_record_ignored() {
        let (store, service, _) = setup(MapEnv::new().with("GOOGLE_MAPS_API_KEY", "env-key"));
        store
            .set("maps", json!({"apiKey": "db-key"}), "admin", SetOptions::new())
            .await
            .unwrap();
        store.deactivate("maps", "ops").await.unwrap();

        let resolved = service.resolve("maps").await.unwrap();
        assert_eq!(resolved.get_str("apiKey"), Some("env-key"));
    }
}
