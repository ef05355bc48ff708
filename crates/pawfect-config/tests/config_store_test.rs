//! End-to-end behaviour of the store and resolver over both backends

use std::sync::Arc;

use pawfect_common::crypto::{KdfParams, StaticKeyProvider, inspect, is_sealed};
use pawfect_common::{ConfigError, Encryptor, MapEnv, SENSITIVE_SENTINEL};
use pawfect_config::{
    ConfigService, ConfigStore, KeyRotationService, SchemaRegistry, SetOptions, ValueSource, mask,
};
use pawfect_persistence::{
    Category, ConfigPersistence, EmbeddedPersistService, MemoryPersistService, OpType,
};
use proptest::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;

fn test_encryptor(current: u8) -> Encryptor {
    let keys = StaticKeyProvider::new(current)
        .with_key(1, "integration-key-one")
        .with_key(2, "integration-key-two");
    Encryptor::new(Arc::new(keys)).with_kdf_params(KdfParams::new(4, 8, 1))
}

fn store_over(persistence: Arc<dyn ConfigPersistence>) -> Arc<ConfigStore> {
    Arc::new(ConfigStore::new(
        persistence,
        test_encryptor(1),
        Arc::new(SchemaRegistry::builtin()),
    ))
}

fn email_document(password: &str) -> Value {
    json!({
        "emailService": {
            "host": "smtp.example.com",
            "port": 465,
            "secure": true,
            "user": "reports@pawfectmatch.com",
            "password": password,
            "from": "reports@pawfectmatch.com"
        },
        "reportRecipients": ["ops@pawfectmatch.com"]
    })
}

#[tokio::test]
async fn test_configure_then_resolve_email() {
    let persistence = Arc::new(MemoryPersistService::new());
    let store = store_over(persistence.clone());

    let record = store
        .set("analytics", email_document("hunter2"), "admin", SetOptions::new())
        .await
        .unwrap();
    assert_eq!(record.version, 1);
    assert!(record.is_encrypted);
    assert_eq!(record.category, Category::Analytics);
    assert_eq!(record.data["emailService"]["password"], json!(SENSITIVE_SENTINEL));

    // Raw storage holds an envelope, never the plaintext
    let stored = persistence
        .config_find_one("analytics", false)
        .await
        .unwrap()
        .unwrap();
    let raw = stored.data["emailService"]["password"].as_str().unwrap();
    assert!(is_sealed(raw));
    assert_eq!(inspect(raw).key_version, Some(1));
    assert!(!stored.data.to_string().contains("hunter2"));

    let service = ConfigService::new(store, Arc::new(MapEnv::new()));
    let settings = service.email_settings().await.unwrap();
    assert_eq!(settings.host, "smtp.example.com");
    assert_eq!(settings.port, 465);
    assert!(settings.secure);
    assert_eq!(settings.password, "hunter2");
}

#[tokio::test]
async fn test_resolve_falls_back_to_environment() {
    let store = store_over(Arc::new(MemoryPersistService::new()));
    let env = MapEnv::new()
        .with("EMAIL_HOST", "smtp.env.com")
        .with("EMAIL_PASS", "env-secret");
    let service = ConfigService::new(store, Arc::new(env));

    let resolved = service.resolve("analytics").await.unwrap();
    assert_eq!(resolved.get_str("emailService.host"), Some("smtp.env.com"));
    assert_eq!(
        resolved.source("emailService.host"),
        Some(ValueSource::Environment)
    );
    assert_eq!(resolved.get("emailService.port"), Some(&json!(587)));
    assert_eq!(
        resolved.source("emailService.port"),
        Some(ValueSource::Default)
    );

    let masked = resolved.masked();
    assert_eq!(
        masked.get_str("emailService.password"),
        Some(SENSITIVE_SENTINEL)
    );
}

#[tokio::test]
async fn test_invalid_port_is_rejected_without_mutation() {
    let persistence = Arc::new(MemoryPersistService::new());
    let store = store_over(persistence.clone());
    store
        .set("analytics", email_document("hunter2"), "admin", SetOptions::new())
        .await
        .unwrap();

    let mut document = email_document(SENSITIVE_SENTINEL);
    document["emailService"]["port"] = json!(99999);
    let err = store
        .set("analytics", document, "admin", SetOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::ValidationFailed { ref field, .. } if field == "emailService.port"
    ));

    let record = store.require("analytics").await.unwrap();
    assert_eq!(record.version, 1);
    assert_eq!(record.data["emailService"]["port"], json!(465));
    assert_eq!(store.history("analytics", 0).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_versions_are_monotonic_with_history() {
    let store = store_over(Arc::new(MemoryPersistService::new()));
    for i in 1..=5 {
        let record = store
            .set(
                "maps",
                json!({"apiKey": format!("AIza-{i}"), "provider": "google"}),
                "admin",
                SetOptions::new(),
            )
            .await
            .unwrap();
        assert_eq!(record.version, i);
    }

    let history = store.history("maps", 3).await.unwrap();
    let versions: Vec<u64> = history.iter().map(|h| h.version).collect();
    assert_eq!(versions, vec![5, 4, 3]);
    assert!(history.iter().all(|h| h.op_type == OpType::Update));
    assert!(
        history
            .iter()
            .all(|h| h.data["apiKey"] == json!(SENSITIVE_SENTINEL))
    );
}

#[tokio::test]
async fn test_sentinel_preserves_secret_on_embedded_backend() {
    let dir = TempDir::new().unwrap();
    let service = EmbeddedPersistService::open(dir.path()).unwrap();
    let persistence = Arc::new(service);
    let store = store_over(persistence.clone());

    store
        .set("analytics", email_document("hunter2"), "admin", SetOptions::new())
        .await
        .unwrap();
    let before = persistence
        .config_find_one("analytics", false)
        .await
        .unwrap()
        .unwrap();

    let mut document = email_document(SENSITIVE_SENTINEL);
    document["emailService"]["host"] = json!("smtp.changed.com");
    let record = store
        .set("analytics", document, "editor", SetOptions::new())
        .await
        .unwrap();
    assert_eq!(record.version, 2);
    assert_eq!(record.updated_by, "editor");

    let after = persistence
        .config_find_one("analytics", false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        after.data["emailService"]["password"],
        before.data["emailService"]["password"]
    );

    let resolver = ConfigService::new(store, Arc::new(MapEnv::new()));
    let resolved = resolver.resolve("analytics").await.unwrap();
    assert_eq!(resolved.get_str("emailService.host"), Some("smtp.changed.com"));
    assert_eq!(resolved.get_str("emailService.password"), Some("hunter2"));
}

#[tokio::test]
async fn test_wrong_key_surfaces_as_authentication_failure() {
    let persistence = Arc::new(MemoryPersistService::new());
    store_over(persistence.clone())
        .set("stripe", json!({"secretKey": "sk_live_1"}), "admin", SetOptions::new())
        .await
        .unwrap();

    let other_keys = StaticKeyProvider::new(1).with_key(1, "a-different-key");
    let other = Arc::new(ConfigStore::new(
        persistence,
        Encryptor::new(Arc::new(other_keys)).with_kdf_params(KdfParams::new(4, 8, 1)),
        Arc::new(SchemaRegistry::builtin()),
    ));
    let err = ConfigService::new(other, Arc::new(MapEnv::new()))
        .resolve("stripe")
        .await
        .unwrap_err();
    assert!(matches!(err, ConfigError::AuthenticationFailed));
}

#[tokio::test]
async fn test_rotation_then_resolve_with_new_current_key() {
    let persistence = Arc::new(MemoryPersistService::new());
    store_over(persistence.clone())
        .set(
            "ai",
            json!({"apiKey": "sk-openai", "model": "gpt-4o"}),
            "admin",
            SetOptions::new().category(Category::Ai),
        )
        .await
        .unwrap();

    let v2_store = Arc::new(ConfigStore::new(
        persistence.clone(),
        test_encryptor(2),
        Arc::new(SchemaRegistry::builtin()),
    ));
    let report = KeyRotationService::new(v2_store.clone())
        .rotate_all(2, "rotator")
        .await
        .unwrap();
    assert_eq!(report.rotated_records, vec!["ai"]);

    // Only version 2 is needed from here on
    let v2_only = StaticKeyProvider::new(2).with_key(2, "integration-key-two");
    let store = Arc::new(ConfigStore::new(
        persistence,
        Encryptor::new(Arc::new(v2_only)).with_kdf_params(KdfParams::new(4, 8, 1)),
        Arc::new(SchemaRegistry::builtin()),
    ));
    let resolved = ConfigService::new(store.clone(), Arc::new(MapEnv::new()))
        .resolve("ai")
        .await
        .unwrap();
    assert_eq!(resolved.get_str("apiKey"), Some("sk-openai"));
    assert_eq!(store.require("ai").await.unwrap().version, 2);
}

proptest! {
    #[test]
    fn prop_mask_never_exposes_sensitive_values(secret in "[a-zA-Z0-9]{1,32}", other in "[a-z]{0,16}") {
        let data = json!({"nested": {"secret": secret.clone()}, "plain": other.clone()});
        let masked = mask(&data, &["nested.secret".to_string()]);
        prop_assert_eq!(&masked["nested"]["secret"], &json!(SENSITIVE_SENTINEL));
        prop_assert_eq!(&masked["plain"], &json!(other));
    }
}
