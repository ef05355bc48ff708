//! Service wiring
//!
//! Builds the persistence backend selected by the settings and the services
//! layered on top of it.

use std::path::Path;
use std::sync::Arc;

use pawfect_common::Encryptor;
use pawfect_common::crypto::EnvKeyProvider;
use pawfect_config::{ConfigService, ConfigStore, KeyRotationService, SchemaRegistry};
use pawfect_persistence::{
    ConfigPersistence, EmbeddedPersistService, MemoryPersistService, PersistenceService,
    StorageMode,
};
use tracing::info;

/// Everything a command needs
pub struct AppServices {
    pub persistence: Arc<dyn PersistenceService>,
    pub store: Arc<ConfigStore>,
    pub resolver: ConfigService,
    pub rotation: KeyRotationService,
}

impl AppServices {
    /// Wire the services over an already opened backend
    pub fn new<P>(backend: Arc<P>, encryptor: Encryptor, registry: SchemaRegistry) -> Self
    where
        P: PersistenceService + 'static,
    {
        let config_persistence: Arc<dyn ConfigPersistence> = backend.clone();
        let store = Arc::new(ConfigStore::new(
            config_persistence,
            encryptor,
            Arc::new(registry),
        ));

        Self {
            persistence: backend,
            resolver: ConfigService::with_process_env(store.clone()),
            rotation: KeyRotationService::new(store.clone()),
            store,
        }
    }

    pub fn storage_mode(&self) -> StorageMode {
        self.persistence.storage_mode()
    }
}

/// Open the configured backend and wire the services with key material
/// from the process environment
pub async fn init_services(mode: StorageMode, data_dir: &Path) -> anyhow::Result<AppServices> {
    let encryptor = Encryptor::new(Arc::new(EnvKeyProvider::from_env()));
    let registry = SchemaRegistry::builtin();

    let services = match mode {
        StorageMode::Memory => {
            info!("Using in-memory storage; changes are discarded on exit");
            AppServices::new(Arc::new(MemoryPersistService::new()), encryptor, registry)
        }
        StorageMode::Embedded => {
            info!(data_dir = %data_dir.display(), "Opening embedded storage");
            std::fs::create_dir_all(data_dir)?;
            let backend = EmbeddedPersistService::open(data_dir)?;
            AppServices::new(Arc::new(backend), encryptor, registry)
        }
    };

    services.persistence.health_check().await?;
    Ok(services)
}
