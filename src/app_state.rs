use std::sync::Arc;

use crate::{
    auth::{IdentityProvider, StoreIdentityProvider},
    config::Config,
    store::DocumentStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DocumentStore>,
    pub auth: Arc<dyn IdentityProvider>,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = DocumentStore::new(&config.database.url, config.cache.capacity).await?;
        store.init().await?;
        let store = Arc::new(store);
        let auth: Arc<dyn IdentityProvider> = Arc::new(StoreIdentityProvider::new(store.clone()));

        Ok(Self {
            store,
            auth,
            config,
        })
    }

    /// State over a throwaway in-memory store, for tests and local demos.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let store = Arc::new(DocumentStore::in_memory().await?);
        let auth: Arc<dyn IdentityProvider> = Arc::new(StoreIdentityProvider::new(store.clone()));
        let config = Config {
            database: crate::config::DatabaseConfig {
                url: "sqlite::memory:".to_string(),
            },
            server: crate::config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            cache: crate::config::CacheConfig { capacity: 64 },
        };

        Ok(Self {
            store,
            auth,
            config,
        })
    }
}
