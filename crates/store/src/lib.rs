//! Store implementations for simulai.
//!
//! Every store trait of `simulai-core` has two implementations: an
//! in-memory one (tests, ephemeral runs) and a SQLite one (default).

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

use simulai_core::{CacheStore, MetricsStore, RequestLogStore, SessionStore, StoreError};
use std::sync::Arc;

pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// The four store seams, usually backed by one database.
#[derive(Clone)]
pub struct Stores {
    pub cache: Arc<dyn CacheStore>,
    pub metrics: Arc<dyn MetricsStore>,
    pub logs: Arc<dyn RequestLogStore>,
    pub sessions: Arc<dyn SessionStore>,
}

impl Stores {
    /// Use one backend for every seam.
    pub fn shared<S>(backend: Arc<S>) -> Self
    where
        S: CacheStore + MetricsStore + RequestLogStore + SessionStore + 'static,
    {
        Self {
            cache: backend.clone(),
            metrics: backend.clone(),
            logs: backend.clone(),
            sessions: backend,
        }
    }
}

/// Open the backend selected by `storage.backend`.
pub async fn open(config: &simulai_config::StorageConfig) -> Result<Stores, StoreError> {
    match config.backend.as_str() {
        "memory" => Ok(Stores::shared(Arc::new(InMemoryStore::new()))),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let store = SqliteStore::new(&config.database_path()).await?;
            Ok(Stores::shared(Arc::new(store)))
        }
        other => Err(StoreError::Storage(format!(
            "storage backend '{other}' is not available"
        ))),
    }
}
