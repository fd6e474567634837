use std::sync::Arc;

use thiserror::Error;

use crate::config::{Config, StoreBackend};
use crate::store::{MemoryRecordStore, MongoRecordStore, RecordStore, StoreError};

pub mod aggregation;
pub mod duplicate_service;
pub mod export_service;
pub mod fields;
pub mod readiness;
pub mod results_service;
pub mod validation;

pub use readiness::{ReadinessState, ReadinessTracker};
pub use results_service::ResultsService;
pub use validation::ValidationFailure;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
    #[error("{0}")]
    StoreUnavailable(String),
    #[error(transparent)]
    StoreOperation(#[from] StoreError),
    #[error("export generation failed: {0}")]
    ExportGeneration(String),
    #[error("{0}")]
    BadRequest(String),
}

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn RecordStore>,
    pub readiness: ReadinessTracker,
}

impl AppState {
    /// Builds the configured store without connecting; the connection is
    /// opened by [`readiness::initialize_store`].
    pub fn new(config: Config) -> Self {
        let store: Arc<dyn RecordStore> = match config.store_backend {
            StoreBackend::Mongo => Arc::new(MongoRecordStore::new(
                config.mongo_uri.clone(),
                config.mongo_database.clone(),
            )),
            StoreBackend::Memory => Arc::new(MemoryRecordStore::new()),
        };
        tracing::info!(backend = store.backend(), "Record store configured");
        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: Arc<dyn RecordStore>) -> Self {
        Self {
            config,
            store,
            readiness: ReadinessTracker::new(),
        }
    }

    pub fn results(&self) -> ResultsService<'_> {
        ResultsService::new(self.store.as_ref(), &self.readiness, &self.config)
    }
}
