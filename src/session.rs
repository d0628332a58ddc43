//! Per-connection state the executor reads: current database, catalog, cache switches.

use std::sync::Arc;

use crate::cache::PredictCache;
use crate::datahub::DataHub;

#[derive(Clone)]
pub struct Session {
    pub database: Option<String>,
    /// Session-level opt-out of the prediction cache.
    pub predictor_cache: bool,
    pub datahub: Arc<dyn DataHub>,
    /// Cache to use instead of the process-wide one.
    pub cache: Option<Arc<PredictCache>>,
}

impl Session {
    pub fn new(datahub: Arc<dyn DataHub>) -> Self {
        Self { database: None, predictor_cache: true, datahub, cache: None }
    }

    pub fn with_database(mut self, db: &str) -> Self {
        self.database = Some(db.to_string());
        self
    }

    pub fn with_cache(mut self, cache: Arc<PredictCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn without_predictor_cache(mut self) -> Self {
        self.predictor_cache = false;
        self
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("database", &self.database)
            .field("predictor_cache", &self.predictor_cache)
            .field("custom_cache", &self.cache.is_some())
            .finish()
    }
}
