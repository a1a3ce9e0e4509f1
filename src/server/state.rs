use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::delivery::InviteTransport;
use crate::dispatch::DispatchEngine;
use crate::postgres::PostgresPool;
use crate::storage::DispatchStore;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn DispatchStore>,
    pub engine: Arc<DispatchEngine>,
    /// Present when the store runs on PostgreSQL (health reporting)
    pub postgres: Option<PostgresPool>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        settings: Settings,
        store: Arc<dyn DispatchStore>,
        transport: Option<Arc<dyn InviteTransport>>,
        postgres: Option<PostgresPool>,
    ) -> Self {
        let engine = Arc::new(DispatchEngine::new(
            store.clone(),
            transport,
            &settings.dispatch,
        ));

        Self {
            settings: Arc::new(settings),
            store,
            engine,
            postgres,
            start_time: Instant::now(),
        }
    }
}
