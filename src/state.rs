use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::services::commission::CommissionDefaults;
use crate::ws::ConnectionRegistry;

/// Shared application state handed to every handler via axum's `State`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub registry: Arc<ConnectionRegistry>,
    pub commission: Arc<RwLock<CommissionDefaults>>,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            registry: Arc::new(ConnectionRegistry::new()),
            commission: Arc::new(RwLock::new(CommissionDefaults::from_config())),
        }
    }
}
