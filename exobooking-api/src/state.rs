use std::sync::Arc;
use std::time::Duration;

use exobooking_core::{InventoryQuery, InventoryStore, ReservationEngine};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: ReservationEngine,
    pub query: InventoryQuery,
    pub auth: AuthConfig,
}

impl AppState {
    /// Engine and query service share the one injected store.
    pub fn new(store: Arc<dyn InventoryStore>, hold_timeout: Duration, auth: AuthConfig) -> Self {
        Self {
            engine: ReservationEngine::new(store.clone(), hold_timeout),
            query: InventoryQuery::new(store),
            auth,
        }
    }
}
