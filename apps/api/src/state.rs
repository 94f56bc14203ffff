use std::sync::Arc;

use crate::config::Config;
use crate::matching::pipeline::Session;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Live normalization map and scoring config. Handlers take a snapshot per call.
    pub session: Arc<Session>,
}
