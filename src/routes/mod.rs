use std::sync::Arc;

use axum::Router;

use crate::clock::Clock;
use crate::pipeline::AlertPipeline;
use crate::store::{NotificationStore, ReadingStore};

mod health;
mod notifications;
mod trigger;

// ---

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<AlertPipeline>,
    pub notifications: Arc<dyn NotificationStore>,
    pub readings: Arc<dyn ReadingStore>,
    pub clock: Arc<dyn Clock>,
    /// Name of the push backend, reported by `/health`.
    pub push_backend: String,
}

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(trigger::router())
        .merge(notifications::router())
        .merge(health::router())
        .with_state(state)
}
