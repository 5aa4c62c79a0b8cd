// src/routes/health.rs
//! Liveness endpoint for the alert service.
//!
//! Used by the container platform and the event runtime's health probes.
//! It does not touch the database; it reports which push backend the
//! process was started with so a misconfigured deployment is visible.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::AppState;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    push: String,
}

/// Handle `GET /health`.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        push: state.push_backend.clone(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
