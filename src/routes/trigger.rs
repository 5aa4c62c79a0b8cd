//! Event receiver for newly written sensor-reading documents.
//!
//! The event runtime POSTs one document per call and redelivers on any
//! non-2xx answer, so a pipeline error maps to 500.

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router,
};
use serde_json::json;
use tracing::{debug, error, info};

use super::AppState;
use crate::SensorReading;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/triggers/sensor-readings", post(handler))
}

async fn handler(
    State(state): State<AppState>,
    Json(reading): Json<SensorReading>,
) -> impl IntoResponse {
    // ---
    info!(
        "POST /triggers/sensor-readings - pond {} doc {}",
        reading.pond_id, reading.doc_id
    );

    // Step 1: Archive the document; alerting goes ahead even if this fails
    match state
        .readings
        .record_reading(&reading, state.clock.now())
        .await
    {
        Ok(true) => debug!("Reading archived"),
        Ok(false) => info!("Document already seen, re-running alert checks"),
        Err(e) => error!("Failed to archive reading: {:#}", e),
    }

    // Step 2: Run the alert pipeline
    match state.pipeline.handle(&reading).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            error!("Alert pipeline failed for pond {}: {:#}", reading.pond_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("{:#}", e) })),
            )
                .into_response()
        }
    }
}
