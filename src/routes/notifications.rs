//! Notification inbox used by the dashboard: listing, unread badge,
//! read/delete actions and a live SSE feed of new alerts.

use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{delete, get, post},
    Json, Router,
};
use futures::Stream;
use serde::Deserialize;
use serde_json::json;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::AppState;

// ---

/// Default and maximum page size of the inbox listing.
const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/notifications", get(list))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/stream", get(stream))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/{id}/read", post(mark_read))
        .route("/notifications/{id}", delete(soft_delete))
}

/// Query parameters shared by the per-user endpoints
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    user_id: String,
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadAllBody {
    user_id: String,
}

async fn list(State(state): State<AppState>, Query(params): Query<UserQuery>) -> Response {
    // ---
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    match state
        .notifications
        .list_for_user(&params.user_id, limit)
        .await
    {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(e) => internal_error("list notifications", e),
    }
}

async fn unread_count(State(state): State<AppState>, Query(params): Query<UserQuery>) -> Response {
    // ---
    match state.notifications.unread_count(&params.user_id).await {
        Ok(count) => (StatusCode::OK, Json(json!({ "unread": count }))).into_response(),
        Err(e) => internal_error("count unread notifications", e),
    }
}

async fn mark_read(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    // ---
    match state.notifications.mark_read(id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => internal_error("mark notification read", e),
    }
}

async fn mark_all_read(State(state): State<AppState>, Json(body): Json<ReadAllBody>) -> Response {
    // ---
    match state.notifications.mark_all_read(&body.user_id).await {
        Ok(updated) => {
            info!("Marked {} notifications read for {}", updated, body.user_id);
            (StatusCode::OK, Json(json!({ "updated": updated }))).into_response()
        }
        Err(e) => internal_error("mark all notifications read", e),
    }
}

async fn soft_delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    // ---
    match state.notifications.soft_delete(id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => internal_error("delete notification", e),
    }
}

/// Live feed of the user's new notifications as `notification` SSE events.
async fn stream(
    State(state): State<AppState>,
    Query(params): Query<UserQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // ---
    let user_id = params.user_id;
    info!("Notification stream opened for {}", user_id);

    let events = BroadcastStream::new(state.notifications.subscribe()).filter_map(move |msg| {
        match msg {
            Ok(n) if n.user_id == user_id => Event::default()
                .event("notification")
                .id(n.id.to_string())
                .json_data(&n)
                .ok()
                .map(Ok),
            Ok(_) => None,
            Err(e) => {
                warn!("Notification stream for {} fell behind: {}", user_id, e);
                None
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

fn internal_error(action: &str, e: anyhow::Error) -> Response {
    // ---
    error!("Failed to {}: {:#}", action, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": format!("failed to {}", action) })),
    )
        .into_response()
}
