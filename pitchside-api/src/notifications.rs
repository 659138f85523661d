use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    middleware::from_fn_with_state,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, patch},
    Extension, Json, Router,
};
use futures_util::stream::{Stream, StreamExt};
use pitchside_core::Notification;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::{auth_middleware, Claims};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadFilter {
    is_read: Option<bool>,
}

#[derive(Debug, Serialize)]
struct UnreadCount {
    count: i64,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/read-all", patch(mark_all_read))
        .route("/notifications/stream", get(stream))
        .route("/notifications/{id}/read", patch(mark_read))
        .route_layer(from_fn_with_state(state, auth_middleware))
}

/// GET /notifications?isRead=
async fn list_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(filter): Query<ReadFilter>,
) -> AppResult<Json<Vec<Notification>>> {
    Ok(Json(
        state
            .repos
            .notifications
            .list_notifications(claims.user_id(), filter.is_read)
            .await?,
    ))
}

/// PATCH /notifications/:id/read
async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    if !state.repos.notifications.mark_read(id, claims.user_id()).await? {
        return Err(AppError::NotFoundError("Notification not found or not authorized".into()));
    }
    Ok(Json(json!({ "message": "Notification marked as read" })))
}

/// PATCH /notifications/read-all
async fn mark_all_read(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> AppResult<Json<Value>> {
    let updated = state.repos.notifications.mark_all_read(claims.user_id()).await?;
    Ok(Json(json!({ "message": "All notifications marked as read", "updated": updated })))
}

/// GET /notifications/unread-count
async fn unread_count(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> AppResult<Json<UnreadCount>> {
    let count = state.repos.notifications.unread_count(claims.user_id()).await?;
    Ok(Json(UnreadCount { count }))
}

/// GET /notifications/stream
///
/// Server-sent events carrying the caller's new notifications. Lagged receivers skip what
/// they missed.
async fn stream(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let user_id = claims.user_id();
    debug!(%user_id, "Notification stream opened");

    let events = BroadcastStream::new(state.notifier.subscribe()).filter_map(move |result| async move {
        match result {
            Ok(event) if event.is_for(user_id) => Event::default()
                .event("notification")
                .json_data(&event)
                .ok()
                .map(Ok),
            _ => None,
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
