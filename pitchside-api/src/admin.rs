use axum::{
    extract::{Path, Query, State},
    middleware::from_fn_with_state,
    routing::{delete, get, patch},
    Extension, Json, Router,
};
use pitchside_core::{Role, UserProfile};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::{auth_middleware, Claims};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListUsersQuery {
    role: Option<Role>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    users_by_role: BTreeMap<String, i64>,
    total_users: i64,
    fields: i64,
    reservations_by_status: BTreeMap<String, i64>,
    orders_by_status: BTreeMap<String, i64>,
    products: i64,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/{id}", delete(delete_user))
        .route("/admin/users/{id}/activate", patch(activate_user))
        .route("/admin/users/{id}/deactivate", patch(deactivate_user))
        .route("/admin/statistics", get(statistics))
        .route_layer(from_fn_with_state(state, auth_middleware))
}

// ============================================================================
// User Management Handlers
// ============================================================================

/// GET /admin/users?role=
async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListUsersQuery>,
) -> AppResult<Json<Vec<UserProfile>>> {
    claims.require(&[Role::Admin])?;
    let users = state.repos.users.list_users(query.role).await?;
    Ok(Json(users.iter().map(|u| u.profile()).collect()))
}

async fn set_active(state: &AppState, claims: &Claims, id: Uuid, active: bool) -> AppResult<UserProfile> {
    claims.require(&[Role::Admin])?;
    let mut user = state
        .repos
        .users
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("User with ID {} not found", id)))?;
    user.is_active = active;
    if !active {
        user.refresh_token_hash = None;
    }
    user.updated_at = chrono::Utc::now();
    state.repos.users.save_user(&user).await?;
    tracing::info!(user_id = %id, active, admin = %claims.user_id(), "User activation changed");
    Ok(user.profile())
}

/// PATCH /admin/users/:id/activate
async fn activate_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserProfile>> {
    Ok(Json(set_active(&state, &claims, id, true).await?))
}

/// PATCH /admin/users/:id/deactivate
async fn deactivate_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserProfile>> {
    Ok(Json(set_active(&state, &claims, id, false).await?))
}

/// DELETE /admin/users/:id
async fn delete_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    claims.require(&[Role::Admin])?;
    if id == claims.user_id() {
        return Err(AppError::ValidationError("You cannot delete your own account".into()));
    }
    if !state.repos.users.delete_user(id).await? {
        return Err(AppError::NotFoundError(format!("User with ID {} not found", id)));
    }
    Ok(Json(json!({ "message": "User deleted successfully" })))
}

// ============================================================================
// Statistics
// ============================================================================

/// GET /admin/statistics
async fn statistics(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> AppResult<Json<Statistics>> {
    claims.require(&[Role::Admin])?;
    let repos = &state.repos;

    let users_by_role: BTreeMap<String, i64> = repos
        .users
        .count_by_role()
        .await?
        .into_iter()
        .map(|(role, count)| (role.as_str().to_string(), count))
        .collect();
    let reservations_by_status = repos
        .reservations
        .count_by_status()
        .await?
        .into_iter()
        .map(|(status, count)| (status.as_str().to_string(), count))
        .collect();
    let orders_by_status = repos
        .orders
        .count_by_status()
        .await?
        .into_iter()
        .map(|(status, count)| (status.as_str().to_string(), count))
        .collect();

    Ok(Json(Statistics {
        total_users: users_by_role.values().sum(),
        users_by_role,
        fields: repos.fields.count_fields().await?,
        reservations_by_status,
        orders_by_status,
        products: repos.products.count_products().await?,
    }))
}
