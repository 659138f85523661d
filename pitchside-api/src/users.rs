use axum::{
    extract::{Path, Query, State},
    middleware::from_fn_with_state,
    routing::get,
    Extension, Json, Router,
};
use pitchside_core::{UserPatch, UserProfile};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::{auth_middleware, Claims};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct PlayerSearch {
    search: Option<String>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/users/profile", get(profile))
        .route("/users/players", get(search_players))
        .route("/users/{id}", get(get_user).patch(update_user))
        .route_layer(from_fn_with_state(state, auth_middleware))
}

fn user_not_found(id: Uuid) -> AppError {
    AppError::NotFoundError(format!("User with ID {} not found", id))
}

/// GET /users/profile
async fn profile(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> AppResult<Json<UserProfile>> {
    let user = state
        .repos
        .users
        .get_user(claims.user_id())
        .await?
        .ok_or_else(|| user_not_found(claims.user_id()))?;
    Ok(Json(user.profile()))
}

/// GET /users/players?search=
async fn search_players(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PlayerSearch>,
) -> AppResult<Json<Vec<UserProfile>>> {
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let players = state.repos.users.search_players(claims.user_id(), search).await?;
    Ok(Json(players.iter().map(|u| u.profile()).collect()))
}

/// GET /users/:id
async fn get_user(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<UserProfile>> {
    let user = state.repos.users.get_user(id).await?.ok_or_else(|| user_not_found(id))?;
    Ok(Json(user.profile()))
}

/// PATCH /users/:id
async fn update_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UserPatch>,
) -> AppResult<Json<UserProfile>> {
    let mut user = state.repos.users.get_user(id).await?.ok_or_else(|| user_not_found(id))?;
    user.ensure_can_edit(claims.user_id(), claims.role)?;
    patch.apply(&mut user)?;
    state.repos.users.save_user(&user).await?;
    Ok(Json(user.profile()))
}
