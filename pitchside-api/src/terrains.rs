use axum::{
    extract::{Path, Query, State},
    middleware::from_fn_with_state,
    routing::get,
    Extension, Json, Router,
};
use chrono::Utc;
use pitchside_booking::{BookingError, Field, Terrain, TerrainPatch};
use pitchside_core::Role;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::error::AppResult;
use crate::fields::load_field;
use crate::middleware::{auth_middleware, Claims};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TerrainFilter {
    field_id: Uuid,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/terrains", get(list_terrains))
        .route("/terrains/{id}", get(get_terrain).put(update_terrain).delete(delete_terrain))
        .route_layer(from_fn_with_state(state, auth_middleware))
}

async fn load(state: &AppState, id: Uuid) -> AppResult<(Terrain, Field)> {
    let terrain = state
        .repos
        .terrains
        .get_terrain(id)
        .await?
        .ok_or_else(|| BookingError::NotFound(format!("Terrain with ID {} not found", id)))?;
    let field = load_field(state, terrain.field_id).await?;
    Ok((terrain, field))
}

/// GET /terrains?fieldId=
async fn list_terrains(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(filter): Query<TerrainFilter>,
) -> AppResult<Json<Vec<Terrain>>> {
    claims.require(&[Role::Owner])?;
    let field = load_field(&state, filter.field_id).await?;
    field.ensure_owned_by(claims.user_id())?;
    Ok(Json(state.repos.terrains.list_terrains(field.id).await?))
}

/// GET /terrains/:id
async fn get_terrain(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<Terrain>> {
    let (terrain, _) = load(&state, id).await?;
    Ok(Json(terrain))
}

/// PUT /terrains/:id
async fn update_terrain(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(patch): Json<TerrainPatch>,
) -> AppResult<Json<Terrain>> {
    let (mut terrain, field) = load(&state, id).await?;
    field.ensure_owned_by(claims.user_id())?;
    patch.apply(&mut terrain)?;
    state.repos.terrains.update_terrain(&terrain).await?;
    Ok(Json(terrain))
}

/// DELETE /terrains/:id
async fn delete_terrain(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let (terrain, field) = load(&state, id).await?;
    field.ensure_owned_by(claims.user_id())?;
    if field.number_of_terrains <= 1 {
        return Err(BookingError::Validation("Number of terrains must be at least 1".into()).into());
    }
    if state.repos.terrains.has_upcoming_approved(terrain.id, Utc::now().date_naive()).await? {
        return Err(BookingError::Conflict(format!(
            "{} has upcoming approved reservations",
            terrain.name
        ))
        .into());
    }

    state.repos.terrains.delete_terrain(id).await?;
    info!(terrain_id = %id, field_id = %field.id, "Terrain deleted");
    Ok(Json(json!({ "message": "Terrain deleted successfully" })))
}
