use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Extension, Json, Router,
};
use pitchside_catalog::{CatalogError, Category, CategoryPatch, NewCategory};
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::middleware::{auth_middleware, Claims};
use crate::products::SHOP_ROLES;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let manage = Router::new()
        .route("/api/categories", post(create_category))
        .route("/api/categories/{id}", put(update_category).delete(delete_category))
        .route_layer(from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/api/categories", get(list_categories))
        .route("/api/categories/{id}", get(get_category))
        .merge(manage)
}

async fn load(state: &AppState, id: i32) -> AppResult<Category> {
    Ok(state
        .repos
        .categories
        .get_category(id)
        .await?
        .ok_or_else(|| CatalogError::category_not_found(id))?)
}

async fn ensure_name_free(state: &AppState, name: &str, except: Option<i32>) -> AppResult<()> {
    match state.repos.categories.find_category_by_name(name.trim()).await? {
        Some(existing) if Some(existing.id) != except => Err(CatalogError::Conflict(format!(
            "Category with name {} already exists",
            existing.name
        ))
        .into()),
        _ => Ok(()),
    }
}

/// GET /api/categories
async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(state.repos.categories.list_categories().await?))
}

/// GET /api/categories/:id
async fn get_category(State(state): State<AppState>, Path(id): Path<i32>) -> AppResult<Json<Category>> {
    Ok(Json(load(&state, id).await?))
}

/// POST /api/categories
async fn create_category(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewCategory>,
) -> AppResult<(StatusCode, Json<Category>)> {
    claims.require(&SHOP_ROLES)?;
    req.validate()?;
    ensure_name_free(&state, &req.name, None).await?;
    let category = state.repos.categories.create_category(&req).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT /api/categories/:id
async fn update_category(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
    Json(patch): Json<CategoryPatch>,
) -> AppResult<Json<Category>> {
    claims.require(&SHOP_ROLES)?;
    let mut category = load(&state, id).await?;
    patch.apply(&mut category)?;
    ensure_name_free(&state, &category.name, Some(id)).await?;
    state.repos.categories.update_category(&category).await?;
    Ok(Json(category))
}

/// DELETE /api/categories/:id
async fn delete_category(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> AppResult<Json<Value>> {
    claims.require(&SHOP_ROLES)?;
    let category = load(&state, id).await?;
    category.ensure_deletable()?;
    state.repos.categories.delete_category(id).await?;
    Ok(Json(json!({ "message": "Category deleted successfully" })))
}
