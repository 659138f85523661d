use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Extension, Json, Router,
};
use pitchside_catalog::{CatalogError, NewProduct, Product, ProductPage, ProductPatch, ProductQuery};
use pitchside_core::Role;
use serde_json::{json, Value};
use tracing::info;

use crate::error::AppResult;
use crate::middleware::{auth_middleware, Claims};
use crate::state::AppState;

pub(crate) const SHOP_ROLES: [Role; 2] = [Role::Admin, Role::Webadmin];

pub fn routes(state: AppState) -> Router<AppState> {
    let manage = Router::new()
        .route("/api/products", post(create_product))
        .route("/api/products/{id}", put(update_product).delete(delete_product))
        .route_layer(from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/api/products", get(list_products))
        .route("/api/products/{id}", get(get_product))
        .merge(manage)
}

async fn load(state: &AppState, id: i32) -> AppResult<Product> {
    Ok(state
        .repos
        .products
        .get_product(id)
        .await?
        .ok_or_else(|| CatalogError::product_not_found(id))?)
}

async fn ensure_category(state: &AppState, id: i32) -> AppResult<()> {
    state
        .repos
        .categories
        .get_category(id)
        .await?
        .ok_or_else(|| CatalogError::category_not_found(id))?;
    Ok(())
}

/// GET /api/products
async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<ProductPage>> {
    let filter = query.into_filter(state.page_size)?;
    let (products, total) = state.repos.products.list_products(&filter).await?;
    Ok(Json(ProductPage::new(products, total, &filter)))
}

/// GET /api/products/:id
async fn get_product(State(state): State<AppState>, Path(id): Path<i32>) -> AppResult<Json<Product>> {
    Ok(Json(load(&state, id).await?))
}

/// POST /api/products
async fn create_product(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewProduct>,
) -> AppResult<(StatusCode, Json<Product>)> {
    claims.require(&SHOP_ROLES)?;
    req.validate()?;
    ensure_category(&state, req.category_id).await?;

    let product = state.repos.products.create_product(&req).await?;
    info!(product_id = product.id, category_id = product.category_id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /api/products/:id
async fn update_product(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
    Json(patch): Json<ProductPatch>,
) -> AppResult<Json<Product>> {
    claims.require(&SHOP_ROLES)?;
    let mut product = load(&state, id).await?;
    let previous_category = product.category_id;

    patch.apply(&mut product)?;
    if product.category_id != previous_category {
        ensure_category(&state, product.category_id).await?;
    }
    state.repos.products.update_product(&product, previous_category).await?;

    // reload for the category name
    Ok(Json(load(&state, id).await?))
}

/// DELETE /api/products/:id
async fn delete_product(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> AppResult<Json<Value>> {
    claims.require(&SHOP_ROLES)?;
    let product = load(&state, id).await?;
    state.repos.products.delete_product(&product).await?;
    info!(product_id = id, "Product deleted");
    Ok(Json(json!({ "message": "Product deleted successfully" })))
}
