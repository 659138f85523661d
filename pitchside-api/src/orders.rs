use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use pitchside_order::{
    generate_order_number, transition, NewOrder, NewOrderItem, Order, OrderError, OrderStatus, PaymentMethod, Quote,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::AppResult;
use crate::middleware::{auth_middleware, Claims, MaybeClaims};
use crate::products::SHOP_ROLES;
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub items: Vec<NewOrderItem>,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/orders/user", get(list_my_orders))
        .route("/orders/admin/all", get(list_all_orders))
        .route("/orders/{id}", get(get_order).put(update_status).delete(delete_order))
        .route_layer(from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/orders/quote", post(quote))
        .route("/orders", post(create_order))
        .merge(protected)
}

pub(crate) async fn load_order(state: &AppState, id: i32) -> AppResult<Order> {
    Ok(state.repos.orders.get_order(id).await?.ok_or(OrderError::NotFound(id))?)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /orders/quote
async fn quote(State(state): State<AppState>, Json(req): Json<QuoteRequest>) -> AppResult<Json<Quote>> {
    req.payment_method.validate()?;
    Ok(Json(state.checkout.quote(&req.items, req.payment_method.kind)?))
}

/// POST /orders
///
/// Guest checkout is allowed; a valid bearer token links the order to the caller.
async fn create_order(
    State(state): State<AppState>,
    MaybeClaims(claims): MaybeClaims,
    Json(req): Json<NewOrder>,
) -> AppResult<(StatusCode, Json<Order>)> {
    let quote = state.checkout.verify(&req).inspect_err(|e| {
        warn!(error = %e, "Checkout rejected");
    })?;

    let order_number = req
        .order_number
        .clone()
        .unwrap_or_else(|| generate_order_number(Utc::now()));
    let user_id = claims.as_ref().map(Claims::user_id);

    let order = state
        .repos
        .orders
        .create_order(&req, &order_number, user_id, &quote)
        .await?;

    state.metrics.orders_created.inc();
    info!(
        order_id = order.id,
        order_number = %order.order_number,
        total = %order.total,
        "Order created"
    );
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders/user
async fn list_my_orders(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<Order>>> {
    Ok(Json(state.repos.orders.list_orders_for_user(claims.user_id()).await?))
}

/// GET /orders/admin/all
async fn list_all_orders(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<Order>>> {
    claims.require(&SHOP_ROLES)?;
    Ok(Json(state.repos.orders.list_orders().await?))
}

/// GET /orders/:id
async fn get_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> AppResult<Json<Order>> {
    let order = load_order(&state, id).await?;
    if !claims.role.manages_shop() && !order.is_visible_to(claims.user_id()) {
        // same answer as a missing order
        return Err(OrderError::NotFound(id).into());
    }
    Ok(Json(order))
}

/// PUT /orders/:id
async fn update_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
    Json(req): Json<UpdateStatusRequest>,
) -> AppResult<Json<Order>> {
    claims.require(&SHOP_ROLES)?;
    let mut order = load_order(&state, id).await?;
    let from = order.status;

    let change = transition(&mut order, req.status)?;
    state.repos.orders.update_order_status(&order, from, change.cancelled()).await?;

    info!(order_id = id, status = order.status.as_str(), "Order status updated");
    Ok(Json(order))
}

/// DELETE /orders/:id
async fn delete_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> AppResult<Json<Value>> {
    claims.require(&SHOP_ROLES)?;
    if !state.repos.orders.delete_order(id).await? {
        return Err(OrderError::NotFound(id).into());
    }
    info!(order_id = id, "Order deleted");
    Ok(Json(json!({ "message": "Order deleted successfully" })))
}
