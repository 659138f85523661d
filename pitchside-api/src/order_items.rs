use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::get,
    Extension, Json, Router,
};
use pitchside_order::{NewOrderItem, Order, OrderItem};
use pitchside_shared::Money;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::middleware::{auth_middleware, Claims};
use crate::orders::load_order;
use crate::products::SHOP_ROLES;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemFilter {
    order_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateItemRequest {
    order_id: i32,
    #[serde(flatten)]
    item: NewOrderItem,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateItemRequest {
    product_id: Option<i32>,
    quantity: Option<i32>,
    price: Option<Money>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/order-items", get(list_items).post(create_item))
        .route("/order-items/{id}", get(get_item).put(update_item).delete(delete_item))
        .route_layer(from_fn_with_state(state, auth_middleware))
}

fn item_not_found(id: i32) -> AppError {
    AppError::NotFoundError(format!("Order item with ID {} not found", id))
}

async fn load_item(state: &AppState, id: i32) -> AppResult<OrderItem> {
    state.repos.order_items.get_item(id).await?.ok_or_else(|| item_not_found(id))
}

/// Recomputes the order totals for the given lines, keeping its shipping charge.
fn reprice(state: &AppState, order: &mut Order, lines: &[OrderItem]) -> AppResult<()> {
    let quote = state.checkout.requote(lines, order.shipping)?;
    order.subtotal = quote.subtotal;
    order.tax = quote.tax;
    order.total = quote.total;
    Ok(())
}

/// GET /order-items?orderId=
async fn list_items(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(filter): Query<ItemFilter>,
) -> AppResult<Json<Vec<OrderItem>>> {
    claims.require(&SHOP_ROLES)?;
    Ok(Json(state.repos.order_items.list_items(filter.order_id).await?))
}

/// GET /order-items/:id
async fn get_item(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> AppResult<Json<OrderItem>> {
    claims.require(&SHOP_ROLES)?;
    Ok(Json(load_item(&state, id).await?))
}

/// POST /order-items
async fn create_item(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateItemRequest>,
) -> AppResult<(StatusCode, Json<OrderItem>)> {
    claims.require(&SHOP_ROLES)?;
    req.item.validate()?;
    let mut order = load_order(&state, req.order_id).await?;
    order.ensure_editable()?;

    let mut lines = order.items.clone();
    lines.push(OrderItem {
        id: 0,
        order_id: order.id,
        product_id: req.item.product_id,
        product_name: None,
        quantity: req.item.quantity,
        price: req.item.price,
    });
    reprice(&state, &mut order, &lines)?;

    let item = state.repos.order_items.add_item(&order, &req.item).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// PUT /order-items/:id
async fn update_item(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
    Json(req): Json<UpdateItemRequest>,
) -> AppResult<Json<OrderItem>> {
    claims.require(&SHOP_ROLES)?;
    let mut item = load_item(&state, id).await?;
    let mut order = load_order(&state, item.order_id).await?;
    order.ensure_editable()?;

    if let Some(product_id) = req.product_id {
        item.product_id = product_id;
    }
    if let Some(quantity) = req.quantity {
        item.quantity = quantity;
    }
    if let Some(price) = req.price {
        item.price = price;
    }
    NewOrderItem {
        product_id: item.product_id,
        quantity: item.quantity,
        price: item.price,
    }
    .validate()?;

    let lines: Vec<OrderItem> = order
        .items
        .iter()
        .map(|line| if line.id == item.id { item.clone() } else { line.clone() })
        .collect();
    reprice(&state, &mut order, &lines)?;

    state.repos.order_items.update_item(&order, &item).await?;
    Ok(Json(item))
}

/// DELETE /order-items/:id
async fn delete_item(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> AppResult<Json<Value>> {
    claims.require(&SHOP_ROLES)?;
    let item = load_item(&state, id).await?;
    let mut order = load_order(&state, item.order_id).await?;
    order.ensure_editable()?;

    let lines: Vec<OrderItem> = order.items.iter().filter(|line| line.id != id).cloned().collect();
    reprice(&state, &mut order, &lines)?;

    state.repos.order_items.delete_item(&order, id).await?;
    Ok(Json(json!({ "message": "Order item deleted successfully" })))
}
