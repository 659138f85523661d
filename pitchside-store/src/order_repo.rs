use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pitchside_catalog::{apply_sale, resize_sale, restock, CatalogError};
use pitchside_core::repository::{OrderItemRepository, OrderRepository};
use pitchside_core::RepoResult;
use pitchside_order::{
    NewOrder, NewOrderItem, Order, OrderError, OrderItem, OrderStatus, PaymentMethod, Quote, ShippingAddress,
};
use pitchside_shared::Money;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::catalog_repo::{fetch_product, save_stock};

pub struct StoreOrderRepository {
    pool: PgPool,
}

impl StoreOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ORDER_SELECT: &str = "SELECT id, order_number, user_id, subtotal_minor, shipping_minor, tax_minor, total_minor, \
    status, shipping_address, payment_method, created_at, updated_at FROM orders";

const ITEM_SELECT: &str = "SELECT i.id, i.order_id, i.product_id, p.name AS product_name, i.quantity, i.price_minor \
    FROM order_items i LEFT JOIN products p ON p.id = i.product_id";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i32,
    order_number: String,
    user_id: Option<Uuid>,
    subtotal_minor: i64,
    shipping_minor: i64,
    tax_minor: i64,
    total_minor: i64,
    status: String,
    shipping_address: Json<ShippingAddress>,
    payment_method: Json<PaymentMethod>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    order_id: i32,
    product_id: i32,
    product_name: Option<String>,
    quantity: i32,
    price_minor: i64,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            price: Money::from_minor(row.price_minor),
        }
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, OrderError> {
        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            user_id: self.user_id,
            subtotal: Money::from_minor(self.subtotal_minor),
            shipping: Money::from_minor(self.shipping_minor),
            tax: Money::from_minor(self.tax_minor),
            total: Money::from_minor(self.total_minor),
            status: self.status.parse()?,
            shipping_address: self.shipping_address.0,
            payment_method: self.payment_method.0,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl StoreOrderRepository {
    /// Attaches the items of every order in one round trip.
    async fn with_items(&self, rows: Vec<OrderRow>) -> RepoResult<Vec<Order>> {
        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        let items = sqlx::query_as::<_, OrderItemRow>(&format!("{} WHERE i.order_id = ANY($1) ORDER BY i.id", ITEM_SELECT))
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;

        let mut items: Vec<OrderItem> = items.into_iter().map(OrderItem::from).collect();
        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let (mine, rest): (Vec<_>, Vec<_>) = items.into_iter().partition(|i| i.order_id == row.id);
            items = rest;
            orders.push(row.into_order(mine)?);
        }
        Ok(orders)
    }
}

/// Locks the order row; lines may only change while it is pending.
async fn lock_pending(conn: &mut PgConnection, order_id: i32) -> RepoResult<()> {
    let status: Option<(String,)> = sqlx::query_as("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?;
    let (status,) = status.ok_or(OrderError::NotFound(order_id))?;
    if status.parse::<OrderStatus>()? != OrderStatus::Pending {
        return Err(OrderError::NotEditable.into());
    }
    Ok(())
}

/// Moves the stock of `product_id` for a line going from `before` to `after` units.
async fn move_stock(conn: &mut PgConnection, product_id: i32, before: i32, after: i32) -> RepoResult<()> {
    if before == after {
        return Ok(());
    }
    let mut product = fetch_product(&mut *conn, product_id, true)
        .await?
        .ok_or_else(|| CatalogError::product_not_found(product_id))?;
    resize_sale(&mut product, before, after)?;
    save_stock(&mut *conn, &product).await
}

async fn save_totals(conn: &mut PgConnection, order: &Order) -> RepoResult<()> {
    sqlx::query(
        "UPDATE orders SET subtotal_minor = $2, shipping_minor = $3, tax_minor = $4, total_minor = $5, updated_at = NOW() WHERE id = $1",
    )
    .bind(order.id)
    .bind(order.subtotal.minor())
    .bind(order.shipping.minor())
    .bind(order.tax.minor())
    .bind(order.total.minor())
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl OrderRepository for StoreOrderRepository {
    async fn create_order(
        &self,
        order: &NewOrder,
        order_number: &str,
        user_id: Option<Uuid>,
        quote: &Quote,
    ) -> RepoResult<Order> {
        let mut tx = self.pool.begin().await?;

        for item in &order.items {
            let mut product = fetch_product(&mut *tx, item.product_id, true)
                .await?
                .ok_or_else(|| CatalogError::product_not_found(item.product_id))?;
            apply_sale(&mut product, item.quantity)?;
            save_stock(&mut *tx, &product).await?;
        }

        let (order_id,): (i32,) = sqlx::query_as(
            r#"
            INSERT INTO orders (order_number, user_id, subtotal_minor, shipping_minor, tax_minor, total_minor,
                                status, shipping_address, payment_method)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(order_number)
        .bind(user_id)
        .bind(quote.subtotal.minor())
        .bind(quote.shipping.minor())
        .bind(quote.tax.minor())
        .bind(quote.total.minor())
        .bind(OrderStatus::Pending.as_str())
        .bind(Json(&order.shipping_address))
        .bind(Json(&order.payment_method))
        .fetch_one(&mut *tx)
        .await?;

        for item in &order.items {
            sqlx::query("INSERT INTO order_items (order_id, product_id, quantity, price_minor) VALUES ($1, $2, $3, $4)")
                .bind(order_id)
                .bind(item.product_id)
                .bind(item.quantity)
                .bind(item.price.minor())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        info!("Order {} stored with {} items", order_number, order.items.len());

        self.get_order(order_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(order_id).into())
    }

    async fn get_order(&self, id: i32) -> RepoResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("{} WHERE id = $1", ORDER_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(self.with_items(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> RepoResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("{} WHERE user_id = $1 ORDER BY created_at DESC", ORDER_SELECT))
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        self.with_items(rows).await
    }

    async fn list_orders(&self) -> RepoResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("{} ORDER BY created_at DESC", ORDER_SELECT))
            .fetch_all(&self.pool)
            .await?;
        self.with_items(rows).await
    }

    async fn update_order_status(&self, order: &Order, from: OrderStatus, restock_items: bool) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 AND status = $3")
            .bind(order.id)
            .bind(order.status.as_str())
            .bind(from.as_str())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(OrderError::StaleStatus(order.id).into());
        }

        if restock_items {
            for item in &order.items {
                if let Some(mut product) = fetch_product(&mut *tx, item.product_id, true).await? {
                    restock(&mut product, item.quantity);
                    save_stock(&mut *tx, &product).await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_order(&self, id: i32) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_by_status(&self) -> RepoResult<Vec<(OrderStatus, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as("SELECT status, COUNT(*) FROM orders GROUP BY status ORDER BY status")
            .fetch_all(&self.pool)
            .await?;
        let mut counts = Vec::with_capacity(rows.len());
        for (status, count) in rows {
            counts.push((status.parse()?, count));
        }
        Ok(counts)
    }
}

pub struct StoreOrderItemRepository {
    pool: PgPool,
}

impl StoreOrderItemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderItemRepository for StoreOrderItemRepository {
    async fn list_items(&self, order_id: Option<i32>) -> RepoResult<Vec<OrderItem>> {
        let rows = sqlx::query_as::<_, OrderItemRow>(&format!(
            "{} WHERE ($1::INT IS NULL OR i.order_id = $1) ORDER BY i.id",
            ITEM_SELECT
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(OrderItem::from).collect())
    }

    async fn get_item(&self, id: i32) -> RepoResult<Option<OrderItem>> {
        let row = sqlx::query_as::<_, OrderItemRow>(&format!("{} WHERE i.id = $1", ITEM_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(OrderItem::from))
    }

    async fn add_item(&self, order: &Order, item: &NewOrderItem) -> RepoResult<OrderItem> {
        let mut tx = self.pool.begin().await?;
        lock_pending(&mut tx, order.id).await?;
        move_stock(&mut tx, item.product_id, 0, item.quantity).await?;
        let (id,): (i32,) = sqlx::query_as(
            "INSERT INTO order_items (order_id, product_id, quantity, price_minor) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(order.id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.price.minor())
        .fetch_one(&mut *tx)
        .await?;
        save_totals(&mut tx, order).await?;

        let row = sqlx::query_as::<_, OrderItemRow>(&format!("{} WHERE i.id = $1", ITEM_SELECT))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row.into())
    }

    async fn update_item(&self, order: &Order, item: &OrderItem) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;
        lock_pending(&mut tx, order.id).await?;
        let (old_product, old_quantity): (i32, i32) =
            sqlx::query_as("SELECT product_id, quantity FROM order_items WHERE id = $1 FOR UPDATE")
                .bind(item.id)
                .fetch_one(&mut *tx)
                .await?;
        if old_product == item.product_id {
            move_stock(&mut tx, item.product_id, old_quantity, item.quantity).await?;
        } else {
            move_stock(&mut tx, old_product, old_quantity, 0).await?;
            move_stock(&mut tx, item.product_id, 0, item.quantity).await?;
        }
        sqlx::query("UPDATE order_items SET product_id = $2, quantity = $3, price_minor = $4 WHERE id = $1")
            .bind(item.id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.price.minor())
            .execute(&mut *tx)
            .await?;
        save_totals(&mut tx, order).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_item(&self, order: &Order, item_id: i32) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;
        lock_pending(&mut tx, order.id).await?;
        let removed: Option<(i32, i32)> =
            sqlx::query_as("DELETE FROM order_items WHERE id = $1 RETURNING product_id, quantity")
                .bind(item_id)
                .fetch_optional(&mut *tx)
                .await?;
        if let Some((product_id, quantity)) = removed {
            // the product may have been deleted since the sale
            if fetch_product(&mut *tx, product_id, false).await?.is_some() {
                move_stock(&mut tx, product_id, quantity, 0).await?;
            }
        }
        save_totals(&mut tx, order).await?;
        tx.commit().await?;
        Ok(())
    }
}
