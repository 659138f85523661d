#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{NaiveDate, Utc};
use http_body_util::BodyExt;
use pitchside_api::middleware::auth::issue_tokens;
use pitchside_api::{app, AppState, Repositories};
use pitchside_booking::field::FieldSearch;
use pitchside_booking::{Field, Reservation, ReservationStatus, Terrain};
use pitchside_catalog::{apply_sale, resize_sale, restock, CatalogError, Category, NewCategory, NewProduct, Product, ProductFilter, ProductSort};
use pitchside_club::{FullMatch, IncompleteMatch, Rating, RatingTally, Team, TeamMatch};
use pitchside_core::credentials::hash_secret;
use pitchside_core::mailer::{Mailer, OutgoingMail};
use pitchside_core::repository::*;
use pitchside_core::{Notification, RepoResult, Role, User};
use pitchside_order::{NewOrder, NewOrderItem, Order, OrderError, OrderItem, OrderStatus, Quote};
use pitchside_store::app_config::{
    AuthConfig, BookingConfig, Config, DatabaseConfig, NotificationConfig, ServerConfig, ShopConfig,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "secret123";

#[derive(Default)]
struct Data {
    users: Vec<User>,
    categories: Vec<Category>,
    products: Vec<Product>,
    orders: Vec<Order>,
    fields: Vec<Field>,
    terrains: Vec<Terrain>,
    reservations: Vec<Reservation>,
    teams: Vec<Team>,
    matches: Vec<IncompleteMatch>,
    full_matches: Vec<FullMatch>,
    team_matches: Vec<TeamMatch>,
    ratings: Vec<Rating>,
    notifications: Vec<Notification>,
    next_id: i32,
}

impl Data {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn category_name(&self, id: i32) -> Option<String> {
        self.categories.iter().find(|c| c.id == id).map(|c| c.name.clone())
    }

    fn bump_category(&mut self, id: i32, delta: i32) {
        if let Some(c) = self.categories.iter_mut().find(|c| c.id == id) {
            c.product_count = (c.product_count + delta).max(0);
        }
    }

    fn product_mut(&mut self, id: i32) -> RepoResult<&mut Product> {
        Ok(self
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| CatalogError::product_not_found(id))?)
    }

    fn put_reservation(&mut self, reservation: &Reservation) {
        match self.reservations.iter_mut().find(|r| r.id == reservation.id) {
            Some(existing) => *existing = reservation.clone(),
            None => self.reservations.push(reservation.clone()),
        }
    }
}

/// Mutex-backed stand-in for the Postgres repositories.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<Data>,
}

impl MemoryStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, Data> {
        self.data.lock().unwrap()
    }

    pub fn product(&self, id: i32) -> Option<Product> {
        self.lock().products.iter().find(|p| p.id == id).cloned()
    }

    pub fn category(&self, id: i32) -> Option<Category> {
        self.lock().categories.iter().find(|c| c.id == id).cloned()
    }

    pub fn notifications_for(&self, user_id: Uuid) -> Vec<Notification> {
        self.lock()
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn reservation(&self, id: Uuid) -> Option<Reservation> {
        self.lock().reservations.iter().find(|r| r.id == id).cloned()
    }

    pub fn reservation_for_match(&self, match_id: Uuid) -> Option<Reservation> {
        self.lock().reservations.iter().find(|r| r.match_id == Some(match_id)).cloned()
    }

    pub fn user(&self, id: Uuid) -> Option<User> {
        self.lock().users.iter().find(|u| u.id == id).cloned()
    }

    pub fn edit_user(&self, id: Uuid, edit: impl FnOnce(&mut User)) {
        if let Some(user) = self.lock().users.iter_mut().find(|u| u.id == id) {
            edit(user);
        }
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: &User) -> RepoResult<()> {
        self.lock().users.push(user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn save_user(&self, user: &User) -> RepoResult<()> {
        if let Some(existing) = self.lock().users.iter_mut().find(|u| u.id == user.id) {
            *existing = user.clone();
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        let mut data = self.lock();
        let before = data.users.len();
        data.users.retain(|u| u.id != id);
        Ok(data.users.len() != before)
    }

    async fn list_users(&self, role: Option<Role>) -> RepoResult<Vec<User>> {
        Ok(self
            .lock()
            .users
            .iter()
            .filter(|u| role.is_none_or(|r| u.role == r))
            .cloned()
            .collect())
    }

    async fn get_users(&self, ids: &[Uuid]) -> RepoResult<Vec<User>> {
        Ok(self.lock().users.iter().filter(|u| ids.contains(&u.id)).cloned().collect())
    }

    async fn search_players(&self, exclude: Uuid, search: Option<&str>) -> RepoResult<Vec<User>> {
        let needle = search.map(str::to_lowercase);
        Ok(self
            .lock()
            .users
            .iter()
            .filter(|u| u.role == Role::Player && u.is_active && u.id != exclude)
            .filter(|u| {
                needle.as_deref().is_none_or(|n| {
                    u.full_name().to_lowercase().contains(n) || u.email.to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect())
    }

    async fn count_by_role(&self) -> RepoResult<Vec<(Role, i64)>> {
        let data = self.lock();
        Ok(Role::ALL
            .into_iter()
            .map(|role| (role, data.users.iter().filter(|u| u.role == role).count() as i64))
            .filter(|(_, n)| *n > 0)
            .collect())
    }
}

#[async_trait]
impl CategoryRepository for MemoryStore {
    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        Ok(self.lock().categories.clone())
    }

    async fn get_category(&self, id: i32) -> RepoResult<Option<Category>> {
        Ok(self.lock().categories.iter().find(|c| c.id == id).cloned())
    }

    async fn find_category_by_name(&self, name: &str) -> RepoResult<Option<Category>> {
        Ok(self
            .lock()
            .categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn create_category(&self, category: &NewCategory) -> RepoResult<Category> {
        let mut data = self.lock();
        let created = Category {
            id: data.next_id(),
            name: category.name.trim().to_string(),
            icon: category.icon.clone(),
            product_count: 0,
        };
        data.categories.push(created.clone());
        Ok(created)
    }

    async fn update_category(&self, category: &Category) -> RepoResult<()> {
        if let Some(existing) = self.lock().categories.iter_mut().find(|c| c.id == category.id) {
            *existing = category.clone();
        }
        Ok(())
    }

    async fn delete_category(&self, id: i32) -> RepoResult<bool> {
        let mut data = self.lock();
        let before = data.categories.len();
        data.categories.retain(|c| c.id != id);
        Ok(data.categories.len() != before)
    }
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn list_products(&self, filter: &ProductFilter) -> RepoResult<(Vec<Product>, i64)> {
        let data = self.lock();
        let needle = filter.search.as_deref().map(str::to_lowercase);
        let mut matching: Vec<Product> = data
            .products
            .iter()
            .filter(|p| {
                filter
                    .category
                    .as_deref()
                    .is_none_or(|c| p.category.as_deref().is_some_and(|name| name.eq_ignore_ascii_case(c)))
            })
            .filter(|p| filter.min_price.is_none_or(|min| p.price >= min))
            .filter(|p| filter.max_price.is_none_or(|max| p.price <= max))
            .filter(|p| needle.as_deref().is_none_or(|n| p.name.to_lowercase().contains(n)))
            .cloned()
            .collect();

        match filter.sort {
            ProductSort::Newest => matching.sort_by(|a, b| b.id.cmp(&a.id)),
            ProductSort::PriceLow => matching.sort_by_key(|p| (p.price.minor(), p.id)),
            ProductSort::PriceHigh => matching.sort_by_key(|p| (-p.price.minor(), p.id)),
            ProductSort::Rating => matching.sort_by(|a, b| b.rating.total_cmp(&a.rating).then(a.id.cmp(&b.id))),
            ProductSort::Name => matching.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id))),
        }

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn get_product(&self, id: i32) -> RepoResult<Option<Product>> {
        Ok(self.lock().products.iter().find(|p| p.id == id).cloned())
    }

    async fn create_product(&self, product: &NewProduct) -> RepoResult<Product> {
        let mut data = self.lock();
        let now = Utc::now();
        let created = Product {
            id: data.next_id(),
            name: product.name.trim().to_string(),
            description: product.description.clone(),
            price: product.price,
            original_price: product.original_price,
            image: product.image.clone(),
            stock: product.stock,
            status: product.initial_status(),
            rating: product.rating.unwrap_or(0.0),
            review_count: 0,
            sales_count: 0,
            badge: product.badge.clone(),
            category_id: product.category_id,
            category: data.category_name(product.category_id),
            created_at: now,
            updated_at: now,
        };
        data.products.push(created.clone());
        data.bump_category(product.category_id, 1);
        Ok(created)
    }

    async fn update_product(&self, product: &Product, previous_category: i32) -> RepoResult<()> {
        let mut data = self.lock();
        let mut stored = product.clone();
        stored.category = data.category_name(product.category_id);
        *data.product_mut(product.id)? = stored;
        if previous_category != product.category_id {
            data.bump_category(previous_category, -1);
            data.bump_category(product.category_id, 1);
        }
        Ok(())
    }

    async fn delete_product(&self, product: &Product) -> RepoResult<()> {
        let mut data = self.lock();
        data.products.retain(|p| p.id != product.id);
        data.bump_category(product.category_id, -1);
        Ok(())
    }

    async fn count_products(&self) -> RepoResult<i64> {
        Ok(self.lock().products.len() as i64)
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn create_order(
        &self,
        order: &NewOrder,
        order_number: &str,
        user_id: Option<Uuid>,
        quote: &Quote,
    ) -> RepoResult<Order> {
        let mut data = self.lock();

        // Work on copies so a failing line leaves stock untouched.
        let mut products = data.products.clone();
        for item in &order.items {
            let product = products
                .iter_mut()
                .find(|p| p.id == item.product_id)
                .ok_or_else(|| CatalogError::product_not_found(item.product_id))?;
            apply_sale(product, item.quantity)?;
        }
        data.products = products;

        let id = data.next_id();
        let mut items = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let product_name = data.products.iter().find(|p| p.id == item.product_id).map(|p| p.name.clone());
            items.push(OrderItem {
                id: data.next_id(),
                order_id: id,
                product_id: item.product_id,
                product_name,
                quantity: item.quantity,
                price: item.price,
            });
        }

        let now = Utc::now();
        let created = Order {
            id,
            order_number: order_number.to_string(),
            user_id,
            subtotal: quote.subtotal,
            shipping: quote.shipping,
            tax: quote.tax,
            total: quote.total,
            status: OrderStatus::Pending,
            shipping_address: order.shipping_address.clone(),
            payment_method: order.payment_method.clone(),
            items,
            created_at: now,
            updated_at: now,
        };
        data.orders.push(created.clone());
        Ok(created)
    }

    async fn get_order(&self, id: i32) -> RepoResult<Option<Order>> {
        Ok(self.lock().orders.iter().find(|o| o.id == id).cloned())
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> RepoResult<Vec<Order>> {
        Ok(self
            .lock()
            .orders
            .iter()
            .filter(|o| o.user_id == Some(user_id))
            .cloned()
            .collect())
    }

    async fn list_orders(&self) -> RepoResult<Vec<Order>> {
        Ok(self.lock().orders.clone())
    }

    async fn update_order_status(&self, order: &Order, from: OrderStatus, put_back: bool) -> RepoResult<()> {
        let mut data = self.lock();
        let stored = data.orders.iter().find(|o| o.id == order.id).map(|o| o.status);
        if stored != Some(from) {
            return Err(OrderError::StaleStatus(order.id).into());
        }
        if put_back {
            for item in &order.items {
                if let Ok(product) = data.product_mut(item.product_id) {
                    restock(product, item.quantity);
                }
            }
        }
        if let Some(existing) = data.orders.iter_mut().find(|o| o.id == order.id) {
            existing.status = order.status;
            existing.updated_at = order.updated_at;
        }
        Ok(())
    }

    async fn delete_order(&self, id: i32) -> RepoResult<bool> {
        let mut data = self.lock();
        let before = data.orders.len();
        data.orders.retain(|o| o.id != id);
        Ok(data.orders.len() != before)
    }

    async fn count_by_status(&self) -> RepoResult<Vec<(OrderStatus, i64)>> {
        let data = self.lock();
        let statuses = [OrderStatus::Pending, OrderStatus::Shipped, OrderStatus::Completed, OrderStatus::Cancelled];
        Ok(statuses
            .into_iter()
            .map(|s| (s, data.orders.iter().filter(|o| o.status == s).count() as i64))
            .filter(|(_, n)| *n > 0)
            .collect())
    }
}

fn store_totals(data: &mut Data, order: &Order) {
    if let Some(existing) = data.orders.iter_mut().find(|o| o.id == order.id) {
        existing.subtotal = order.subtotal;
        existing.tax = order.tax;
        existing.total = order.total;
    }
}

#[async_trait]
impl OrderItemRepository for MemoryStore {
    async fn list_items(&self, order_id: Option<i32>) -> RepoResult<Vec<OrderItem>> {
        Ok(self
            .lock()
            .orders
            .iter()
            .filter(|o| order_id.is_none_or(|id| o.id == id))
            .flat_map(|o| o.items.clone())
            .collect())
    }

    async fn get_item(&self, id: i32) -> RepoResult<Option<OrderItem>> {
        Ok(self
            .lock()
            .orders
            .iter()
            .flat_map(|o| o.items.iter())
            .find(|i| i.id == id)
            .cloned())
    }

    async fn add_item(&self, order: &Order, item: &NewOrderItem) -> RepoResult<OrderItem> {
        let mut data = self.lock();
        resize_sale(data.product_mut(item.product_id)?, 0, item.quantity)?;
        let product_name = data.products.iter().find(|p| p.id == item.product_id).map(|p| p.name.clone());
        let created = OrderItem {
            id: data.next_id(),
            order_id: order.id,
            product_id: item.product_id,
            product_name,
            quantity: item.quantity,
            price: item.price,
        };
        if let Some(existing) = data.orders.iter_mut().find(|o| o.id == order.id) {
            existing.items.push(created.clone());
        }
        store_totals(&mut data, order);
        Ok(created)
    }

    async fn update_item(&self, order: &Order, item: &OrderItem) -> RepoResult<()> {
        let mut data = self.lock();
        let old = data
            .orders
            .iter()
            .flat_map(|o| o.items.iter())
            .find(|i| i.id == item.id)
            .map(|i| (i.product_id, i.quantity));
        if let Some((old_product, old_quantity)) = old {
            if old_product == item.product_id {
                resize_sale(data.product_mut(item.product_id)?, old_quantity, item.quantity)?;
            } else {
                resize_sale(data.product_mut(item.product_id)?, 0, item.quantity)?;
                resize_sale(data.product_mut(old_product)?, old_quantity, 0)?;
            }
        }
        if let Some(existing) = data
            .orders
            .iter_mut()
            .flat_map(|o| o.items.iter_mut())
            .find(|i| i.id == item.id)
        {
            *existing = item.clone();
        }
        store_totals(&mut data, order);
        Ok(())
    }

    async fn delete_item(&self, order: &Order, item_id: i32) -> RepoResult<()> {
        let mut data = self.lock();
        let old = data
            .orders
            .iter()
            .flat_map(|o| o.items.iter())
            .find(|i| i.id == item_id)
            .map(|i| (i.product_id, i.quantity));
        if let Some((product_id, quantity)) = old {
            if let Ok(product) = data.product_mut(product_id) {
                restock(product, quantity);
            }
        }
        if let Some(existing) = data.orders.iter_mut().find(|o| o.id == order.id) {
            existing.items.retain(|i| i.id != item_id);
        }
        store_totals(&mut data, order);
        Ok(())
    }
}

fn new_terrains(field_id: Uuid, names: &[String]) -> Vec<Terrain> {
    names
        .iter()
        .map(|name| Terrain { id: Uuid::new_v4(), field_id, name: name.clone(), is_active: true })
        .collect()
}

#[async_trait]
impl FieldRepository for MemoryStore {
    async fn create_field(&self, field: &Field, terrain_names: &[String]) -> RepoResult<Vec<Terrain>> {
        let mut data = self.lock();
        let terrains = new_terrains(field.id, terrain_names);
        data.fields.push(field.clone());
        data.terrains.extend(terrains.iter().cloned());
        Ok(terrains)
    }

    async fn get_field(&self, id: Uuid) -> RepoResult<Option<Field>> {
        Ok(self.lock().fields.iter().find(|f| f.id == id).cloned())
    }

    async fn list_fields(&self, search: &FieldSearch) -> RepoResult<Vec<Field>> {
        Ok(self
            .lock()
            .fields
            .iter()
            .filter(|f| search.city.as_deref().is_none_or(|c| f.city.eq_ignore_ascii_case(c)))
            .filter(|f| search.max_price_per_hour.is_none_or(|max| f.price_per_hour <= max))
            .filter(|f| search.has_showers.is_none_or(|v| f.has_showers == v))
            .filter(|f| search.has_water.is_none_or(|v| f.has_water == v))
            .filter(|f| search.is_indoor.is_none_or(|v| f.is_indoor == v))
            .cloned()
            .collect())
    }

    async fn list_fields_by_owner(&self, owner_id: Uuid) -> RepoResult<Vec<Field>> {
        Ok(self.lock().fields.iter().filter(|f| f.owner_id == owner_id).cloned().collect())
    }

    async fn update_field(&self, field: &Field, add_terrains: &[String], remove_terrains: &[Uuid]) -> RepoResult<()> {
        let mut data = self.lock();
        if let Some(existing) = data.fields.iter_mut().find(|f| f.id == field.id) {
            *existing = field.clone();
        }
        data.terrains.retain(|t| !remove_terrains.contains(&t.id));
        let added = new_terrains(field.id, add_terrains);
        data.terrains.extend(added);
        Ok(())
    }

    async fn delete_field(&self, id: Uuid) -> RepoResult<bool> {
        let mut data = self.lock();
        let before = data.fields.len();
        data.fields.retain(|f| f.id != id);
        data.terrains.retain(|t| t.field_id != id);
        data.reservations.retain(|r| r.field_id != id);
        Ok(data.fields.len() != before)
    }

    async fn count_fields(&self) -> RepoResult<i64> {
        Ok(self.lock().fields.len() as i64)
    }
}

#[async_trait]
impl TerrainRepository for MemoryStore {
    async fn list_terrains(&self, field_id: Uuid) -> RepoResult<Vec<Terrain>> {
        let mut terrains: Vec<Terrain> = self.lock().terrains.iter().filter(|t| t.field_id == field_id).cloned().collect();
        terrains.sort_by(|a, b| a.name.len().cmp(&b.name.len()).then(a.name.cmp(&b.name)));
        Ok(terrains)
    }

    async fn get_terrain(&self, id: Uuid) -> RepoResult<Option<Terrain>> {
        Ok(self.lock().terrains.iter().find(|t| t.id == id).cloned())
    }

    async fn update_terrain(&self, terrain: &Terrain) -> RepoResult<()> {
        if let Some(existing) = self.lock().terrains.iter_mut().find(|t| t.id == terrain.id) {
            *existing = terrain.clone();
        }
        Ok(())
    }

    async fn delete_terrain(&self, id: Uuid) -> RepoResult<bool> {
        let mut data = self.lock();
        let Some(position) = data.terrains.iter().position(|t| t.id == id) else {
            return Ok(false);
        };
        let removed = data.terrains.remove(position);
        if let Some(field) = data.fields.iter_mut().find(|f| f.id == removed.field_id) {
            field.number_of_terrains = (field.number_of_terrains - 1).max(1);
        }
        Ok(true)
    }

    async fn has_upcoming_approved(&self, terrain_id: Uuid, from: NaiveDate) -> RepoResult<bool> {
        Ok(self.lock().reservations.iter().any(|r| {
            r.terrain_id == Some(terrain_id) && r.status == ReservationStatus::Approved && r.date >= from
        }))
    }
}

#[async_trait]
impl ReservationRepository for MemoryStore {
    async fn create_reservation(&self, reservation: &Reservation) -> RepoResult<()> {
        self.lock().reservations.push(reservation.clone());
        Ok(())
    }

    async fn create_reservations(&self, reservations: &[Reservation]) -> RepoResult<()> {
        self.lock().reservations.extend(reservations.iter().cloned());
        Ok(())
    }

    async fn get_reservation(&self, id: Uuid) -> RepoResult<Option<Reservation>> {
        Ok(self.reservation(id))
    }

    async fn update_reservation(&self, reservation: &Reservation) -> RepoResult<()> {
        self.lock().put_reservation(reservation);
        Ok(())
    }

    async fn delete_reservation(&self, id: Uuid) -> RepoResult<bool> {
        let mut data = self.lock();
        let before = data.reservations.len();
        data.reservations.retain(|r| r.id != id);
        Ok(data.reservations.len() != before)
    }

    async fn list_by_field(&self, field_id: Uuid, status: Option<ReservationStatus>) -> RepoResult<Vec<Reservation>> {
        Ok(self
            .lock()
            .reservations
            .iter()
            .filter(|r| r.field_id == field_id && status.is_none_or(|s| r.status == s))
            .cloned()
            .collect())
    }

    async fn list_by_user(&self, user_id: Uuid) -> RepoResult<Vec<Reservation>> {
        Ok(self.lock().reservations.iter().filter(|r| r.user_id == user_id).cloned().collect())
    }

    async fn list_by_field_between(&self, field_id: Uuid, from: NaiveDate, to: NaiveDate) -> RepoResult<Vec<Reservation>> {
        Ok(self
            .lock()
            .reservations
            .iter()
            .filter(|r| r.field_id == field_id && r.date >= from && r.date <= to)
            .cloned()
            .collect())
    }

    async fn list_approved_on_terrain(&self, terrain_id: Uuid, from: NaiveDate, to: NaiveDate) -> RepoResult<Vec<Reservation>> {
        Ok(self
            .lock()
            .reservations
            .iter()
            .filter(|r| r.terrain_id == Some(terrain_id) && r.status == ReservationStatus::Approved)
            .filter(|r| r.date >= from && r.date <= to)
            .cloned()
            .collect())
    }

    async fn find_by_match(&self, match_id: Uuid) -> RepoResult<Option<Reservation>> {
        Ok(self.lock().reservations.iter().find(|r| r.match_id == Some(match_id)).cloned())
    }

    async fn count_by_status(&self) -> RepoResult<Vec<(ReservationStatus, i64)>> {
        let data = self.lock();
        let mut counts: Vec<(ReservationStatus, i64)> = Vec::new();
        for r in &data.reservations {
            match counts.iter_mut().find(|(s, _)| *s == r.status) {
                Some((_, n)) => *n += 1,
                None => counts.push((r.status, 1)),
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl TeamRepository for MemoryStore {
    async fn create_team(&self, team: &Team) -> RepoResult<()> {
        self.lock().teams.push(team.clone());
        Ok(())
    }

    async fn get_team(&self, id: Uuid) -> RepoResult<Option<Team>> {
        Ok(self.lock().teams.iter().find(|t| t.id == id).cloned())
    }

    async fn find_team_by_name(&self, name: &str) -> RepoResult<Option<Team>> {
        Ok(self.lock().teams.iter().find(|t| t.name == name).cloned())
    }

    async fn list_teams(&self) -> RepoResult<Vec<Team>> {
        Ok(self.lock().teams.clone())
    }

    async fn save_team(&self, team: &Team) -> RepoResult<()> {
        if let Some(existing) = self.lock().teams.iter_mut().find(|t| t.id == team.id) {
            *existing = team.clone();
        }
        Ok(())
    }

    async fn delete_team(&self, id: Uuid) -> RepoResult<bool> {
        let mut data = self.lock();
        let before = data.teams.len();
        data.teams.retain(|t| t.id != id);
        Ok(data.teams.len() != before)
    }

    async fn find_captained_by(&self, user_id: Uuid) -> RepoResult<Option<Team>> {
        Ok(self.lock().teams.iter().find(|t| t.captain_id == user_id).cloned())
    }

    async fn list_member_of(&self, user_id: Uuid) -> RepoResult<Vec<Team>> {
        Ok(self
            .lock()
            .teams
            .iter()
            .filter(|t| t.captain_id == user_id || t.players.contains(&user_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MatchRepository for MemoryStore {
    async fn create_match(&self, created: &IncompleteMatch, reservation: &Reservation) -> RepoResult<()> {
        let mut data = self.lock();
        data.matches.push(created.clone());
        data.reservations.push(reservation.clone());
        Ok(())
    }

    async fn get_match(&self, id: Uuid) -> RepoResult<Option<IncompleteMatch>> {
        Ok(self.lock().matches.iter().find(|m| m.id == id).cloned())
    }

    async fn list_matches(&self, filter: &MatchFilter) -> RepoResult<Vec<IncompleteMatch>> {
        let needle = filter.city.as_deref().map(str::to_lowercase);
        Ok(self
            .lock()
            .matches
            .iter()
            .filter(|m| needle.as_deref().is_none_or(|c| m.city.to_lowercase().contains(c)))
            .filter(|m| filter.date.is_none_or(|d| m.date == d))
            .filter(|m| filter.status.is_none_or(|s| m.status == s))
            .filter(|m| filter.viewer.is_none_or(|v| m.is_visible_to(v)))
            .cloned()
            .collect())
    }

    async fn save_match(&self, updated: &IncompleteMatch, reservation: Option<&Reservation>) -> RepoResult<()> {
        let mut data = self.lock();
        if let Some(existing) = data.matches.iter_mut().find(|m| m.id == updated.id) {
            *existing = updated.clone();
        }
        if let Some(reservation) = reservation {
            data.put_reservation(reservation);
        }
        Ok(())
    }

    async fn delete_match(&self, id: Uuid) -> RepoResult<bool> {
        let mut data = self.lock();
        let before = data.matches.len();
        data.matches.retain(|m| m.id != id);
        data.reservations.retain(|r| r.match_id != Some(id));
        Ok(data.matches.len() != before)
    }
}

#[async_trait]
impl FullMatchRepository for MemoryStore {
    async fn create_full_match(&self, created: &FullMatch, reservation: &Reservation) -> RepoResult<()> {
        let mut data = self.lock();
        data.full_matches.push(created.clone());
        data.reservations.push(reservation.clone());
        Ok(())
    }

    async fn get_full_match(&self, id: Uuid) -> RepoResult<Option<FullMatch>> {
        Ok(self.lock().full_matches.iter().find(|m| m.id == id && !m.is_deleted).cloned())
    }

    async fn list_full_matches(&self, creator: Option<Uuid>) -> RepoResult<Vec<FullMatch>> {
        Ok(self
            .lock()
            .full_matches
            .iter()
            .filter(|m| !m.is_deleted && creator.is_none_or(|c| m.creator_id == c))
            .cloned()
            .collect())
    }

    async fn save_full_match(&self, updated: &FullMatch, reservation: Option<&Reservation>) -> RepoResult<()> {
        let mut data = self.lock();
        if let Some(existing) = data.full_matches.iter_mut().find(|m| m.id == updated.id) {
            *existing = updated.clone();
        }
        if let Some(reservation) = reservation {
            data.put_reservation(reservation);
        }
        Ok(())
    }

    async fn retire_full_match(&self, retired: &FullMatch) -> RepoResult<()> {
        let mut data = self.lock();
        if let Some(existing) = data.full_matches.iter_mut().find(|m| m.id == retired.id) {
            existing.is_deleted = true;
        }
        data.reservations.retain(|r| r.match_id != Some(retired.id));
        Ok(())
    }
}

#[async_trait]
impl TeamMatchRepository for MemoryStore {
    async fn create_team_match(&self, created: &TeamMatch, reservation: &Reservation) -> RepoResult<()> {
        let mut data = self.lock();
        data.team_matches.push(created.clone());
        data.reservations.push(reservation.clone());
        Ok(())
    }

    async fn get_team_match(&self, id: Uuid) -> RepoResult<Option<TeamMatch>> {
        Ok(self.lock().team_matches.iter().find(|m| m.id == id).cloned())
    }

    async fn list_team_matches(&self) -> RepoResult<Vec<TeamMatch>> {
        Ok(self.lock().team_matches.clone())
    }

    async fn save_team_match(&self, updated: &TeamMatch, reservation: Option<&Reservation>) -> RepoResult<()> {
        let mut data = self.lock();
        if let Some(existing) = data.team_matches.iter_mut().find(|m| m.id == updated.id) {
            *existing = updated.clone();
        }
        if let Some(reservation) = reservation {
            data.put_reservation(reservation);
        }
        Ok(())
    }

    async fn delete_team_match(&self, id: Uuid) -> RepoResult<bool> {
        let mut data = self.lock();
        let before = data.team_matches.len();
        data.team_matches.retain(|m| m.id != id);
        data.reservations.retain(|r| r.match_id != Some(id));
        Ok(data.team_matches.len() != before)
    }
}

#[async_trait]
impl RatingRepository for MemoryStore {
    async fn create_rating(&self, rating: &Rating) -> RepoResult<RatingTally> {
        let mut data = self.lock();
        let user = data
            .users
            .iter_mut()
            .find(|u| u.id == rating.player_id)
            .ok_or(sqlx::Error::RowNotFound)?;
        let tally = user.tally().record(rating.score);
        user.total_ratings = tally.total_ratings;
        user.rating_sum = tally.rating_sum;
        user.average_rating = tally.average_rating;
        data.ratings.push(rating.clone());
        Ok(tally)
    }

    async fn rating_exists(&self, rater_id: Uuid, player_id: Uuid, match_id: Uuid) -> RepoResult<bool> {
        Ok(self
            .lock()
            .ratings
            .iter()
            .any(|r| r.rater_id == rater_id && r.player_id == player_id && r.match_id == match_id))
    }

    async fn list_for_user(&self, user_id: Uuid) -> RepoResult<Vec<Rating>> {
        Ok(self
            .lock()
            .ratings
            .iter()
            .filter(|r| r.rater_id == user_id || r.player_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_received(&self, user_id: Uuid) -> RepoResult<Vec<Rating>> {
        Ok(self.lock().ratings.iter().filter(|r| r.player_id == user_id).cloned().collect())
    }

    async fn list_given(&self, user_id: Uuid) -> RepoResult<Vec<Rating>> {
        Ok(self.lock().ratings.iter().filter(|r| r.rater_id == user_id).cloned().collect())
    }

    async fn list_for_match(&self, match_id: Uuid) -> RepoResult<Vec<Rating>> {
        Ok(self.lock().ratings.iter().filter(|r| r.match_id == match_id).cloned().collect())
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn create_notification(&self, notification: &Notification) -> RepoResult<()> {
        self.lock().notifications.push(notification.clone());
        Ok(())
    }

    async fn list_notifications(&self, user_id: Uuid, is_read: Option<bool>) -> RepoResult<Vec<Notification>> {
        let mut found: Vec<Notification> = self
            .lock()
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && is_read.is_none_or(|v| n.is_read == v))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> RepoResult<bool> {
        let mut data = self.lock();
        match data.notifications.iter_mut().find(|n| n.id == id && n.user_id == user_id) {
            Some(n) => {
                n.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, user_id: Uuid) -> RepoResult<u64> {
        let mut changed = 0;
        for n in self.lock().notifications.iter_mut().filter(|n| n.user_id == user_id && !n.is_read) {
            n.is_read = true;
            changed += 1;
        }
        Ok(changed)
    }

    async fn unread_count(&self, user_id: Uuid) -> RepoResult<i64> {
        Ok(self
            .lock()
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count() as i64)
    }
}

pub fn test_config() -> Config {
    Config {
        server: ServerConfig { port: 0 },
        database: DatabaseConfig { url: "postgres://unused".into(), max_connections: 1 },
        auth: AuthConfig {
            jwt_secret: "test-access-secret".into(),
            jwt_refresh_secret: "test-refresh-secret".into(),
            access_token_seconds: 3600,
            refresh_token_seconds: 86_400,
            reset_code_minutes: 15,
        },
        shop: ShopConfig::default(),
        booking: BookingConfig::default(),
        notifications: NotificationConfig::default(),
    }
}

/// Keeps every mail so tests can read the codes sent out.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl RecordingMailer {
    /// The six digit code in the latest mail sent to `to`.
    pub fn last_code_for(&self, to: &str) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        let mail = sent.iter().rev().find(|m| m.to == to)?;
        mail.text
            .split(|c: char| !c.is_ascii_digit())
            .find(|word| word.len() == 6)
            .map(str::to_string)
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> RepoResult<()> {
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::default());
        let repos = Repositories {
            users: store.clone(),
            categories: store.clone(),
            products: store.clone(),
            orders: store.clone(),
            order_items: store.clone(),
            fields: store.clone(),
            terrains: store.clone(),
            reservations: store.clone(),
            teams: store.clone(),
            matches: store.clone(),
            full_matches: store.clone(),
            team_matches: store.clone(),
            ratings: store.clone(),
            notifications: store.clone(),
        };
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::new(repos, mailer.clone(), &test_config()).unwrap();
        let router = app(state.clone());
        Self { store, mailer, state, router }
    }

    /// Stores a user directly and returns it with a bearer token.
    pub fn seed_user(&self, role: Role, active: bool, email: &str) -> (User, String) {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            first_name: "Test".into(),
            last_name: role.as_str().to_lowercase(),
            email: email.to_string(),
            password_hash: hash_secret(PASSWORD).unwrap(),
            refresh_token_hash: None,
            role,
            city: Some("Tunis".into()),
            phone_number: None,
            profile_picture: None,
            bio: None,
            date_of_birth: None,
            is_replacement_player: false,
            is_active: active,
            total_ratings: 0,
            rating_sum: 0,
            average_rating: 0.0,
            reset_code_hash: None,
            reset_code_expires_at: None,
            reset_attempts: 0,
            created_at: now,
            updated_at: now,
        };
        self.store.lock().users.push(user.clone());
        let token = issue_tokens(&self.state.auth, &user).unwrap().access_token;
        (user, token)
    }

    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, json)
    }
}
