use async_trait::async_trait;
use chrono::NaiveDate;
use pitchside_booking::field::FieldSearch;
use pitchside_booking::{Field, Reservation, ReservationStatus, Terrain};
use pitchside_catalog::{Category, NewCategory, NewProduct, Product, ProductFilter};
use pitchside_club::{FullMatch, IncompleteMatch, MatchStatus, Rating, RatingTally, Team, TeamMatch};
use pitchside_order::{NewOrder, NewOrderItem, Order, OrderItem, OrderStatus, Quote};
use uuid::Uuid;

use crate::identity::{Role, User};
use crate::notification::Notification;
use crate::RepoResult;

/// Repository trait for user accounts
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: &User) -> RepoResult<()>;

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;

    /// Writes every mutable column of `user`, secrets included.
    async fn save_user(&self, user: &User) -> RepoResult<()>;

    async fn delete_user(&self, id: Uuid) -> RepoResult<bool>;

    async fn list_users(&self, role: Option<Role>) -> RepoResult<Vec<User>>;

    async fn get_users(&self, ids: &[Uuid]) -> RepoResult<Vec<User>>;

    /// Active players other than `exclude`, matching `search` on name or email.
    async fn search_players(&self, exclude: Uuid, search: Option<&str>) -> RepoResult<Vec<User>>;

    async fn count_by_role(&self) -> RepoResult<Vec<(Role, i64)>>;
}

/// Repository trait for storefront categories
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn list_categories(&self) -> RepoResult<Vec<Category>>;

    async fn get_category(&self, id: i32) -> RepoResult<Option<Category>>;

    async fn find_category_by_name(&self, name: &str) -> RepoResult<Option<Category>>;

    async fn create_category(&self, category: &NewCategory) -> RepoResult<Category>;

    async fn update_category(&self, category: &Category) -> RepoResult<()>;

    async fn delete_category(&self, id: i32) -> RepoResult<bool>;
}

/// Repository trait for product catalog access
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Matching page and the total number of matches.
    async fn list_products(&self, filter: &ProductFilter) -> RepoResult<(Vec<Product>, i64)>;

    async fn get_product(&self, id: i32) -> RepoResult<Option<Product>>;

    /// Inserts the product and bumps its category's product count.
    async fn create_product(&self, product: &NewProduct) -> RepoResult<Product>;

    /// Moves the category count when `previous_category` differs.
    async fn update_product(&self, product: &Product, previous_category: i32) -> RepoResult<()>;

    async fn delete_product(&self, product: &Product) -> RepoResult<()>;

    async fn count_products(&self) -> RepoResult<i64>;
}

/// Repository trait for order data access
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Writes the order and its items and takes the items out of stock, all or nothing.
    async fn create_order(
        &self,
        order: &NewOrder,
        order_number: &str,
        user_id: Option<Uuid>,
        quote: &Quote,
    ) -> RepoResult<Order>;

    async fn get_order(&self, id: i32) -> RepoResult<Option<Order>>;

    async fn list_orders_for_user(&self, user_id: Uuid) -> RepoResult<Vec<Order>>;

    async fn list_orders(&self) -> RepoResult<Vec<Order>>;

    /// Persists the status if the stored one is still `from`, else `OrderError::StaleStatus`.
    /// `restock` puts the items back on the shelf in the same transaction.
    async fn update_order_status(&self, order: &Order, from: OrderStatus, restock: bool) -> RepoResult<()>;

    async fn delete_order(&self, id: i32) -> RepoResult<bool>;

    async fn count_by_status(&self) -> RepoResult<Vec<(OrderStatus, i64)>>;
}

/// Order lines; every write also stores the order's recomputed totals and moves product stock
/// by the change in sold units.
#[async_trait]
pub trait OrderItemRepository: Send + Sync {
    async fn list_items(&self, order_id: Option<i32>) -> RepoResult<Vec<OrderItem>>;

    async fn get_item(&self, id: i32) -> RepoResult<Option<OrderItem>>;

    async fn add_item(&self, order: &Order, item: &NewOrderItem) -> RepoResult<OrderItem>;

    async fn update_item(&self, order: &Order, item: &OrderItem) -> RepoResult<()>;

    async fn delete_item(&self, order: &Order, item_id: i32) -> RepoResult<()>;
}

/// Repository trait for fields and their terrains
#[async_trait]
pub trait FieldRepository: Send + Sync {
    /// Inserts the field together with its numbered terrains.
    async fn create_field(&self, field: &Field, terrain_names: &[String]) -> RepoResult<Vec<Terrain>>;

    async fn get_field(&self, id: Uuid) -> RepoResult<Option<Field>>;

    /// Applies every filter of `search` except the time slot.
    async fn list_fields(&self, search: &FieldSearch) -> RepoResult<Vec<Field>>;

    async fn list_fields_by_owner(&self, owner_id: Uuid) -> RepoResult<Vec<Field>>;

    async fn update_field(&self, field: &Field, add_terrains: &[String], remove_terrains: &[Uuid]) -> RepoResult<()>;

    async fn delete_field(&self, id: Uuid) -> RepoResult<bool>;

    async fn count_fields(&self) -> RepoResult<i64>;
}

#[async_trait]
pub trait TerrainRepository: Send + Sync {
    /// Ordered by terrain name.
    async fn list_terrains(&self, field_id: Uuid) -> RepoResult<Vec<Terrain>>;

    async fn get_terrain(&self, id: Uuid) -> RepoResult<Option<Terrain>>;

    async fn update_terrain(&self, terrain: &Terrain) -> RepoResult<()>;

    async fn delete_terrain(&self, id: Uuid) -> RepoResult<bool>;

    async fn has_upcoming_approved(&self, terrain_id: Uuid, from: NaiveDate) -> RepoResult<bool>;
}

#[async_trait]
pub trait ReservationRepository: Send + Sync {
    async fn create_reservation(&self, reservation: &Reservation) -> RepoResult<()>;

    /// All or nothing.
    async fn create_reservations(&self, reservations: &[Reservation]) -> RepoResult<()>;

    async fn get_reservation(&self, id: Uuid) -> RepoResult<Option<Reservation>>;

    async fn update_reservation(&self, reservation: &Reservation) -> RepoResult<()>;

    async fn delete_reservation(&self, id: Uuid) -> RepoResult<bool>;

    async fn list_by_field(&self, field_id: Uuid, status: Option<ReservationStatus>) -> RepoResult<Vec<Reservation>>;

    async fn list_by_user(&self, user_id: Uuid) -> RepoResult<Vec<Reservation>>;

    /// Reservations of the field dated `from..=to`, any status.
    async fn list_by_field_between(&self, field_id: Uuid, from: NaiveDate, to: NaiveDate) -> RepoResult<Vec<Reservation>>;

    async fn list_approved_on_terrain(&self, terrain_id: Uuid, from: NaiveDate, to: NaiveDate) -> RepoResult<Vec<Reservation>>;

    async fn find_by_match(&self, match_id: Uuid) -> RepoResult<Option<Reservation>>;

    async fn count_by_status(&self) -> RepoResult<Vec<(ReservationStatus, i64)>>;
}

#[async_trait]
pub trait TeamRepository: Send + Sync {
    async fn create_team(&self, team: &Team) -> RepoResult<()>;

    async fn get_team(&self, id: Uuid) -> RepoResult<Option<Team>>;

    async fn find_team_by_name(&self, name: &str) -> RepoResult<Option<Team>>;

    async fn list_teams(&self) -> RepoResult<Vec<Team>>;

    /// Writes the team row and replaces its member list.
    async fn save_team(&self, team: &Team) -> RepoResult<()>;

    async fn delete_team(&self, id: Uuid) -> RepoResult<bool>;

    async fn find_captained_by(&self, user_id: Uuid) -> RepoResult<Option<Team>>;

    async fn list_member_of(&self, user_id: Uuid) -> RepoResult<Vec<Team>>;
}

/// Filters for listing matches.
#[derive(Debug, Clone, Default)]
pub struct MatchFilter {
    pub city: Option<String>,
    pub date: Option<NaiveDate>,
    pub status: Option<MatchStatus>,
    /// Private matches are only listed to this user's own or joined matches; `None` lists all.
    pub viewer: Option<Uuid>,
}

#[async_trait]
pub trait MatchRepository: Send + Sync {
    /// Writes the match, its roster and its reservation together.
    async fn create_match(&self, created: &IncompleteMatch, reservation: &Reservation) -> RepoResult<()>;

    async fn get_match(&self, id: Uuid) -> RepoResult<Option<IncompleteMatch>>;

    async fn list_matches(&self, filter: &MatchFilter) -> RepoResult<Vec<IncompleteMatch>>;

    /// Saves the match and roster, and the linked reservation when given, in one transaction.
    async fn save_match(&self, updated: &IncompleteMatch, reservation: Option<&Reservation>) -> RepoResult<()>;

    /// Removes the match and its reservation.
    async fn delete_match(&self, id: Uuid) -> RepoResult<bool>;
}

#[async_trait]
pub trait FullMatchRepository: Send + Sync {
    /// Writes the match and its reservation together.
    async fn create_full_match(&self, created: &FullMatch, reservation: &Reservation) -> RepoResult<()>;

    /// Deleted matches are not returned.
    async fn get_full_match(&self, id: Uuid) -> RepoResult<Option<FullMatch>>;

    /// Newest first, deleted ones left out; `creator` narrows to one user's matches.
    async fn list_full_matches(&self, creator: Option<Uuid>) -> RepoResult<Vec<FullMatch>>;

    async fn save_full_match(&self, updated: &FullMatch, reservation: Option<&Reservation>) -> RepoResult<()>;

    /// Stores the deleted flag and drops the match's reservation.
    async fn retire_full_match(&self, retired: &FullMatch) -> RepoResult<()>;
}

#[async_trait]
pub trait TeamMatchRepository: Send + Sync {
    /// Writes the match, its team lists and its reservation together.
    async fn create_team_match(&self, created: &TeamMatch, reservation: &Reservation) -> RepoResult<()>;

    async fn get_team_match(&self, id: Uuid) -> RepoResult<Option<TeamMatch>>;

    /// Ordered by date and start time.
    async fn list_team_matches(&self) -> RepoResult<Vec<TeamMatch>>;

    /// Saves the match and team lists, and the linked reservation when given, in one transaction.
    async fn save_team_match(&self, updated: &TeamMatch, reservation: Option<&Reservation>) -> RepoResult<()>;

    /// Removes the match and its reservation.
    async fn delete_team_match(&self, id: Uuid) -> RepoResult<bool>;
}

#[async_trait]
pub trait RatingRepository: Send + Sync {
    /// Stores the rating and bumps the player's aggregate in place, returning the new aggregate.
    async fn create_rating(&self, rating: &Rating) -> RepoResult<RatingTally>;

    async fn rating_exists(&self, rater_id: Uuid, player_id: Uuid, match_id: Uuid) -> RepoResult<bool>;

    /// Given or received by the user.
    async fn list_for_user(&self, user_id: Uuid) -> RepoResult<Vec<Rating>>;

    async fn list_received(&self, user_id: Uuid) -> RepoResult<Vec<Rating>>;

    async fn list_given(&self, user_id: Uuid) -> RepoResult<Vec<Rating>>;

    async fn list_for_match(&self, match_id: Uuid) -> RepoResult<Vec<Rating>>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create_notification(&self, notification: &Notification) -> RepoResult<()>;

    /// Newest first.
    async fn list_notifications(&self, user_id: Uuid, is_read: Option<bool>) -> RepoResult<Vec<Notification>>;

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> RepoResult<bool>;

    async fn mark_all_read(&self, user_id: Uuid) -> RepoResult<u64>;

    async fn unread_count(&self, user_id: Uuid) -> RepoResult<i64>;
}
