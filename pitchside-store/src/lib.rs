pub mod app_config;
pub mod database;
pub mod user_repo;
pub mod catalog_repo;
pub mod order_repo;
pub mod field_repo;
pub mod reservation_repo;
pub mod team_repo;
pub mod match_repo;
pub mod full_match_repo;
pub mod team_match_repo;
pub mod rating_repo;
pub mod notification_repo;

pub use app_config::Config;
pub use database::DbClient;
pub use user_repo::StoreUserRepository;
pub use catalog_repo::{StoreCategoryRepository, StoreProductRepository};
pub use order_repo::{StoreOrderItemRepository, StoreOrderRepository};
pub use field_repo::{StoreFieldRepository, StoreTerrainRepository};
pub use reservation_repo::StoreReservationRepository;
pub use team_repo::StoreTeamRepository;
pub use match_repo::StoreMatchRepository;
pub use full_match_repo::StoreFullMatchRepository;
pub use team_match_repo::StoreTeamMatchRepository;
pub use rating_repo::StoreRatingRepository;
pub use notification_repo::StoreNotificationRepository;
