use pitchside_booking::SlotRules;
use pitchside_core::mailer::Mailer;
use pitchside_core::repository::{
    CategoryRepository, FieldRepository, FullMatchRepository, MatchRepository, NotificationRepository,
    OrderItemRepository, OrderRepository, ProductRepository, RatingRepository, ReservationRepository,
    TeamMatchRepository, TeamRepository, TerrainRepository, UserRepository,
};
use pitchside_order::CheckoutRules;
use pitchside_shared::Money;
use pitchside_store::app_config::Config;
use std::sync::Arc;

use crate::metrics::Metrics;
use crate::notify::Notifier;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub refresh_secret: String,
    pub expiration: u64,
    pub refresh_expiration: u64,
    pub reset_code_minutes: i64,
}

/// Every storage port the handlers talk to.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub categories: Arc<dyn CategoryRepository>,
    pub products: Arc<dyn ProductRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub order_items: Arc<dyn OrderItemRepository>,
    pub fields: Arc<dyn FieldRepository>,
    pub terrains: Arc<dyn TerrainRepository>,
    pub reservations: Arc<dyn ReservationRepository>,
    pub teams: Arc<dyn TeamRepository>,
    pub matches: Arc<dyn MatchRepository>,
    pub full_matches: Arc<dyn FullMatchRepository>,
    pub team_matches: Arc<dyn TeamMatchRepository>,
    pub ratings: Arc<dyn RatingRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
}

#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub notifier: Notifier,
    pub mailer: Arc<dyn Mailer>,
    pub metrics: Arc<Metrics>,
    pub auth: AuthConfig,
    pub checkout: CheckoutRules,
    pub slots: SlotRules,
    pub page_size: u32,
}

impl AppState {
    pub fn new(repos: Repositories, mailer: Arc<dyn Mailer>, config: &Config) -> Result<Self, prometheus::Error> {
        let notifier = Notifier::new(repos.notifications.clone(), config.notifications.channel_capacity);
        Ok(Self {
            notifier,
            mailer,
            metrics: Arc::new(Metrics::new()?),
            auth: AuthConfig {
                secret: config.auth.jwt_secret.clone(),
                refresh_secret: config.auth.jwt_refresh_secret.clone(),
                expiration: config.auth.access_token_seconds,
                refresh_expiration: config.auth.refresh_token_seconds,
                reset_code_minutes: config.auth.reset_code_minutes,
            },
            checkout: CheckoutRules {
                tax_rate: config.shop.tax_rate,
                card_shipping: Money::from_major(config.shop.card_shipping),
                hand_to_hand_shipping: Money::from_major(config.shop.hand_to_hand_shipping),
            },
            slots: SlotRules {
                min_minutes: config.booking.min_slot_minutes,
                slot_minutes: config.booking.slot_minutes,
            },
            page_size: config.shop.default_page_size,
            repos,
        })
    }
}
