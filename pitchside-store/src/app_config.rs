use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub shop: ShopConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_refresh_secret: String,
    #[serde(default = "default_access_seconds")]
    pub access_token_seconds: u64,
    #[serde(default = "default_refresh_seconds")]
    pub refresh_token_seconds: u64,
    #[serde(default = "default_reset_minutes")]
    pub reset_code_minutes: i64,
}

fn default_access_seconds() -> u64 {
    5 * 60 * 60
}

fn default_refresh_seconds() -> u64 {
    7 * 24 * 60 * 60
}

fn default_reset_minutes() -> i64 {
    15
}

/// Checkout and listing rules of the storefront. Amounts are in dinars.
#[derive(Debug, Deserialize, Clone)]
pub struct ShopConfig {
    pub tax_rate: f64,
    pub card_shipping: f64,
    pub hand_to_hand_shipping: f64,
    pub default_page_size: u32,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            tax_rate: 0.08,
            card_shipping: 15.0,
            hand_to_hand_shipping: 0.01,
            default_page_size: 12,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingConfig {
    pub min_slot_minutes: i32,
    pub slot_minutes: i32,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self { min_slot_minutes: 75, slot_minutes: 90 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    pub channel_capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { channel_capacity: 100 }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `PITCHSIDE__DATABASE__URL`
            .add_source(config::Environment::with_prefix("PITCHSIDE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
