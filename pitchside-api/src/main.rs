use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use pitchside_api::{app, AppState, Repositories};
use pitchside_core::mailer::LogMailer;
use pitchside_store::{
    Config, DbClient, StoreCategoryRepository, StoreFieldRepository, StoreFullMatchRepository, StoreMatchRepository,
    StoreNotificationRepository, StoreOrderItemRepository, StoreOrderRepository, StoreProductRepository,
    StoreRatingRepository, StoreReservationRepository, StoreTeamMatchRepository, StoreTeamRepository,
    StoreTerrainRepository, StoreUserRepository,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pitchside_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Pitchside API on port {}", config.server.port);

    // Postgres
    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;
    let pool = db.pool.clone();

    let repos = Repositories {
        users: Arc::new(StoreUserRepository::new(pool.clone())),
        categories: Arc::new(StoreCategoryRepository::new(pool.clone())),
        products: Arc::new(StoreProductRepository::new(pool.clone())),
        orders: Arc::new(StoreOrderRepository::new(pool.clone())),
        order_items: Arc::new(StoreOrderItemRepository::new(pool.clone())),
        fields: Arc::new(StoreFieldRepository::new(pool.clone())),
        terrains: Arc::new(StoreTerrainRepository::new(pool.clone())),
        reservations: Arc::new(StoreReservationRepository::new(pool.clone())),
        teams: Arc::new(StoreTeamRepository::new(pool.clone())),
        matches: Arc::new(StoreMatchRepository::new(pool.clone())),
        full_matches: Arc::new(StoreFullMatchRepository::new(pool.clone())),
        team_matches: Arc::new(StoreTeamMatchRepository::new(pool.clone())),
        ratings: Arc::new(StoreRatingRepository::new(pool.clone())),
        notifications: Arc::new(StoreNotificationRepository::new(pool)),
    };

    let state = AppState::new(repos, Arc::new(LogMailer), &config).context("Failed to register metrics")?;
    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
