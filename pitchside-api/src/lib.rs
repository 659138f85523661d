use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod auth;
pub mod availability;
pub mod categories;
pub mod dashboards;
pub mod error;
pub mod fields;
pub mod full_matches;
pub mod matches;
pub mod metrics;
pub mod middleware;
pub mod notifications;
pub mod notify;
pub mod order_items;
pub mod orders;
pub mod products;
pub mod ratings;
pub mod reservations;
pub mod state;
pub mod teams;
pub mod terrains;
pub mod users;
pub mod versus_matches;

pub use state::{AppState, AuthConfig, Repositories};

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::USER_AGENT]);

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_text))
        .merge(auth::routes(state.clone()))
        .merge(users::routes(state.clone()))
        .merge(admin::routes(state.clone()))
        .merge(products::routes(state.clone()))
        .merge(categories::routes(state.clone()))
        .merge(orders::routes(state.clone()))
        .merge(order_items::routes(state.clone()))
        .merge(fields::routes(state.clone()))
        .merge(terrains::routes(state.clone()))
        .merge(reservations::routes(state.clone()))
        .merge(teams::routes(state.clone()))
        .merge(matches::routes(state.clone()))
        .merge(full_matches::routes(state.clone()))
        .merge(versus_matches::routes(state.clone()))
        .merge(ratings::routes(state.clone()))
        .merge(notifications::routes(state.clone()))
        .merge(dashboards::routes(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn metrics_text(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        Err(e) => {
            tracing::error!("Failed to render metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
