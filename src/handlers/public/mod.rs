mod activate;
mod refresh;

pub use activate::*;
pub use refresh::*;

use std::sync::Arc;

use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::Serialize;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};

use crate::db::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Unauthenticated device-facing routes. Activation takes the brunt of
/// credential-guessing traffic, so it alone sits behind the rate limiter
/// (enabled by the caller; tests and the CLI skip it).
pub fn router(rate_limit: Option<(u64, u32)>) -> Router<AppState> {
    let mut activation = Router::new().route("/activate", post(activate));

    if let Some((per_second, burst)) = rate_limit {
        let config = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(per_second)
                .burst_size(burst)
                .finish()
                .expect("valid rate limit configuration"),
        );
        activation = activation.layer(GovernorLayer::new(config));
    }

    Router::new()
        .route("/health", get(health))
        .route("/refresh", post(refresh))
        .merge(activation)
}
