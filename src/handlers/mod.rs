pub mod admin;
pub mod ota;
pub mod public;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::db::AppState;

/// Assemble the full application router. Rate limiting on activation is
/// opt-in because the governor keys on peer IPs, which only exist when the
/// server is bound to a real socket (tests drive the router directly).
pub fn app(state: AppState, rate_limit: Option<(u64, u32)>) -> Router {
    Router::new()
        .merge(public::router(rate_limit))
        .nest("/ota", ota::router(state.clone()))
        .nest("/admin", admin::router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
