mod check;
mod download;
mod status;

pub use check::*;
pub use download::*;
pub use status::*;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::db::AppState;
use crate::middleware::device_auth;

/// Device-facing update routes; every one requires a valid device token.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/check", post(check_update))
        .route("/download/{firmware_id}", get(download))
        .route("/status", post(report_status))
        .layer(middleware::from_fn_with_state(state, device_auth))
}
