mod attempts;
mod devices;
mod firmware;
mod secrets;
mod tenants;

pub use attempts::*;
pub use devices::*;
pub use firmware::*;
pub use secrets::*;
pub use tenants::*;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::db::AppState;
use crate::middleware::admin_auth;

/// Operator surface. A separate trust domain from device tokens: every
/// route requires the static admin token.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/tenants", post(create_tenant).get(list_tenants))
        .route("/tenants/{tenant_id}", get(get_tenant).patch(update_tenant))
        .route(
            "/tenants/{tenant_id}/secrets",
            post(issue_secret).get(list_secrets),
        )
        .route(
            "/tenants/{tenant_id}/secrets/{secret_id}/revoke",
            post(revoke_secret),
        )
        .route("/tenants/{tenant_id}/devices", get(list_devices))
        .route(
            "/tenants/{tenant_id}/devices/{device_id}/revoke",
            post(revoke_device),
        )
        .route("/firmware", post(register_release).get(list_releases))
        .route("/firmware/upload", post(upload_binary))
        .route(
            "/firmware/{firmware_id}",
            get(get_release).patch(patch_release).delete(deactivate_release),
        )
        .route("/attempts", get(query_attempts))
        .layer(middleware::from_fn_with_state(state, admin_auth))
}
