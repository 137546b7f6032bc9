use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::db::AppState;
use crate::error::{AppError, Result};

/// Static-token gate for the admin surface. A separate trust domain from
/// device tokens: how the operator tooling stores this token is its problem.
pub async fn admin_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let Some(ref expected) = state.admin_token else {
        return Err(AppError::Unauthorized("admin surface not configured".into()));
    };

    let presented = request
        .headers()
        .get("x-admin-token")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing admin token".into()))?;

    let presented = presented.as_bytes();
    let expected = expected.as_bytes();
    if presented.len() != expected.len() || !bool::from(presented.ct_eq(expected)) {
        return Err(AppError::Unauthorized("admin token invalid".into()));
    }

    Ok(next.run(request).await)
}
