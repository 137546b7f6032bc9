use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::TenantStatus;
use crate::util::extract_bearer_token;

use super::activate::TokenResponse;

/// POST /refresh
///
/// Exchange a previously issued token for a fresh one anchored at the
/// refresh time. Unlike validation, refresh accepts tokens up to the
/// offline-grace window past their expiry, so a device that was offline for
/// a week can recover without re-entering its license key. This route is
/// deliberately outside the strict-auth middleware.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>> {
    let token = extract_bearer_token(&headers)
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;

    let now = queries::now();
    let claims = state.tokens.verify_for_refresh(token, now)?;

    let conn = state.db.get()?;

    let tenant = queries::get_tenant_by_id(&conn, &claims.tenant_id)?
        .ok_or_else(|| AppError::NotFound("tenant not found".into()))?;
    // The replacement token would be issued after any lapse, so a lapsed
    // subscription cannot be papered over by refreshing.
    if tenant.status != TenantStatus::Active || tenant.subscription_expires_at < now {
        return Err(AppError::Suspended);
    }

    let device = queries::get_device(&conn, &tenant.id, &claims.device_id)?
        .ok_or_else(|| AppError::NotFound("device not found".into()))?;
    if device.revoked {
        return Err(AppError::DeviceRevoked);
    }

    queries::touch_device_last_seen(&conn, &device.id, now)?;

    let (token, claims) = state.tokens.issue(&tenant.id, &device.device_id, now)?;

    Ok(Json(TokenResponse {
        access_token: token,
        issued_at: claims.issued_at,
        expires_at: claims.expires_at,
        server_time: now,
    }))
}
