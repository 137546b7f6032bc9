use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::{Device, Tenant, TenantStatus};
use crate::subscription::evaluate_subscription;
use crate::token::TokenClaims;
use crate::util::extract_bearer_token;

/// Live state attached to every authenticated device request.
///
/// Tokens are not self-sufficient: revocation and subscription lapses happen
/// after issuance, so both are re-checked here on every request.
#[derive(Clone)]
pub struct DeviceContext {
    pub tenant: Tenant,
    pub device: Device,
    pub claims: TokenClaims,
    /// True when the tenant subscription has lapsed but the token is inside
    /// the offline-grace window.
    pub grace_active: bool,
}

pub async fn device_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let token = extract_bearer_token(request.headers())
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;

    let now = queries::now();
    // Strict verification: signature then expiry, no grace. Only refresh
    // tolerates an expired token.
    let claims = state.tokens.verify(token, now)?;

    let conn = state.db.get()?;

    let tenant = queries::get_tenant_by_id(&conn, &claims.tenant_id)?
        .ok_or_else(|| AppError::NotFound("tenant not found".into()))?;
    if tenant.status != TenantStatus::Active {
        return Err(AppError::Suspended);
    }
    let subscription = evaluate_subscription(
        tenant.subscription_expires_at,
        claims.issued_at,
        now,
        state.grace_days,
    );
    if !subscription.allowed {
        return Err(AppError::Suspended);
    }

    let device = queries::get_device(&conn, &tenant.id, &claims.device_id)?
        .ok_or_else(|| AppError::NotFound("device not found".into()))?;
    if device.revoked {
        return Err(AppError::DeviceRevoked);
    }

    queries::touch_device_last_seen(&conn, &device.id, now)?;

    request.extensions_mut().insert(DeviceContext {
        tenant,
        device,
        claims,
        grace_active: subscription.grace_active,
    });

    Ok(next.run(request).await)
}
