use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::TenantStatus;

#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub company_code: String,
    pub license_key: String,
    pub device_id: String,
}

/// Issued-token envelope shared by activation and refresh. `server_time`
/// lets clock-skewed devices compute their own offset.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub issued_at: i64,
    pub expires_at: i64,
    pub server_time: i64,
}

/// POST /activate
///
/// Exchange (company code, license secret, device id) for a device token,
/// binding the device on first use. Re-activation of an existing, unrevoked
/// binding is idempotent.
pub async fn activate(
    State(state): State<AppState>,
    Json(request): Json<ActivateRequest>,
) -> Result<Json<TokenResponse>> {
    let company_code = request.company_code.trim();
    let license_key = request.license_key.trim();
    let device_id = request.device_id.trim();

    if license_key.is_empty() {
        return Err(AppError::InvalidCredential);
    }
    if company_code.is_empty() || device_id.is_empty() {
        return Err(AppError::BadRequest(
            "company_code and device_id are required".into(),
        ));
    }

    let now = queries::now();
    let mut conn = state.db.get()?;

    let tenant = queries::get_tenant_by_code(&conn, company_code)?
        .ok_or_else(|| AppError::NotFound("tenant not found".into()))?;
    if tenant.status != TenantStatus::Active || tenant.subscription_expires_at < now {
        return Err(AppError::Suspended);
    }

    // Compare against the tenant's current secret only; rotated-out and
    // revoked secrets never activate new devices.
    let secret = queries::get_current_secret(&conn, &tenant.id)?
        .ok_or(AppError::InvalidCredential)?;
    if !crate::crypto::verify_secret(license_key, &secret.secret_hash) {
        return Err(AppError::InvalidCredential);
    }

    let device = queries::activate_device(&mut conn, &tenant.id, device_id, &secret.id, now)?;

    let (token, claims) = state.tokens.issue(&tenant.id, &device.device_id, now)?;

    tracing::info!(
        "device {} activated for tenant {}",
        device.device_id,
        tenant.company_code
    );

    Ok(Json(TokenResponse {
        access_token: token,
        issued_at: claims.issued_at,
        expires_at: claims.expires_at,
        server_time: now,
    }))
}
