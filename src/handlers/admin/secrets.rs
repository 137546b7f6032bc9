use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::{LicenseSecret, LicenseSecretIssued};

/// POST /admin/tenants/{tenant_id}/secrets
///
/// Issue (or rotate to) a new license secret. The previous current secret
/// keeps working for already-bound devices but no longer activates new ones.
/// The plaintext in the response is the only copy that will ever exist.
pub async fn issue_secret(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<LicenseSecretIssued>> {
    let mut conn = state.db.get()?;
    queries::get_tenant_by_id(&conn, &tenant_id)?
        .ok_or_else(|| AppError::NotFound("tenant not found".into()))?;

    let (secret, plaintext) = queries::issue_license_secret(&mut conn, &tenant_id, &state.keyring)?;

    tracing::info!("issued license secret {} for tenant {}", secret.id, tenant_id);

    Ok(Json(LicenseSecretIssued {
        id: secret.id,
        tenant_id: secret.tenant_id,
        secret: plaintext,
        created_at: secret.created_at,
    }))
}

pub async fn list_secrets(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<Vec<LicenseSecret>>> {
    let conn = state.db.get()?;
    queries::get_tenant_by_id(&conn, &tenant_id)?
        .ok_or_else(|| AppError::NotFound("tenant not found".into()))?;
    Ok(Json(queries::list_secrets_for_tenant(&conn, &tenant_id)?))
}

#[derive(Serialize)]
pub struct RevokedResponse {
    pub revoked: bool,
}

pub async fn revoke_secret(
    State(state): State<AppState>,
    Path((tenant_id, secret_id)): Path<(String, String)>,
) -> Result<Json<RevokedResponse>> {
    let conn = state.db.get()?;
    let secrets = queries::list_secrets_for_tenant(&conn, &tenant_id)?;
    if !secrets.iter().any(|s| s.id == secret_id) {
        return Err(AppError::NotFound("license secret not found".into()));
    }

    let revoked = queries::revoke_license_secret(&conn, &secret_id)?;
    if revoked {
        tracing::info!("revoked license secret {} for tenant {}", secret_id, tenant_id);
    }
    Ok(Json(RevokedResponse { revoked }))
}
