use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::Device;

pub async fn list_devices(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<Vec<Device>>> {
    let conn = state.db.get()?;
    queries::get_tenant_by_id(&conn, &tenant_id)?
        .ok_or_else(|| AppError::NotFound("tenant not found".into()))?;
    Ok(Json(queries::list_devices_for_tenant(&conn, &tenant_id)?))
}

#[derive(Serialize)]
pub struct DeviceRevokedResponse {
    pub revoked: bool,
}

/// POST /admin/tenants/{tenant_id}/devices/{device_id}/revoke
///
/// One-way: a revoked device can never re-activate under this binding.
/// Takes effect on the device's next validation; a download already in
/// flight is allowed to finish.
pub async fn revoke_device(
    State(state): State<AppState>,
    Path((tenant_id, device_id)): Path<(String, String)>,
) -> Result<Json<DeviceRevokedResponse>> {
    let conn = state.db.get()?;
    queries::get_device(&conn, &tenant_id, &device_id)?
        .ok_or_else(|| AppError::NotFound("device not found".into()))?;

    let revoked = queries::revoke_device(&conn, &tenant_id, &device_id)?;
    if revoked {
        tracing::info!("revoked device {} for tenant {}", device_id, tenant_id);
    }
    Ok(Json(DeviceRevokedResponse { revoked }))
}
