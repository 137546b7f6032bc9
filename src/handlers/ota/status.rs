use axum::Json;
use axum::extract::{Extension, State};
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::middleware::DeviceContext;
use crate::models::UpdateStatus;

#[derive(Debug, Deserialize)]
pub struct StatusReport {
    pub firmware_id: i64,
    pub status: UpdateStatus,
    #[serde(default)]
    pub bytes_downloaded: Option<i64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub attempt_id: i64,
    pub status: UpdateStatus,
}

/// POST /ota/status
///
/// Device progress reports. The latest attempt for this (device, firmware)
/// pair is advanced; a fresh attempt is opened when none exists yet or the
/// previous one already reached a terminal state (a retry is a new
/// lifecycle, not a resurrection). Backward reports fail with
/// `invalid_transition` and change nothing.
pub async fn report_status(
    State(state): State<AppState>,
    Extension(ctx): Extension<DeviceContext>,
    Json(report): Json<StatusReport>,
) -> Result<Json<StatusResponse>> {
    let now = queries::now();
    let mut conn = state.db.get()?;

    // The release may have been deactivated mid-update; reports still land.
    queries::get_firmware_by_id(&conn, report.firmware_id)?
        .ok_or_else(|| AppError::NotFound("firmware not found".into()))?;

    let attempt = match queries::latest_attempt_for(&conn, &ctx.device.id, report.firmware_id)? {
        Some(attempt) if !attempt.status.is_terminal() => attempt,
        _ => queries::open_attempt(&conn, &ctx.device.id, report.firmware_id, now)?,
    };

    let updated = queries::advance_attempt(
        &mut conn,
        attempt.id,
        report.status,
        report.bytes_downloaded,
        report.error_message.as_deref(),
        now,
    )?;

    if updated.status.is_terminal() {
        tracing::info!(
            "device {} finished firmware {} attempt {}: {}",
            ctx.device.device_id,
            report.firmware_id,
            updated.id,
            updated.status.as_ref()
        );
    }

    Ok(Json(StatusResponse {
        attempt_id: updated.id,
        status: updated.status,
    }))
}
