use axum::extract::{Extension, Path, Query, Request, State};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::grant::verify_grant;
use crate::middleware::DeviceContext;
use crate::util::safe_relative_path;

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub grant: String,
}

/// GET /ota/download/{firmware_id}?grant=…
///
/// Requires both the device token (who may ask) and a live grant for this
/// exact (device, firmware) pair (who may fetch these bytes right now).
/// Metadata is read once up front; the byte transfer itself holds no
/// database connection and honors Range requests, so interrupted devices
/// can resume where they left off.
pub async fn download(
    State(state): State<AppState>,
    Extension(ctx): Extension<DeviceContext>,
    Path(firmware_id): Path<i64>,
    Query(query): Query<DownloadQuery>,
    request: Request,
) -> Result<Response> {
    let now = queries::now();
    let grant = verify_grant(state.keyring.grant_key(), &query.grant, now)?;
    if grant.firmware_id != firmware_id || grant.device_id != ctx.device.id {
        return Err(AppError::Tampered);
    }

    let release = {
        let conn = state.db.get()?;
        queries::get_active_firmware_by_id(&conn, firmware_id)?
            .ok_or_else(|| AppError::NotFound("firmware not found or inactive".into()))?
    };

    if !safe_relative_path(&release.binary_path) {
        return Err(AppError::StorageUnavailable("invalid binary path".into()));
    }
    let path = state
        .firmware_dir
        .join(release.binary_path.trim_start_matches('/'));
    if !path.is_file() {
        tracing::error!("firmware binary missing on disk: {}", path.display());
        return Err(AppError::StorageUnavailable(
            "firmware binary missing from storage".into(),
        ));
    }

    let mut response = ServeFile::new(&path)
        .oneshot(request)
        .await
        .map_err(|e| AppError::Internal(format!("binary streaming failed: {e}")))?
        .into_response();

    let headers = response.headers_mut();
    insert_header(headers, "x-firmware-version", &release.version)?;
    insert_header(headers, "x-firmware-build", &release.build_number.to_string())?;
    insert_header(headers, "x-firmware-hash", &release.file_hash)?;
    insert_header(
        headers,
        "content-disposition",
        &format!("attachment; filename={}", release.filename),
    )?;

    Ok(response)
}

fn insert_header(
    headers: &mut axum::http::HeaderMap,
    name: &'static str,
    value: &str,
) -> Result<()> {
    let value = HeaderValue::from_str(value)
        .map_err(|_| AppError::Internal(format!("invalid {name} header value")))?;
    headers.insert(name, value);
    Ok(())
}
