use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::{CreateFirmware, FirmwareRelease, UpdateFirmware};
use crate::util::{safe_relative_path, sha256_file};
use crate::version::FirmwareVersion;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub device_type: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub device_type: String,
    pub version: String,
    pub binary_path: String,
    pub file_size: i64,
    pub file_hash: String,
}

/// POST /admin/firmware/upload?device_type=…&version=…
///
/// Store a raw binary under the firmware directory and report the path,
/// size, and hash to feed into registration. Upload and registration are
/// separate steps so the operator can verify the hash out of band first.
pub async fn upload_binary(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<Json<UploadResponse>> {
    let device_type = query.device_type.trim();
    if device_type.is_empty() || !safe_relative_path(device_type) || device_type.contains('/') {
        return Err(AppError::BadRequest("invalid device_type".into()));
    }
    if FirmwareVersion::parse(&query.version).is_none() {
        return Err(AppError::BadRequest(
            "version must be MAJOR.MINOR.PATCH".into(),
        ));
    }
    if body.is_empty() {
        return Err(AppError::BadRequest("empty firmware binary".into()));
    }

    let dir = state.firmware_dir.join(device_type);
    tokio::fs::create_dir_all(&dir).await?;

    let binary_path = format!("{}/v{}.bin", device_type, query.version);
    let path = state.firmware_dir.join(&binary_path);
    tokio::fs::write(&path, &body).await?;

    let file_hash = sha256_file(&path)?;

    tracing::info!(
        "stored firmware binary {} ({} bytes)",
        binary_path,
        body.len()
    );

    Ok(Json(UploadResponse {
        device_type: device_type.to_string(),
        version: query.version,
        binary_path,
        file_size: body.len() as i64,
        file_hash,
    }))
}

/// POST /admin/firmware
///
/// Register a release. The binary must already be on disk and its size and
/// SHA-256 must match the submitted metadata before the row goes active.
pub async fn register_release(
    State(state): State<AppState>,
    Json(input): Json<CreateFirmware>,
) -> Result<Json<FirmwareRelease>> {
    if FirmwareVersion::parse(&input.version).is_none() {
        return Err(AppError::BadRequest(
            "version must be MAJOR.MINOR.PATCH".into(),
        ));
    }
    if let Some(min) = input.min_current_version.as_deref() {
        if FirmwareVersion::parse(min).is_none() {
            return Err(AppError::BadRequest(
                "min_current_version must be MAJOR.MINOR.PATCH".into(),
            ));
        }
    }
    if !safe_relative_path(&input.binary_path) {
        return Err(AppError::BadRequest("invalid binary_path".into()));
    }

    let path = state
        .firmware_dir
        .join(input.binary_path.trim_start_matches('/'));
    if !path.is_file() {
        return Err(AppError::BadRequest(
            "binary file not found on server".into(),
        ));
    }

    let actual_size = std::fs::metadata(&path)?.len() as i64;
    if actual_size != input.file_size {
        return Err(AppError::BadRequest(format!(
            "file size mismatch: metadata says {}, binary is {}",
            input.file_size, actual_size
        )));
    }
    let actual_hash = sha256_file(&path)?;
    if !actual_hash.eq_ignore_ascii_case(&input.file_hash) {
        return Err(AppError::BadRequest("file hash mismatch".into()));
    }

    let conn = state.db.get()?;
    let release = queries::create_firmware(&conn, &input)?;

    tracing::info!(
        "registered firmware {} v{} build {}",
        release.device_type,
        release.version,
        release.build_number
    );

    Ok(Json(release))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub device_type: Option<String>,
}

pub async fn list_releases(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<FirmwareRelease>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_firmware(
        &conn,
        query.device_type.as_deref(),
    )?))
}

pub async fn get_release(
    State(state): State<AppState>,
    Path(firmware_id): Path<i64>,
) -> Result<Json<FirmwareRelease>> {
    let conn = state.db.get()?;
    let release = queries::get_firmware_by_id(&conn, firmware_id)?
        .ok_or_else(|| AppError::NotFound("firmware not found".into()))?;
    Ok(Json(release))
}

pub async fn patch_release(
    State(state): State<AppState>,
    Path(firmware_id): Path<i64>,
    Json(input): Json<UpdateFirmware>,
) -> Result<Json<FirmwareRelease>> {
    if let Some(min) = input.min_current_version.as_deref() {
        if FirmwareVersion::parse(min).is_none() {
            return Err(AppError::BadRequest(
                "min_current_version must be MAJOR.MINOR.PATCH".into(),
            ));
        }
    }

    let conn = state.db.get()?;
    queries::get_firmware_by_id(&conn, firmware_id)?
        .ok_or_else(|| AppError::NotFound("firmware not found".into()))?;

    queries::update_firmware(&conn, firmware_id, &input)?;

    let release = queries::get_firmware_by_id(&conn, firmware_id)?
        .ok_or_else(|| AppError::NotFound("firmware not found".into()))?;
    Ok(Json(release))
}

#[derive(Serialize)]
pub struct DeactivatedResponse {
    pub deactivated: bool,
}

/// DELETE /admin/firmware/{firmware_id}
///
/// Soft removal: the release disappears from negotiation and delivery but
/// the row and binary stay for audit and for devices mid-update.
pub async fn deactivate_release(
    State(state): State<AppState>,
    Path(firmware_id): Path<i64>,
) -> Result<Json<DeactivatedResponse>> {
    let conn = state.db.get()?;
    queries::get_firmware_by_id(&conn, firmware_id)?
        .ok_or_else(|| AppError::NotFound("firmware not found".into()))?;

    let deactivated = queries::deactivate_firmware(&conn, firmware_id)?;
    if deactivated {
        tracing::info!("deactivated firmware {}", firmware_id);
    }
    Ok(Json(DeactivatedResponse { deactivated }))
}
