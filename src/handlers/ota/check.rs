use axum::Json;
use axum::extract::{Extension, State};
use serde::{Deserialize, Serialize};

use crate::catalog::select_update;
use crate::db::{AppState, queries};
use crate::error::Result;
use crate::grant::mint_grant;
use crate::middleware::DeviceContext;
use crate::version::FirmwareVersion;

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub device_type: String,
    pub current_version: String,
    pub current_build: i64,
}

#[derive(Debug, Default, Serialize)]
pub struct CheckResponse {
    pub update_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Relative URL embedding a short-lived signed grant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
}

/// POST /ota/check
///
/// Compare the device's reported firmware against the catalog. A positive
/// answer carries everything the device needs to fetch and verify the
/// binary, including a minted download grant.
pub async fn check_update(
    State(state): State<AppState>,
    Extension(ctx): Extension<DeviceContext>,
    Json(request): Json<CheckRequest>,
) -> Result<Json<CheckResponse>> {
    let Some(current_version) = FirmwareVersion::parse(&request.current_version) else {
        tracing::debug!(
            "device {} reported unparseable version {:?}",
            ctx.device.device_id,
            request.current_version
        );
        return Ok(Json(CheckResponse::default()));
    };

    let releases = {
        let conn = state.db.get()?;
        queries::list_active_firmware_for_type(&conn, &request.device_type)?
    };

    let Some(release) = select_update(&releases, current_version, request.current_build) else {
        return Ok(Json(CheckResponse::default()));
    };

    let expires_at = queries::now() + state.download_ttl_secs;
    let grant = mint_grant(state.keyring.grant_key(), &ctx.device.id, release.id, expires_at);

    tracing::info!(
        "offering {} v{} build {} to device {}",
        release.device_type,
        release.version,
        release.build_number,
        ctx.device.device_id
    );

    Ok(Json(CheckResponse {
        update_available: true,
        firmware_id: Some(release.id),
        version: Some(release.version.clone()),
        build_number: Some(release.build_number),
        description: release.description.clone(),
        download_url: Some(format!("/ota/download/{}?grant={}", release.id, grant)),
        file_hash: Some(release.file_hash.clone()),
        file_size: Some(release.file_size),
    }))
}
