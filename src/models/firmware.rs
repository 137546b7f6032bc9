use serde::{Deserialize, Serialize};

/// One immutable, uniquely versioned firmware binary record.
/// (device_type, version, build_number) is unique across the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirmwareRelease {
    pub id: i64,
    pub device_type: String,
    /// Numeric MAJOR.MINOR.PATCH, compared numerically during negotiation.
    pub version: String,
    pub build_number: i64,
    pub filename: String,
    pub file_size: i64,
    /// SHA-256 of the binary, hex-encoded.
    pub file_hash: String,
    /// Path relative to the firmware base directory.
    pub binary_path: String,
    pub description: Option<String>,
    pub release_notes: Option<String>,
    pub is_stable: bool,
    /// Once false, the release is excluded from negotiation and delivery.
    pub is_active: bool,
    /// Devices below this version must step through an intermediate release.
    pub min_current_version: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub released_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFirmware {
    pub device_type: String,
    pub version: String,
    pub build_number: i64,
    pub filename: String,
    pub file_size: i64,
    pub file_hash: String,
    pub binary_path: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub release_notes: Option<String>,
    #[serde(default)]
    pub is_stable: bool,
    #[serde(default)]
    pub min_current_version: Option<String>,
}

/// Metadata patch: omitted fields stay unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateFirmware {
    pub description: Option<String>,
    pub release_notes: Option<String>,
    pub is_stable: Option<bool>,
    pub min_current_version: Option<String>,
    pub released_at: Option<i64>,
}
