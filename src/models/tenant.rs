use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Suspended,
    Expired,
}

/// One licensed customer organization. Never physically deleted; disabled
/// via status instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub company_code: String,
    pub erp_url: String,
    /// Sealed at rest; never serialized out.
    #[serde(skip_serializing)]
    pub erp_api_key: Option<Vec<u8>>,
    #[serde(skip_serializing)]
    pub erp_api_secret: Option<Vec<u8>>,
    pub status: TenantStatus,
    pub subscription_expires_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateTenant {
    pub company_code: String,
    pub erp_url: String,
    #[serde(default)]
    pub erp_api_key: Option<String>,
    #[serde(default)]
    pub erp_api_secret: Option<String>,
    pub subscription_expires_at: i64,
}

/// Partial update: omitted fields stay unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTenant {
    pub erp_url: Option<String>,
    pub erp_api_key: Option<String>,
    pub erp_api_secret: Option<String>,
    pub status: Option<TenantStatus>,
    pub subscription_expires_at: Option<i64>,
}
