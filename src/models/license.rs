use serde::{Deserialize, Serialize};

/// One rotation of a tenant's license secret. Only the salted hash and a
/// keyed lookup fingerprint are stored; the plaintext is shown once at
/// issuance and never again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseSecret {
    pub id: String,
    pub tenant_id: String,
    #[serde(skip_serializing)]
    pub secret_hash: String,
    #[serde(skip_serializing)]
    pub fingerprint: String,
    /// At most one secret per tenant is current for new activations.
    pub current: bool,
    pub revoked: bool,
    pub created_at: i64,
}

/// Response when issuing a secret: the only time the plaintext leaves the
/// server.
#[derive(Debug, Serialize)]
pub struct LicenseSecretIssued {
    pub id: String,
    pub tenant_id: String,
    pub secret: String,
    pub created_at: i64,
}
