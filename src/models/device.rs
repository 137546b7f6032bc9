use serde::{Deserialize, Serialize};

/// A device bound to a tenant's license. Bindings are created on first
/// activation; revocation is one-way and permanent for the binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub tenant_id: String,
    /// Tenant-scoped device identifier as reported by the device itself.
    pub device_id: String,
    /// The license secret that last activated this device.
    pub license_id: String,
    pub revoked: bool,
    pub last_seen_at: i64,
    pub created_at: i64,
}
