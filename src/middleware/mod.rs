mod admin_auth;
mod device_auth;

pub use admin_auth::admin_auth;
pub use device_auth::{DeviceContext, device_auth};
