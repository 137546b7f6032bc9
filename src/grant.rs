//! Signed download grants.
//!
//! A grant is a single-purpose capability: it authorizes one device to fetch
//! one firmware binary until a near-term expiry. The device token answers
//! "who may ask for an update"; the grant answers "who may fetch these exact
//! bytes right now", so a leaked download URL goes stale in minutes.
//!
//! The MAC covers a canonical length-prefixed encoding of the fields. The
//! variable-length device id is length-prefixed so no choice of id can shift
//! bytes into the firmware or expiry positions.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadGrant {
    /// Device row id (not the tenant-scoped device identifier).
    pub device_id: String,
    pub firmware_id: i64,
    pub expires_at: i64,
}

/// Wire shape of the opaque token: fields plus hex MAC, base64url-encoded.
#[derive(Serialize, Deserialize)]
struct GrantEnvelope {
    d: String,
    f: i64,
    e: i64,
    s: String,
}

fn canonical_payload(device_id: &str, firmware_id: i64, expires_at: i64) -> Vec<u8> {
    format!(
        "grant-v1|{}:{}|{}|{}",
        device_id.len(),
        device_id,
        firmware_id,
        expires_at
    )
    .into_bytes()
}

fn signature(key: &[u8; 32], device_id: &str, firmware_id: i64, expires_at: i64) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key)
        .expect("HMAC accepts any key length");
    mac.update(&canonical_payload(device_id, firmware_id, expires_at));
    mac.finalize().into_bytes().to_vec()
}

/// Mint an opaque grant token for embedding in a download URL.
pub fn mint_grant(key: &[u8; 32], device_id: &str, firmware_id: i64, expires_at: i64) -> String {
    let sig = signature(key, device_id, firmware_id, expires_at);
    let envelope = GrantEnvelope {
        d: device_id.to_string(),
        f: firmware_id,
        e: expires_at,
        s: hex::encode(sig),
    };
    let json = serde_json::to_vec(&envelope).expect("grant envelope serializes");
    URL_SAFE_NO_PAD.encode(json)
}

/// Verify an opaque grant token. Tampering (including undecodable tokens and
/// device mismatch downstream) is reported before expiry so an attacker
/// cannot distinguish "forged" from "forged and stale".
pub fn verify_grant(key: &[u8; 32], token: &str, now: i64) -> Result<DownloadGrant> {
    let json = URL_SAFE_NO_PAD
        .decode(token.as_bytes())
        .map_err(|_| AppError::Tampered)?;
    let envelope: GrantEnvelope = serde_json::from_slice(&json).map_err(|_| AppError::Tampered)?;

    let presented = hex::decode(&envelope.s).map_err(|_| AppError::Tampered)?;
    let expected = signature(key, &envelope.d, envelope.f, envelope.e);
    if presented.len() != expected.len() || !bool::from(presented.ct_eq(&expected)) {
        return Err(AppError::Tampered);
    }

    if now > envelope.e {
        return Err(AppError::Expired);
    }

    Ok(DownloadGrant {
        device_id: envelope.d,
        firmware_id: envelope.f,
        expires_at: envelope.e,
    })
}
