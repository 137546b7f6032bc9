//! Device access tokens.
//!
//! Tokens are HS256 JWTs carrying the tenant/device binding plus explicit
//! `issued_at`/`expires_at` claims. Expiry is enforced here on those claims
//! rather than by the JWT library, because validation and refresh apply
//! different windows to the same token: validation is strict, refresh
//! tolerates up to `grace_days` past expiry (the offline-grace contract).

use jwt_simple::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

const SECONDS_PER_DAY: i64 = 86400;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub tenant_id: String,
    pub device_id: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

#[derive(Clone)]
pub struct TokenSigner {
    key: HS256Key,
    ttl_days: i64,
    grace_days: i64,
}

impl TokenSigner {
    pub fn new(key: &[u8; 32], ttl_days: i64, grace_days: i64) -> Self {
        Self {
            key: HS256Key::from_bytes(key),
            ttl_days,
            grace_days,
        }
    }

    pub fn ttl_days(&self) -> i64 {
        self.ttl_days
    }

    /// Issue a token for a validated (tenant, device) binding, anchored at
    /// `now`. Expiry is always issuance + ttl.
    pub fn issue(&self, tenant_id: &str, device_id: &str, now: i64) -> Result<(String, TokenClaims)> {
        let claims = TokenClaims {
            tenant_id: tenant_id.to_string(),
            device_id: device_id.to_string(),
            issued_at: now,
            expires_at: now + self.ttl_days * SECONDS_PER_DAY,
        };

        // The envelope expiry is set past the refresh-grace ceiling; the
        // windows that matter are enforced on the custom claims below.
        let envelope = Claims::with_custom_claims(
            claims.clone(),
            Duration::from_days((self.ttl_days + self.grace_days) as u64),
        );
        let token = self
            .key
            .authenticate(envelope)
            .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))?;
        Ok((token, claims))
    }

    /// Signature and shape check only. Any failure here means the token was
    /// not produced by this server as-is.
    fn decode(&self, token: &str) -> Result<TokenClaims> {
        let mut options = VerificationOptions::default();
        options.time_tolerance = Some(Duration::from_days(36500));
        let verified = self
            .key
            .verify_token::<TokenClaims>(token, Some(options))
            .map_err(|_| AppError::Tampered)?;
        Ok(verified.custom)
    }

    /// Strict verification: signature plus unexpired at `now`.
    pub fn verify(&self, token: &str, now: i64) -> Result<TokenClaims> {
        let claims = self.decode(token)?;
        if now > claims.expires_at {
            return Err(AppError::Expired);
        }
        Ok(claims)
    }

    /// Refresh-window verification: signature plus expiry no further than
    /// `grace_days` in the past. Past that, the device must re-activate.
    pub fn verify_for_refresh(&self, token: &str, now: i64) -> Result<TokenClaims> {
        let claims = self.decode(token)?;
        if now > claims.expires_at + self.grace_days * SECONDS_PER_DAY {
            return Err(AppError::Expired);
        }
        Ok(claims)
    }
}
