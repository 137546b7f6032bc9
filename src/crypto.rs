//! Key derivation, at-rest sealing, and license-secret hashing.
//!
//! A single `SECRET_KEY` is expanded with HKDF-SHA256 into independent keys
//! so that token signing, download-grant MACs, and credential sealing can
//! never be cross-used against each other.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};

const NONCE_LEN: usize = 12;
const SALT_LEN: usize = 16;

/// All derived key material for one server instance.
#[derive(Clone)]
pub struct Keyring {
    token_key: [u8; 32],
    grant_key: [u8; 32],
    seal_key: [u8; 32],
}

impl Keyring {
    pub fn from_secret(secret: &str) -> Self {
        Self {
            token_key: derive(secret, b"gatehouse/token/v1"),
            grant_key: derive(secret, b"gatehouse/grant/v1"),
            seal_key: derive(secret, b"gatehouse/seal/v1"),
        }
    }

    pub fn token_key(&self) -> &[u8; 32] {
        &self.token_key
    }

    pub fn grant_key(&self) -> &[u8; 32] {
        &self.grant_key
    }

    /// Encrypt a tenant credential for storage. The context string (tenant id)
    /// is bound as associated data so ciphertexts cannot be swapped between
    /// rows. Output layout: nonce || ciphertext.
    pub fn seal(&self, context: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new_from_slice(&self.seal_key)
            .map_err(|_| AppError::Internal("invalid sealing key length".into()))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext,
                    aad: context.as_bytes(),
                },
            )
            .map_err(|_| AppError::Internal("credential sealing failed".into()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    pub fn open(&self, context: &str, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_LEN {
            return Err(AppError::Internal("sealed credential too short".into()));
        }
        let cipher = Aes256Gcm::new_from_slice(&self.seal_key)
            .map_err(|_| AppError::Internal("invalid sealing key length".into()))?;

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        cipher
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: ciphertext,
                    aad: context.as_bytes(),
                },
            )
            .map_err(|_| AppError::Internal("credential unsealing failed".into()))
    }

    /// Keyed lookup hash for a license secret. Stored alongside the salted
    /// hash so activation can find candidate rows with an indexed query
    /// instead of scanning every secret for the tenant.
    pub fn fingerprint(&self, secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"gatehouse-fingerprint-v1:");
        hasher.update(self.grant_key);
        hasher.update(secret.as_bytes());
        hex::encode(&hasher.finalize()[..16])
    }
}

fn derive(secret: &str, info: &[u8]) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(None, secret.as_bytes());
    let mut okm = [0u8; 32];
    hk.expand(info, &mut okm)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    okm
}

/// Generate a fresh license secret. Shown to the operator exactly once;
/// only the salted hash and fingerprint are stored.
pub fn generate_license_secret() -> String {
    format!("gh_{}", uuid::Uuid::new_v4().simple())
}

/// Salted one-way hash of a license secret, stored as `hex(salt)$hex(digest)`.
pub fn hash_secret(secret: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    format!("{}${}", hex::encode(salt), hex::encode(digest(&salt, secret)))
}

/// Constant-time verification against a stored `hash_secret` value.
/// Malformed stored values simply fail to verify.
pub fn verify_secret(secret: &str, stored: &str) -> bool {
    let Some((salt_hex, hash_hex)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(hash_hex)) else {
        return false;
    };
    let actual = digest(&salt, secret);
    expected.len() == actual.len() && bool::from(expected.ct_eq(&actual))
}

fn digest(salt: &[u8], secret: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"gatehouse-secret-v1:");
    hasher.update(salt);
    hasher.update(secret.as_bytes());
    hasher.finalize().into()
}
