pub mod from_row;
pub mod queries;

use std::path::PathBuf;

use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::config::Config;
use crate::crypto::Keyring;
use crate::error::Result;
use crate::token::TokenSigner;

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;

/// Shared request state: pooled store plus derived key material.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub keyring: Keyring,
    pub tokens: TokenSigner,
    pub firmware_dir: PathBuf,
    pub admin_token: Option<String>,
    pub grace_days: i64,
    pub download_ttl_secs: i64,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self> {
        let db = open_pool(&config.database_path)?;
        init_schema(&*db.get()?)?;

        let keyring = Keyring::from_secret(&config.secret_key);
        let tokens = TokenSigner::new(keyring.token_key(), config.token_ttl_days, config.grace_days);

        Ok(Self {
            db,
            keyring,
            tokens,
            firmware_dir: PathBuf::from(&config.firmware_dir),
            admin_token: config.admin_token.clone(),
            grace_days: config.grace_days,
            download_ttl_secs: config.download_ttl_secs,
        })
    }
}

pub fn open_pool(path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
    });
    Ok(r2d2::Pool::new(manager)?)
}

/// Create all tables and indexes. Idempotent; runs at startup.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS tenants (
            id TEXT PRIMARY KEY,
            company_code TEXT NOT NULL UNIQUE COLLATE NOCASE,
            erp_url TEXT NOT NULL,
            erp_api_key BLOB,
            erp_api_secret BLOB,
            status TEXT NOT NULL,
            subscription_expires_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS license_secrets (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL REFERENCES tenants(id),
            secret_hash TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            is_current INTEGER NOT NULL DEFAULT 0,
            revoked INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_license_secrets_tenant
            ON license_secrets(tenant_id);
        CREATE INDEX IF NOT EXISTS idx_license_secrets_fingerprint
            ON license_secrets(fingerprint);

        CREATE TABLE IF NOT EXISTS devices (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL REFERENCES tenants(id),
            device_id TEXT NOT NULL,
            license_id TEXT NOT NULL REFERENCES license_secrets(id),
            revoked INTEGER NOT NULL DEFAULT 0,
            last_seen_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE (tenant_id, device_id)
        );

        CREATE TABLE IF NOT EXISTS firmware_releases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device_type TEXT NOT NULL,
            version TEXT NOT NULL,
            build_number INTEGER NOT NULL,
            filename TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            file_hash TEXT NOT NULL,
            binary_path TEXT NOT NULL,
            description TEXT,
            release_notes TEXT,
            is_stable INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            min_current_version TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            released_at INTEGER,
            UNIQUE (device_type, version, build_number)
        );
        CREATE INDEX IF NOT EXISTS idx_firmware_device_type
            ON firmware_releases(device_type);

        CREATE TABLE IF NOT EXISTS update_attempts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id TEXT NOT NULL REFERENCES devices(id),
            firmware_id INTEGER NOT NULL REFERENCES firmware_releases(id),
            status TEXT NOT NULL,
            bytes_downloaded INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            download_started_at INTEGER,
            download_completed_at INTEGER,
            finished_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_attempts_device
            ON update_attempts(device_id);
        CREATE INDEX IF NOT EXISTS idx_attempts_firmware
            ON update_attempts(firmware_id);",
    )?;
    Ok(())
}
