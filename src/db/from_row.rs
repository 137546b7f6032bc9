//! Row-mapping helpers shared by the query layer.
//!
//! Each entity declares its column list once; `query_one`/`query_all` pair a
//! SELECT over those columns with the matching `FromRow` implementation.

use rusqlite::{Connection, Params, Row};

use crate::error::Result;
use crate::models::*;

pub trait FromRow: Sized {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

pub fn query_one<T: FromRow, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query_map(params, |row| T::from_row(row))?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

pub fn query_all<T: FromRow, P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| T::from_row(row))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub const TENANT_COLS: &str = "id, company_code, erp_url, erp_api_key, erp_api_secret, status, subscription_expires_at, created_at, updated_at";

impl FromRow for Tenant {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Tenant {
            id: row.get(0)?,
            company_code: row.get(1)?,
            erp_url: row.get(2)?,
            erp_api_key: row.get(3)?,
            erp_api_secret: row.get(4)?,
            status: row.get::<_, String>(5)?.parse().unwrap(),
            subscription_expires_at: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

pub const LICENSE_SECRET_COLS: &str =
    "id, tenant_id, secret_hash, fingerprint, is_current, revoked, created_at";

impl FromRow for LicenseSecret {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(LicenseSecret {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            secret_hash: row.get(2)?,
            fingerprint: row.get(3)?,
            current: row.get(4)?,
            revoked: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

pub const DEVICE_COLS: &str =
    "id, tenant_id, device_id, license_id, revoked, last_seen_at, created_at";

impl FromRow for Device {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Device {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            device_id: row.get(2)?,
            license_id: row.get(3)?,
            revoked: row.get(4)?,
            last_seen_at: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

pub const FIRMWARE_COLS: &str = "id, device_type, version, build_number, filename, file_size, file_hash, binary_path, description, release_notes, is_stable, is_active, min_current_version, created_at, updated_at, released_at";

impl FromRow for FirmwareRelease {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(FirmwareRelease {
            id: row.get(0)?,
            device_type: row.get(1)?,
            version: row.get(2)?,
            build_number: row.get(3)?,
            filename: row.get(4)?,
            file_size: row.get(5)?,
            file_hash: row.get(6)?,
            binary_path: row.get(7)?,
            description: row.get(8)?,
            release_notes: row.get(9)?,
            is_stable: row.get(10)?,
            is_active: row.get(11)?,
            min_current_version: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
            released_at: row.get(15)?,
        })
    }
}

pub const ATTEMPT_COLS: &str = "id, device_id, firmware_id, status, bytes_downloaded, error_message, download_started_at, download_completed_at, finished_at, created_at, updated_at";

impl FromRow for UpdateAttempt {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(UpdateAttempt {
            id: row.get(0)?,
            device_id: row.get(1)?,
            firmware_id: row.get(2)?,
            status: row.get::<_, String>(3)?.parse().unwrap(),
            bytes_downloaded: row.get(4)?,
            error_message: row.get(5)?,
            download_started_at: row.get(6)?,
            download_completed_at: row.get(7)?,
            finished_at: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}
