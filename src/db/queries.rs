use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior, params};
use uuid::Uuid;

use crate::crypto::{self, Keyring};
use crate::error::{AppError, Result};
use crate::models::*;

use super::from_row::{
    ATTEMPT_COLS, DEVICE_COLS, FIRMWARE_COLS, LICENSE_SECRET_COLS, TENANT_COLS, query_all,
    query_one,
};

pub fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

// ============ Tenants ============

/// Create a tenant, sealing its ERP credentials under the new tenant id.
pub fn create_tenant(conn: &Connection, input: &CreateTenant, keyring: &Keyring) -> Result<Tenant> {
    let id = gen_id();
    let now = now();

    let erp_api_key = input
        .erp_api_key
        .as_deref()
        .map(|v| keyring.seal(&id, v.as_bytes()))
        .transpose()?;
    let erp_api_secret = input
        .erp_api_secret
        .as_deref()
        .map(|v| keyring.seal(&id, v.as_bytes()))
        .transpose()?;

    conn.execute(
        "INSERT INTO tenants (id, company_code, erp_url, erp_api_key, erp_api_secret, status, subscription_expires_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            &id,
            &input.company_code,
            &input.erp_url,
            &erp_api_key,
            &erp_api_secret,
            TenantStatus::Active.as_ref(),
            input.subscription_expires_at,
            now,
            now
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!("company code '{}' already exists", input.company_code))
        } else {
            e.into()
        }
    })?;

    Ok(Tenant {
        id,
        company_code: input.company_code.clone(),
        erp_url: input.erp_url.clone(),
        erp_api_key,
        erp_api_secret,
        status: TenantStatus::Active,
        subscription_expires_at: input.subscription_expires_at,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_tenant_by_id(conn: &Connection, id: &str) -> Result<Option<Tenant>> {
    query_one(
        conn,
        &format!("SELECT {} FROM tenants WHERE id = ?1", TENANT_COLS),
        &[&id],
    )
}

/// Company codes are matched case-insensitively.
pub fn get_tenant_by_code(conn: &Connection, company_code: &str) -> Result<Option<Tenant>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM tenants WHERE company_code = ?1 COLLATE NOCASE",
            TENANT_COLS
        ),
        &[&company_code],
    )
}

pub fn list_tenants(conn: &Connection) -> Result<Vec<Tenant>> {
    query_all(
        conn,
        &format!("SELECT {} FROM tenants ORDER BY created_at DESC", TENANT_COLS),
        [],
    )
}

pub fn update_tenant(
    conn: &Connection,
    id: &str,
    input: &UpdateTenant,
    keyring: &Keyring,
) -> Result<bool> {
    let now = now();
    let mut updated = false;

    if let Some(ref erp_url) = input.erp_url {
        conn.execute(
            "UPDATE tenants SET erp_url = ?1, updated_at = ?2 WHERE id = ?3",
            params![erp_url, now, id],
        )?;
        updated = true;
    }
    if let Some(ref key) = input.erp_api_key {
        let sealed = keyring.seal(id, key.as_bytes())?;
        conn.execute(
            "UPDATE tenants SET erp_api_key = ?1, updated_at = ?2 WHERE id = ?3",
            params![sealed, now, id],
        )?;
        updated = true;
    }
    if let Some(ref secret) = input.erp_api_secret {
        let sealed = keyring.seal(id, secret.as_bytes())?;
        conn.execute(
            "UPDATE tenants SET erp_api_secret = ?1, updated_at = ?2 WHERE id = ?3",
            params![sealed, now, id],
        )?;
        updated = true;
    }
    if let Some(status) = input.status {
        conn.execute(
            "UPDATE tenants SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_ref(), now, id],
        )?;
        updated = true;
    }
    if let Some(expires_at) = input.subscription_expires_at {
        conn.execute(
            "UPDATE tenants SET subscription_expires_at = ?1, updated_at = ?2 WHERE id = ?3",
            params![expires_at, now, id],
        )?;
        updated = true;
    }

    Ok(updated)
}

// ============ License secrets ============

/// Issue a fresh license secret for a tenant, demoting any previous current
/// secret. Returns the stored row plus the plaintext (shown exactly once).
pub fn issue_license_secret(
    conn: &mut Connection,
    tenant_id: &str,
    keyring: &Keyring,
) -> Result<(LicenseSecret, String)> {
    let id = gen_id();
    let now = now();
    let secret = crypto::generate_license_secret();
    let secret_hash = crypto::hash_secret(&secret);
    let fingerprint = keyring.fingerprint(&secret);

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute(
        "UPDATE license_secrets SET is_current = 0 WHERE tenant_id = ?1 AND is_current = 1",
        params![tenant_id],
    )?;
    tx.execute(
        "INSERT INTO license_secrets (id, tenant_id, secret_hash, fingerprint, is_current, revoked, created_at)
         VALUES (?1, ?2, ?3, ?4, 1, 0, ?5)",
        params![&id, tenant_id, &secret_hash, &fingerprint, now],
    )?;
    tx.commit()?;

    Ok((
        LicenseSecret {
            id,
            tenant_id: tenant_id.to_string(),
            secret_hash,
            fingerprint,
            current: true,
            revoked: false,
            created_at: now,
        },
        secret,
    ))
}

/// The tenant's current secret for new activations, if any.
pub fn get_current_secret(conn: &Connection, tenant_id: &str) -> Result<Option<LicenseSecret>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM license_secrets WHERE tenant_id = ?1 AND is_current = 1 AND revoked = 0",
            LICENSE_SECRET_COLS
        ),
        &[&tenant_id],
    )
}

pub fn list_secrets_for_tenant(conn: &Connection, tenant_id: &str) -> Result<Vec<LicenseSecret>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM license_secrets WHERE tenant_id = ?1 ORDER BY created_at DESC",
            LICENSE_SECRET_COLS
        ),
        &[&tenant_id],
    )
}

pub fn revoke_license_secret(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE license_secrets SET revoked = 1, is_current = 0 WHERE id = ?1 AND revoked = 0",
        params![id],
    )?;
    Ok(affected > 0)
}

// ============ Devices ============

/// Bind a device on activation, or refresh an existing binding.
///
/// Runs as one IMMEDIATE transaction so two concurrent first activations for
/// the same device id cannot both insert: the first writer creates the row,
/// the second observes it and proceeds idempotently. Revoked devices never
/// re-activate.
pub fn activate_device(
    conn: &mut Connection,
    tenant_id: &str,
    device_id: &str,
    license_id: &str,
    now: i64,
) -> Result<Device> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let existing: Option<Device> = query_one(
        &tx,
        &format!(
            "SELECT {} FROM devices WHERE tenant_id = ?1 AND device_id = ?2",
            DEVICE_COLS
        ),
        params![tenant_id, device_id],
    )?;
    if let Some(ref device) = existing {
        if device.revoked {
            return Err(AppError::DeviceRevoked);
        }
    }

    tx.execute(
        "INSERT INTO devices (id, tenant_id, device_id, license_id, revoked, last_seen_at, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)
         ON CONFLICT(tenant_id, device_id) DO UPDATE
         SET last_seen_at = excluded.last_seen_at, license_id = excluded.license_id",
        params![gen_id(), tenant_id, device_id, license_id, now, now],
    )?;

    let device: Device = query_one(
        &tx,
        &format!(
            "SELECT {} FROM devices WHERE tenant_id = ?1 AND device_id = ?2",
            DEVICE_COLS
        ),
        params![tenant_id, device_id],
    )?
    .ok_or_else(|| AppError::Internal("device binding vanished mid-transaction".into()))?;

    tx.commit()?;
    Ok(device)
}

pub fn get_device(conn: &Connection, tenant_id: &str, device_id: &str) -> Result<Option<Device>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM devices WHERE tenant_id = ?1 AND device_id = ?2",
            DEVICE_COLS
        ),
        params![tenant_id, device_id],
    )
}

pub fn list_devices_for_tenant(conn: &Connection, tenant_id: &str) -> Result<Vec<Device>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM devices WHERE tenant_id = ?1 ORDER BY created_at DESC",
            DEVICE_COLS
        ),
        &[&tenant_id],
    )
}

pub fn touch_device_last_seen(conn: &Connection, id: &str, now: i64) -> Result<()> {
    conn.execute(
        "UPDATE devices SET last_seen_at = ?1 WHERE id = ?2",
        params![now, id],
    )?;
    Ok(())
}

/// One-way revocation. Takes effect on the next validation; in-flight
/// requests are not interrupted.
pub fn revoke_device(conn: &Connection, tenant_id: &str, device_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE devices SET revoked = 1 WHERE tenant_id = ?1 AND device_id = ?2 AND revoked = 0",
        params![tenant_id, device_id],
    )?;
    Ok(affected > 0)
}

// ============ Firmware catalog ============

pub fn create_firmware(conn: &Connection, input: &CreateFirmware) -> Result<FirmwareRelease> {
    let now = now();

    conn.execute(
        "INSERT INTO firmware_releases (device_type, version, build_number, filename, file_size, file_hash, binary_path, description, release_notes, is_stable, is_active, min_current_version, created_at, updated_at, released_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1, ?11, ?12, ?13, NULL)",
        params![
            &input.device_type,
            &input.version,
            input.build_number,
            &input.filename,
            input.file_size,
            &input.file_hash,
            &input.binary_path,
            &input.description,
            &input.release_notes,
            input.is_stable as i32,
            &input.min_current_version,
            now,
            now
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!(
                "firmware {} v{} build {} already exists",
                input.device_type, input.version, input.build_number
            ))
        } else {
            e.into()
        }
    })?;

    let id = conn.last_insert_rowid();
    Ok(FirmwareRelease {
        id,
        device_type: input.device_type.clone(),
        version: input.version.clone(),
        build_number: input.build_number,
        filename: input.filename.clone(),
        file_size: input.file_size,
        file_hash: input.file_hash.clone(),
        binary_path: input.binary_path.clone(),
        description: input.description.clone(),
        release_notes: input.release_notes.clone(),
        is_stable: input.is_stable,
        is_active: true,
        min_current_version: input.min_current_version.clone(),
        created_at: now,
        updated_at: now,
        released_at: None,
    })
}

pub fn get_firmware_by_id(conn: &Connection, id: i64) -> Result<Option<FirmwareRelease>> {
    query_one(
        conn,
        &format!("SELECT {} FROM firmware_releases WHERE id = ?1", FIRMWARE_COLS),
        params![id],
    )
}

/// Lookup for delivery: inactive releases are invisible here.
pub fn get_active_firmware_by_id(conn: &Connection, id: i64) -> Result<Option<FirmwareRelease>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM firmware_releases WHERE id = ?1 AND is_active = 1",
            FIRMWARE_COLS
        ),
        params![id],
    )
}

/// Candidate set for update negotiation; stability is weighed by the caller.
pub fn list_active_firmware_for_type(
    conn: &Connection,
    device_type: &str,
) -> Result<Vec<FirmwareRelease>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM firmware_releases WHERE device_type = ?1 AND is_active = 1",
            FIRMWARE_COLS
        ),
        &[&device_type],
    )
}

pub fn list_firmware(conn: &Connection, device_type: Option<&str>) -> Result<Vec<FirmwareRelease>> {
    match device_type {
        Some(dt) => query_all(
            conn,
            &format!(
                "SELECT {} FROM firmware_releases WHERE device_type = ?1 ORDER BY created_at DESC",
                FIRMWARE_COLS
            ),
            &[&dt],
        ),
        None => query_all(
            conn,
            &format!(
                "SELECT {} FROM firmware_releases ORDER BY created_at DESC",
                FIRMWARE_COLS
            ),
            [],
        ),
    }
}

pub fn update_firmware(conn: &Connection, id: i64, input: &UpdateFirmware) -> Result<bool> {
    let now = now();
    let mut updated = false;

    if let Some(ref description) = input.description {
        conn.execute(
            "UPDATE firmware_releases SET description = ?1, updated_at = ?2 WHERE id = ?3",
            params![description, now, id],
        )?;
        updated = true;
    }
    if let Some(ref notes) = input.release_notes {
        conn.execute(
            "UPDATE firmware_releases SET release_notes = ?1, updated_at = ?2 WHERE id = ?3",
            params![notes, now, id],
        )?;
        updated = true;
    }
    if let Some(is_stable) = input.is_stable {
        conn.execute(
            "UPDATE firmware_releases SET is_stable = ?1, updated_at = ?2 WHERE id = ?3",
            params![is_stable as i32, now, id],
        )?;
        updated = true;
    }
    if let Some(ref min) = input.min_current_version {
        conn.execute(
            "UPDATE firmware_releases SET min_current_version = ?1, updated_at = ?2 WHERE id = ?3",
            params![min, now, id],
        )?;
        updated = true;
    }
    if let Some(released_at) = input.released_at {
        conn.execute(
            "UPDATE firmware_releases SET released_at = ?1, updated_at = ?2 WHERE id = ?3",
            params![released_at, now, id],
        )?;
        updated = true;
    }

    Ok(updated)
}

/// Exclude a release from negotiation and delivery. The row and binary stay
/// for audit and for devices mid-update.
pub fn deactivate_firmware(conn: &Connection, id: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE firmware_releases SET is_active = 0, updated_at = ?1 WHERE id = ?2",
        params![now(), id],
    )?;
    Ok(affected > 0)
}

// ============ Update attempts ============

pub fn open_attempt(
    conn: &Connection,
    device_id: &str,
    firmware_id: i64,
    now: i64,
) -> Result<UpdateAttempt> {
    conn.execute(
        "INSERT INTO update_attempts (device_id, firmware_id, status, bytes_downloaded, created_at, updated_at)
         VALUES (?1, ?2, ?3, 0, ?4, ?5)",
        params![device_id, firmware_id, UpdateStatus::Pending.as_ref(), now, now],
    )?;

    Ok(UpdateAttempt {
        id: conn.last_insert_rowid(),
        device_id: device_id.to_string(),
        firmware_id,
        status: UpdateStatus::Pending,
        bytes_downloaded: 0,
        error_message: None,
        download_started_at: None,
        download_completed_at: None,
        finished_at: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_attempt(conn: &Connection, id: i64) -> Result<Option<UpdateAttempt>> {
    query_one(
        conn,
        &format!("SELECT {} FROM update_attempts WHERE id = ?1", ATTEMPT_COLS),
        params![id],
    )
}

/// The newest attempt for a (device, firmware) pair, if any.
pub fn latest_attempt_for(
    conn: &Connection,
    device_id: &str,
    firmware_id: i64,
) -> Result<Option<UpdateAttempt>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM update_attempts WHERE device_id = ?1 AND firmware_id = ?2
             ORDER BY created_at DESC, id DESC LIMIT 1",
            ATTEMPT_COLS
        ),
        params![device_id, firmware_id],
    )
}

/// Move an attempt forward, stamping each phase on first entry.
///
/// Runs as one IMMEDIATE transaction: the status check and the update are
/// atomic, so concurrent reports cannot interleave into an illegal history.
pub fn advance_attempt(
    conn: &mut Connection,
    attempt_id: i64,
    status: UpdateStatus,
    bytes_downloaded: Option<i64>,
    error_message: Option<&str>,
    now: i64,
) -> Result<UpdateAttempt> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let attempt: UpdateAttempt = query_one(
        &tx,
        &format!("SELECT {} FROM update_attempts WHERE id = ?1", ATTEMPT_COLS),
        params![attempt_id],
    )?
    .ok_or_else(|| AppError::NotFound(format!("update attempt {attempt_id} not found")))?;

    if !attempt.status.can_advance_to(status) {
        return Err(AppError::InvalidTransition(format!(
            "cannot move attempt {} from {} to {}",
            attempt_id,
            attempt.status.as_ref(),
            status.as_ref()
        )));
    }

    tx.execute(
        "UPDATE update_attempts SET
            status = ?1,
            bytes_downloaded = COALESCE(?2, bytes_downloaded),
            error_message = COALESCE(?3, error_message),
            download_started_at = CASE WHEN ?1 = 'downloading' THEN COALESCE(download_started_at, ?4) ELSE download_started_at END,
            download_completed_at = CASE WHEN ?1 = 'installing' THEN COALESCE(download_completed_at, ?4) ELSE download_completed_at END,
            finished_at = CASE WHEN ?1 IN ('success', 'failed') THEN COALESCE(finished_at, ?4) ELSE finished_at END,
            updated_at = ?4
         WHERE id = ?5",
        params![status.as_ref(), bytes_downloaded, error_message, now, attempt_id],
    )?;

    let updated: UpdateAttempt = query_one(
        &tx,
        &format!("SELECT {} FROM update_attempts WHERE id = ?1", ATTEMPT_COLS),
        params![attempt_id],
    )?
    .ok_or_else(|| AppError::Internal("update attempt vanished mid-transaction".into()))?;

    tx.commit()?;
    Ok(updated)
}

/// Ledger query: newest first, filterable, paginated.
pub fn query_attempts(conn: &Connection, query: &AttemptQuery) -> Result<Vec<UpdateAttempt>> {
    let mut where_clause = String::from("WHERE 1=1");
    let mut filter_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(ref device_id) = query.device_id {
        where_clause.push_str(" AND device_id = ?");
        filter_params.push(Box::new(device_id.clone()));
    }
    if let Some(firmware_id) = query.firmware_id {
        where_clause.push_str(" AND firmware_id = ?");
        filter_params.push(Box::new(firmware_id));
    }
    if let Some(status) = query.status {
        where_clause.push_str(" AND status = ?");
        filter_params.push(Box::new(status.as_ref().to_string()));
    }
    filter_params.push(Box::new(query.limit()));
    filter_params.push(Box::new(query.offset()));

    let sql = format!(
        "SELECT {} FROM update_attempts {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        ATTEMPT_COLS, where_clause
    );
    let refs: Vec<&dyn rusqlite::ToSql> = filter_params.iter().map(|b| b.as_ref()).collect();
    query_all(conn, &sql, refs.as_slice())
}
