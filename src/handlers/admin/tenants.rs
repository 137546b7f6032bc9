use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::{CreateTenant, Tenant, UpdateTenant};

pub async fn create_tenant(
    State(state): State<AppState>,
    Json(input): Json<CreateTenant>,
) -> Result<Json<Tenant>> {
    if input.company_code.trim().is_empty() {
        return Err(AppError::BadRequest("company_code is required".into()));
    }

    let conn = state.db.get()?;
    let tenant = queries::create_tenant(&conn, &input, &state.keyring)?;

    tracing::info!("created tenant {} ({})", tenant.company_code, tenant.id);
    Ok(Json(tenant))
}

pub async fn list_tenants(State(state): State<AppState>) -> Result<Json<Vec<Tenant>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_tenants(&conn)?))
}

pub async fn get_tenant(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<Tenant>> {
    let conn = state.db.get()?;
    let tenant = queries::get_tenant_by_id(&conn, &tenant_id)?
        .ok_or_else(|| AppError::NotFound("tenant not found".into()))?;
    Ok(Json(tenant))
}

#[derive(Serialize)]
pub struct UpdatedResponse {
    pub updated: bool,
}

/// PATCH /admin/tenants/{tenant_id}
///
/// Subscription renewal and status changes land here. Tenants are never
/// deleted; suspension is the off switch.
pub async fn update_tenant(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    Json(input): Json<UpdateTenant>,
) -> Result<Json<UpdatedResponse>> {
    let conn = state.db.get()?;
    queries::get_tenant_by_id(&conn, &tenant_id)?
        .ok_or_else(|| AppError::NotFound("tenant not found".into()))?;

    let updated = queries::update_tenant(&conn, &tenant_id, &input, &state.keyring)?;
    if updated {
        tracing::info!("updated tenant {}", tenant_id);
    }
    Ok(Json(UpdatedResponse { updated }))
}
