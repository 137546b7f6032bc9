use axum::Json;
use axum::extract::{Query, State};

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::models::{AttemptQuery, UpdateAttempt};

/// GET /admin/attempts
///
/// Ledger query: newest attempts first, filterable by device, firmware, and
/// status, paginated with limit/offset.
pub async fn query_attempts(
    State(state): State<AppState>,
    Query(query): Query<AttemptQuery>,
) -> Result<Json<Vec<UpdateAttempt>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::query_attempts(&conn, &query)?))
}
