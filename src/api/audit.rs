//! Audit log endpoints (dashboard read side)

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::audit::{AuditLog, AuditQuery},
};

use super::AuthenticatedUser;

/// Paginated audit log list
#[derive(Serialize, ToSchema)]
pub struct AuditListResponse {
    pub items: Vec<AuditLog>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

/// List audit log entries, newest first (staff only)
#[utoipa::path(
    get,
    path = "/audit-logs",
    tag = "audit",
    security(("bearer_auth" = [])),
    params(AuditQuery),
    responses(
        (status = 200, description = "Audit log entries", body = AuditListResponse),
        (status = 403, description = "Not staff")
    )
)]
pub async fn list_audit_logs(
    State(state): State<crate::AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Query(query): Query<AuditQuery>,
) -> AppResult<Json<AuditListResponse>> {
    if !actor.is_staff() {
        return Err(AppError::Authorization(
            "Only staff can read audit logs".to_string(),
        ));
    }

    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(50).clamp(1, 200);

    let (items, total) = state.services.audit.list(&query).await?;

    Ok(Json(AuditListResponse {
        items,
        total,
        page,
        page_size,
    }))
}
