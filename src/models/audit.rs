//! Audit log entry model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::user::Actor;

/// Audit log entry from database; append-only, never consulted by
/// the circulation engine itself.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AuditLog {
    pub id: Uuid,
    pub actor_user_id: Option<Uuid>,
    pub actor_role: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    #[schema(value_type = Object)]
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A state transition about to be recorded
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub action: &'static str,
    pub entity_type: &'static str,
    pub entity_id: Option<Uuid>,
    pub details: serde_json::Value,
    pub actor: Option<Actor>,
}

/// Audit log list query parameters
#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditQuery {
    /// Filter on a single action, e.g. `loan.created`
    pub action: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}
