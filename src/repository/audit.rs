//! Audit log repository; insert-only from the engine's point of view,
//! read back only by the staff dashboard endpoint.

use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::audit::{AuditLog, AuditQuery, NewAuditEntry},
};

#[derive(Clone)]
pub struct AuditRepository {
    pool: Pool<Postgres>,
}

impl AuditRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Append one audit entry
    pub async fn insert(&self, entry: &NewAuditEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (actor_user_id, actor_role, action, entity_type, entity_id, details)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.actor.map(|a| a.id))
        .bind(entry.actor.map(|a| a.role.as_str()))
        .bind(entry.action)
        .bind(entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.details)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// List audit entries, newest first, with pagination
    pub async fn list(&self, query: &AuditQuery) -> AppResult<(Vec<AuditLog>, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let page_size = query.page_size.unwrap_or(50).clamp(1, 200);
        let offset = (page - 1) * page_size;

        let (total, rows) = if let Some(ref action) = query.action {
            let total: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM audit_logs WHERE action = $1")
                    .bind(action)
                    .fetch_one(&self.pool)
                    .await?;
            let rows = sqlx::query_as::<_, AuditLog>(&format!(
                "SELECT * FROM audit_logs WHERE action = $1 ORDER BY created_at DESC LIMIT {} OFFSET {}",
                page_size, offset
            ))
            .bind(action)
            .fetch_all(&self.pool)
            .await?;
            (total, rows)
        } else {
            let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_logs")
                .fetch_one(&self.pool)
                .await?;
            let rows = sqlx::query_as::<_, AuditLog>(&format!(
                "SELECT * FROM audit_logs ORDER BY created_at DESC LIMIT {} OFFSET {}",
                page_size, offset
            ))
            .fetch_all(&self.pool)
            .await?;
            (total, rows)
        };

        Ok((rows, total))
    }
}
