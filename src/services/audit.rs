//! Fire-and-forget audit recording.
//!
//! A failed write is logged and swallowed; it never delays or fails
//! the circulation operation that produced it.

use crate::{
    error::AppResult,
    models::audit::{AuditLog, AuditQuery, NewAuditEntry},
    repository::audit::AuditRepository,
};

#[derive(Clone)]
pub struct AuditRecorder {
    repository: AuditRepository,
}

impl AuditRecorder {
    pub fn new(repository: AuditRepository) -> Self {
        Self { repository }
    }

    /// Record a state transition without awaiting the insert
    pub fn record(&self, entry: NewAuditEntry) {
        let repository = self.repository.clone();
        tokio::spawn(async move {
            if let Err(e) = repository.insert(&entry).await {
                tracing::warn!("Failed to write audit log for {}: {}", entry.action, e);
            }
        });
    }

    /// Read back entries for the dashboard; the engine itself never
    /// consults the log
    pub async fn list(&self, query: &AuditQuery) -> AppResult<(Vec<AuditLog>, i64)> {
        self.repository.list(query).await
    }
}
