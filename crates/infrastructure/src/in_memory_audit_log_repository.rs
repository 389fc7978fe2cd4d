//! In-memory audit log repository for tests and local development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lykos_application::{AuditLogQuery, AuditLogRepository};
use lykos_core::{AppResult, TenantId};
use lykos_domain::AuditLogEntry;
use tokio::sync::RwLock;

/// In-memory implementation of the audit log repository port.
///
/// Mirrors the Postgres adapter's filter, clamp, and ordering semantics so
/// upper-layer tests observe the same behavior either way.
#[derive(Debug, Default)]
pub struct InMemoryAuditLogRepository {
    entries: RwLock<Vec<AuditLogEntry>>,
}

impl InMemoryAuditLogRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryAuditLogRepository {
    async fn append(&self, entry: &AuditLogEntry) -> AppResult<()> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn query(
        &self,
        tenant_id: TenantId,
        query: &AuditLogQuery,
    ) -> AppResult<Vec<AuditLogEntry>> {
        let capped_limit = query.limit.unwrap_or(50).clamp(1, 200) as usize;
        let capped_offset = query.offset.unwrap_or(0).clamp(0, 5_000) as usize;

        let entries = self.entries.read().await;
        let mut matched: Vec<AuditLogEntry> = entries
            .iter()
            .filter(|entry| entry.tenant_id == tenant_id)
            .filter(|entry| query.actor_id.is_none_or(|actor| entry.actor_id == actor))
            .filter(|entry| query.action.is_none_or(|action| entry.action == action))
            .filter(|entry| {
                query
                    .entity_type
                    .as_deref()
                    .is_none_or(|entity_type| entry.entity_type == entity_type)
            })
            .filter(|entry| {
                query
                    .min_risk_level
                    .is_none_or(|min| entry.risk_level >= min)
            })
            .filter(|entry| query.occurred_after.is_none_or(|after| entry.occurred_at >= after))
            .filter(|entry| {
                query
                    .occurred_before
                    .is_none_or(|before| entry.occurred_at < before)
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        Ok(matched.into_iter().skip(capped_offset).take(capped_limit).collect())
    }

    async fn entries_in_range(
        &self,
        tenant_id: TenantId,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> AppResult<Vec<AuditLogEntry>> {
        let entries = self.entries.read().await;
        let mut matched: Vec<AuditLogEntry> = entries
            .iter()
            .filter(|entry| {
                entry.tenant_id == tenant_id
                    && entry.occurred_at >= from
                    && entry.occurred_at < until
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at));
        Ok(matched)
    }
}
