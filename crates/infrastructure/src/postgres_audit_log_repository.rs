//! PostgreSQL-backed audit log repository.
//!
//! The table is append-only: the adapter issues INSERT and SELECT statements
//! only; there is no update or delete path.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use lykos_application::{AuditLogQuery, AuditLogRepository};
use lykos_core::{AppError, AppResult, TenantId};
use lykos_domain::{AuditAction, AuditLogEntry, AuditResult, RequestMetadata, RiskLevel};

#[cfg(test)]
mod tests;

/// Hard ceiling on query page size.
const MAX_QUERY_LIMIT: i64 = 200;

/// Hard ceiling on query offset.
const MAX_QUERY_OFFSET: i64 = 5_000;

/// PostgreSQL implementation of the audit log repository port.
#[derive(Clone)]
pub struct PostgresAuditLogRepository {
    pool: PgPool,
}

impl PostgresAuditLogRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditLogRow {
    id: uuid::Uuid,
    tenant_id: uuid::Uuid,
    actor_id: uuid::Uuid,
    actor_email: Option<String>,
    actor_name: String,
    action: String,
    entity_type: String,
    entity_id: Option<String>,
    description: String,
    before_snapshot: Option<String>,
    after_snapshot: Option<String>,
    metadata: serde_json::Value,
    risk_level: String,
    result: String,
    error_message: Option<String>,
    duration_ms: Option<i64>,
    occurred_at: DateTime<Utc>,
}

impl AuditLogRow {
    fn into_entry(self) -> AppResult<AuditLogEntry> {
        let metadata: RequestMetadata = serde_json::from_value(self.metadata).map_err(|error| {
            AppError::Internal(format!("failed to decode audit metadata: {error}"))
        })?;

        Ok(AuditLogEntry {
            id: self.id,
            tenant_id: TenantId::from_uuid(self.tenant_id),
            actor_id: self.actor_id,
            actor_email: self.actor_email,
            actor_name: self.actor_name,
            action: AuditAction::from_str(self.action.as_str())?,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            description: self.description,
            before_snapshot: self.before_snapshot,
            after_snapshot: self.after_snapshot,
            metadata,
            risk_level: RiskLevel::from_str(self.risk_level.as_str())?,
            result: AuditResult::from_str(self.result.as_str())?,
            error_message: self.error_message,
            duration_ms: self.duration_ms,
            occurred_at: self.occurred_at,
        })
    }
}

#[async_trait]
impl AuditLogRepository for PostgresAuditLogRepository {
    async fn append(&self, entry: &AuditLogEntry) -> AppResult<()> {
        let metadata = serde_json::to_value(&entry.metadata).map_err(|error| {
            AppError::Internal(format!("failed to encode audit metadata: {error}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO audit_log_entries (
                id, tenant_id, actor_id, actor_email, actor_name, action,
                entity_type, entity_id, description, before_snapshot,
                after_snapshot, metadata, risk_level, result, error_message,
                duration_ms, occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17)
            "#,
        )
        .bind(entry.id)
        .bind(entry.tenant_id.as_uuid())
        .bind(entry.actor_id)
        .bind(entry.actor_email.as_deref())
        .bind(entry.actor_name.as_str())
        .bind(entry.action.as_str())
        .bind(entry.entity_type.as_str())
        .bind(entry.entity_id.as_deref())
        .bind(entry.description.as_str())
        .bind(entry.before_snapshot.as_deref())
        .bind(entry.after_snapshot.as_deref())
        .bind(metadata)
        .bind(entry.risk_level.as_str())
        .bind(entry.result.as_str())
        .bind(entry.error_message.as_deref())
        .bind(entry.duration_ms)
        .bind(entry.occurred_at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append audit entry: {error}")))?;

        Ok(())
    }

    async fn query(
        &self,
        tenant_id: TenantId,
        query: &AuditLogQuery,
    ) -> AppResult<Vec<AuditLogEntry>> {
        let capped_limit = query.limit.unwrap_or(50).clamp(1, MAX_QUERY_LIMIT);
        let capped_offset = query.offset.unwrap_or(0).clamp(0, MAX_QUERY_OFFSET);

        let rows = sqlx::query_as::<_, AuditLogRow>(
            r#"
            SELECT
                id, tenant_id, actor_id, actor_email, actor_name, action,
                entity_type, entity_id, description, before_snapshot,
                after_snapshot, metadata, risk_level, result, error_message,
                duration_ms, occurred_at
            FROM audit_log_entries
            WHERE tenant_id = $1
                AND ($2::UUID IS NULL OR actor_id = $2)
                AND ($3::TEXT IS NULL OR action = $3)
                AND ($4::TEXT IS NULL OR entity_type = $4)
                AND ($5::TIMESTAMPTZ IS NULL OR occurred_at >= $5)
                AND ($6::TIMESTAMPTZ IS NULL OR occurred_at < $6)
            ORDER BY occurred_at DESC
            LIMIT $7
            OFFSET $8
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(query.actor_id)
        .bind(query.action.map(|action| action.as_str()))
        .bind(query.entity_type.as_deref())
        .bind(query.occurred_after)
        .bind(query.occurred_before)
        .bind(capped_limit)
        .bind(capped_offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to query audit entries: {error}")))?;

        let mut entries = rows
            .into_iter()
            .map(AuditLogRow::into_entry)
            .collect::<AppResult<Vec<_>>>()?;

        // Risk filtering happens here rather than in SQL: risk levels are
        // ordered in the domain, not lexically in their storage strings.
        if let Some(min_risk_level) = query.min_risk_level {
            entries.retain(|entry| entry.risk_level >= min_risk_level);
        }

        Ok(entries)
    }

    async fn entries_in_range(
        &self,
        tenant_id: TenantId,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> AppResult<Vec<AuditLogEntry>> {
        let rows = sqlx::query_as::<_, AuditLogRow>(
            r#"
            SELECT
                id, tenant_id, actor_id, actor_email, actor_name, action,
                entity_type, entity_id, description, before_snapshot,
                after_snapshot, metadata, risk_level, result, error_message,
                duration_ms, occurred_at
            FROM audit_log_entries
            WHERE tenant_id = $1 AND occurred_at >= $2 AND occurred_at < $3
            ORDER BY occurred_at ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(from)
        .bind(until)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to scan audit entries in range: {error}"))
        })?;

        rows.into_iter().map(AuditLogRow::into_entry).collect()
    }
}
