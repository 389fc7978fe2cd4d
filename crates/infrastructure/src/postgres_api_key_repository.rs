//! PostgreSQL-backed API key repository.

use std::collections::BTreeSet;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use lykos_application::ApiKeyRepository;
use lykos_core::{AppError, AppResult, TenantId};
use lykos_domain::{ApiKey, ApiKeyEnvironment, ApiKeyId, ApiKeyStatus};

/// PostgreSQL implementation of the API key repository port.
#[derive(Clone)]
pub struct PostgresApiKeyRepository {
    pool: PgPool,
}

impl PostgresApiKeyRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = r#"
    id, tenant_id, name, key_prefix, key_hash, environment, scopes, status,
    rate_limit_per_hour, rate_limit_per_day, expires_at, last_used_at,
    total_requests, created_at
"#;

#[derive(Debug, FromRow)]
struct ApiKeyRow {
    id: uuid::Uuid,
    tenant_id: uuid::Uuid,
    name: String,
    key_prefix: String,
    key_hash: String,
    environment: String,
    scopes: Vec<String>,
    status: String,
    rate_limit_per_hour: i32,
    rate_limit_per_day: i32,
    expires_at: Option<DateTime<Utc>>,
    last_used_at: Option<DateTime<Utc>>,
    total_requests: i64,
    created_at: DateTime<Utc>,
}

impl ApiKeyRow {
    fn into_api_key(self) -> AppResult<ApiKey> {
        Ok(ApiKey {
            id: ApiKeyId::from_uuid(self.id),
            tenant_id: TenantId::from_uuid(self.tenant_id),
            name: self.name,
            key_prefix: self.key_prefix,
            key_hash: self.key_hash,
            environment: ApiKeyEnvironment::from_str(self.environment.as_str())?,
            scopes: self.scopes.into_iter().collect::<BTreeSet<String>>(),
            status: ApiKeyStatus::from_str(self.status.as_str())?,
            rate_limit_per_hour: self.rate_limit_per_hour,
            rate_limit_per_day: self.rate_limit_per_day,
            expires_at: self.expires_at,
            last_used_at: self.last_used_at,
            total_requests: self.total_requests,
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl ApiKeyRepository for PostgresApiKeyRepository {
    async fn insert(&self, key: &ApiKey) -> AppResult<()> {
        let scopes: Vec<String> = key.scopes.iter().cloned().collect();

        sqlx::query(
            r#"
            INSERT INTO api_keys (
                id, tenant_id, name, key_prefix, key_hash, environment, scopes,
                status, rate_limit_per_hour, rate_limit_per_day, expires_at,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(key.id.as_uuid())
        .bind(key.tenant_id.as_uuid())
        .bind(key.name.as_str())
        .bind(key.key_prefix.as_str())
        .bind(key.key_hash.as_str())
        .bind(key.environment.as_str())
        .bind(&scopes)
        .bind(key.status.as_str())
        .bind(key.rate_limit_per_hour)
        .bind(key.rate_limit_per_day)
        .bind(key.expires_at)
        .bind(key.created_at)
        .execute(&self.pool)
        .await
        .map_err(|error| match error {
            sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
                AppError::Conflict("an api key with this digest already exists".to_owned())
            }
            other => AppError::Internal(format!("failed to insert api key: {other}")),
        })?;

        Ok(())
    }

    async fn find_by_hash(
        &self,
        tenant_id: TenantId,
        key_hash: &str,
    ) -> AppResult<Option<ApiKey>> {
        let row = sqlx::query_as::<_, ApiKeyRow>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM api_keys
            WHERE tenant_id = $1 AND key_hash = $2
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find api key: {error}")))?;

        row.map(ApiKeyRow::into_api_key).transpose()
    }

    async fn find_by_id(&self, tenant_id: TenantId, id: ApiKeyId) -> AppResult<Option<ApiKey>> {
        let row = sqlx::query_as::<_, ApiKeyRow>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM api_keys
            WHERE tenant_id = $1 AND id = $2
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find api key: {error}")))?;

        row.map(ApiKeyRow::into_api_key).transpose()
    }

    async fn list_for_tenant(&self, tenant_id: TenantId) -> AppResult<Vec<ApiKey>> {
        let rows = sqlx::query_as::<_, ApiKeyRow>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM api_keys
            WHERE tenant_id = $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list api keys: {error}")))?;

        rows.into_iter().map(ApiKeyRow::into_api_key).collect()
    }

    async fn mark_revoked(&self, tenant_id: TenantId, id: ApiKeyId) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE api_keys
            SET status = 'revoked'
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to revoke api key: {error}")))?;

        Ok(())
    }

    async fn record_usage(
        &self,
        tenant_id: TenantId,
        id: ApiKeyId,
        used_at: DateTime<Utc>,
    ) -> AppResult<()> {
        // Single atomic increment so concurrent validations never lose an
        // update.
        sqlx::query(
            r#"
            UPDATE api_keys
            SET total_requests = total_requests + 1,
                last_used_at = GREATEST(COALESCE(last_used_at, $3), $3)
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .bind(used_at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to record api key usage: {error}")))?;

        Ok(())
    }
}
