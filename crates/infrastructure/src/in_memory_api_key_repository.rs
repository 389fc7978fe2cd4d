//! In-memory API key repository for tests and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lykos_application::ApiKeyRepository;
use lykos_core::{AppError, AppResult, TenantId};
use lykos_domain::{ApiKey, ApiKeyId, ApiKeyStatus};
use tokio::sync::RwLock;

/// In-memory implementation of the API key repository port.
#[derive(Debug, Default)]
pub struct InMemoryApiKeyRepository {
    keys: RwLock<HashMap<ApiKeyId, ApiKey>>,
}

impl InMemoryApiKeyRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ApiKeyRepository for InMemoryApiKeyRepository {
    async fn insert(&self, key: &ApiKey) -> AppResult<()> {
        let mut keys = self.keys.write().await;
        if keys.values().any(|stored| stored.key_hash == key.key_hash) {
            return Err(AppError::Conflict(
                "an api key with this digest already exists".to_owned(),
            ));
        }
        keys.insert(key.id, key.clone());
        Ok(())
    }

    async fn find_by_hash(
        &self,
        tenant_id: TenantId,
        key_hash: &str,
    ) -> AppResult<Option<ApiKey>> {
        Ok(self
            .keys
            .read()
            .await
            .values()
            .find(|key| key.tenant_id == tenant_id && key.key_hash == key_hash)
            .cloned())
    }

    async fn find_by_id(&self, tenant_id: TenantId, id: ApiKeyId) -> AppResult<Option<ApiKey>> {
        Ok(self
            .keys
            .read()
            .await
            .get(&id)
            .filter(|key| key.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_for_tenant(&self, tenant_id: TenantId) -> AppResult<Vec<ApiKey>> {
        let mut keys: Vec<ApiKey> = self
            .keys
            .read()
            .await
            .values()
            .filter(|key| key.tenant_id == tenant_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }

    async fn mark_revoked(&self, tenant_id: TenantId, id: ApiKeyId) -> AppResult<()> {
        if let Some(key) = self
            .keys
            .write()
            .await
            .get_mut(&id)
            .filter(|key| key.tenant_id == tenant_id)
        {
            key.status = ApiKeyStatus::Revoked;
        }
        Ok(())
    }

    async fn record_usage(
        &self,
        tenant_id: TenantId,
        id: ApiKeyId,
        used_at: DateTime<Utc>,
    ) -> AppResult<()> {
        if let Some(key) = self
            .keys
            .write()
            .await
            .get_mut(&id)
            .filter(|key| key.tenant_id == tenant_id)
        {
            key.total_requests += 1;
            key.last_used_at = Some(key.last_used_at.map_or(used_at, |stored| stored.max(used_at)));
        }
        Ok(())
    }
}
