//! Creation, validation, and revocation of machine-to-machine API keys.
//!
//! Secrets are shown once at creation and never stored: the store keeps a
//! SHA-256 digest plus a short display prefix for dashboards. Validation is
//! deliberately oracle-free, answering only "usable key or not".

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lykos_core::{AppError, AppResult, TenantId};
use lykos_domain::{ApiKey, ApiKeyEnvironment, ApiKeyId, ApiKeyStatus};

/// Number of random bytes backing a key secret. 32 bytes of entropy,
/// hex-encoded to 64 characters after the environment prefix.
const SECRET_RANDOM_BYTES: usize = 32;

/// Characters of the random portion retained for display alongside the
/// environment prefix.
const DISPLAY_RANDOM_CHARS: usize = 8;

/// Port for API key persistence.
#[async_trait]
pub trait ApiKeyRepository: Send + Sync {
    /// Persists a new key record.
    async fn insert(&self, key: &ApiKey) -> AppResult<()>;

    /// Looks up a key by secret digest, scoped to a tenant.
    async fn find_by_hash(&self, tenant_id: TenantId, key_hash: &str)
    -> AppResult<Option<ApiKey>>;

    /// Looks up a key by identifier, scoped to a tenant.
    async fn find_by_id(&self, tenant_id: TenantId, id: ApiKeyId) -> AppResult<Option<ApiKey>>;

    /// Lists a tenant's keys, newest first.
    async fn list_for_tenant(&self, tenant_id: TenantId) -> AppResult<Vec<ApiKey>>;

    /// Marks a key revoked. Succeeds even when already revoked.
    async fn mark_revoked(&self, tenant_id: TenantId, id: ApiKeyId) -> AppResult<()>;

    /// Atomically bumps the usage counter and stamps last use.
    ///
    /// Implementations must let concurrent bumps all land; lost updates are
    /// a defect.
    async fn record_usage(
        &self,
        tenant_id: TenantId,
        id: ApiKeyId,
        used_at: DateTime<Utc>,
    ) -> AppResult<()>;
}

/// Request to mint a new API key.
#[derive(Debug, Clone)]
pub struct NewApiKey {
    /// Human-readable label, unique per tenant by convention.
    pub name: String,
    /// Test or live environment.
    pub environment: ApiKeyEnvironment,
    /// Scope strings granted to the key.
    pub scopes: BTreeSet<String>,
    /// Hourly request budget.
    pub rate_limit_per_hour: i32,
    /// Daily request budget.
    pub rate_limit_per_day: i32,
    /// Optional hard expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

/// A freshly minted key: the stored record plus the one-time secret.
#[derive(Debug, Clone)]
pub struct GeneratedApiKey {
    /// The persisted record (digest, never the secret).
    pub key: ApiKey,
    /// The full secret. Shown to the caller exactly once.
    pub secret: String,
}

/// Issues and validates tenant-scoped API keys.
#[derive(Clone)]
pub struct ApiKeyAuthority {
    repository: Arc<dyn ApiKeyRepository>,
}

impl ApiKeyAuthority {
    /// Creates an authority over the given key store.
    #[must_use]
    pub fn new(repository: Arc<dyn ApiKeyRepository>) -> Self {
        Self { repository }
    }

    /// Mints a key and returns its secret once.
    ///
    /// The secret never touches the store; only its digest and display
    /// prefix do.
    pub async fn create(&self, tenant_id: TenantId, request: NewApiKey) -> AppResult<GeneratedApiKey> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("api key name must not be blank".into()));
        }
        if request.rate_limit_per_hour <= 0 || request.rate_limit_per_day <= 0 {
            return Err(AppError::Validation(
                "api key rate limits must be positive".into(),
            ));
        }

        let secret = generate_secret(request.environment)?;
        let key_prefix: String = secret
            .chars()
            .take(request.environment.secret_prefix().len() + DISPLAY_RANDOM_CHARS)
            .collect();

        let key = ApiKey {
            id: ApiKeyId::new(),
            tenant_id,
            name: name.to_owned(),
            key_prefix,
            key_hash: secret_digest(secret.as_str()),
            environment: request.environment,
            scopes: request.scopes,
            status: ApiKeyStatus::Active,
            rate_limit_per_hour: request.rate_limit_per_hour,
            rate_limit_per_day: request.rate_limit_per_day,
            expires_at: request.expires_at,
            last_used_at: None,
            total_requests: 0,
            created_at: Utc::now(),
        };

        self.repository.insert(&key).await?;

        Ok(GeneratedApiKey { key, secret })
    }

    /// Validates a presented secret for a tenant.
    ///
    /// Returns the key record on success, `None` otherwise. Unknown,
    /// revoked, inactive, and expired keys are indistinguishable to the
    /// caller; the reason lands in debug logs only. A successful validation
    /// records one usage before returning.
    pub async fn validate(&self, tenant_id: TenantId, secret: &str) -> AppResult<Option<ApiKey>> {
        if ApiKeyEnvironment::from_secret(secret).is_none() {
            tracing::debug!("rejected api key with unknown prefix");
            return Ok(None);
        }

        let digest = secret_digest(secret);
        let Some(mut key) = self.repository.find_by_hash(tenant_id, digest.as_str()).await? else {
            tracing::debug!("rejected unknown api key");
            return Ok(None);
        };

        let now = Utc::now();
        if !key.is_usable(now) {
            tracing::debug!(
                key_prefix = %key.key_prefix,
                status = ?key.status,
                "rejected unusable api key"
            );
            return Ok(None);
        }

        self.repository.record_usage(tenant_id, key.id, now).await?;
        key.total_requests += 1;
        key.last_used_at = Some(now);

        Ok(Some(key))
    }

    /// Lists a tenant's keys for dashboard display.
    pub async fn list(&self, tenant_id: TenantId) -> AppResult<Vec<ApiKey>> {
        self.repository.list_for_tenant(tenant_id).await
    }

    /// Revokes a key. Effective for the very next validation; idempotent.
    pub async fn revoke(&self, tenant_id: TenantId, id: ApiKeyId) -> AppResult<()> {
        if self.repository.find_by_id(tenant_id, id).await?.is_none() {
            return Err(AppError::NotFound(format!("api key {id} not found")));
        }
        self.repository.mark_revoked(tenant_id, id).await
    }
}

/// Generates `<env-prefix><64 hex chars>` from OS randomness.
fn generate_secret(environment: ApiKeyEnvironment) -> AppResult<String> {
    let mut random = [0u8; SECRET_RANDOM_BYTES];
    getrandom::fill(&mut random)
        .map_err(|error| AppError::Internal(format!("failed to gather entropy: {error}")))?;

    Ok(format!(
        "{}{}",
        environment.secret_prefix(),
        hex::encode(random)
    ))
}

/// SHA-256 hex digest of the full secret, the only stored form.
fn secret_digest(secret: &str) -> String {
    use sha2::{Digest, Sha256};

    hex::encode(Sha256::digest(secret.as_bytes()))
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use lykos_core::{AppResult, TenantId};
    use lykos_domain::{ApiKey, ApiKeyEnvironment, ApiKeyId, ApiKeyStatus};
    use tokio::sync::Mutex;

    use super::{ApiKeyAuthority, ApiKeyRepository, NewApiKey};

    #[derive(Default)]
    struct FakeApiKeyRepository {
        keys: Mutex<HashMap<ApiKeyId, ApiKey>>,
    }

    #[async_trait]
    impl ApiKeyRepository for FakeApiKeyRepository {
        async fn insert(&self, key: &ApiKey) -> AppResult<()> {
            self.keys.lock().await.insert(key.id, key.clone());
            Ok(())
        }

        async fn find_by_hash(
            &self,
            tenant_id: TenantId,
            key_hash: &str,
        ) -> AppResult<Option<ApiKey>> {
            Ok(self
                .keys
                .lock()
                .await
                .values()
                .find(|key| key.tenant_id == tenant_id && key.key_hash == key_hash)
                .cloned())
        }

        async fn find_by_id(&self, tenant_id: TenantId, id: ApiKeyId) -> AppResult<Option<ApiKey>> {
            Ok(self
                .keys
                .lock()
                .await
                .get(&id)
                .filter(|key| key.tenant_id == tenant_id)
                .cloned())
        }

        async fn list_for_tenant(&self, tenant_id: TenantId) -> AppResult<Vec<ApiKey>> {
            let mut keys: Vec<ApiKey> = self
                .keys
                .lock()
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
                .lock()
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
                .lock()
                .await
                .get_mut(&id)
                .filter(|key| key.tenant_id == tenant_id)
            {
                key.total_requests += 1;
                key.last_used_at = Some(used_at);
            }
            Ok(())
        }
    }

    fn new_key_request(environment: ApiKeyEnvironment) -> NewApiKey {
        NewApiKey {
            name: "booking-sync".to_owned(),
            environment,
            scopes: BTreeSet::from(["bookings:read".to_owned()]),
            rate_limit_per_hour: 1_000,
            rate_limit_per_day: 10_000,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn created_key_validates_and_secret_is_not_stored() {
        let authority = ApiKeyAuthority::new(Arc::new(FakeApiKeyRepository::default()));
        let tenant_id = TenantId::new();

        let generated = authority
            .create(tenant_id, new_key_request(ApiKeyEnvironment::Test))
            .await
            .unwrap_or_else(|_| panic!("create must succeed"));

        assert!(generated.secret.starts_with("lyk_test_"));
        assert_eq!(generated.secret.len(), "lyk_test_".len() + 64);
        assert_ne!(generated.key.key_hash, generated.secret);
        assert!(generated.secret.starts_with(generated.key.key_prefix.as_str()));

        let validated = authority
            .validate(tenant_id, generated.secret.as_str())
            .await
            .unwrap_or_else(|_| panic!("validate must not error"));
        assert!(validated.is_some());
    }

    #[tokio::test]
    async fn test_and_live_prefixes_are_distinct() {
        let authority = ApiKeyAuthority::new(Arc::new(FakeApiKeyRepository::default()));
        let tenant_id = TenantId::new();

        let test_key = authority
            .create(tenant_id, new_key_request(ApiKeyEnvironment::Test))
            .await
            .unwrap_or_else(|_| panic!("create must succeed"));
        let live_key = authority
            .create(tenant_id, new_key_request(ApiKeyEnvironment::Live))
            .await
            .unwrap_or_else(|_| panic!("create must succeed"));

        assert!(test_key.secret.starts_with("lyk_test_"));
        assert!(live_key.secret.starts_with("lyk_live_"));
        assert_eq!(test_key.key.environment, ApiKeyEnvironment::Test);
        assert_eq!(live_key.key.environment, ApiKeyEnvironment::Live);
    }

    #[tokio::test]
    async fn validation_failures_are_uniform() {
        let authority = ApiKeyAuthority::new(Arc::new(FakeApiKeyRepository::default()));
        let tenant_id = TenantId::new();

        let generated = authority
            .create(tenant_id, new_key_request(ApiKeyEnvironment::Live))
            .await
            .unwrap_or_else(|_| panic!("create must succeed"));

        // Unknown secret, wrong prefix, and wrong tenant all yield Ok(None).
        let unknown = authority
            .validate(tenant_id, "lyk_live_deadbeef")
            .await
            .unwrap_or_else(|_| panic!("validate must not error"));
        assert!(unknown.is_none());

        let bad_prefix = authority
            .validate(tenant_id, "sk_live_deadbeef")
            .await
            .unwrap_or_else(|_| panic!("validate must not error"));
        assert!(bad_prefix.is_none());

        let other_tenant = authority
            .validate(TenantId::new(), generated.secret.as_str())
            .await
            .unwrap_or_else(|_| panic!("validate must not error"));
        assert!(other_tenant.is_none());
    }

    #[tokio::test]
    async fn revoked_key_stops_validating() {
        let authority = ApiKeyAuthority::new(Arc::new(FakeApiKeyRepository::default()));
        let tenant_id = TenantId::new();

        let generated = authority
            .create(tenant_id, new_key_request(ApiKeyEnvironment::Live))
            .await
            .unwrap_or_else(|_| panic!("create must succeed"));

        assert!(authority.revoke(tenant_id, generated.key.id).await.is_ok());
        // Second revoke is a no-op, not an error.
        assert!(authority.revoke(tenant_id, generated.key.id).await.is_ok());

        let validated = authority
            .validate(tenant_id, generated.secret.as_str())
            .await
            .unwrap_or_else(|_| panic!("validate must not error"));
        assert!(validated.is_none());
    }

    #[tokio::test]
    async fn expired_key_stops_validating() {
        let repository = Arc::new(FakeApiKeyRepository::default());
        let authority = ApiKeyAuthority::new(Arc::clone(&repository) as Arc<dyn ApiKeyRepository>);
        let tenant_id = TenantId::new();

        let mut request = new_key_request(ApiKeyEnvironment::Test);
        request.expires_at = Some(Utc::now() - Duration::hours(1));
        let generated = authority
            .create(tenant_id, request)
            .await
            .unwrap_or_else(|_| panic!("create must succeed"));

        let validated = authority
            .validate(tenant_id, generated.secret.as_str())
            .await
            .unwrap_or_else(|_| panic!("validate must not error"));
        assert!(validated.is_none());
    }

    #[tokio::test]
    async fn concurrent_validations_all_record_usage() {
        let repository = Arc::new(FakeApiKeyRepository::default());
        let authority = ApiKeyAuthority::new(Arc::clone(&repository) as Arc<dyn ApiKeyRepository>);
        let tenant_id = TenantId::new();

        let generated = authority
            .create(tenant_id, new_key_request(ApiKeyEnvironment::Live))
            .await
            .unwrap_or_else(|_| panic!("create must succeed"));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let authority = authority.clone();
                let secret = generated.secret.clone();
                tokio::spawn(async move { authority.validate(tenant_id, secret.as_str()).await })
            })
            .collect();

        for handle in handles {
            let outcome = handle.await;
            assert!(matches!(outcome, Ok(Ok(Some(_)))));
        }

        let stored = repository
            .find_by_id(tenant_id, generated.key.id)
            .await
            .unwrap_or_else(|_| panic!("lookup must succeed"))
            .unwrap_or_else(|| panic!("key must exist"));
        assert_eq!(stored.total_requests, 10);
        assert!(stored.last_used_at.is_some());
    }

    #[tokio::test]
    async fn blank_name_and_nonpositive_limits_are_rejected() {
        let authority = ApiKeyAuthority::new(Arc::new(FakeApiKeyRepository::default()));
        let tenant_id = TenantId::new();

        let mut blank = new_key_request(ApiKeyEnvironment::Test);
        blank.name = "   ".to_owned();
        assert!(authority.create(tenant_id, blank).await.is_err());

        let mut zero_limit = new_key_request(ApiKeyEnvironment::Test);
        zero_limit.rate_limit_per_hour = 0;
        assert!(authority.create(tenant_id, zero_limit).await.is_err());
    }
}
