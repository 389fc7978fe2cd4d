//! Redis-backed token blacklist.
//!
//! Revocations survive process restarts and are visible to every instance
//! sharing the Redis deployment. Each entry carries a TTL matching the
//! revoked token's remaining life, so the set cleans itself.

use async_trait::async_trait;
use lykos_application::TokenBlacklist;
use lykos_core::{AppError, AppResult};
use redis::AsyncCommands;

/// Redis implementation of the token blacklist port.
#[derive(Clone)]
pub struct RedisTokenBlacklist {
    client: redis::Client,
    key_prefix: String,
}

impl RedisTokenBlacklist {
    /// Creates a blacklist with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, digest: &str) -> String {
        format!("{}:{digest}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))
    }
}

#[async_trait]
impl TokenBlacklist for RedisTokenBlacklist {
    async fn insert(&self, digest: &str, ttl: chrono::Duration) -> AppResult<()> {
        // A non-positive TTL still gets one second so the entry is observable
        // by concurrent validators racing the revocation.
        let ttl_seconds = u64::try_from(ttl.num_seconds().max(1)).unwrap_or(1);

        let mut connection = self.connection().await?;
        let _: () = connection
            .set_ex(self.key_for(digest), "1", ttl_seconds)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to insert blacklist entry: {error}"))
            })?;

        Ok(())
    }

    async fn contains(&self, digest: &str) -> AppResult<bool> {
        let mut connection = self.connection().await?;
        let exists: bool = connection.exists(self.key_for(digest)).await.map_err(|error| {
            AppError::Internal(format!("failed to check blacklist entry: {error}"))
        })?;

        Ok(exists)
    }
}
