//! In-memory token blacklist.
//!
//! Suitable for tests and single-instance deployments only: revocations are
//! lost on restart and invisible to other processes.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lykos_application::TokenBlacklist;
use lykos_core::AppResult;
use tokio::sync::RwLock;

/// In-memory blacklist keyed by token digest, with lazy expiry.
#[derive(Debug, Default)]
pub struct InMemoryTokenBlacklist {
    digests: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl InMemoryTokenBlacklist {
    /// Creates an empty blacklist.
    #[must_use]
    pub fn new() -> Self {
        Self {
            digests: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl TokenBlacklist for InMemoryTokenBlacklist {
    async fn insert(&self, digest: &str, ttl: chrono::Duration) -> AppResult<()> {
        let expires_at = Utc::now() + ttl;
        let mut digests = self.digests.write().await;
        // Keep the later expiry when the digest is re-inserted.
        digests
            .entry(digest.to_owned())
            .and_modify(|stored| {
                if *stored < expires_at {
                    *stored = expires_at;
                }
            })
            .or_insert(expires_at);
        Ok(())
    }

    async fn contains(&self, digest: &str) -> AppResult<bool> {
        let now = Utc::now();
        {
            let digests = self.digests.read().await;
            match digests.get(digest) {
                Some(expires_at) if *expires_at > now => return Ok(true),
                None => return Ok(false),
                Some(_) => {}
            }
        }

        // Expired entry: drop it so the map does not grow unboundedly.
        self.digests.write().await.remove(digest);
        Ok(false)
    }
}
