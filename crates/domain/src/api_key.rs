//! Opaque API keys for external integrators.
//!
//! The raw secret is returned exactly once at generation; only the public
//! prefix and a one-way digest are ever persisted. A prefix alone is never
//! sufficient to authenticate.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use lykos_core::{AppError, TenantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an API key record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApiKeyId(Uuid);

impl ApiKeyId {
    /// Creates a new random API key identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an API key identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ApiKeyId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ApiKeyId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Key environment, distinguishable at a glance from the raw secret prefix.
///
/// The prefix keeps test keys out of production integrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyEnvironment {
    /// Sandbox keys (`lyk_test_` prefix).
    Test,
    /// Production keys (`lyk_live_` prefix).
    Live,
}

impl ApiKeyEnvironment {
    /// Returns the raw-secret prefix for this environment.
    #[must_use]
    pub fn secret_prefix(&self) -> &'static str {
        match self {
            Self::Test => "lyk_test_",
            Self::Live => "lyk_live_",
        }
    }

    /// Returns a stable storage value for this environment.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Live => "live",
        }
    }

    /// Identifies the environment a raw secret belongs to from its prefix.
    #[must_use]
    pub fn from_secret(raw_secret: &str) -> Option<Self> {
        if raw_secret.starts_with(Self::Test.secret_prefix()) {
            Some(Self::Test)
        } else if raw_secret.starts_with(Self::Live.secret_prefix()) {
            Some(Self::Live)
        } else {
            None
        }
    }
}

impl FromStr for ApiKeyEnvironment {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "test" => Ok(Self::Test),
            "live" => Ok(Self::Live),
            _ => Err(AppError::Validation(format!(
                "unknown api key environment '{value}'"
            ))),
        }
    }
}

/// API key lifecycle state. `Revoked` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyStatus {
    /// Key authenticates requests.
    Active,
    /// Key is administratively paused and may be re-activated.
    Inactive,
    /// Key is permanently unusable.
    Revoked,
    /// Key passed its expiry timestamp.
    Expired,
}

impl ApiKeyStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }
}

impl FromStr for ApiKeyStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "revoked" => Ok(Self::Revoked),
            "expired" => Ok(Self::Expired),
            _ => Err(AppError::Validation(format!(
                "unknown api key status '{value}'"
            ))),
        }
    }
}

/// Persisted API key record.
///
/// Authentication requires both the prefix lookup and a digest match; scopes
/// live in a string namespace deliberately decoupled from internal
/// [`crate::Permission`] values so internal refactors never leak into the
/// external contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    /// Stable key identifier.
    pub id: ApiKeyId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Human-readable label chosen by the integrator.
    pub name: String,
    /// Public prefix of the raw secret, stored plaintext for lookup.
    pub key_prefix: String,
    /// One-way digest of the full raw secret.
    pub key_hash: String,
    /// Environment the key was generated for.
    pub environment: ApiKeyEnvironment,
    /// Capability scopes granted to the key.
    pub scopes: BTreeSet<String>,
    /// Lifecycle state.
    pub status: ApiKeyStatus,
    /// Declared hourly request budget; enforcement is a collaborator concern.
    pub rate_limit_per_hour: i32,
    /// Declared daily request budget; enforcement is a collaborator concern.
    pub rate_limit_per_day: i32,
    /// Optional expiry timestamp.
    pub expires_at: Option<DateTime<Utc>>,
    /// Last successful validation timestamp.
    pub last_used_at: Option<DateTime<Utc>>,
    /// Total successful validations.
    pub total_requests: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    /// Returns whether the key may authenticate requests right now.
    #[must_use]
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status == ApiKeyStatus::Active
            && self.expires_at.is_none_or(|expiry| now < expiry)
    }

    /// Returns whether the key holds the scope.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    /// Returns whether the key holds at least one of the required scopes.
    #[must_use]
    pub fn has_any_scope(&self, required: &[&str]) -> bool {
        required.iter().any(|scope| self.scopes.contains(*scope))
    }

    /// Returns whether the key holds every required scope.
    #[must_use]
    pub fn has_all_scopes(&self, required: &[&str]) -> bool {
        required.iter().all(|scope| self.scopes.contains(*scope))
    }
}
