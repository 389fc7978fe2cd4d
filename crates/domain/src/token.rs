//! Typed, signed, time-boxed token claims.
//!
//! Access tokens embed the full permission and group snapshot taken at
//! issuance, which avoids a storage round-trip on every authorized call.
//! The cost is staleness: a permission change does not affect already-issued
//! access tokens until they expire or are revoked. That TTL-bounded staleness
//! is the documented contract, not a bug to fix silently.

use std::str::FromStr;

use chrono::Duration;
use lykos_core::{AppError, AppResult, TenantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::employee::EmployeeId;
use crate::security::Permission;

/// Access token lifetime in minutes.
pub const ACCESS_TOKEN_TTL_MINUTES: i64 = 15;

/// Refresh token lifetime in days.
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

/// Password-reset and password-change token lifetime in hours.
pub const PASSWORD_TOKEN_TTL_HOURS: i64 = 1;

/// Token type discriminator embedded in the claim set.
///
/// A token's declared type must match the validation call's expected type;
/// cross-type use is a hard rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived bearer token carrying a permission snapshot.
    Access,
    /// Long-lived token exchangeable for a fresh session.
    Refresh,
    /// Single-purpose token for the forgot-password flow.
    PasswordReset,
    /// Single-purpose token for the forced password-change flow.
    PasswordChange,
}

impl TokenType {
    /// Returns the claim string for this token type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
            Self::PasswordReset => "password_reset",
            Self::PasswordChange => "password_change",
        }
    }

    /// Returns the default lifetime for tokens of this type.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        match self {
            Self::Access => Duration::minutes(ACCESS_TOKEN_TTL_MINUTES),
            Self::Refresh => Duration::days(REFRESH_TOKEN_TTL_DAYS),
            Self::PasswordReset | Self::PasswordChange => {
                Duration::hours(PASSWORD_TOKEN_TTL_HOURS)
            }
        }
    }
}

impl FromStr for TokenType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "access" => Ok(Self::Access),
            "refresh" => Ok(Self::Refresh),
            "password_reset" => Ok(Self::PasswordReset),
            "password_change" => Ok(Self::PasswordChange),
            _ => Err(AppError::Validation(format!(
                "unknown token type '{value}'"
            ))),
        }
    }
}

/// Signed claim set carried by every issued token.
///
/// `name`, `email`, `permissions`, and `groups` are present on access tokens
/// only; refresh and password tokens carry identity alone to minimize the
/// blast radius of a leak.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the employee identifier.
    pub sub: String,
    /// Tenant the token is scoped to.
    pub tenant: String,
    /// Token type discriminator.
    pub typ: String,
    /// Issued-at as a Unix timestamp.
    pub iat: i64,
    /// Expiry as a Unix timestamp.
    pub exp: i64,
    /// Unique token identifier used for revocation.
    pub jti: String,
    /// Display name (access tokens only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Email address (access tokens only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Permission snapshot taken at issuance (access tokens only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
    /// Group name snapshot taken at issuance (access tokens only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
}

impl TokenClaims {
    /// Parses the subject claim into an employee identifier.
    pub fn employee_id(&self) -> AppResult<EmployeeId> {
        Uuid::parse_str(self.sub.as_str())
            .map(EmployeeId::from_uuid)
            .map_err(|error| AppError::Validation(format!("invalid subject claim: {error}")))
    }

    /// Parses the tenant claim into a tenant identifier.
    pub fn tenant_id(&self) -> AppResult<TenantId> {
        Uuid::parse_str(self.tenant.as_str())
            .map(TenantId::from_uuid)
            .map_err(|error| AppError::Validation(format!("invalid tenant claim: {error}")))
    }

    /// Parses the type claim.
    pub fn token_type(&self) -> AppResult<TokenType> {
        TokenType::from_str(self.typ.as_str())
    }

    /// Returns whether the embedded snapshot grants the permission.
    ///
    /// Always false for non-access tokens, which carry no snapshot.
    #[must_use]
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions
            .as_ref()
            .is_some_and(|granted| granted.iter().any(|value| value == permission.as_str()))
    }

    /// Returns whether the snapshot grants at least one required permission.
    #[must_use]
    pub fn has_any_permission(&self, required: &[Permission]) -> bool {
        required
            .iter()
            .any(|permission| self.has_permission(*permission))
    }

    /// Returns whether the snapshot grants every required permission.
    #[must_use]
    pub fn has_all_permissions(&self, required: &[Permission]) -> bool {
        required
            .iter()
            .all(|permission| self.has_permission(*permission))
    }
}
