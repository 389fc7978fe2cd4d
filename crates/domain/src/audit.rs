//! Immutable audit records.
//!
//! An entry answers who, what, when, where, why, outcome, and impact. The
//! builder refuses construction unless the required facets are populated;
//! once built, no mutation or deletion API exists anywhere in the system.

use chrono::{DateTime, Utc};
use lykos_core::{AppError, AppResult, TenantId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Stable audit actions emitted by the trust layer and business services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Employee authenticated successfully.
    LoginSucceeded,
    /// Employee presented bad credentials.
    LoginFailed,
    /// Account entered the lockout window after repeated failures.
    AccountLockedOut,
    /// A token was explicitly revoked before natural expiry.
    TokenRevoked,
    /// A password-reset flow was initiated.
    PasswordResetRequested,
    /// A password was changed (reset or voluntary change).
    PasswordChanged,
    /// An external API key was generated.
    ApiKeyCreated,
    /// An external API key was revoked.
    ApiKeyRevoked,
    /// A permission group was created.
    GroupCreated,
    /// A permission group was deleted.
    GroupDeleted,
    /// A group was assigned to an employee.
    GroupAssigned,
    /// A group was removed from an employee.
    GroupUnassigned,
    /// A guard rejected an operation for insufficient permission or scope.
    AuthorizationDenied,
    /// A facility booking was created.
    BookingCreated,
    /// A facility booking was cancelled.
    BookingCancelled,
    /// A member profile was mutated.
    MemberUpdated,
    /// A member payment was charged.
    PaymentCharged,
    /// A payment was refunded.
    PaymentRefunded,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoginSucceeded => "auth.login.succeeded",
            Self::LoginFailed => "auth.login.failed",
            Self::AccountLockedOut => "auth.account.locked_out",
            Self::TokenRevoked => "auth.token.revoked",
            Self::PasswordResetRequested => "auth.password.reset_requested",
            Self::PasswordChanged => "auth.password.changed",
            Self::ApiKeyCreated => "security.api_key.created",
            Self::ApiKeyRevoked => "security.api_key.revoked",
            Self::GroupCreated => "security.group.created",
            Self::GroupDeleted => "security.group.deleted",
            Self::GroupAssigned => "security.group.assigned",
            Self::GroupUnassigned => "security.group.unassigned",
            Self::AuthorizationDenied => "security.authorization.denied",
            Self::BookingCreated => "booking.created",
            Self::BookingCancelled => "booking.cancelled",
            Self::MemberUpdated => "member.updated",
            Self::PaymentCharged => "payment.charged",
            Self::PaymentRefunded => "payment.refunded",
        }
    }
}

impl FromStr for AuditAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "auth.login.succeeded" => Ok(Self::LoginSucceeded),
            "auth.login.failed" => Ok(Self::LoginFailed),
            "auth.account.locked_out" => Ok(Self::AccountLockedOut),
            "auth.token.revoked" => Ok(Self::TokenRevoked),
            "auth.password.reset_requested" => Ok(Self::PasswordResetRequested),
            "auth.password.changed" => Ok(Self::PasswordChanged),
            "security.api_key.created" => Ok(Self::ApiKeyCreated),
            "security.api_key.revoked" => Ok(Self::ApiKeyRevoked),
            "security.group.created" => Ok(Self::GroupCreated),
            "security.group.deleted" => Ok(Self::GroupDeleted),
            "security.group.assigned" => Ok(Self::GroupAssigned),
            "security.group.unassigned" => Ok(Self::GroupUnassigned),
            "security.authorization.denied" => Ok(Self::AuthorizationDenied),
            "booking.created" => Ok(Self::BookingCreated),
            "booking.cancelled" => Ok(Self::BookingCancelled),
            "member.updated" => Ok(Self::MemberUpdated),
            "payment.charged" => Ok(Self::PaymentCharged),
            "payment.refunded" => Ok(Self::PaymentRefunded),
            _ => Err(AppError::Validation(format!(
                "unknown audit action '{value}'"
            ))),
        }
    }
}

/// Coarse severity tag driving analytics and anomaly thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Routine activity.
    Low,
    /// Activity warranting attention in aggregate.
    Medium,
    /// Sensitive activity (refunds, revocations, denials).
    High,
    /// Activity requiring immediate review.
    Critical,
}

impl RiskLevel {
    /// Returns a stable storage value for this risk level.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl FromStr for RiskLevel {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(AppError::Validation(format!(
                "unknown risk level '{value}'"
            ))),
        }
    }
}

/// Outcome of the audited operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    /// Operation completed.
    Success,
    /// Operation failed.
    Failure,
    /// Operation completed partially.
    Partial,
    /// Operation was rejected by an authorization guard.
    Unauthorized,
}

impl AuditResult {
    /// Returns a stable storage value for this result.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Partial => "partial",
            Self::Unauthorized => "unauthorized",
        }
    }
}

impl FromStr for AuditResult {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            "partial" => Ok(Self::Partial),
            "unauthorized" => Ok(Self::Unauthorized),
            _ => Err(AppError::Validation(format!(
                "unknown audit result '{value}'"
            ))),
        }
    }
}

/// Request metadata captured alongside an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    /// Client IP address.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Session or request correlation identifier.
    pub session_id: Option<String>,
}

/// Append-only audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Stable entry identifier.
    pub id: Uuid,
    /// Affected tenant.
    pub tenant_id: TenantId,
    /// Actor identifier.
    pub actor_id: Uuid,
    /// Actor email, when the actor is an employee.
    pub actor_email: Option<String>,
    /// Actor display label.
    pub actor_name: String,
    /// What happened.
    pub action: AuditAction,
    /// Kind of entity acted upon.
    pub entity_type: String,
    /// Identifier of the entity acted upon, when one exists.
    pub entity_id: Option<String>,
    /// Human-readable description.
    pub description: String,
    /// Opaque snapshot of the entity before the change.
    pub before_snapshot: Option<String>,
    /// Opaque snapshot of the entity after the change.
    pub after_snapshot: Option<String>,
    /// Request metadata.
    pub metadata: RequestMetadata,
    /// Severity tag.
    pub risk_level: RiskLevel,
    /// Operation outcome.
    pub result: AuditResult,
    /// Error message when the outcome was not a success.
    pub error_message: Option<String>,
    /// Operation duration in milliseconds.
    pub duration_ms: Option<i64>,
    /// Immutable event timestamp.
    pub occurred_at: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Starts building an entry.
    #[must_use]
    pub fn builder() -> AuditLogEntryBuilder {
        AuditLogEntryBuilder::default()
    }
}

/// Builder enforcing required facets at construction.
///
/// `build` fails unless actor id, action, entity type, and description are
/// all supplied. Risk level defaults to Low and result to Success; call sites
/// that know better override them explicitly.
#[derive(Debug, Default)]
pub struct AuditLogEntryBuilder {
    tenant_id: Option<TenantId>,
    actor_id: Option<Uuid>,
    actor_email: Option<String>,
    actor_name: Option<String>,
    action: Option<AuditAction>,
    entity_type: Option<String>,
    entity_id: Option<String>,
    description: Option<String>,
    before_snapshot: Option<String>,
    after_snapshot: Option<String>,
    metadata: RequestMetadata,
    risk_level: Option<RiskLevel>,
    result: Option<AuditResult>,
    error_message: Option<String>,
    duration_ms: Option<i64>,
}

impl AuditLogEntryBuilder {
    /// Sets the affected tenant (required).
    #[must_use]
    pub fn tenant_id(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    /// Sets the actor identifier (required).
    #[must_use]
    pub fn actor_id(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    /// Sets the actor email.
    #[must_use]
    pub fn actor_email(mut self, actor_email: impl Into<String>) -> Self {
        self.actor_email = Some(actor_email.into());
        self
    }

    /// Sets the actor display label.
    #[must_use]
    pub fn actor_name(mut self, actor_name: impl Into<String>) -> Self {
        self.actor_name = Some(actor_name.into());
        self
    }

    /// Sets the action (required).
    #[must_use]
    pub fn action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Sets the entity type (required).
    #[must_use]
    pub fn entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    /// Sets the entity identifier.
    #[must_use]
    pub fn entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Sets the human-readable description (required).
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the before-change snapshot.
    #[must_use]
    pub fn before_snapshot(mut self, snapshot: impl Into<String>) -> Self {
        self.before_snapshot = Some(snapshot.into());
        self
    }

    /// Sets the after-change snapshot.
    #[must_use]
    pub fn after_snapshot(mut self, snapshot: impl Into<String>) -> Self {
        self.after_snapshot = Some(snapshot.into());
        self
    }

    /// Sets the request metadata.
    #[must_use]
    pub fn metadata(mut self, metadata: RequestMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Overrides the default Low risk level.
    #[must_use]
    pub fn risk_level(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = Some(risk_level);
        self
    }

    /// Overrides the default Success result.
    #[must_use]
    pub fn result(mut self, result: AuditResult) -> Self {
        self.result = Some(result);
        self
    }

    /// Sets the error message.
    #[must_use]
    pub fn error_message(mut self, error_message: impl Into<String>) -> Self {
        self.error_message = Some(error_message.into());
        self
    }

    /// Sets the operation duration in milliseconds.
    #[must_use]
    pub fn duration_ms(mut self, duration_ms: i64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Builds the immutable entry, validating required facets.
    pub fn build(self) -> AppResult<AuditLogEntry> {
        let tenant_id = self
            .tenant_id
            .ok_or_else(|| AppError::Validation("audit entry requires a tenant".to_owned()))?;
        let actor_id = self
            .actor_id
            .ok_or_else(|| AppError::Validation("audit entry requires an actor id".to_owned()))?;
        let action = self
            .action
            .ok_or_else(|| AppError::Validation("audit entry requires an action".to_owned()))?;
        let entity_type = self
            .entity_type
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                AppError::Validation("audit entry requires an entity type".to_owned())
            })?;
        let description = self
            .description
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                AppError::Validation("audit entry requires a description".to_owned())
            })?;

        Ok(AuditLogEntry {
            id: Uuid::new_v4(),
            tenant_id,
            actor_id,
            actor_email: self.actor_email,
            actor_name: self.actor_name.unwrap_or_else(|| actor_id.to_string()),
            action,
            entity_type,
            entity_id: self.entity_id,
            description,
            before_snapshot: self.before_snapshot,
            after_snapshot: self.after_snapshot,
            metadata: self.metadata,
            risk_level: self.risk_level.unwrap_or(RiskLevel::Low),
            result: self.result.unwrap_or(AuditResult::Success),
            error_message: self.error_message,
            duration_ms: self.duration_ms,
            occurred_at: Utc::now(),
        })
    }
}
