//! Employee authentication: login, session token lifecycle, and password
//! management.
//!
//! Follows OWASP guidance for generic error messages and enumeration
//! resistance: a failed login looks the same whether the email is unknown,
//! the password is wrong, the account is locked, or the employee is no
//! longer active.

mod login;
mod password;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use lykos_core::{AppError, AppResult, TenantId};
use lykos_domain::{
    AuditAction, AuditLogEntry, AuditResult, Employee, EmployeeId, RequestMetadata, RiskLevel,
    TokenType,
};
use uuid::Uuid;

use crate::audit_trail::AuditTrail;
use crate::credentials::PasswordHasher;
use crate::token_authority::{SignedToken, TokenAuthority};

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Repository port for employee persistence.
#[async_trait]
pub trait EmployeeRepository: Send + Sync {
    /// Finds an employee by email within a tenant, groups included.
    async fn find_by_email(
        &self,
        tenant_id: TenantId,
        email: &str,
    ) -> AppResult<Option<Employee>>;

    /// Finds an employee by identifier within a tenant, groups included.
    async fn find_by_id(&self, tenant_id: TenantId, id: EmployeeId)
    -> AppResult<Option<Employee>>;

    /// Increments the failed login counter and applies the lockout policy.
    ///
    /// Returns the new lockout expiry when this attempt tripped a lockout,
    /// `None` otherwise.
    async fn record_failed_login(
        &self,
        tenant_id: TenantId,
        id: EmployeeId,
    ) -> AppResult<Option<DateTime<Utc>>>;

    /// Resets the failed login counter and clears any lock.
    async fn reset_failed_logins(&self, tenant_id: TenantId, id: EmployeeId) -> AppResult<()>;

    /// Replaces the stored password hash.
    async fn update_password(
        &self,
        tenant_id: TenantId,
        id: EmployeeId,
        password_hash: &str,
    ) -> AppResult<()>;
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// The access/refresh pair established by a successful login or refresh.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    /// Short-lived token carrying the permission snapshot.
    pub access: SignedToken,
    /// Long-lived token used only to mint new access tokens.
    pub refresh: SignedToken,
}

/// Result of a login attempt.
#[derive(Debug)]
pub enum AuthOutcome {
    /// Authentication succeeded; a session is established.
    Authenticated {
        /// The authenticated employee.
        employee: Employee,
        /// The freshly issued token pair.
        tokens: SessionTokens,
    },
    /// Authentication failed. One generic variant for every reason.
    Failed,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Application service for employee authentication.
#[derive(Clone)]
pub struct EmployeeAuthService {
    employee_repository: Arc<dyn EmployeeRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
    token_authority: TokenAuthority,
    audit_trail: AuditTrail,
}

impl EmployeeAuthService {
    /// Creates a new authentication service.
    #[must_use]
    pub fn new(
        employee_repository: Arc<dyn EmployeeRepository>,
        password_hasher: Arc<dyn PasswordHasher>,
        token_authority: TokenAuthority,
        audit_trail: AuditTrail,
    ) -> Self {
        Self {
            employee_repository,
            password_hasher,
            token_authority,
            audit_trail,
        }
    }

    /// Issues a fresh access/refresh pair for an employee.
    fn issue_session(&self, employee: &Employee, tenant_id: TenantId) -> AppResult<SessionTokens> {
        Ok(SessionTokens {
            access: self
                .token_authority
                .issue(employee, tenant_id, TokenType::Access)?,
            refresh: self
                .token_authority
                .issue(employee, tenant_id, TokenType::Refresh)?,
        })
    }

    /// Records an auth audit entry, attributing unknown actors to the nil
    /// identifier.
    async fn audit(
        &self,
        tenant_id: TenantId,
        actor_id: Option<Uuid>,
        action: AuditAction,
        description: &str,
        result: AuditResult,
        risk_level: RiskLevel,
        metadata: Option<&RequestMetadata>,
    ) {
        let mut builder = AuditLogEntry::builder()
            .tenant_id(tenant_id)
            .actor_id(actor_id.unwrap_or_else(Uuid::nil))
            .action(action)
            .entity_type("employee")
            .description(description)
            .result(result)
            .risk_level(risk_level);
        if let Some(metadata) = metadata {
            builder = builder.metadata(metadata.clone());
        }

        match builder.build() {
            Ok(entry) => self.audit_trail.record(entry).await,
            Err(error) => {
                tracing::error!(%error, action = action.as_str(), "failed to build audit entry");
            }
        }
    }
}

fn generic_auth_failure() -> AppError {
    AppError::Unauthenticated("invalid credentials".to_owned())
}
