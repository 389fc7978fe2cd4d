//! Explicit authorization checks evaluated before business logic.
//!
//! Every handler that needs a permission or scope calls the guard directly;
//! there is no ambient interception layer. Denials are uniform `Forbidden`
//! errors and each one lands in the audit trail.

use lykos_core::{AppError, AppResult, AuthContext};
use lykos_domain::{
    ApiKey, AuditAction, AuditLogEntry, AuditResult, Permission, RiskLevel, TokenClaims,
};

use crate::audit_trail::AuditTrail;

/// Authorization checkpoint for employee tokens and API keys.
#[derive(Clone)]
pub struct AccessGuard {
    audit_trail: AuditTrail,
}

impl AccessGuard {
    /// Creates a guard that reports denials through the given trail.
    #[must_use]
    pub fn new(audit_trail: AuditTrail) -> Self {
        Self { audit_trail }
    }

    /// Requires one permission on an employee's token claims.
    pub async fn require_permission(
        &self,
        context: &AuthContext,
        claims: &TokenClaims,
        permission: Permission,
    ) -> AppResult<()> {
        if claims.has_permission(permission) {
            return Ok(());
        }
        self.deny(context, &format!("missing permission {permission}"))
            .await
    }

    /// Requires at least one of the given permissions.
    pub async fn require_any_permission(
        &self,
        context: &AuthContext,
        claims: &TokenClaims,
        permissions: &[Permission],
    ) -> AppResult<()> {
        if claims.has_any_permission(permissions) {
            return Ok(());
        }
        self.deny(context, &format!("missing all of {}", permission_list(permissions)))
            .await
    }

    /// Requires every one of the given permissions.
    pub async fn require_all_permissions(
        &self,
        context: &AuthContext,
        claims: &TokenClaims,
        permissions: &[Permission],
    ) -> AppResult<()> {
        if claims.has_all_permissions(permissions) {
            return Ok(());
        }
        self.deny(context, &format!("missing some of {}", permission_list(permissions)))
            .await
    }

    /// Requires one scope on an API key.
    pub async fn require_scope(
        &self,
        context: &AuthContext,
        key: &ApiKey,
        scope: &str,
    ) -> AppResult<()> {
        if key.has_scope(scope) {
            return Ok(());
        }
        self.deny(context, &format!("missing scope {scope}")).await
    }

    /// Requires at least one of the given scopes on an API key.
    pub async fn require_any_scope(
        &self,
        context: &AuthContext,
        key: &ApiKey,
        scopes: &[&str],
    ) -> AppResult<()> {
        if key.has_any_scope(scopes) {
            return Ok(());
        }
        self.deny(context, &format!("missing all of scopes {}", scopes.join(", ")))
            .await
    }

    /// Requires every one of the given scopes on an API key.
    pub async fn require_all_scopes(
        &self,
        context: &AuthContext,
        key: &ApiKey,
        scopes: &[&str],
    ) -> AppResult<()> {
        if key.has_all_scopes(scopes) {
            return Ok(());
        }
        self.deny(context, &format!("missing some of scopes {}", scopes.join(", ")))
            .await
    }

    async fn deny(&self, context: &AuthContext, detail: &str) -> AppResult<()> {
        let entry = AuditLogEntry::builder()
            .tenant_id(context.tenant_id())
            .actor_id(context.principal().actor_id())
            .actor_name(context.principal().actor_label())
            .action(AuditAction::AuthorizationDenied)
            .entity_type("authorization")
            .description(detail)
            .result(AuditResult::Unauthorized)
            .risk_level(RiskLevel::Medium)
            .build();

        match entry {
            Ok(entry) => self.audit_trail.record(entry).await,
            Err(error) => {
                tracing::error!(%error, "failed to build authorization denial audit entry");
            }
        }

        Err(AppError::Forbidden("insufficient permissions".to_owned()))
    }
}

fn permission_list(permissions: &[Permission]) -> String {
    permissions
        .iter()
        .map(Permission::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
