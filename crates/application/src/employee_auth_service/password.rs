use lykos_core::{AppError, AppResult, TenantId};
use lykos_domain::{
    AuditAction, AuditResult, EmployeeId, RequestMetadata, RiskLevel, TokenType,
    validate_password,
};

use super::*;
use crate::token_authority::SignedToken;

impl EmployeeAuthService {
    /// Starts a password reset.
    ///
    /// Returns a PasswordReset token for known, active employees and `None`
    /// otherwise. Callers deliver the token out of band and must respond
    /// identically in both cases so the endpoint does not leak which emails
    /// exist.
    pub async fn request_password_reset(
        &self,
        tenant_id: TenantId,
        email: &str,
        metadata: RequestMetadata,
    ) -> AppResult<Option<SignedToken>> {
        let employee = self
            .employee_repository
            .find_by_email(tenant_id, email)
            .await?;

        let Some(employee) = employee.filter(Employee::is_enabled) else {
            tracing::debug!("password reset requested for unknown or disabled email");
            return Ok(None);
        };

        let token = self
            .token_authority
            .issue(&employee, tenant_id, TokenType::PasswordReset)?;

        self.audit(
            tenant_id,
            Some(employee.id.as_uuid()),
            AuditAction::PasswordResetRequested,
            "password reset token issued",
            AuditResult::Success,
            RiskLevel::Medium,
            Some(&metadata),
        )
        .await;

        Ok(Some(token))
    }

    /// Completes a password reset with a PasswordReset token.
    ///
    /// The token is single-use: it is revoked as soon as the new hash is
    /// stored. Existing sessions are left alone; only the reset token dies.
    pub async fn reset_password(
        &self,
        reset_token: &str,
        new_password: &str,
        metadata: RequestMetadata,
    ) -> AppResult<()> {
        let claims = self
            .token_authority
            .validate(reset_token, TokenType::PasswordReset)
            .await?;

        let tenant_id = claims.tenant_id()?;
        let employee_id = claims.employee_id()?;

        let employee = self
            .employee_repository
            .find_by_id(tenant_id, employee_id)
            .await?
            .filter(Employee::is_enabled)
            .ok_or_else(generic_auth_failure)?;

        validate_password(new_password)?;
        let new_hash = self.password_hasher.hash_password(new_password)?;
        self.employee_repository
            .update_password(tenant_id, employee.id, &new_hash)
            .await?;
        self.token_authority.revoke(reset_token).await?;

        self.audit(
            tenant_id,
            Some(employee.id.as_uuid()),
            AuditAction::PasswordChanged,
            "password reset completed",
            AuditResult::Success,
            RiskLevel::Medium,
            Some(&metadata),
        )
        .await;

        Ok(())
    }

    /// Changes an authenticated employee's password.
    ///
    /// Requires the current password, per the OWASP change-password feature.
    pub async fn change_password(
        &self,
        tenant_id: TenantId,
        employee_id: EmployeeId,
        current_password: &str,
        new_password: &str,
        metadata: RequestMetadata,
    ) -> AppResult<()> {
        let employee = self
            .employee_repository
            .find_by_id(tenant_id, employee_id)
            .await?
            .ok_or_else(|| AppError::NotFound("employee not found".to_owned()))?;

        let current_valid = self
            .password_hasher
            .verify_password(current_password, &employee.password_hash)?;

        if !current_valid {
            return Err(AppError::Unauthenticated(
                "current password is incorrect".to_owned(),
            ));
        }

        validate_password(new_password)?;
        let new_hash = self.password_hasher.hash_password(new_password)?;
        self.employee_repository
            .update_password(tenant_id, employee_id, &new_hash)
            .await?;

        self.audit(
            tenant_id,
            Some(employee_id.as_uuid()),
            AuditAction::PasswordChanged,
            "password changed with current-password verification",
            AuditResult::Success,
            RiskLevel::Medium,
            Some(&metadata),
        )
        .await;

        Ok(())
    }
}
