use lykos_core::{AppResult, TenantId};
use lykos_domain::{AuditAction, AuditResult, RequestMetadata, RiskLevel, TokenType};

use super::*;

impl EmployeeAuthService {
    /// Authenticates an employee with email and password.
    ///
    /// Returns `AuthOutcome::Failed` for any failure — unknown email, wrong
    /// password, locked account, suspended or terminated employment — so a
    /// caller cannot enumerate accounts. Every attempt is audited.
    pub async fn login(
        &self,
        tenant_id: TenantId,
        email: &str,
        password: &str,
        metadata: RequestMetadata,
    ) -> AppResult<AuthOutcome> {
        let employee = self
            .employee_repository
            .find_by_email(tenant_id, email)
            .await?;

        let Some(employee) = employee else {
            // OWASP: hash anyway so unknown emails cost the same time.
            let _ = self.password_hasher.hash_password(password);
            self.audit(
                tenant_id,
                None,
                AuditAction::LoginFailed,
                "login attempt for unknown email",
                AuditResult::Failure,
                RiskLevel::Medium,
                Some(&metadata),
            )
            .await;
            return Ok(AuthOutcome::Failed);
        };

        let now = chrono::Utc::now();
        if employee.is_locked(now) {
            let _ = self.password_hasher.hash_password(password);
            self.audit(
                tenant_id,
                Some(employee.id.as_uuid()),
                AuditAction::LoginFailed,
                "login attempt against locked account",
                AuditResult::Failure,
                RiskLevel::High,
                Some(&metadata),
            )
            .await;
            return Ok(AuthOutcome::Failed);
        }

        if !employee.is_enabled() {
            let _ = self.password_hasher.hash_password(password);
            self.audit(
                tenant_id,
                Some(employee.id.as_uuid()),
                AuditAction::LoginFailed,
                "login attempt by non-active employee",
                AuditResult::Failure,
                RiskLevel::High,
                Some(&metadata),
            )
            .await;
            return Ok(AuthOutcome::Failed);
        }

        let password_valid = self
            .password_hasher
            .verify_password(password, &employee.password_hash)?;

        if !password_valid {
            let locked_until = self
                .employee_repository
                .record_failed_login(tenant_id, employee.id)
                .await?;

            self.audit(
                tenant_id,
                Some(employee.id.as_uuid()),
                AuditAction::LoginFailed,
                "invalid password",
                AuditResult::Failure,
                RiskLevel::Medium,
                Some(&metadata),
            )
            .await;

            if let Some(locked_until) = locked_until {
                self.audit(
                    tenant_id,
                    Some(employee.id.as_uuid()),
                    AuditAction::AccountLockedOut,
                    &format!("account locked until {locked_until}"),
                    AuditResult::Failure,
                    RiskLevel::High,
                    Some(&metadata),
                )
                .await;
            }

            return Ok(AuthOutcome::Failed);
        }

        self.employee_repository
            .reset_failed_logins(tenant_id, employee.id)
            .await?;

        let tokens = self.issue_session(&employee, tenant_id)?;

        self.audit(
            tenant_id,
            Some(employee.id.as_uuid()),
            AuditAction::LoginSucceeded,
            "login succeeded",
            AuditResult::Success,
            RiskLevel::Low,
            Some(&metadata),
        )
        .await;

        Ok(AuthOutcome::Authenticated { employee, tokens })
    }

    /// Rotates a session from a refresh token.
    ///
    /// Re-reads the employee so the new access token carries a fresh
    /// permission snapshot, then revokes the presented refresh token so each
    /// one works exactly once.
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<SessionTokens> {
        let claims = self
            .token_authority
            .validate(refresh_token, TokenType::Refresh)
            .await?;

        let tenant_id = claims.tenant_id()?;
        let employee_id = claims.employee_id()?;

        let employee = self
            .employee_repository
            .find_by_id(tenant_id, employee_id)
            .await?
            .filter(|employee| employee.is_enabled() && !employee.is_locked(chrono::Utc::now()))
            .ok_or_else(generic_auth_failure)?;

        let tokens = self.issue_session(&employee, tenant_id)?;
        self.token_authority.revoke(refresh_token).await?;

        Ok(tokens)
    }

    /// Ends a session by revoking both tokens.
    ///
    /// Revocation is idempotent, so replaying a logout is harmless.
    pub async fn logout(&self, access_token: &str, refresh_token: &str) -> AppResult<()> {
        self.token_authority.revoke(access_token).await?;
        self.token_authority.revoke(refresh_token).await?;

        if let Some(claims) = self.token_authority.decode_claims_lossy(access_token)
            && let (Ok(tenant_id), Ok(employee_id)) = (claims.tenant_id(), claims.employee_id())
        {
            self.audit(
                tenant_id,
                Some(employee_id.as_uuid()),
                AuditAction::TokenRevoked,
                "session tokens revoked on logout",
                AuditResult::Success,
                RiskLevel::Low,
                None,
            )
            .await;
        }

        Ok(())
    }
}
