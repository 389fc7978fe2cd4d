use lykos_application::{
    AccessGuard, ApiKeyAuthority, AuditTrail, EmployeeAuthService, SecurityAdminService,
    SecurityAnalytics, TokenAuthority,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub employee_auth_service: EmployeeAuthService,
    pub security_admin_service: SecurityAdminService,
    pub api_key_authority: ApiKeyAuthority,
    pub access_guard: AccessGuard,
    pub security_analytics: SecurityAnalytics,
    pub token_authority: TokenAuthority,
    pub audit_trail: AuditTrail,
}
