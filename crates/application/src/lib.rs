//! Application services and ports for the Lykos trust and access layer.

#![forbid(unsafe_code)]

mod access_guard;
mod api_key_authority;
mod audit_trail;
mod credentials;
mod employee_auth_service;
mod security_admin_service;
mod security_analytics;
mod token_authority;

pub use access_guard::AccessGuard;
pub use api_key_authority::{ApiKeyAuthority, ApiKeyRepository, GeneratedApiKey, NewApiKey};
pub use audit_trail::{AuditLogQuery, AuditLogRepository, AuditTrail, AuditTrailConfig};
pub use credentials::PasswordHasher;
pub use employee_auth_service::{
    AuthOutcome, EmployeeAuthService, EmployeeRepository, SessionTokens,
};
pub use security_admin_service::{GroupRepository, SecurityAdminService};
pub use security_analytics::{
    ActionFailureRate, ActionFrequency, ActorActivity, AnomalyFinding, AnomalySubject,
    ComplianceReport, SecurityAnalytics,
};
pub use token_authority::{
    CLOCK_SKEW_LEEWAY_SECONDS, SignedToken, TokenAuthority, TokenBlacklist,
};
