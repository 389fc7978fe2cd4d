//! Domain entities and invariants for the Lykos trust and access layer.

#![forbid(unsafe_code)]

mod api_key;
mod audit;
mod employee;
mod security;
mod token;

pub use api_key::{ApiKey, ApiKeyEnvironment, ApiKeyId, ApiKeyStatus};
pub use audit::{
    AuditAction, AuditLogEntry, AuditLogEntryBuilder, AuditResult, RequestMetadata, RiskLevel,
};
pub use employee::{
    EmailAddress, Employee, EmployeeId, EmploymentStatus, PASSWORD_MAX_LENGTH, PASSWORD_MIN_LENGTH,
    validate_password,
};
pub use security::{Group, GroupId, Permission, effective_permissions};
pub use token::{
    ACCESS_TOKEN_TTL_MINUTES, PASSWORD_TOKEN_TTL_HOURS, REFRESH_TOKEN_TTL_DAYS, TokenClaims,
    TokenType,
};
