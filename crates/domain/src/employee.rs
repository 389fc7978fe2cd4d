//! Employee identity, employment status, and password policy.
//!
//! Password strength rules follow the OWASP Authentication and Password
//! Storage cheat sheets.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use lykos_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::security::{Group, Permission, effective_permissions};
use std::collections::BTreeSet;

/// Unique identifier for an employee record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmployeeId(Uuid);

impl EmployeeId {
    /// Creates a new random employee identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an employee identifier from an existing UUID value.
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

impl Default for EmployeeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EmployeeId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Validated email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Creates a validated email address.
    ///
    /// Performs basic structural validation: non-empty, contains exactly one
    /// `@`, local part and domain are non-empty, domain contains at least one
    /// `.`.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim().to_lowercase();

        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "email address must not be empty".to_owned(),
            ));
        }

        let parts: Vec<&str> = trimmed.splitn(2, '@').collect();
        if parts.len() != 2 {
            return Err(AppError::Validation(
                "email address must contain exactly one '@'".to_owned(),
            ));
        }

        let local = parts[0];
        let domain = parts[1];

        if local.is_empty() {
            return Err(AppError::Validation(
                "email local part must not be empty".to_owned(),
            ));
        }

        if domain.is_empty() || !domain.contains('.') {
            return Err(AppError::Validation(
                "email domain must contain at least one '.'".to_owned(),
            ));
        }

        if trimmed.len() > 254 {
            return Err(AppError::Validation(
                "email address must not exceed 254 characters".to_owned(),
            ));
        }

        Ok(Self(trimmed))
    }

    /// Returns the validated email string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

/// Employment lifecycle state.
///
/// Employees are never hard-deleted; terminal states preserve audit
/// referential integrity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentStatus {
    /// Employee may authenticate and act.
    Active,
    /// Temporarily barred from authenticating.
    Suspended,
    /// Dormant account (e.g. seasonal staff off-season).
    Inactive,
    /// Terminal state after offboarding.
    Terminated,
}

impl EmploymentStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Inactive => "inactive",
            Self::Terminated => "terminated",
        }
    }
}

impl FromStr for EmploymentStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            "inactive" => Ok(Self::Inactive),
            "terminated" => Ok(Self::Terminated),
            _ => Err(AppError::Validation(format!(
                "unknown employment status '{value}'"
            ))),
        }
    }
}

/// Employee aggregate with group memberships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    /// Stable employee identifier.
    pub id: EmployeeId,
    /// Unique email address within a tenant.
    pub email: EmailAddress,
    /// Display name shown in audit records.
    pub display_name: String,
    /// Argon2id digest of the password.
    pub password_hash: String,
    /// Employment lifecycle state.
    pub status: EmploymentStatus,
    /// Consecutive failed login attempts since the last success.
    pub failed_login_count: i32,
    /// Account lockout expiry; the lockout auto-clears once passed.
    pub locked_until: Option<DateTime<Utc>>,
    /// Group memberships granting permissions.
    pub groups: Vec<Group>,
}

impl Employee {
    /// Returns whether the employee may authenticate at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.status == EmploymentStatus::Active
    }

    /// Returns whether the account lockout is currently in effect.
    #[must_use]
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }

    /// Returns the union of permissions over all group memberships.
    #[must_use]
    pub fn effective_permissions(&self) -> BTreeSet<Permission> {
        effective_permissions(&self.groups)
    }

    /// Returns whether the employee holds the permission through any group.
    #[must_use]
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.groups
            .iter()
            .any(|group| group.permissions.contains(&permission))
    }
}

/// Minimum password length (NIST SP800-63B, no MFA factor in scope).
pub const PASSWORD_MIN_LENGTH: usize = 10;

/// Maximum password length to allow passphrases while bounding Argon2id cost.
pub const PASSWORD_MAX_LENGTH: usize = 128;

/// Validates a plaintext password against OWASP and NIST rules.
pub fn validate_password(password: &str) -> AppResult<()> {
    let char_count = password.chars().count();

    if char_count < PASSWORD_MIN_LENGTH {
        return Err(AppError::Validation(format!(
            "password must be at least {PASSWORD_MIN_LENGTH} characters"
        )));
    }

    if char_count > PASSWORD_MAX_LENGTH {
        return Err(AppError::Validation(format!(
            "password must not exceed {PASSWORD_MAX_LENGTH} characters"
        )));
    }

    if is_common_password(password) {
        return Err(AppError::Validation(
            "this password is too common and has appeared in data breaches".to_owned(),
        ));
    }

    Ok(())
}

/// Checks whether a password appears in the embedded common passwords list.
fn is_common_password(password: &str) -> bool {
    let lowered = password.to_lowercase();
    COMMON_PASSWORDS.iter().any(|entry| *entry == lowered)
}

/// Top breached passwords (subset for fast embedded check).
static COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "password123",
    "passw0rd",
    "1234567890",
    "qwerty123",
    "qwertyuiop",
    "iloveyou",
    "trustno1",
    "sunshine",
    "basketball",
    "football",
    "baseball",
    "superman",
    "welcome1",
    "letmein123",
    "starwars",
    "whatever",
    "1q2w3e4r5t",
    "adminadmin",
];

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::security::GroupId;

    fn employee_with_status(status: EmploymentStatus) -> Employee {
        Employee {
            id: EmployeeId::new(),
            email: EmailAddress::new("staff@club.example")
                .unwrap_or_else(|_| panic!("fixture email must be valid")),
            display_name: "Staff".to_owned(),
            password_hash: "$argon2id$fixture".to_owned(),
            status,
            failed_login_count: 0,
            locked_until: None,
            groups: Vec::new(),
        }
    }

    #[test]
    fn valid_email_is_normalized_to_lowercase() {
        let email = EmailAddress::new("FRONT.Desk@Example.COM");
        assert!(email.is_ok());
        assert_eq!(
            email.unwrap_or_else(|_| panic!("test")).as_str(),
            "front.desk@example.com"
        );
    }

    #[test]
    fn email_without_at_is_rejected() {
        assert!(EmailAddress::new("noatsign").is_err());
    }

    #[test]
    fn email_without_domain_dot_is_rejected() {
        assert!(EmailAddress::new("desk@nodot").is_err());
    }

    #[test]
    fn is_enabled_only_for_active_status() {
        assert!(employee_with_status(EmploymentStatus::Active).is_enabled());
        assert!(!employee_with_status(EmploymentStatus::Suspended).is_enabled());
        assert!(!employee_with_status(EmploymentStatus::Inactive).is_enabled());
        assert!(!employee_with_status(EmploymentStatus::Terminated).is_enabled());
    }

    #[test]
    fn lockout_auto_clears_after_window() {
        let mut employee = employee_with_status(EmploymentStatus::Active);
        let now = Utc::now();

        employee.locked_until = Some(now + Duration::minutes(5));
        assert!(employee.is_locked(now));

        employee.locked_until = Some(now - Duration::seconds(1));
        assert!(!employee.is_locked(now));
    }

    #[test]
    fn employment_status_roundtrip_storage_value() {
        for status in [
            EmploymentStatus::Active,
            EmploymentStatus::Suspended,
            EmploymentStatus::Inactive,
            EmploymentStatus::Terminated,
        ] {
            assert_eq!(EmploymentStatus::from_str(status.as_str()).ok(), Some(status));
        }
    }

    #[test]
    fn permission_lookup_crosses_all_groups() {
        let mut employee = employee_with_status(EmploymentStatus::Active);
        employee.groups.push(Group {
            id: GroupId::new(),
            name: "finance".to_owned(),
            permissions: [Permission::PaymentRefund].iter().copied().collect(),
            is_system: false,
        });

        assert!(employee.has_permission(Permission::PaymentRefund));
        assert!(!employee.has_permission(Permission::TrainerManage));
    }

    #[test]
    fn short_password_is_rejected() {
        assert!(validate_password("short").is_err());
    }

    #[test]
    fn adequate_passphrase_is_accepted() {
        assert!(validate_password("a-reasonable-passphrase").is_ok());
    }

    #[test]
    fn common_password_is_rejected() {
        assert!(validate_password("password123").is_err());
    }

    #[test]
    fn very_long_password_is_rejected() {
        let long = "a".repeat(PASSWORD_MAX_LENGTH + 1);
        assert!(validate_password(&long).is_err());
    }
}
