use std::collections::BTreeSet;
use std::str::FromStr;

use lykos_core::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Capability tokens enforced by application policy checks.
///
/// The set is closed: there is no permission hierarchy, and effective
/// permissions are the union over an employee's group memberships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Allows creating facility bookings.
    BookingCreate,
    /// Allows cancelling facility bookings.
    BookingCancel,
    /// Allows reading member profiles.
    MemberView,
    /// Allows mutating member profiles.
    MemberManage,
    /// Allows managing trainer schedules and profiles.
    TrainerManage,
    /// Allows charging member payments.
    PaymentCharge,
    /// Allows issuing payment refunds.
    PaymentRefund,
    /// Allows approving payment refunds (conjunctive with PaymentRefund).
    PaymentRefundApprove,
    /// Allows reading audit log entries and compliance reports.
    SecurityAuditRead,
    /// Allows managing groups and group memberships.
    SecurityGroupManage,
    /// Allows issuing and revoking external API keys.
    SecurityApiKeyManage,
}

impl Permission {
    /// Returns a stable storage value for this permission.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BookingCreate => "booking.create",
            Self::BookingCancel => "booking.cancel",
            Self::MemberView => "member.view",
            Self::MemberManage => "member.manage",
            Self::TrainerManage => "trainer.manage",
            Self::PaymentCharge => "payment.charge",
            Self::PaymentRefund => "payment.refund",
            Self::PaymentRefundApprove => "payment.refund.approve",
            Self::SecurityAuditRead => "security.audit.read",
            Self::SecurityGroupManage => "security.group.manage",
            Self::SecurityApiKeyManage => "security.api_key.manage",
        }
    }

    /// Returns all known permissions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Permission] = &[
            Permission::BookingCreate,
            Permission::BookingCancel,
            Permission::MemberView,
            Permission::MemberManage,
            Permission::TrainerManage,
            Permission::PaymentCharge,
            Permission::PaymentRefund,
            Permission::PaymentRefundApprove,
            Permission::SecurityAuditRead,
            Permission::SecurityGroupManage,
            Permission::SecurityApiKeyManage,
        ];

        ALL
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "booking.create" => Ok(Self::BookingCreate),
            "booking.cancel" => Ok(Self::BookingCancel),
            "member.view" => Ok(Self::MemberView),
            "member.manage" => Ok(Self::MemberManage),
            "trainer.manage" => Ok(Self::TrainerManage),
            "payment.charge" => Ok(Self::PaymentCharge),
            "payment.refund" => Ok(Self::PaymentRefund),
            "payment.refund.approve" => Ok(Self::PaymentRefundApprove),
            "security.audit.read" => Ok(Self::SecurityAuditRead),
            "security.group.manage" => Ok(Self::SecurityGroupManage),
            "security.api_key.manage" => Ok(Self::SecurityApiKeyManage),
            _ => Err(AppError::Validation(format!(
                "unknown permission value '{value}'"
            ))),
        }
    }
}

/// Unique identifier for a group record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(Uuid);

impl GroupId {
    /// Creates a new random group identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a group identifier from an existing UUID value.
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

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A named set of permissions assignable to employees.
///
/// System groups are seeded at bootstrap and refuse deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Stable group identifier.
    pub id: GroupId,
    /// Unique group name within a tenant.
    pub name: String,
    /// Permissions granted by membership.
    pub permissions: BTreeSet<Permission>,
    /// Whether this group was seeded at bootstrap and is immutable.
    pub is_system: bool,
}

/// Computes the effective permission set as the union over group permissions.
///
/// A pure function with no failure modes: an empty group slice yields an
/// empty permission set.
#[must_use]
pub fn effective_permissions(groups: &[Group]) -> BTreeSet<Permission> {
    groups
        .iter()
        .flat_map(|group| group.permissions.iter().copied())
        .collect()
}
