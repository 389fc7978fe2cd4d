use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::TenantId;

/// The authenticated actor resolved for one request.
///
/// Exactly one principal is attached to an [`AuthContext`] at a time: an
/// employee authenticated through a signed token, or an external integrator
/// authenticated through an opaque API key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Principal {
    /// Internal employee resolved from a validated access token.
    Employee {
        /// Stable employee identifier.
        id: Uuid,
        /// Employee email address.
        email: String,
        /// Display name for audit records.
        display_name: String,
    },
    /// External integrator resolved from a validated API key.
    ApiKey {
        /// Stable API key identifier.
        id: Uuid,
        /// Public key prefix (never sufficient to authenticate).
        key_prefix: String,
    },
}

impl Principal {
    /// Returns a stable actor identifier for audit records.
    #[must_use]
    pub fn actor_id(&self) -> Uuid {
        match self {
            Self::Employee { id, .. } | Self::ApiKey { id, .. } => *id,
        }
    }

    /// Returns a human-readable actor label for audit records.
    #[must_use]
    pub fn actor_label(&self) -> &str {
        match self {
            Self::Employee { display_name, .. } => display_name.as_str(),
            Self::ApiKey { key_prefix, .. } => key_prefix.as_str(),
        }
    }

    /// Returns the actor email, if the principal is an employee.
    #[must_use]
    pub fn actor_email(&self) -> Option<&str> {
        match self {
            Self::Employee { email, .. } => Some(email.as_str()),
            Self::ApiKey { .. } => None,
        }
    }
}

/// Tenant-scoped context for exactly one logical operation.
///
/// The context is constructed once at the boundary and passed explicitly by
/// value through every call. It is never stored in thread-local or task-local
/// state, so it cannot leak across concurrently handled requests that share a
/// worker thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    tenant_id: TenantId,
    principal: Principal,
}

impl AuthContext {
    /// Creates a context binding one principal to one tenant.
    #[must_use]
    pub fn new(tenant_id: TenantId, principal: Principal) -> Self {
        Self {
            tenant_id,
            principal,
        }
    }

    /// Returns the tenant every query in this operation is scoped to.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the principal attached to this operation.
    #[must_use]
    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{AuthContext, Principal};
    use crate::TenantId;

    #[test]
    fn employee_principal_exposes_email() {
        let principal = Principal::Employee {
            id: Uuid::new_v4(),
            email: "pat@example.com".to_owned(),
            display_name: "Pat".to_owned(),
        };
        assert_eq!(principal.actor_email(), Some("pat@example.com"));
        assert_eq!(principal.actor_label(), "Pat");
    }

    #[test]
    fn api_key_principal_has_no_email() {
        let principal = Principal::ApiKey {
            id: Uuid::new_v4(),
            key_prefix: "lyk_test_a1b2c3d4".to_owned(),
        };
        assert_eq!(principal.actor_email(), None);
    }

    #[test]
    fn context_carries_tenant_and_principal() {
        let tenant_id = TenantId::new();
        let id = Uuid::new_v4();
        let context = AuthContext::new(
            tenant_id,
            Principal::ApiKey {
                id,
                key_prefix: "lyk_live_ffffffff".to_owned(),
            },
        );
        assert_eq!(context.tenant_id(), tenant_id);
        assert_eq!(context.principal().actor_id(), id);
    }
}
