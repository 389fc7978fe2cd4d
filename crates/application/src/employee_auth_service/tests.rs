use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use lykos_core::{AppResult, TenantId};
use lykos_domain::{
    AuditAction, AuditLogEntry, EmailAddress, Employee, EmployeeId, EmploymentStatus, Group,
    GroupId, Permission, RequestMetadata, TokenType,
};
use tokio::sync::Mutex;

use super::{AuthOutcome, EmployeeAuthService, EmployeeRepository};
use crate::audit_trail::{AuditLogQuery, AuditLogRepository, AuditTrail, AuditTrailConfig};
use crate::credentials::PasswordHasher;
use crate::token_authority::{TokenAuthority, TokenBlacklist};

const LOCKOUT_THRESHOLD: i32 = 5;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeEmployeeRepository {
    employees: Mutex<HashMap<EmployeeId, (TenantId, Employee)>>,
}

impl FakeEmployeeRepository {
    async fn seed(&self, tenant_id: TenantId, employee: Employee) {
        self.employees
            .lock()
            .await
            .insert(employee.id, (tenant_id, employee));
    }
}

#[async_trait]
impl EmployeeRepository for FakeEmployeeRepository {
    async fn find_by_email(
        &self,
        tenant_id: TenantId,
        email: &str,
    ) -> AppResult<Option<Employee>> {
        Ok(self
            .employees
            .lock()
            .await
            .values()
            .find(|(tenant, employee)| {
                *tenant == tenant_id && employee.email.as_str() == email.to_lowercase()
            })
            .map(|(_, employee)| employee.clone()))
    }

    async fn find_by_id(
        &self,
        tenant_id: TenantId,
        id: EmployeeId,
    ) -> AppResult<Option<Employee>> {
        Ok(self
            .employees
            .lock()
            .await
            .get(&id)
            .filter(|(tenant, _)| *tenant == tenant_id)
            .map(|(_, employee)| employee.clone()))
    }

    async fn record_failed_login(
        &self,
        tenant_id: TenantId,
        id: EmployeeId,
    ) -> AppResult<Option<DateTime<Utc>>> {
        let mut employees = self.employees.lock().await;
        let Some((tenant, employee)) = employees.get_mut(&id) else {
            return Ok(None);
        };
        if *tenant != tenant_id {
            return Ok(None);
        }

        employee.failed_login_count += 1;
        if employee.failed_login_count >= LOCKOUT_THRESHOLD {
            let until = Utc::now() + Duration::minutes(15);
            employee.locked_until = Some(until);
            return Ok(Some(until));
        }
        Ok(None)
    }

    async fn reset_failed_logins(&self, tenant_id: TenantId, id: EmployeeId) -> AppResult<()> {
        if let Some((tenant, employee)) = self.employees.lock().await.get_mut(&id)
            && *tenant == tenant_id
        {
            employee.failed_login_count = 0;
            employee.locked_until = None;
        }
        Ok(())
    }

    async fn update_password(
        &self,
        tenant_id: TenantId,
        id: EmployeeId,
        password_hash: &str,
    ) -> AppResult<()> {
        if let Some((tenant, employee)) = self.employees.lock().await.get_mut(&id)
            && *tenant == tenant_id
        {
            employee.password_hash = password_hash.to_owned();
        }
        Ok(())
    }
}

/// Hashing fake: `hash(p)` is `"hashed:" + p`, verify compares directly.
struct FakePasswordHasher;

impl PasswordHasher for FakePasswordHasher {
    fn hash_password(&self, password: &str) -> AppResult<String> {
        Ok(format!("hashed:{password}"))
    }

    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        Ok(hash == format!("hashed:{password}"))
    }
}

#[derive(Default)]
struct TestBlacklist {
    digests: Mutex<HashSet<String>>,
}

#[async_trait]
impl TokenBlacklist for TestBlacklist {
    async fn insert(&self, digest: &str, _ttl: chrono::Duration) -> AppResult<()> {
        self.digests.lock().await.insert(digest.to_owned());
        Ok(())
    }

    async fn contains(&self, digest: &str) -> AppResult<bool> {
        Ok(self.digests.lock().await.contains(digest))
    }
}

#[derive(Default)]
struct RecordingAuditRepository {
    entries: Mutex<Vec<AuditLogEntry>>,
}

#[async_trait]
impl AuditLogRepository for RecordingAuditRepository {
    async fn append(&self, entry: &AuditLogEntry) -> AppResult<()> {
        self.entries.lock().await.push(entry.clone());
        Ok(())
    }

    async fn query(
        &self,
        tenant_id: TenantId,
        _query: &AuditLogQuery,
    ) -> AppResult<Vec<AuditLogEntry>> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .filter(|entry| entry.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn entries_in_range(
        &self,
        tenant_id: TenantId,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> AppResult<Vec<AuditLogEntry>> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .filter(|entry| {
                entry.tenant_id == tenant_id
                    && entry.occurred_at >= from
                    && entry.occurred_at < until
            })
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    service: EmployeeAuthService,
    repository: Arc<FakeEmployeeRepository>,
    audit: Arc<RecordingAuditRepository>,
    trail: AuditTrail,
    tenant_id: TenantId,
}

fn harness() -> Harness {
    let repository = Arc::new(FakeEmployeeRepository::default());
    let audit = Arc::new(RecordingAuditRepository::default());
    let trail = AuditTrail::spawn(
        Arc::clone(&audit) as Arc<dyn AuditLogRepository>,
        AuditTrailConfig::default(),
    );
    let token_authority = TokenAuthority::new(
        b"unit-test-signing-secret-at-least-32-bytes",
        Arc::new(TestBlacklist::default()),
    )
    .unwrap_or_else(|_| panic!("authority must build"));

    let service = EmployeeAuthService::new(
        Arc::clone(&repository) as Arc<dyn EmployeeRepository>,
        Arc::new(FakePasswordHasher),
        token_authority,
        trail.clone(),
    );

    Harness {
        service,
        repository,
        audit,
        trail,
        tenant_id: TenantId::new(),
    }
}

fn active_employee(email: &str, password: &str) -> Employee {
    Employee {
        id: EmployeeId::new(),
        email: EmailAddress::new(email).unwrap_or_else(|_| panic!("fixture email must be valid")),
        display_name: "Front Desk".to_owned(),
        password_hash: format!("hashed:{password}"),
        status: EmploymentStatus::Active,
        failed_login_count: 0,
        locked_until: None,
        groups: vec![Group {
            id: GroupId::new(),
            name: "front-desk".to_owned(),
            permissions: [Permission::BookingCreate, Permission::MemberView]
                .into_iter()
                .collect(),
            is_system: false,
        }],
    }
}

fn metadata() -> RequestMetadata {
    RequestMetadata {
        ip_address: Some("203.0.113.9".to_owned()),
        user_agent: Some("tests".to_owned()),
        session_id: None,
    }
}

async fn audited_actions(harness: &Harness) -> Vec<AuditAction> {
    harness
        .audit
        .entries
        .lock()
        .await
        .iter()
        .map(|entry| entry.action)
        .collect()
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

#[tokio::test]
async fn successful_login_issues_token_pair_and_audits() {
    let harness = harness();
    let employee = active_employee("desk@club.example", "correct horse zap");
    harness.repository.seed(harness.tenant_id, employee).await;

    let outcome = harness
        .service
        .login(
            harness.tenant_id,
            "desk@club.example",
            "correct horse zap",
            metadata(),
        )
        .await
        .unwrap_or_else(|_| panic!("login must not error"));

    let AuthOutcome::Authenticated { tokens, .. } = outcome else {
        panic!("expected authenticated outcome");
    };

    let access = harness
        .service
        .token_authority
        .validate(tokens.access.token.as_str(), TokenType::Access)
        .await;
    assert!(access.is_ok());

    assert!(harness.trail.shutdown().await);
    assert!(audited_actions(&harness).await.contains(&AuditAction::LoginSucceeded));
}

#[tokio::test]
async fn unknown_email_and_wrong_password_fail_identically() {
    let harness = harness();
    let employee = active_employee("desk@club.example", "correct horse zap");
    harness.repository.seed(harness.tenant_id, employee).await;

    let unknown = harness
        .service
        .login(harness.tenant_id, "ghost@club.example", "whatever pass", metadata())
        .await
        .unwrap_or_else(|_| panic!("login must not error"));
    assert!(matches!(unknown, AuthOutcome::Failed));

    let wrong = harness
        .service
        .login(harness.tenant_id, "desk@club.example", "wrong password!", metadata())
        .await
        .unwrap_or_else(|_| panic!("login must not error"));
    assert!(matches!(wrong, AuthOutcome::Failed));
}

#[tokio::test]
async fn repeated_failures_lock_the_account_and_audit_lockout() {
    let harness = harness();
    let employee = active_employee("desk@club.example", "correct horse zap");
    let employee_id = employee.id;
    harness.repository.seed(harness.tenant_id, employee).await;

    for _ in 0..LOCKOUT_THRESHOLD {
        let outcome = harness
            .service
            .login(harness.tenant_id, "desk@club.example", "wrong password!", metadata())
            .await
            .unwrap_or_else(|_| panic!("login must not error"));
        assert!(matches!(outcome, AuthOutcome::Failed));
    }

    // Correct password no longer helps while locked.
    let locked = harness
        .service
        .login(
            harness.tenant_id,
            "desk@club.example",
            "correct horse zap",
            metadata(),
        )
        .await
        .unwrap_or_else(|_| panic!("login must not error"));
    assert!(matches!(locked, AuthOutcome::Failed));

    let stored = harness
        .repository
        .find_by_id(harness.tenant_id, employee_id)
        .await
        .unwrap_or_else(|_| panic!("lookup must succeed"))
        .unwrap_or_else(|| panic!("employee must exist"));
    assert!(stored.locked_until.is_some());

    assert!(harness.trail.shutdown().await);
    assert!(audited_actions(&harness).await.contains(&AuditAction::AccountLockedOut));
}

#[tokio::test]
async fn suspended_employee_cannot_login() {
    let harness = harness();
    let mut employee = active_employee("desk@club.example", "correct horse zap");
    employee.status = EmploymentStatus::Suspended;
    harness.repository.seed(harness.tenant_id, employee).await;

    let outcome = harness
        .service
        .login(
            harness.tenant_id,
            "desk@club.example",
            "correct horse zap",
            metadata(),
        )
        .await
        .unwrap_or_else(|_| panic!("login must not error"));
    assert!(matches!(outcome, AuthOutcome::Failed));
}

#[tokio::test]
async fn success_resets_the_failure_counter() {
    let harness = harness();
    let employee = active_employee("desk@club.example", "correct horse zap");
    let employee_id = employee.id;
    harness.repository.seed(harness.tenant_id, employee).await;

    for _ in 0..(LOCKOUT_THRESHOLD - 1) {
        let _ = harness
            .service
            .login(harness.tenant_id, "desk@club.example", "wrong password!", metadata())
            .await;
    }

    let outcome = harness
        .service
        .login(
            harness.tenant_id,
            "desk@club.example",
            "correct horse zap",
            metadata(),
        )
        .await
        .unwrap_or_else(|_| panic!("login must not error"));
    assert!(matches!(outcome, AuthOutcome::Authenticated { .. }));

    let stored = harness
        .repository
        .find_by_id(harness.tenant_id, employee_id)
        .await
        .unwrap_or_else(|_| panic!("lookup must succeed"))
        .unwrap_or_else(|| panic!("employee must exist"));
    assert_eq!(stored.failed_login_count, 0);
}

// ---------------------------------------------------------------------------
// Refresh and logout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refresh_rotates_and_retires_the_old_token() {
    let harness = harness();
    let employee = active_employee("desk@club.example", "correct horse zap");
    harness.repository.seed(harness.tenant_id, employee).await;

    let outcome = harness
        .service
        .login(
            harness.tenant_id,
            "desk@club.example",
            "correct horse zap",
            metadata(),
        )
        .await
        .unwrap_or_else(|_| panic!("login must not error"));
    let AuthOutcome::Authenticated { tokens, .. } = outcome else {
        panic!("expected authenticated outcome");
    };

    let rotated = harness
        .service
        .refresh(tokens.refresh.token.as_str())
        .await
        .unwrap_or_else(|_| panic!("refresh must succeed"));
    assert_ne!(rotated.refresh.token, tokens.refresh.token);

    // The consumed refresh token is dead.
    assert!(
        harness
            .service
            .refresh(tokens.refresh.token.as_str())
            .await
            .is_err()
    );
    // The rotated one works.
    assert!(
        harness
            .service
            .refresh(rotated.refresh.token.as_str())
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn refreshed_access_token_carries_a_fresh_permission_snapshot() {
    let harness = harness();
    let employee = active_employee("desk@club.example", "correct horse zap");
    let employee_id = employee.id;
    harness.repository.seed(harness.tenant_id, employee).await;

    let outcome = harness
        .service
        .login(
            harness.tenant_id,
            "desk@club.example",
            "correct horse zap",
            metadata(),
        )
        .await
        .unwrap_or_else(|_| panic!("login must not error"));
    let AuthOutcome::Authenticated { tokens, .. } = outcome else {
        panic!("expected authenticated outcome");
    };

    // Grant a new group after login.
    {
        let mut employees = harness.repository.employees.lock().await;
        if let Some((_, stored)) = employees.get_mut(&employee_id) {
            stored.groups.push(Group {
                id: GroupId::new(),
                name: "finance".to_owned(),
                permissions: [Permission::PaymentRefund].into_iter().collect(),
                is_system: false,
            });
        }
    }

    let rotated = harness
        .service
        .refresh(tokens.refresh.token.as_str())
        .await
        .unwrap_or_else(|_| panic!("refresh must succeed"));

    let stale_claims = harness
        .service
        .token_authority
        .validate(tokens.access.token.as_str(), TokenType::Access)
        .await
        .unwrap_or_else(|_| panic!("validate must succeed"));
    let fresh_claims = harness
        .service
        .token_authority
        .validate(rotated.access.token.as_str(), TokenType::Access)
        .await
        .unwrap_or_else(|_| panic!("validate must succeed"));

    assert!(!stale_claims.has_permission(Permission::PaymentRefund));
    assert!(fresh_claims.has_permission(Permission::PaymentRefund));
}

#[tokio::test]
async fn logout_revokes_both_tokens() {
    let harness = harness();
    let employee = active_employee("desk@club.example", "correct horse zap");
    harness.repository.seed(harness.tenant_id, employee).await;

    let outcome = harness
        .service
        .login(
            harness.tenant_id,
            "desk@club.example",
            "correct horse zap",
            metadata(),
        )
        .await
        .unwrap_or_else(|_| panic!("login must not error"));
    let AuthOutcome::Authenticated { tokens, .. } = outcome else {
        panic!("expected authenticated outcome");
    };

    assert!(
        harness
            .service
            .logout(tokens.access.token.as_str(), tokens.refresh.token.as_str())
            .await
            .is_ok()
    );

    assert!(
        harness
            .service
            .token_authority
            .validate(tokens.access.token.as_str(), TokenType::Access)
            .await
            .is_err()
    );
    assert!(harness.service.refresh(tokens.refresh.token.as_str()).await.is_err());

    // Logout replay is harmless.
    assert!(
        harness
            .service
            .logout(tokens.access.token.as_str(), tokens.refresh.token.as_str())
            .await
            .is_ok()
    );
}

// ---------------------------------------------------------------------------
// Passwords
// ---------------------------------------------------------------------------

#[tokio::test]
async fn password_reset_round_trip() {
    let harness = harness();
    let employee = active_employee("desk@club.example", "correct horse zap");
    harness.repository.seed(harness.tenant_id, employee).await;

    let token = harness
        .service
        .request_password_reset(harness.tenant_id, "desk@club.example", metadata())
        .await
        .unwrap_or_else(|_| panic!("request must not error"))
        .unwrap_or_else(|| panic!("known email must yield a token"));

    assert!(
        harness
            .service
            .reset_password(token.token.as_str(), "brand new secret 42", metadata())
            .await
            .is_ok()
    );

    // New password works, old one does not.
    let with_new = harness
        .service
        .login(
            harness.tenant_id,
            "desk@club.example",
            "brand new secret 42",
            metadata(),
        )
        .await
        .unwrap_or_else(|_| panic!("login must not error"));
    assert!(matches!(with_new, AuthOutcome::Authenticated { .. }));

    let with_old = harness
        .service
        .login(
            harness.tenant_id,
            "desk@club.example",
            "correct horse zap",
            metadata(),
        )
        .await
        .unwrap_or_else(|_| panic!("login must not error"));
    assert!(matches!(with_old, AuthOutcome::Failed));

    // The reset token was single-use.
    assert!(
        harness
            .service
            .reset_password(token.token.as_str(), "another secret 4242", metadata())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn password_reset_is_silent_for_unknown_email() {
    let harness = harness();

    let token = harness
        .service
        .request_password_reset(harness.tenant_id, "ghost@club.example", metadata())
        .await
        .unwrap_or_else(|_| panic!("request must not error"));
    assert!(token.is_none());
}

#[tokio::test]
async fn access_token_cannot_reset_a_password() {
    let harness = harness();
    let employee = active_employee("desk@club.example", "correct horse zap");
    harness.repository.seed(harness.tenant_id, employee).await;

    let outcome = harness
        .service
        .login(
            harness.tenant_id,
            "desk@club.example",
            "correct horse zap",
            metadata(),
        )
        .await
        .unwrap_or_else(|_| panic!("login must not error"));
    let AuthOutcome::Authenticated { tokens, .. } = outcome else {
        panic!("expected authenticated outcome");
    };

    let result = harness
        .service
        .reset_password(tokens.access.token.as_str(), "brand new secret 42", metadata())
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn change_password_requires_the_current_one() {
    let harness = harness();
    let employee = active_employee("desk@club.example", "correct horse zap");
    let employee_id = employee.id;
    harness.repository.seed(harness.tenant_id, employee).await;

    assert!(
        harness
            .service
            .change_password(
                harness.tenant_id,
                employee_id,
                "not the current one",
                "brand new secret 42",
                metadata(),
            )
            .await
            .is_err()
    );

    assert!(
        harness
            .service
            .change_password(
                harness.tenant_id,
                employee_id,
                "correct horse zap",
                "brand new secret 42",
                metadata(),
            )
            .await
            .is_ok()
    );

    let outcome = harness
        .service
        .login(
            harness.tenant_id,
            "desk@club.example",
            "brand new secret 42",
            metadata(),
        )
        .await
        .unwrap_or_else(|_| panic!("login must not error"));
    assert!(matches!(outcome, AuthOutcome::Authenticated { .. }));
}

#[tokio::test]
async fn weak_replacement_passwords_are_rejected() {
    let harness = harness();
    let employee = active_employee("desk@club.example", "correct horse zap");
    let employee_id = employee.id;
    harness.repository.seed(harness.tenant_id, employee).await;

    let result = harness
        .service
        .change_password(
            harness.tenant_id,
            employee_id,
            "correct horse zap",
            "short",
            metadata(),
        )
        .await;
    assert!(result.is_err());
}
