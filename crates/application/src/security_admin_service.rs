//! Administration of permission groups and their memberships.
//!
//! Groups are the only unit of permission assignment; there are no direct
//! per-employee permissions. System groups are seeded at install time and
//! cannot be deleted.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use lykos_core::{AppError, AppResult, AuthContext, TenantId};
use lykos_domain::{
    AuditAction, AuditLogEntry, AuditResult, EmployeeId, Group, GroupId, Permission, RiskLevel,
};

use crate::audit_trail::AuditTrail;

/// Repository port for group persistence and membership.
#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Persists a new group.
    async fn insert(&self, tenant_id: TenantId, group: &Group) -> AppResult<()>;

    /// Finds a group by identifier within a tenant.
    async fn find_by_id(
        &self,
        tenant_id: TenantId,
        id: GroupId,
    ) -> AppResult<Option<Group>>;

    /// Lists a tenant's groups by name.
    async fn list_for_tenant(&self, tenant_id: TenantId) -> AppResult<Vec<Group>>;

    /// Deletes a group and all its memberships.
    async fn delete(&self, tenant_id: TenantId, id: GroupId) -> AppResult<()>;

    /// Adds an employee to a group. Adding twice is a no-op.
    async fn assign(
        &self,
        tenant_id: TenantId,
        group_id: GroupId,
        employee_id: EmployeeId,
    ) -> AppResult<()>;

    /// Removes an employee from a group. Removing a non-member is a no-op.
    async fn unassign(
        &self,
        tenant_id: TenantId,
        group_id: GroupId,
        employee_id: EmployeeId,
    ) -> AppResult<()>;
}

/// Application service for group administration.
#[derive(Clone)]
pub struct SecurityAdminService {
    group_repository: Arc<dyn GroupRepository>,
    audit_trail: AuditTrail,
}

impl SecurityAdminService {
    /// Creates a new admin service.
    #[must_use]
    pub fn new(group_repository: Arc<dyn GroupRepository>, audit_trail: AuditTrail) -> Self {
        Self {
            group_repository,
            audit_trail,
        }
    }

    /// Creates a non-system group.
    pub async fn create_group(
        &self,
        context: &AuthContext,
        name: &str,
        permissions: BTreeSet<Permission>,
    ) -> AppResult<Group> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("group name must not be blank".into()));
        }

        let group = Group {
            id: GroupId::new(),
            name: name.to_owned(),
            permissions,
            is_system: false,
        };
        self.group_repository
            .insert(context.tenant_id(), &group)
            .await?;

        self.audit(
            context,
            AuditAction::GroupCreated,
            &group.id,
            &format!("created group '{}'", group.name),
        )
        .await;

        Ok(group)
    }

    /// Deletes a group. System groups are refused.
    pub async fn delete_group(&self, context: &AuthContext, id: GroupId) -> AppResult<()> {
        let group = self
            .group_repository
            .find_by_id(context.tenant_id(), id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("group {id} not found")))?;

        if group.is_system {
            return Err(AppError::Validation(
                "system groups cannot be deleted".to_owned(),
            ));
        }

        self.group_repository
            .delete(context.tenant_id(), id)
            .await?;

        self.audit(
            context,
            AuditAction::GroupDeleted,
            &id,
            &format!("deleted group '{}'", group.name),
        )
        .await;

        Ok(())
    }

    /// Lists a tenant's groups.
    pub async fn list_groups(&self, context: &AuthContext) -> AppResult<Vec<Group>> {
        self.group_repository
            .list_for_tenant(context.tenant_id())
            .await
    }

    /// Adds an employee to a group.
    ///
    /// The wider permission set only reaches tokens issued afterwards;
    /// outstanding access tokens keep their snapshot until expiry.
    pub async fn assign_group(
        &self,
        context: &AuthContext,
        group_id: GroupId,
        employee_id: EmployeeId,
    ) -> AppResult<()> {
        self.require_group(context, group_id).await?;
        self.group_repository
            .assign(context.tenant_id(), group_id, employee_id)
            .await?;

        self.audit(
            context,
            AuditAction::GroupAssigned,
            &group_id,
            &format!("assigned group to employee {employee_id}"),
        )
        .await;

        Ok(())
    }

    /// Removes an employee from a group.
    pub async fn unassign_group(
        &self,
        context: &AuthContext,
        group_id: GroupId,
        employee_id: EmployeeId,
    ) -> AppResult<()> {
        self.require_group(context, group_id).await?;
        self.group_repository
            .unassign(context.tenant_id(), group_id, employee_id)
            .await?;

        self.audit(
            context,
            AuditAction::GroupUnassigned,
            &group_id,
            &format!("unassigned group from employee {employee_id}"),
        )
        .await;

        Ok(())
    }

    async fn require_group(&self, context: &AuthContext, id: GroupId) -> AppResult<()> {
        self.group_repository
            .find_by_id(context.tenant_id(), id)
            .await?
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("group {id} not found")))
    }

    async fn audit(
        &self,
        context: &AuthContext,
        action: AuditAction,
        group_id: &GroupId,
        description: &str,
    ) {
        let entry = AuditLogEntry::builder()
            .tenant_id(context.tenant_id())
            .actor_id(context.principal().actor_id())
            .actor_name(context.principal().actor_label())
            .action(action)
            .entity_type("group")
            .entity_id(group_id.to_string())
            .description(description)
            .result(AuditResult::Success)
            .risk_level(RiskLevel::Medium)
            .build();

        match entry {
            Ok(entry) => self.audit_trail.record(entry).await,
            Err(error) => {
                tracing::error!(%error, action = action.as_str(), "failed to build audit entry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use lykos_core::{AppResult, AuthContext, Principal, TenantId};
    use lykos_domain::{
        AuditAction, AuditLogEntry, EmployeeId, Group, GroupId, Permission,
    };
    use tokio::sync::Mutex;
    use uuid::Uuid;

    use super::{GroupRepository, SecurityAdminService};
    use crate::audit_trail::{AuditLogQuery, AuditLogRepository, AuditTrail, AuditTrailConfig};

    #[derive(Default)]
    struct FakeGroupRepository {
        groups: Mutex<HashMap<GroupId, (TenantId, Group)>>,
        memberships: Mutex<Vec<(GroupId, EmployeeId)>>,
    }

    #[async_trait]
    impl GroupRepository for FakeGroupRepository {
        async fn insert(&self, tenant_id: TenantId, group: &Group) -> AppResult<()> {
            self.groups
                .lock()
                .await
                .insert(group.id, (tenant_id, group.clone()));
            Ok(())
        }

        async fn find_by_id(&self, tenant_id: TenantId, id: GroupId) -> AppResult<Option<Group>> {
            Ok(self
                .groups
                .lock()
                .await
                .get(&id)
                .filter(|(tenant, _)| *tenant == tenant_id)
                .map(|(_, group)| group.clone()))
        }

        async fn list_for_tenant(&self, tenant_id: TenantId) -> AppResult<Vec<Group>> {
            let mut groups: Vec<Group> = self
                .groups
                .lock()
                .await
                .values()
                .filter(|(tenant, _)| *tenant == tenant_id)
                .map(|(_, group)| group.clone())
                .collect();
            groups.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(groups)
        }

        async fn delete(&self, tenant_id: TenantId, id: GroupId) -> AppResult<()> {
            let mut groups = self.groups.lock().await;
            if groups
                .get(&id)
                .is_some_and(|(tenant, _)| *tenant == tenant_id)
            {
                groups.remove(&id);
                self.memberships
                    .lock()
                    .await
                    .retain(|(group_id, _)| *group_id != id);
            }
            Ok(())
        }

        async fn assign(
            &self,
            _tenant_id: TenantId,
            group_id: GroupId,
            employee_id: EmployeeId,
        ) -> AppResult<()> {
            let mut memberships = self.memberships.lock().await;
            if !memberships.contains(&(group_id, employee_id)) {
                memberships.push((group_id, employee_id));
            }
            Ok(())
        }

        async fn unassign(
            &self,
            _tenant_id: TenantId,
            group_id: GroupId,
            employee_id: EmployeeId,
        ) -> AppResult<()> {
            self.memberships
                .lock()
                .await
                .retain(|pair| *pair != (group_id, employee_id));
            Ok(())
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
            _tenant_id: TenantId,
            _query: &AuditLogQuery,
        ) -> AppResult<Vec<AuditLogEntry>> {
            Ok(self.entries.lock().await.clone())
        }

        async fn entries_in_range(
            &self,
            _tenant_id: TenantId,
            _from: DateTime<Utc>,
            _until: DateTime<Utc>,
        ) -> AppResult<Vec<AuditLogEntry>> {
            Ok(self.entries.lock().await.clone())
        }
    }

    fn service() -> (
        SecurityAdminService,
        Arc<FakeGroupRepository>,
        Arc<RecordingAuditRepository>,
        AuditTrail,
    ) {
        let repository = Arc::new(FakeGroupRepository::default());
        let audit = Arc::new(RecordingAuditRepository::default());
        let trail = AuditTrail::spawn(
            Arc::clone(&audit) as Arc<dyn AuditLogRepository>,
            AuditTrailConfig::default(),
        );
        let service = SecurityAdminService::new(
            Arc::clone(&repository) as Arc<dyn GroupRepository>,
            trail.clone(),
        );
        (service, repository, audit, trail)
    }

    fn context() -> AuthContext {
        AuthContext::new(
            TenantId::new(),
            Principal::Employee {
                id: Uuid::new_v4(),
                email: "admin@club.example".to_owned(),
                display_name: "Admin".to_owned(),
            },
        )
    }

    #[tokio::test]
    async fn group_lifecycle_is_audited() {
        let (service, _repository, audit, trail) = service();
        let context = context();

        let group = service
            .create_group(
                &context,
                "front-desk",
                BTreeSet::from([Permission::BookingCreate]),
            )
            .await
            .unwrap_or_else(|_| panic!("create must succeed"));

        let employee_id = EmployeeId::new();
        assert!(service.assign_group(&context, group.id, employee_id).await.is_ok());
        assert!(service.unassign_group(&context, group.id, employee_id).await.is_ok());
        assert!(service.delete_group(&context, group.id).await.is_ok());

        assert!(trail.shutdown().await);
        let actions: Vec<AuditAction> = audit
            .entries
            .lock()
            .await
            .iter()
            .map(|entry| entry.action)
            .collect();
        assert_eq!(
            actions,
            vec![
                AuditAction::GroupCreated,
                AuditAction::GroupAssigned,
                AuditAction::GroupUnassigned,
                AuditAction::GroupDeleted,
            ]
        );
    }

    #[tokio::test]
    async fn system_groups_cannot_be_deleted() {
        let (service, repository, _audit, trail) = service();
        let context = context();

        let system = Group {
            id: GroupId::new(),
            name: "owners".to_owned(),
            permissions: Permission::all().iter().copied().collect(),
            is_system: true,
        };
        repository
            .insert(context.tenant_id(), &system)
            .await
            .unwrap_or_else(|_| panic!("insert must succeed"));

        assert!(service.delete_group(&context, system.id).await.is_err());
        assert!(trail.shutdown().await);
    }

    #[tokio::test]
    async fn operations_are_tenant_scoped() {
        let (service, _repository, _audit, trail) = service();
        let context = context();
        let foreign_context = context_with_tenant(TenantId::new());

        let group = service
            .create_group(&context, "front-desk", BTreeSet::new())
            .await
            .unwrap_or_else(|_| panic!("create must succeed"));

        // Another tenant cannot see or mutate the group.
        assert!(service.delete_group(&foreign_context, group.id).await.is_err());
        assert!(
            service
                .assign_group(&foreign_context, group.id, EmployeeId::new())
                .await
                .is_err()
        );
        assert!(trail.shutdown().await);
    }

    fn context_with_tenant(tenant_id: TenantId) -> AuthContext {
        AuthContext::new(
            tenant_id,
            Principal::Employee {
                id: Uuid::new_v4(),
                email: "other@club.example".to_owned(),
                display_name: "Other Admin".to_owned(),
            },
        )
    }

    #[tokio::test]
    async fn blank_group_name_is_rejected() {
        let (service, _repository, _audit, trail) = service();
        let context = context();

        assert!(service.create_group(&context, "  ", BTreeSet::new()).await.is_err());
        assert!(trail.shutdown().await);
    }
}
