//! PostgreSQL-backed group repository.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use lykos_application::GroupRepository;
use lykos_core::{AppError, AppResult, TenantId};
use lykos_domain::{EmployeeId, Group, GroupId, Permission};

/// PostgreSQL implementation of the group repository port.
#[derive(Clone)]
pub struct PostgresGroupRepository {
    pool: PgPool,
}

impl PostgresGroupRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Seeds the standard system groups for a tenant, idempotently.
    ///
    /// Called at tenant provisioning; existing groups with the same name are
    /// left untouched.
    pub async fn ensure_system_groups(&self, tenant_id: TenantId) -> AppResult<()> {
        let owner_permissions: Vec<String> = Permission::all()
            .iter()
            .map(|permission| permission.as_str().to_owned())
            .collect();
        let auditor_permissions = vec![Permission::SecurityAuditRead.as_str().to_owned()];

        for (name, permissions) in [
            ("owners", &owner_permissions),
            ("security-auditors", &auditor_permissions),
        ] {
            sqlx::query(
                r#"
                INSERT INTO groups (id, tenant_id, name, permissions, is_system)
                VALUES ($1, $2, $3, $4, TRUE)
                ON CONFLICT (tenant_id, name) DO NOTHING
                "#,
            )
            .bind(GroupId::new().as_uuid())
            .bind(tenant_id.as_uuid())
            .bind(name)
            .bind(permissions)
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to seed system group '{name}': {error}"))
            })?;
        }

        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct GroupRow {
    id: uuid::Uuid,
    name: String,
    permissions: Vec<String>,
    is_system: bool,
}

impl GroupRow {
    fn into_group(self) -> AppResult<Group> {
        let permissions = self
            .permissions
            .iter()
            .map(|value| Permission::from_str(value))
            .collect::<AppResult<_>>()?;

        Ok(Group {
            id: GroupId::from_uuid(self.id),
            name: self.name,
            permissions,
            is_system: self.is_system,
        })
    }
}

#[async_trait]
impl GroupRepository for PostgresGroupRepository {
    async fn insert(&self, tenant_id: TenantId, group: &Group) -> AppResult<()> {
        let permissions: Vec<String> = group
            .permissions
            .iter()
            .map(|permission| permission.as_str().to_owned())
            .collect();

        sqlx::query(
            r#"
            INSERT INTO groups (id, tenant_id, name, permissions, is_system)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(group.id.as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(group.name.as_str())
        .bind(&permissions)
        .bind(group.is_system)
        .execute(&self.pool)
        .await
        .map_err(|error| match error {
            sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
                AppError::Conflict(format!(
                    "group '{}' already exists for this tenant",
                    group.name
                ))
            }
            other => AppError::Internal(format!("failed to insert group: {other}")),
        })?;

        Ok(())
    }

    async fn find_by_id(&self, tenant_id: TenantId, id: GroupId) -> AppResult<Option<Group>> {
        let row = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT id, name, permissions, is_system
            FROM groups
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find group: {error}")))?;

        row.map(GroupRow::into_group).transpose()
    }

    async fn list_for_tenant(&self, tenant_id: TenantId) -> AppResult<Vec<Group>> {
        let rows = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT id, name, permissions, is_system
            FROM groups
            WHERE tenant_id = $1
            ORDER BY name
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list groups: {error}")))?;

        rows.into_iter().map(GroupRow::into_group).collect()
    }

    async fn delete(&self, tenant_id: TenantId, id: GroupId) -> AppResult<()> {
        // Memberships go with the group via ON DELETE CASCADE.
        sqlx::query(
            r#"
            DELETE FROM groups
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete group: {error}")))?;

        Ok(())
    }

    async fn assign(
        &self,
        tenant_id: TenantId,
        group_id: GroupId,
        employee_id: EmployeeId,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO group_memberships (group_id, employee_id)
            SELECT g.id, $3
            FROM groups g
            WHERE g.tenant_id = $1 AND g.id = $2
            ON CONFLICT (group_id, employee_id) DO NOTHING
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(group_id.as_uuid())
        .bind(employee_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to assign group: {error}")))?;

        Ok(())
    }

    async fn unassign(
        &self,
        tenant_id: TenantId,
        group_id: GroupId,
        employee_id: EmployeeId,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            DELETE FROM group_memberships m
            USING groups g
            WHERE m.group_id = g.id
              AND g.tenant_id = $1 AND g.id = $2 AND m.employee_id = $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(group_id.as_uuid())
        .bind(employee_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to unassign group: {error}")))?;

        Ok(())
    }
}
