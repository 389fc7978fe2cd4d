//! PostgreSQL-backed employee repository.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use lykos_application::EmployeeRepository;
use lykos_core::{AppError, AppResult, TenantId};
use lykos_domain::{
    EmailAddress, Employee, EmployeeId, EmploymentStatus, Group, GroupId, Permission,
};


/// PostgreSQL implementation of the employee repository port.
#[derive(Clone)]
pub struct PostgresEmployeeRepository {
    pool: PgPool,
}

impl PostgresEmployeeRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_groups(&self, tenant_id: TenantId, id: EmployeeId) -> AppResult<Vec<Group>> {
        let rows = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT g.id, g.name, g.permissions, g.is_system
            FROM groups g
            JOIN group_memberships m ON m.group_id = g.id
            WHERE g.tenant_id = $1 AND m.employee_id = $2
            ORDER BY g.name
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load employee groups: {error}")))?;

        rows.into_iter().map(GroupRow::into_group).collect()
    }

    async fn hydrate(
        &self,
        tenant_id: TenantId,
        row: Option<EmployeeRow>,
    ) -> AppResult<Option<Employee>> {
        let Some(row) = row else {
            return Ok(None);
        };
        let id = EmployeeId::from_uuid(row.id);
        let groups = self.load_groups(tenant_id, id).await?;
        Ok(Some(row.into_employee(groups)?))
    }
}

#[derive(Debug, FromRow)]
struct EmployeeRow {
    id: uuid::Uuid,
    email: String,
    display_name: String,
    password_hash: String,
    status: String,
    failed_login_count: i32,
    locked_until: Option<DateTime<Utc>>,
}

impl EmployeeRow {
    fn into_employee(self, groups: Vec<Group>) -> AppResult<Employee> {
        Ok(Employee {
            id: EmployeeId::from_uuid(self.id),
            email: EmailAddress::new(&self.email)?,
            display_name: self.display_name,
            password_hash: self.password_hash,
            status: EmploymentStatus::from_str(self.status.as_str())?,
            failed_login_count: self.failed_login_count,
            locked_until: self.locked_until,
            groups,
        })
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
impl EmployeeRepository for PostgresEmployeeRepository {
    async fn find_by_email(
        &self,
        tenant_id: TenantId,
        email: &str,
    ) -> AppResult<Option<Employee>> {
        let row = sqlx::query_as::<_, EmployeeRow>(
            r#"
            SELECT id, email, display_name, password_hash, status,
                   failed_login_count, locked_until
            FROM employees
            WHERE tenant_id = $1 AND email = LOWER($2)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find employee by email: {error}"))
        })?;

        self.hydrate(tenant_id, row).await
    }

    async fn find_by_id(
        &self,
        tenant_id: TenantId,
        id: EmployeeId,
    ) -> AppResult<Option<Employee>> {
        let row = sqlx::query_as::<_, EmployeeRow>(
            r#"
            SELECT id, email, display_name, password_hash, status,
                   failed_login_count, locked_until
            FROM employees
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find employee by id: {error}")))?;

        self.hydrate(tenant_id, row).await
    }

    async fn record_failed_login(
        &self,
        tenant_id: TenantId,
        id: EmployeeId,
    ) -> AppResult<Option<DateTime<Utc>>> {
        // Exponential lockout: lock for 2^(n-3) seconds after n failures,
        // starting at the 3rd failure. 24-hour lock after 10 failures.
        let locked_until = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            r#"
            UPDATE employees
            SET failed_login_count = failed_login_count + 1,
                locked_until = CASE
                    WHEN failed_login_count + 1 >= 10
                        THEN now() + interval '24 hours'
                    WHEN failed_login_count + 1 >= 3
                        THEN now() + make_interval(secs => power(2, LEAST(failed_login_count + 1 - 3, 10))::int)
                    ELSE NULL
                END,
                updated_at = now()
            WHERE tenant_id = $1 AND id = $2
            RETURNING locked_until
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to record failed login: {error}")))?;

        Ok(locked_until.flatten())
    }

    async fn reset_failed_logins(&self, tenant_id: TenantId, id: EmployeeId) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE employees
            SET failed_login_count = 0, locked_until = NULL, updated_at = now()
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to reset failed logins: {error}")))?;

        Ok(())
    }

    async fn update_password(
        &self,
        tenant_id: TenantId,
        id: EmployeeId,
        password_hash: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE employees
            SET password_hash = $3, password_changed_at = now(), updated_at = now()
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update password: {error}")))?;

        Ok(())
    }
}
