//! Permission store (角色权限数据访问)
//!
//! Read-only access to role→permission rows, employee data scope and the
//! URL allow-list. Every failure is reported as a [`LookupError`], which
//! callers must treat as "deny".

use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::role::{EmployeeCode, EmployeeScopeRow};

/// Permission lookup failure
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("permission store unavailable: {0}")]
    Store(#[from] sqlx::Error),

    #[error("malformed permission string {raw:?}")]
    Malformed { raw: String },
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Raw permission string for `(role_id, function_id)`, if a row exists
    async fn role_permission(
        &self,
        role_id: i32,
        function_id: i32,
    ) -> Result<Option<String>, LookupError>;

    /// Data-scope columns of the employee, if the employee exists
    async fn employee_scope(
        &self,
        employee_code: &EmployeeCode,
    ) -> Result<Option<EmployeeScopeRow>, LookupError>;

    /// Distinct URLs reachable by the employee's roles (active employees only)
    async fn allowed_urls(&self, employee_code: &EmployeeCode) -> Result<Vec<String>, LookupError>;
}

pub struct PgPermissionStore {
    db: PgPool,
}

impl PgPermissionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PermissionStore for PgPermissionStore {
    async fn role_permission(
        &self,
        role_id: i32,
        function_id: i32,
    ) -> Result<Option<String>, LookupError> {
        let permission: Option<Option<String>> = sqlx::query_scalar(
            "SELECT permission FROM sys_role_permission WHERE function_id = $1 AND role_id = $2",
        )
        .bind(function_id)
        .bind(role_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(permission.flatten())
    }

    async fn employee_scope(
        &self,
        employee_code: &EmployeeCode,
    ) -> Result<Option<EmployeeScopeRow>, LookupError> {
        let row = sqlx::query_as::<_, EmployeeScopeRow>(
            r#"
            SELECT dept_id, COALESCE(see_data_all_dept, FALSE) AS see_data_all_dept
            FROM ms_employee
            WHERE employee_code = $1
            LIMIT 1
            "#,
        )
        .bind(employee_code.as_str())
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }

    async fn allowed_urls(&self, employee_code: &EmployeeCode) -> Result<Vec<String>, LookupError> {
        // A function URL is reachable when its permission number appears in
        // the role's comma-separated permission string.
        let urls: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT fp.url
            FROM sys_role_member rm
            JOIN sys_role_permission rp ON rm.role_id = rp.role_id
            JOIN sys_func_permission fp ON rp.function_id = fp.function_id
            JOIN ms_employee e ON rm.operator = e.employee_id
            WHERE e.employee_code = $1
              AND e.is_active
              AND fp.url IS NOT NULL
              AND fp.url <> ''
              AND (',' || replace(rp.permission, ' ', '') || ',')
                  LIKE ('%,' || fp.permission_no::text || ',%')
            "#,
        )
        .bind(employee_code.as_str())
        .fetch_all(&self.db)
        .await?;

        Ok(urls)
    }
}
