//! 员工登录与菜单数据访问

use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{
        auth::{LoginAccount, MenuItem},
        role::EmployeeCode,
    },
};

pub struct EmployeeRepository {
    db: PgPool,
}

impl EmployeeRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 在职员工及其第一个角色
    pub async fn find_login(&self, employee_code: &EmployeeCode) -> Result<Option<LoginAccount>, AppError> {
        let account = sqlx::query_as::<_, LoginAccount>(
            r#"
            SELECT e.employee_code, e.employee_name, e.password_hash,
                   r.role_id, r.is_admin_role
            FROM ms_employee e
            LEFT JOIN LATERAL (
                SELECT rm.role_id, ro.is_admin_role
                FROM sys_role_member rm
                JOIN sys_role ro ON ro.role_id = rm.role_id
                WHERE rm.operator = e.employee_id
                ORDER BY rm.role_id
                LIMIT 1
            ) r ON TRUE
            WHERE e.employee_code = $1 AND e.is_active
            "#,
        )
        .bind(employee_code.as_str())
        .fetch_optional(&self.db)
        .await?;

        Ok(account)
    }

    /// 管理员菜单：所有配置了 URL 的功能
    pub async fn full_menu(&self) -> Result<Vec<MenuItem>, AppError> {
        let items = sqlx::query_as::<_, MenuItem>(
            r#"
            SELECT m.module_id, m.module_name, f.function_id, f.function_name, f.url
            FROM sys_function f
            JOIN sys_module m ON m.module_id = f.module_id
            WHERE f.url <> ''
            ORDER BY m.module_id, f.function_id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(items)
    }

    /// 角色菜单：任一角色拥有权限 1 的功能
    pub async fn role_menu(&self, employee_code: &EmployeeCode) -> Result<Vec<MenuItem>, AppError> {
        let items = sqlx::query_as::<_, MenuItem>(
            r#"
            SELECT DISTINCT m.module_id, m.module_name, f.function_id, f.function_name, f.url
            FROM ms_employee e
            JOIN sys_role_member rm ON rm.operator = e.employee_id
            JOIN sys_role_permission rp ON rp.role_id = rm.role_id
            JOIN sys_function f ON f.function_id = rp.function_id
            JOIN sys_module m ON m.module_id = f.module_id
            WHERE e.employee_code = $1
              AND e.is_active
              AND f.url <> ''
              AND (',' || replace(rp.permission, ' ', '') || ',') LIKE '%,1,%'
            ORDER BY m.module_name, f.function_name
            "#,
        )
        .bind(employee_code.as_str())
        .fetch_all(&self.db)
        .await?;

        Ok(items)
    }
}
