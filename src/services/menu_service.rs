use crate::{
    error::AppError,
    models::{
        auth::{group_menu, MenuGroup},
        role::Identity,
    },
    repository::employee_repo::EmployeeRepository,
};

pub struct MenuService {
    repo: EmployeeRepository,
}

impl MenuService {
    pub fn new(repo: EmployeeRepository) -> Self {
        Self { repo }
    }

    /// 管理员看到全部功能，其余按角色的查看权限
    pub async fn menu_for(&self, identity: &Identity) -> Result<Vec<MenuGroup>, AppError> {
        let items = if identity.is_admin {
            self.repo.full_menu().await?
        } else {
            self.repo.role_menu(&identity.employee_code).await?
        };
        Ok(group_menu(items))
    }
}
