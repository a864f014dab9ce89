//! 权限检查服务
//!
//! 页面权限求值、管理员放行、数据范围解析，以及请求网关使用的 URL 权限缓存。

use std::sync::Arc;
use std::time::Duration;

use crate::{
    error::AppError,
    models::{
        page::{Page, PageAction, PagePermissions},
        role::{DataScope, EmployeeCode, Identity, PermissionSet},
    },
    repository::role_repo::{LookupError, PermissionStore},
    services::permission_cache::{normalize_allowed_urls, AllowedUrls, UrlPermissionCache},
};

pub struct PermissionService {
    store: Arc<dyn PermissionStore>,
    url_cache: UrlPermissionCache,
}

impl PermissionService {
    pub fn new(store: Arc<dyn PermissionStore>, cache_ttl: Duration) -> Self {
        Self {
            store,
            url_cache: UrlPermissionCache::new(cache_ttl),
        }
    }

    /// 角色在某页面上被授予的权限编号（不含管理员放行）
    ///
    /// role 0 或没有对应记录时返回空集合；权限串格式错误时返回错误。
    pub async fn permissions_for_page(
        &self,
        role_id: i32,
        page: Page,
    ) -> Result<PermissionSet, LookupError> {
        if role_id == 0 {
            return Ok(PermissionSet::empty());
        }

        match self.store.role_permission(role_id, page.function_id()).await? {
            Some(raw) => PermissionSet::parse(&raw),
            None => Ok(PermissionSet::empty()),
        }
    }

    /// 当前用户在页面上的有效权限，管理员在此统一放行
    pub async fn resolve_effective_permissions(
        &self,
        identity: &Identity,
        page: Page,
    ) -> Result<PagePermissions, LookupError> {
        let granted = if identity.is_admin {
            PermissionSet::admin_superset()
        } else {
            self.permissions_for_page(identity.role_id, page).await?
        };

        Ok(PagePermissions::new(page, identity.employee_code.clone(), granted))
    }

    /// 解析权限并要求某个动作，返回解析结果供后续按钮/行级判断复用
    pub async fn require<A: PageAction>(
        &self,
        identity: &Identity,
        action: A,
    ) -> Result<PagePermissions, AppError> {
        let permissions = self.resolve_effective_permissions(identity, A::PAGE).await?;
        permissions.require(action)?;
        Ok(permissions)
    }

    /// 要求任意一个动作
    pub async fn require_any<A: PageAction>(
        &self,
        identity: &Identity,
        actions: &[A],
    ) -> Result<PagePermissions, AppError> {
        let permissions = self.resolve_effective_permissions(identity, A::PAGE).await?;
        permissions.require_any(actions)?;
        Ok(permissions)
    }

    /// 员工的数据范围：管理员或全部门标记可看全部，否则仅限本部门
    pub async fn data_scope(&self, identity: &Identity) -> Result<DataScope, LookupError> {
        if identity.is_admin {
            return Ok(DataScope::AllDepartments);
        }

        let row = self.store.employee_scope(&identity.employee_code).await?;
        Ok(DataScope::from_row(row.as_ref()))
    }

    /// 员工可访问的 URL 列表（已规范化），未命中缓存时读取数据库
    ///
    /// 并发的首次请求可能重复读取，结果相同。读取失败不写入缓存。
    pub async fn allowed_urls(&self, employee_code: &EmployeeCode) -> Result<AllowedUrls, LookupError> {
        if let Some(urls) = self.url_cache.get(employee_code).await {
            return Ok(urls);
        }

        let urls = self.store.allowed_urls(employee_code).await.map_err(|e| {
            tracing::error!(employee_code = %employee_code, error = %e, "Failed to load allowed URLs");
            e
        })?;

        let urls: AllowedUrls = Arc::new(normalize_allowed_urls(urls));
        self.url_cache.insert(employee_code.clone(), urls.clone()).await;
        Ok(urls)
    }

    /// 角色或权限调整后使某员工的 URL 缓存失效
    pub async fn invalidate_employee(&self, employee_code: &EmployeeCode) {
        self.url_cache.invalidate(employee_code).await;
    }

    /// 使全部 URL 缓存失效
    pub fn invalidate_all(&self) {
        self.url_cache.invalidate_all();
    }

    pub fn cache_ttl(&self) -> Duration {
        self.url_cache.ttl()
    }
}
