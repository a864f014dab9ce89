//! 员工 URL 权限缓存
//! 进程内缓存，按员工编码存放已规范化的可访问 URL 列表，滑动过期

use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

use crate::models::role::EmployeeCode;

/// Normalised allowed-URL list of one employee
pub type AllowedUrls = Arc<Vec<String>>;

#[derive(Clone)]
pub struct UrlPermissionCache {
    inner: Cache<EmployeeCode, AllowedUrls>,
    ttl: Duration,
}

impl UrlPermissionCache {
    /// 每次读取都会重置条目的过期计时
    pub fn new(ttl: Duration) -> Self {
        let inner = Cache::builder().time_to_idle(ttl).build();
        Self { inner, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, employee_code: &EmployeeCode) -> Option<AllowedUrls> {
        self.inner.get(employee_code).await
    }

    pub async fn insert(&self, employee_code: EmployeeCode, urls: AllowedUrls) {
        tracing::debug!(
            cache_key = %employee_code.cache_key(),
            url_count = urls.len(),
            "Cached allowed URLs"
        );
        self.inner.insert(employee_code, urls).await;
    }

    /// 角色或权限变更后调用，使该员工下次请求重新读取
    pub async fn invalidate(&self, employee_code: &EmployeeCode) {
        tracing::info!(cache_key = %employee_code.cache_key(), "Permission cache entry invalidated");
        self.inner.invalidate(employee_code).await;
    }

    pub fn invalidate_all(&self) {
        tracing::info!("Permission cache cleared");
        self.inner.invalidate_all();
    }
}

/// Lowercase and strip trailing slashes; empty results are dropped
pub fn normalize_allowed_urls<I>(urls: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut normalized: Vec<String> = urls
        .into_iter()
        .map(|u| u.trim().to_lowercase().trim_end_matches('/').to_string())
        .filter(|u| !u.is_empty())
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_allowed_urls() {
        let urls = normalize_allowed_urls(vec![
            "/Purchasing/Supplier/Index/".to_string(),
            "/purchasing/supplier/index".to_string(),
            "/".to_string(),
            "/Sales/STContract/Index".to_string(),
        ]);
        assert_eq!(
            urls,
            vec![
                "/purchasing/supplier/index".to_string(),
                "/sales/stcontract/index".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_insert_get_and_invalidate() {
        let cache = UrlPermissionCache::new(Duration::from_secs(60));
        let code = EmployeeCode::new("EMP001");

        assert!(cache.get(&code).await.is_none());

        cache
            .insert(code.clone(), Arc::new(vec!["/infor/periodoccupied/index".to_string()]))
            .await;
        assert_eq!(cache.get(&code).await.unwrap().len(), 1);

        cache.invalidate(&code).await;
        assert!(cache.get(&code).await.is_none());
    }

    #[tokio::test]
    async fn test_idle_entries_expire() {
        let cache = UrlPermissionCache::new(Duration::from_millis(100));
        let code = EmployeeCode::new("EMP001");

        cache.insert(code.clone(), Arc::new(vec![])).await;
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert!(cache.get(&code).await.is_none());
    }
}
