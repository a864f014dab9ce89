//! 供应商业务逻辑
//!
//! 调用方必须先完成页面权限检查并解析出数据范围，这里只做行级部门判断
//! 和业务规则。

use chrono::{Datelike, Utc};
use serde::Serialize;

use crate::{
    error::AppError,
    models::{
        common::{collect_ids, Paging, SelectOption},
        role::DataScope,
        supplier::*,
    },
    repository::supplier_repo::SupplierRepository,
};

/// 列表页数据
#[derive(Debug, Serialize)]
pub struct SupplierListing {
    pub rows: Vec<SupplierListRow>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub view_mode: ViewMode,
    pub dept_id: Option<i32>,
}

/// 详情页数据
#[derive(Debug, Serialize)]
pub struct SupplierDetailView {
    pub supplier: SupplierDetail,
    pub history: Vec<ApprovalHistoryEntry>,
    pub view_mode: ViewMode,
    pub year: Option<i32>,
}

pub struct SupplierService {
    repo: SupplierRepository,
}

impl SupplierService {
    pub fn new(repo: SupplierRepository) -> Self {
        Self { repo }
    }

    fn criteria(scope: &DataScope, query: &SupplierFilterQuery) -> Result<SupplierCriteria, AppError> {
        let dept_id = scope.department_filter(query.dept_id)?;
        Ok(SupplierCriteria::from_query(query, dept_id))
    }

    pub async fn list(
        &self,
        scope: &DataScope,
        query: &SupplierFilterQuery,
    ) -> Result<SupplierListing, AppError> {
        let criteria = Self::criteria(scope, query)?;
        let page = self.repo.search(&criteria).await?;
        let Paging { page: current, page_size } = page.paging;

        Ok(SupplierListing {
            total_pages: page.paging.total_pages(page.total),
            rows: page.rows,
            total: page.total,
            page: current,
            page_size,
            view_mode: criteria.view_mode,
            dept_id: criteria.dept_id,
        })
    }

    /// 部门下拉：受限用户只能看到本部门
    pub async fn lookups(&self, scope: &DataScope) -> Result<SupplierLookups, AppError> {
        let departments = self.repo.departments().await?;
        let departments: Vec<SelectOption> = match scope {
            DataScope::AllDepartments => std::iter::once(SelectOption::all())
                .chain(departments.into_iter().map(SelectOption::from))
                .collect(),
            DataScope::Department(own) => departments
                .into_iter()
                .filter(|d| d.id == *own)
                .map(SelectOption::from)
                .collect(),
            DataScope::Unassigned => Vec::new(),
        };

        let statuses = std::iter::once(SelectOption::all())
            .chain(self.repo.statuses().await?.into_iter().map(SelectOption::from))
            .collect();

        Ok(SupplierLookups {
            departments,
            statuses,
        })
    }

    /// 导出当前筛选结果为 CSV
    pub async fn export_csv(
        &self,
        scope: &DataScope,
        query: &SupplierFilterQuery,
    ) -> Result<String, AppError> {
        let criteria = Self::criteria(scope, query)?;
        let rows = self.repo.search_all(&criteria).await?;

        let mut out = csv_line(EXPORT_HEADERS.iter().copied());
        for row in &rows {
            out.push_str(&csv_line(row.export_fields().iter().copied()));
        }
        Ok(out)
    }

    /// 复制选中的供应商到指定年度；无权访问的 id 被跳过
    pub async fn copy_to_year(
        &self,
        scope: &DataScope,
        request: &CopyYearRequest,
    ) -> Result<String, AppError> {
        scope.require_assigned()?;
        let ids = collect_ids(request.selected_id, request.selected_ids.as_deref());
        if ids.is_empty() {
            return Err(AppError::BadRequest("Select at least one supplier.".to_string()));
        }

        let mut accessible = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(dept) = self.repo.department_of(*id, ViewMode::Current, None).await? {
                if scope.can_access(dept) {
                    accessible.push(*id);
                }
            }
        }

        if accessible.is_empty() {
            return Err(AppError::BadRequest(
                "No selected supplier is accessible by your department scope.".to_string(),
            ));
        }

        let current_year = Utc::now().year();
        let Some(year) = request.valid_year(current_year) else {
            return Err(AppError::BadRequest(format!(
                "Enter a valid year before {} and confirm the copy.",
                current_year
            )));
        };

        let inserted = self.repo.copy_to_year(year, &accessible).await?;
        tracing::info!(year, selected = ids.len(), inserted, "Suppliers copied to year");

        Ok(copy_year_message(accessible.len(), ids.len() - accessible.len()))
    }

    /// 批量退回准备状态，仅当前列表模式可用
    pub async fn submit(
        &self,
        scope: &DataScope,
        request: &SubmitRequest,
    ) -> Result<SubmitSummary, AppError> {
        scope.require_assigned()?;
        if ViewMode::from_query(request.view_mode.as_deref()) != ViewMode::Current {
            return Err(AppError::BadRequest(
                "Submit is available only in Current List mode.".to_string(),
            ));
        }

        let ids = collect_ids(request.selected_id, request.selected_ids.as_deref());
        if ids.is_empty() {
            return Err(AppError::BadRequest("Select at least one supplier.".to_string()));
        }

        let mut summary = SubmitSummary::default();
        for id in ids {
            let outcome = match self.repo.state(id).await? {
                None => SubmitOutcome::NotFound,
                Some(s) if !scope.can_access(s.dept_id) => SubmitOutcome::NoAccess,
                Some(s) if s.status == STATUS_PREPARING => SubmitOutcome::AlreadyPreparing,
                Some(_) => {
                    self.repo.reset_to_preparing(id).await?;
                    SubmitOutcome::Submitted
                }
            };
            summary.record(outcome);
        }

        Ok(summary)
    }

    /// 详情；年度模式读取年度快照
    pub async fn detail(
        &self,
        scope: &DataScope,
        supplier_id: i32,
        mode: ViewMode,
        year: Option<i32>,
    ) -> Result<SupplierDetailView, AppError> {
        let (supplier, history_year) = match (mode, year) {
            (ViewMode::ByYear, Some(y)) => (self.repo.annual_detail(supplier_id, y).await?, Some(y)),
            (ViewMode::ByYear, None) => {
                return Err(AppError::BadRequest("Year is required in By Year mode.".to_string()))
            }
            (ViewMode::Current, _) => (self.repo.detail(supplier_id).await?, None),
        };

        let supplier = supplier.ok_or(AppError::NotFound)?;
        if !scope.can_access(supplier.dept_id) {
            tracing::warn!(supplier_id, dept_id = ?supplier.dept_id, "Supplier outside data scope");
            return Err(AppError::Forbidden);
        }

        let history = self.repo.approval_history(supplier_id, history_year).await?;
        Ok(SupplierDetailView {
            supplier,
            history,
            view_mode: mode,
            year: history_year,
        })
    }

    async fn accessible_state(
        &self,
        scope: &DataScope,
        supplier_id: i32,
    ) -> Result<SupplierState, AppError> {
        let state = self.repo.state(supplier_id).await?.ok_or(AppError::NotFound)?;
        if !scope.can_access(state.dept_id) {
            tracing::warn!(supplier_id, dept_id = ?state.dept_id, "Supplier outside data scope");
            return Err(AppError::Forbidden);
        }
        Ok(state)
    }

    /// 新建或更新，返回供应商 id
    pub async fn save(
        &self,
        scope: &DataScope,
        form: &SupplierForm,
        operator_code: &str,
    ) -> Result<i32, AppError> {
        let code = form.trimmed_code();
        if code.is_empty() {
            return Err(AppError::BadRequest("Supplier code is required.".to_string()));
        }

        // 目标部门同样受数据范围约束
        if !scope.can_access(form.dept_id) {
            return Err(AppError::Forbidden);
        }

        let existing = form.existing_id();
        if let Some(id) = existing {
            let state = self.accessible_state(scope, id).await?;
            if state.is_deleted {
                return Err(AppError::BadRequest("Cannot save a deleted supplier.".to_string()));
            }
        }

        let new_status = match existing {
            Some(_) => None,
            None => Some(form.new_status().map_err(|m| AppError::BadRequest(m.to_string()))?),
        };

        if self.repo.code_exists(&code, existing).await? {
            return Err(AppError::Conflict("Supplier code already exists.".to_string()));
        }

        match (existing, new_status) {
            (Some(id), _) => {
                self.repo.update(id, form, &code).await?;
                tracing::info!(supplier_id = id, operator = operator_code, "Supplier updated");
                Ok(id)
            }
            (None, status) => {
                let status = status.unwrap_or(STATUS_PREPARING);
                let id = self.repo.create(form, &code, status, operator_code).await?;
                tracing::info!(supplier_id = id, status, operator = operator_code, "Supplier created");
                Ok(id)
            }
        }
    }

    pub async fn submit_approval(
        &self,
        scope: &DataScope,
        supplier_id: i32,
        operator_code: &str,
    ) -> Result<(), AppError> {
        let state = self.accessible_state(scope, supplier_id).await?;
        if state.is_deleted {
            return Err(AppError::BadRequest("Cannot submit a deleted supplier.".to_string()));
        }
        if state.status != STATUS_PREPARING {
            return Err(AppError::BadRequest("Supplier has already been submitted.".to_string()));
        }

        self.repo.submit_approval(supplier_id, operator_code).await?;
        tracing::info!(supplier_id, operator = operator_code, "Supplier submitted for approval");
        Ok(())
    }

    pub async fn code_exists(&self, code: &str, exclude_id: Option<i32>) -> Result<bool, AppError> {
        self.repo.code_exists(code.trim(), exclude_id.filter(|id| *id > 0)).await
    }

    pub async fn suggested_code(&self) -> Result<String, AppError> {
        self.repo.suggested_code().await
    }
}

/// RFC 4180 字段转义
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_line<'a>(fields: impl Iterator<Item = &'a str>) -> String {
    let mut line = fields.map(csv_field).collect::<Vec<_>>().join(",");
    line.push_str("\r\n");
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn test_csv_line() {
        assert_eq!(csv_line(["a", "b,c", ""].into_iter()), "a,\"b,c\",\r\n");
    }
}
