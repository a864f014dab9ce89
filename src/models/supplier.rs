//! Supplier domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::common::{Paging, SelectOption, DEFAULT_PAGE_SIZE};

/// Status 0: purchaser is still preparing the supplier
pub const STATUS_PREPARING: i32 = 0;
/// Status 1: purchaser submitted the supplier for approval
pub const STATUS_SUBMITTED: i32 = 1;

/// Which supplier table a list or detail request reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Current,
    ByYear,
}

impl ViewMode {
    pub fn from_query(raw: Option<&str>) -> Self {
        match raw {
            Some(v) if v.trim().eq_ignore_ascii_case("byyear") => ViewMode::ByYear,
            _ => ViewMode::Current,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ViewMode::Current => "current",
            ViewMode::ByYear => "byyear",
        }
    }
}

/// Raw list filter as posted by the index page
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupplierFilterQuery {
    pub view_mode: Option<String>,
    pub year: Option<i32>,
    pub dept_id: Option<i32>,
    pub supplier_code: Option<String>,
    pub supplier_name: Option<String>,
    pub business: Option<String>,
    pub contact: Option<String>,
    pub status_id: Option<i32>,
    #[serde(default)]
    pub is_new: bool,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// List filter after the data scope has been applied
#[derive(Debug, Clone, PartialEq)]
pub struct SupplierCriteria {
    pub view_mode: ViewMode,
    pub year: Option<i32>,
    pub dept_id: Option<i32>,
    pub supplier_code: Option<String>,
    pub supplier_name: Option<String>,
    pub business: Option<String>,
    pub contact: Option<String>,
    pub status_id: Option<i32>,
    pub is_new: bool,
    pub paging: Paging,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl SupplierCriteria {
    /// `dept_id` is the department filter already enforced by the data scope
    pub fn from_query(query: &SupplierFilterQuery, dept_id: Option<i32>) -> Self {
        Self {
            view_mode: ViewMode::from_query(query.view_mode.as_deref()),
            year: query.year,
            dept_id,
            supplier_code: non_blank(&query.supplier_code),
            supplier_name: non_blank(&query.supplier_name),
            business: non_blank(&query.business),
            contact: non_blank(&query.contact),
            status_id: query.status_id,
            is_new: query.is_new,
            paging: Paging::normalize(query.page, query.page_size, DEFAULT_PAGE_SIZE),
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SupplierListRow {
    pub supplier_id: i32,
    pub supplier_code: String,
    pub supplier_name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub fax: Option<String>,
    pub contact: Option<String>,
    pub position: Option<String>,
    pub business: Option<String>,
    pub approved_date: Option<DateTime<Utc>>,
    pub document: bool,
    pub certificate: Option<String>,
    pub service: Option<String>,
    pub comment: Option<String>,
    pub is_new: bool,
    pub code_of_acc: Option<String>,
    pub dept_id: Option<i32>,
    pub dept_code: Option<String>,
    pub status_name: Option<String>,
    pub status: i32,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SupplierDetail {
    pub supplier_id: i32,
    pub supplier_code: String,
    pub supplier_name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub fax: Option<String>,
    pub contact: Option<String>,
    pub position: Option<String>,
    pub business: Option<String>,
    pub approved_date: Option<DateTime<Utc>>,
    pub document: bool,
    pub certificate: Option<String>,
    pub service: Option<String>,
    pub comment: Option<String>,
    pub is_new: bool,
    pub code_of_acc: Option<String>,
    pub dept_id: Option<i32>,
    pub status: i32,
    pub is_deleted: bool,
}

/// Minimal row used for row-level checks on write paths
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SupplierState {
    pub supplier_id: i32,
    pub dept_id: Option<i32>,
    pub status: i32,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ApprovalHistoryEntry {
    pub action: String,
    pub user_name: String,
    pub action_date: Option<DateTime<Utc>>,
}

/// Supplier detail form
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SupplierForm {
    pub supplier_id: Option<i32>,
    #[validate(length(min = 1, max = 255, message = "Supplier code is required."))]
    pub supplier_code: String,
    #[validate(length(max = 255))]
    pub supplier_name: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub fax: Option<String>,
    pub contact: Option<String>,
    pub position: Option<String>,
    pub business: Option<String>,
    #[serde(default)]
    pub document: bool,
    pub certificate: Option<String>,
    pub service: Option<String>,
    pub comment: Option<String>,
    #[serde(default)]
    pub is_new: bool,
    pub code_of_acc: Option<String>,
    pub dept_id: Option<i32>,
    pub status: Option<i32>,
}

impl SupplierForm {
    pub fn existing_id(&self) -> Option<i32> {
        self.supplier_id.filter(|id| *id > 0)
    }

    pub fn trimmed_code(&self) -> String {
        self.supplier_code.trim().to_string()
    }

    /// New suppliers start as draft or already submitted
    pub fn new_status(&self) -> Result<i32, &'static str> {
        match self.status.unwrap_or(STATUS_PREPARING) {
            s @ (STATUS_PREPARING | STATUS_SUBMITTED) => Ok(s),
            _ => Err("New supplier only allows Draft or Purchaser Submitted status."),
        }
    }
}

/// Outcome of resetting one supplier to preparing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted,
    NotFound,
    NoAccess,
    AlreadyPreparing,
}

/// Per-outcome counters of a bulk submit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubmitSummary {
    pub submitted: usize,
    pub not_found: usize,
    pub no_access: usize,
    pub already_preparing: usize,
}

impl SubmitSummary {
    pub fn record(&mut self, outcome: SubmitOutcome) {
        match outcome {
            SubmitOutcome::Submitted => self.submitted += 1,
            SubmitOutcome::NotFound => self.not_found += 1,
            SubmitOutcome::NoAccess => self.no_access += 1,
            SubmitOutcome::AlreadyPreparing => self.already_preparing += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.submitted + self.not_found + self.no_access + self.already_preparing
    }

    /// Message shown after the submit; a single selection gets a specific sentence
    pub fn message(&self) -> String {
        if self.total() == 1 {
            let message = if self.submitted == 1 {
                "Supplier submitted. Workflow reset to Preparing."
            } else if self.not_found == 1 {
                "Supplier not found."
            } else if self.no_access == 1 {
                "You do not have permission to submit this supplier."
            } else {
                "Supplier is already in Preparing status."
            };
            return message.to_string();
        }

        let parts: Vec<String> = [
            ("submitted and reset to preparing", self.submitted),
            ("not found", self.not_found),
            ("no access", self.no_access),
            ("already preparing", self.already_preparing),
        ]
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(label, count)| format!("{}: {}", label, count))
        .collect();

        if parts.is_empty() {
            "No supplier status was changed.".to_string()
        } else {
            format!("Submit completed. {}.", parts.join(", "))
        }
    }
}

/// Copy-to-year request
#[derive(Debug, Clone, Deserialize)]
pub struct CopyYearRequest {
    pub selected_id: Option<i32>,
    pub selected_ids: Option<String>,
    pub copy_year: Option<i32>,
    #[serde(default)]
    pub confirm: bool,
}

impl CopyYearRequest {
    /// Target year, when it lies in `2000..current_year` and the copy was confirmed
    pub fn valid_year(&self, current_year: i32) -> Option<i32> {
        self.copy_year
            .filter(|y| (2000..current_year).contains(y))
            .filter(|_| self.confirm)
    }
}

pub fn copy_year_message(accessible: usize, no_access: usize) -> String {
    if no_access > 0 {
        format!(
            "Copy completed for {} supplier(s). Skipped (no access): {}.",
            accessible, no_access
        )
    } else {
        "Copy completed.".to_string()
    }
}

/// Submit request from the index page
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    pub view_mode: Option<String>,
    pub selected_id: Option<i32>,
    pub selected_ids: Option<String>,
}

/// Next `SP` code given the largest numeric suffix and its width
pub fn suggest_supplier_code(max_no: Option<i64>, width: Option<i32>) -> String {
    let next = max_no.unwrap_or(0) + 1;
    let width = width.unwrap_or(3).max(3) as usize;
    format!("SP{:0width$}", next, width = width)
}

/// Lookup lists of the index page
#[derive(Debug, Clone, Serialize)]
pub struct SupplierLookups {
    pub departments: Vec<SelectOption>,
    pub statuses: Vec<SelectOption>,
}

pub const EXPORT_HEADERS: [&str; 11] = [
    "Supplier Code",
    "Supplier Name",
    "Address",
    "Phone",
    "Mobile",
    "Fax",
    "Contact",
    "Position",
    "Business",
    "Status",
    "Dept",
];

impl SupplierListRow {
    pub fn export_fields(&self) -> [&str; 11] {
        fn s(v: &Option<String>) -> &str {
            v.as_deref().unwrap_or_default()
        }
        [
            &self.supplier_code,
            s(&self.supplier_name),
            s(&self.address),
            s(&self.phone),
            s(&self.mobile),
            s(&self.fax),
            s(&self.contact),
            s(&self.position),
            s(&self.business),
            s(&self.status_name),
            s(&self.dept_code),
        ]
    }
}
