//! Long-term and short-term contract models

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{
    common::{DateRange, Paging, DATE_FORMAT},
    page::{LongTermContractAction, PagePermissions, ShortTermContractAction},
};

pub const CONTRACT_STATUS_ACTIVE: i32 = 1;
pub const CONTRACT_STATUS_LIVING: i32 = 2;
pub const CONTRACT_STATUS_CANCELLED: i32 = 3;

/// Default page size of the contract search grids
pub const CONTRACT_PAGE_SIZE: i64 = 10;

/// First number handed out to short-term contracts
const FIRST_ST_CONTRACT_NO: i64 = 10001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    LongTerm,
    ShortTerm,
}

impl ContractKind {
    pub fn is_short_term(self) -> bool {
        matches!(self, ContractKind::ShortTerm)
    }
}

/// AJAX search request of both contract grids
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractSearchRequest {
    pub status_id: Option<i32>,
    pub apartment_id: Option<i32>,
    pub company_id: Option<i32>,
    /// Short-term grid only
    pub agent_company_id: Option<i32>,
    pub date_range_in: Option<String>,
    pub date_range_out: Option<String>,
    pub contract_no: Option<String>,
    pub customer_name: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Search request with blanks removed and date ranges parsed
#[derive(Debug, Clone, PartialEq)]
pub struct ContractCriteria {
    pub kind: ContractKind,
    pub status_id: Option<i32>,
    pub apartment_id: Option<i32>,
    pub company_id: Option<i32>,
    pub agent_company_id: Option<i32>,
    pub check_in: DateRange,
    pub check_out: DateRange,
    pub contract_no: Option<String>,
    pub customer_name: Option<String>,
    pub paging: Paging,
}

impl ContractCriteria {
    pub fn from_request(kind: ContractKind, req: &ContractSearchRequest) -> Self {
        let text = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        // 0 means "all" in the dropdowns
        let id = |v: Option<i32>| v.filter(|id| *id > 0);

        Self {
            kind,
            status_id: id(req.status_id),
            apartment_id: id(req.apartment_id),
            company_id: id(req.company_id),
            agent_company_id: if kind.is_short_term() {
                id(req.agent_company_id)
            } else {
                None
            },
            check_in: DateRange::parse(req.date_range_in.as_deref()),
            check_out: DateRange::parse(req.date_range_out.as_deref()),
            contract_no: text(&req.contract_no),
            customer_name: text(&req.customer_name),
            paging: Paging::normalize(req.page, req.page_size, CONTRACT_PAGE_SIZE),
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ContractRow {
    pub contract_id: i32,
    pub contract_no: String,
    pub apartment_no: Option<String>,
    pub customer_name: Option<String>,
    pub company_name: Option<String>,
    pub contract_from_date: Option<NaiveDate>,
    pub contract_to_date: Option<NaiveDate>,
    pub status_id: i32,
    pub status_name: Option<String>,
}

/// Row buttons of the long-term grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LongTermRowActions {
    pub can_view: bool,
    pub can_add: bool,
    pub can_copy: bool,
    pub can_edit: bool,
    pub can_cancel: bool,
    pub can_gen_bill: bool,
}

impl LongTermRowActions {
    pub fn for_row(perms: &PagePermissions, status_id: i32) -> Self {
        use LongTermContractAction as A;
        Self {
            can_view: perms.allows(A::View),
            can_add: perms.allows(A::Add),
            can_copy: perms.allows(A::Copy),
            can_edit: perms.allows(A::Edit)
                && matches!(status_id, CONTRACT_STATUS_ACTIVE | CONTRACT_STATUS_LIVING),
            can_cancel: perms.allows(A::Cancel) && status_id == CONTRACT_STATUS_ACTIVE,
            can_gen_bill: perms.allows(A::GenerateBill) && status_id != CONTRACT_STATUS_CANCELLED,
        }
    }
}

/// Row buttons of the short-term grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortTermRowActions {
    pub can_access: bool,
    pub access_mode: DetailMode,
    pub can_cancel: bool,
    pub can_to_living: bool,
}

impl ShortTermRowActions {
    pub fn for_row(perms: &PagePermissions, status_id: i32) -> Self {
        use ShortTermContractAction as A;
        let editable = perms.allows(A::Edit)
            && matches!(status_id, CONTRACT_STATUS_ACTIVE | CONTRACT_STATUS_LIVING);
        Self {
            can_access: editable || perms.allows(A::View),
            access_mode: if editable { DetailMode::Edit } else { DetailMode::View },
            can_cancel: perms.allows(A::Cancel) && status_id == CONTRACT_STATUS_ACTIVE,
            can_to_living: perms.allows(A::ToLiving) && status_id == CONTRACT_STATUS_LIVING,
        }
    }
}

/// Grid row with its buttons
#[derive(Debug, Clone, Serialize)]
pub struct ContractGridRow<A> {
    pub data: ContractRow,
    pub actions: A,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub contract_id: i32,
}

/// Mode of the short-term detail page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailMode {
    Add,
    View,
    Edit,
}

impl DetailMode {
    /// No id means a new contract; an existing one opens read-only unless `edit` is asked for
    pub fn resolve(id: Option<i32>, mode: Option<&str>) -> Self {
        match (id.filter(|i| *i > 0), mode.map(str::trim)) {
            (None, _) => DetailMode::Add,
            (Some(_), Some(m)) if m.eq_ignore_ascii_case("edit") => DetailMode::Edit,
            (Some(_), _) => DetailMode::View,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetailQuery {
    pub id: Option<i32>,
    pub mode: Option<String>,
}

/// Short-term contract row as loaded for the detail page
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShortTermContract {
    pub contract_id: i32,
    pub contract_no: String,
    pub contract_date: Option<NaiveDate>,
    pub apmt_id: Option<i32>,
    pub contract_apartment_no: Option<String>,
    pub customer_name: Option<String>,
    pub current_rent_rate_vnd: Option<f64>,
    pub per_vat: Option<f64>,
    pub total_price_exc_vat_vnd: Option<f64>,
    pub display_vat_from_id: Option<i32>,
    pub contract_status: i32,
    pub company_id: Option<i32>,
    pub contract_from_date: Option<NaiveDate>,
    pub contract_to_date: Option<NaiveDate>,
    pub is_repeater: bool,
    pub occupy: Option<i32>,
    pub contract_source_id: Option<i32>,
    pub received_by_id: Option<i32>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShortTermInfo {
    pub agent_company: Option<i32>,
    pub agent_person: Option<i32>,
    pub cancellation_charge: Option<String>,
    pub payment_infor: Option<String>,
    pub deposit_infor: Option<String>,
    pub special_req: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ContractApartment {
    pub apartment_no: String,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

/// Short-term contract form; `contract_id` absent or 0 creates a new contract
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ShortTermContractForm {
    pub contract_id: Option<i32>,
    #[validate(length(min = 1, max = 50, message = "Contract No is required."))]
    pub contract_no: String,
    pub contract_date: Option<NaiveDate>,
    pub apmt_id: Option<i32>,
    #[validate(length(max = 255))]
    pub customer_name: Option<String>,
    pub current_rent_rate_vnd: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0, message = "VAT must be between 0 and 100."))]
    pub per_vat: Option<f64>,
    pub total_price_exc_vat_vnd: Option<f64>,
    pub display_vat_from_id: Option<i32>,
    pub contract_status: Option<i32>,
    pub company_id: Option<i32>,
    pub contract_from_date: Option<NaiveDate>,
    pub contract_to_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_repeater: bool,
    pub occupy: Option<i32>,
    pub contract_source_id: Option<i32>,
    pub received_by_id: Option<i32>,
    pub remarks: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub st_info: ShortTermInfoForm,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ShortTermInfoForm {
    pub agent_company: Option<i32>,
    pub agent_person: Option<i32>,
    #[validate(length(max = 254))]
    pub cancellation_charge: Option<String>,
    #[validate(length(max = 254))]
    pub payment_infor: Option<String>,
    #[validate(length(max = 254))]
    pub deposit_infor: Option<String>,
    #[validate(length(max = 400))]
    pub special_req: Option<String>,
}

impl ShortTermContractForm {
    pub fn existing_id(&self) -> Option<i32> {
        self.contract_id.filter(|id| *id > 0)
    }

    pub fn status(&self) -> i32 {
        self.contract_status.unwrap_or(CONTRACT_STATUS_ACTIVE)
    }

    pub fn check_dates(&self) -> Result<(), &'static str> {
        match (self.contract_from_date, self.contract_to_date) {
            (Some(from), Some(to)) if from > to => Err("Contract end date must not be before its start date."),
            _ => Ok(()),
        }
    }
}

/// Values pre-filled on a new short-term contract
#[derive(Debug, Clone, Serialize)]
pub struct NewContractDefaults {
    pub contract_no: String,
    pub contract_date: NaiveDate,
    pub contract_status: i32,
    pub per_vat: f64,
    pub contract_from_date: NaiveDate,
    pub contract_to_date: NaiveDate,
}

impl NewContractDefaults {
    pub fn new(contract_no: String, today: NaiveDate) -> Self {
        Self {
            contract_no,
            contract_date: today,
            contract_status: CONTRACT_STATUS_ACTIVE,
            per_vat: 10.0,
            contract_from_date: today,
            contract_to_date: today.checked_add_months(Months::new(1)).unwrap_or(today),
        }
    }
}

/// Next `ST` number given the largest numeric part already used
pub fn suggest_st_contract_no(max_no: Option<i64>) -> String {
    let next = match max_no {
        Some(n) if n >= FIRST_ST_CONTRACT_NO => n + 1,
        _ => FIRST_ST_CONTRACT_NO,
    };
    format!("ST{}", next)
}

/// Status ids offered on the detail page
pub fn selectable_statuses(is_new: bool) -> Vec<i32> {
    if is_new {
        vec![1, 9]
    } else {
        (1..=9).collect()
    }
}

/// Apartment availability for a date range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Free,
    ShortTermOverlap,
    LongTermOverlap,
}

impl Availability {
    pub fn code(self) -> i32 {
        match self {
            Availability::Free => 0,
            Availability::ShortTermOverlap => 1,
            Availability::LongTermOverlap => 2,
        }
    }

    /// Long-term overlaps win over short-term ones
    pub fn from_overlaps(short_term: bool, long_term: bool) -> Self {
        if long_term {
            Availability::LongTermOverlap
        } else if short_term {
            Availability::ShortTermOverlap
        } else {
            Availability::Free
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub apartment_no: String,
    pub from_date: String,
    pub to_date: String,
    #[serde(default)]
    pub contract_id: i32,
}

/// Accepts both ISO dates and `dd/MM/yyyy`
pub fn parse_form_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, DATE_FORMAT))
        .ok()
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ContractServiceRow {
    pub contract_service_id: i64,
    pub service_name: String,
    pub service_from_date: Option<NaiveDate>,
    pub service_to_date: Option<NaiveDate>,
    pub charge_interval_name: Option<String>,
    pub charge_type_name: Option<String>,
    pub max_quantity: f64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ContractServiceForm {
    #[validate(range(min = 1, message = "Contract is required."))]
    pub contract_id: i32,
    #[validate(range(min = 1, message = "Service is required."))]
    pub service_id: i32,
    pub service_from_date: Option<NaiveDate>,
    pub service_to_date: Option<NaiveDate>,
    pub charge_interval: i32,
    pub charge_type: i32,
    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub max_quantity: f64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractIdQuery {
    pub contract_id: i32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyIdQuery {
    pub company_id: i32,
}
