//! 合同业务逻辑（长租列表、短租列表与短租详情）

use chrono::{Local, NaiveDate};
use serde::Serialize;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        common::{IdNameRow, SelectOption},
        contract::*,
        page::PagePermissions,
    },
    repository::contract_repo::ContractRepository,
};

/// 搜索结果，行上附带按钮权限
#[derive(Debug, Serialize)]
pub struct ContractGrid<A> {
    pub rows: Vec<ContractGridRow<A>>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

/// 列表页下拉数据
#[derive(Debug, Serialize)]
pub struct ContractLookups {
    pub statuses: Vec<SelectOption>,
    pub apartments: Vec<SelectOption>,
    pub companies: Vec<SelectOption>,
    pub default_status_id: i32,
}

/// 详情页下拉数据
#[derive(Debug, Serialize)]
pub struct DetailLookups {
    pub statuses: Vec<SelectOption>,
    pub apartments: Vec<SelectOption>,
    pub companies: Vec<SelectOption>,
    pub services: Vec<SelectOption>,
    pub charge_intervals: Vec<SelectOption>,
    pub charge_types: Vec<SelectOption>,
}

#[derive(Debug, Serialize)]
pub struct ShortTermDetail {
    pub contract: ShortTermContract,
    pub st_info: ShortTermInfo,
    pub apartment: Option<ContractApartment>,
    pub services: Vec<ContractServiceRow>,
}

fn options(rows: Vec<IdNameRow>) -> Vec<SelectOption> {
    rows.into_iter().map(SelectOption::from).collect()
}

fn with_all(rows: Vec<IdNameRow>) -> Vec<SelectOption> {
    std::iter::once(SelectOption::all())
        .chain(rows.into_iter().map(SelectOption::from))
        .collect()
}

pub struct ContractService {
    repo: ContractRepository,
}

impl ContractService {
    pub fn new(repo: ContractRepository) -> Self {
        Self { repo }
    }

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    pub async fn lookups(&self) -> Result<ContractLookups, AppError> {
        Ok(ContractLookups {
            statuses: with_all(self.repo.statuses().await?),
            apartments: with_all(self.repo.current_apartments(Self::today()).await?),
            companies: with_all(self.repo.companies().await?),
            default_status_id: CONTRACT_STATUS_ACTIVE,
        })
    }

    /// 搜索并按调用者权限计算每行按钮
    pub async fn search<A>(
        &self,
        kind: ContractKind,
        request: &ContractSearchRequest,
        actions: impl Fn(i32) -> A,
    ) -> Result<ContractGrid<A>, AppError> {
        let criteria = ContractCriteria::from_request(kind, request);
        let page = self.repo.search(&criteria).await?;

        let rows = page
            .rows
            .into_iter()
            .map(|data| ContractGridRow {
                actions: actions(data.status_id),
                data,
            })
            .collect();

        Ok(ContractGrid {
            rows,
            total: page.total,
            page: page.paging.page,
            page_size: page.paging.page_size,
            total_pages: page.paging.total_pages(page.total),
        })
    }

    pub async fn search_long_term(
        &self,
        perms: &PagePermissions,
        request: &ContractSearchRequest,
    ) -> Result<ContractGrid<LongTermRowActions>, AppError> {
        self.search(ContractKind::LongTerm, request, |status| {
            LongTermRowActions::for_row(perms, status)
        })
        .await
    }

    pub async fn search_short_term(
        &self,
        perms: &PagePermissions,
        request: &ContractSearchRequest,
    ) -> Result<ContractGrid<ShortTermRowActions>, AppError> {
        self.search(ContractKind::ShortTerm, request, |status| {
            ShortTermRowActions::for_row(perms, status)
        })
        .await
    }

    /// 取消合同；只有状态 1 的合同可以取消
    pub async fn cancel(
        &self,
        kind: ContractKind,
        contract_id: i32,
        operator_code: &str,
    ) -> Result<(), AppError> {
        let affected = self.repo.cancel(kind, contract_id, operator_code).await?;
        if affected == 0 {
            return Err(AppError::BadRequest(
                "Only active contracts can be cancelled.".to_string(),
            ));
        }

        tracing::info!(contract_id, kind = ?kind, operator = operator_code, "Contract cancelled");
        Ok(())
    }

    pub async fn new_contract_defaults(&self) -> Result<NewContractDefaults, AppError> {
        let contract_no = suggest_st_contract_no(self.repo.max_st_number().await?);
        Ok(NewContractDefaults::new(contract_no, Self::today()))
    }

    pub async fn short_term_detail(&self, contract_id: i32) -> Result<ShortTermDetail, AppError> {
        let contract = self
            .repo
            .short_term_contract(contract_id)
            .await?
            .ok_or(AppError::NotFound)?;

        Ok(ShortTermDetail {
            contract,
            st_info: self.repo.short_term_info(contract_id).await?.unwrap_or_default(),
            apartment: self.repo.contract_apartment(contract_id).await?,
            services: self.repo.contract_services(contract_id).await?,
        })
    }

    pub async fn detail_lookups(&self, is_new: bool) -> Result<DetailLookups, AppError> {
        let allowed = selectable_statuses(is_new);
        let statuses = self
            .repo
            .statuses()
            .await?
            .into_iter()
            .filter(|s| allowed.contains(&s.id))
            .map(SelectOption::from)
            .collect();

        Ok(DetailLookups {
            statuses,
            apartments: options(self.repo.current_apartments(Self::today()).await?),
            companies: options(self.repo.companies().await?),
            services: options(self.repo.contract_services_lookup().await?),
            charge_intervals: options(self.repo.charge_intervals().await?),
            charge_types: options(self.repo.charge_types().await?),
        })
    }

    /// 保存短租合同，返回合同 id
    pub async fn save_short_term(
        &self,
        form: &ShortTermContractForm,
        operator_code: &str,
    ) -> Result<i32, AppError> {
        form.validate()?;
        let contract_no = form.contract_no.trim();
        if contract_no.is_empty() {
            return Err(AppError::BadRequest("Contract No is required.".to_string()));
        }
        form.check_dates()
            .map_err(|m| AppError::BadRequest(m.to_string()))?;

        if self.repo.contract_no_exists(contract_no, form.existing_id()).await? {
            return Err(AppError::Conflict("Contract No already exists.".to_string()));
        }

        let contract_id = self.repo.save_short_term(form, operator_code).await?;
        tracing::info!(
            contract_id,
            created = form.existing_id().is_none(),
            operator = operator_code,
            "Short-term contract saved"
        );
        Ok(contract_id)
    }

    pub async fn availability(&self, query: &AvailabilityQuery) -> Result<Availability, AppError> {
        let apartment_no = query.apartment_no.trim();
        if apartment_no.is_empty() {
            return Err(AppError::BadRequest("Apartment is required.".to_string()));
        }

        let (Some(from), Some(to)) = (parse_form_date(&query.from_date), parse_form_date(&query.to_date))
        else {
            return Err(AppError::BadRequest("Invalid date range.".to_string()));
        };
        if from > to {
            return Err(AppError::BadRequest("Invalid date range.".to_string()));
        }

        let (short_term, long_term) = self
            .repo
            .overlaps(apartment_no, from, to, query.contract_id)
            .await?;
        Ok(Availability::from_overlaps(short_term, long_term))
    }

    pub async fn contract_services(&self, contract_id: i32) -> Result<Vec<ContractServiceRow>, AppError> {
        self.repo.contract_services(contract_id).await
    }

    pub async fn save_service(&self, form: &ContractServiceForm) -> Result<i64, AppError> {
        form.validate()?;
        if let (Some(from), Some(to)) = (form.service_from_date, form.service_to_date) {
            if from > to {
                return Err(AppError::BadRequest(
                    "Service end date must not be before its start date.".to_string(),
                ));
            }
        }
        if !self.repo.short_term_exists(form.contract_id).await? {
            return Err(AppError::NotFound);
        }

        let id = self.repo.insert_service(form).await?;
        tracing::info!(contract_id = form.contract_id, contract_service_id = id, "Contract service added");
        Ok(id)
    }

    pub async fn agent_persons(&self, company_id: i32) -> Result<Vec<SelectOption>, AppError> {
        Ok(options(self.repo.agent_persons(company_id).await?))
    }
}
