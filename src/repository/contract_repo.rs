//! Contract repository (长租/短租合同数据访问)

use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    error::AppError,
    models::{
        common::{IdNameRow, Paging},
        contract::*,
    },
};

const SEARCH_COLUMNS: &str = r#"
    SELECT c.contract_id, c.contract_no,
           COALESCE(c.current_apartment_no, c.contract_apartment_no) AS apartment_no,
           c.customer_name, co.company_name, c.contract_from_date, c.contract_to_date,
           c.contract_status AS status_id, cs.status_name
"#;

const ST_CONTRACT_COLUMNS: &str = r#"
    contract_id, contract_no, contract_date, apmt_id, contract_apartment_no, customer_name,
    current_rent_rate_vnd, per_vat, total_price_exc_vat_vnd, display_vat_from_id,
    contract_status, company_id, contract_from_date, contract_to_date, is_repeater, occupy,
    contract_source_id, received_by_id, remarks
"#;

#[derive(Debug)]
pub struct ContractPage {
    pub rows: Vec<ContractRow>,
    pub total: i64,
    pub paging: Paging,
}

pub struct ContractRepository {
    db: PgPool,
}

impl ContractRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn push_from_where(qb: &mut QueryBuilder<'_, Postgres>, criteria: &ContractCriteria) {
        qb.push(
            " FROM cm_contract c \
             LEFT JOIN cm_company co ON c.company_id = co.company_id \
             LEFT JOIN cm_contract_status cs ON c.contract_status = cs.status_id \
             LEFT JOIN cm_st_info si ON si.st_contract_id = c.contract_id \
             WHERE c.is_short_term = ",
        )
        .push_bind(criteria.kind.is_short_term());

        if let Some(status_id) = criteria.status_id {
            qb.push(" AND c.contract_status = ").push_bind(status_id);
        }
        if let Some(apartment_id) = criteria.apartment_id {
            qb.push(" AND c.apmt_id = ").push_bind(apartment_id);
        }
        if let Some(company_id) = criteria.company_id {
            qb.push(" AND c.company_id = ").push_bind(company_id);
        }
        if let Some(agent_company_id) = criteria.agent_company_id {
            qb.push(" AND si.agent_company = ").push_bind(agent_company_id);
        }

        for (column, range) in [
            ("c.contract_from_date", &criteria.check_in),
            ("c.contract_to_date", &criteria.check_out),
        ] {
            if let Some(from) = range.from {
                qb.push(" AND ").push(column).push(" >= ").push_bind(from);
            }
            if let Some(to) = range.to {
                qb.push(" AND ").push(column).push(" <= ").push_bind(to);
            }
        }

        if let Some(no) = &criteria.contract_no {
            qb.push(" AND c.contract_no ILIKE ").push_bind(format!("%{}%", no));
        }
        if let Some(name) = &criteria.customer_name {
            qb.push(" AND c.customer_name ILIKE ").push_bind(format!("%{}%", name));
        }
    }

    /// 分页查询；页码超出范围时回退到最后一页
    pub async fn search(&self, criteria: &ContractCriteria) -> Result<ContractPage, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(1)");
        Self::push_from_where(&mut qb, criteria);
        let total: i64 = qb.build_query_scalar().fetch_one(&self.db).await?;

        let paging = criteria.paging.clamp_to(total);
        let mut qb = QueryBuilder::<Postgres>::new(SEARCH_COLUMNS);
        Self::push_from_where(&mut qb, criteria);
        qb.push(" ORDER BY c.contract_id DESC LIMIT ")
            .push_bind(paging.page_size)
            .push(" OFFSET ")
            .push_bind(paging.offset());

        let rows = qb.build_query_as::<ContractRow>().fetch_all(&self.db).await?;
        Ok(ContractPage { rows, total, paging })
    }

    /// 仅取消状态为 1 的合同，返回受影响行数
    pub async fn cancel(
        &self,
        kind: ContractKind,
        contract_id: i32,
        operator_code: &str,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE cm_contract
            SET contract_status = $3, updated_by = $4, updated_date = NOW()
            WHERE contract_id = $1 AND is_short_term = $2 AND contract_status = $5
            "#,
        )
        .bind(contract_id)
        .bind(kind.is_short_term())
        .bind(CONTRACT_STATUS_CANCELLED)
        .bind(operator_code)
        .bind(CONTRACT_STATUS_ACTIVE)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn statuses(&self) -> Result<Vec<IdNameRow>, AppError> {
        let rows = sqlx::query_as::<_, IdNameRow>(
            "SELECT status_id AS id, status_name AS name FROM cm_contract_status ORDER BY status_id",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    /// 当前存在的公寓
    pub async fn current_apartments(&self, today: NaiveDate) -> Result<Vec<IdNameRow>, AppError> {
        let rows = sqlx::query_as::<_, IdNameRow>(
            r#"
            SELECT apmt_id AS id, apartment_no AS name FROM am_apmt
            WHERE exist_from <= $1 AND exist_to >= $1
            ORDER BY apartment_no
            "#,
        )
        .bind(today)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    pub async fn companies(&self) -> Result<Vec<IdNameRow>, AppError> {
        let rows = sqlx::query_as::<_, IdNameRow>(
            "SELECT company_id AS id, company_name AS name FROM cm_company ORDER BY company_name",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    pub async fn agent_persons(&self, company_id: i32) -> Result<Vec<IdNameRow>, AppError> {
        let rows = sqlx::query_as::<_, IdNameRow>(
            r#"
            SELECT agent_id AS id, agent_name AS name FROM cm_agent_person
            WHERE company_id = $1
            ORDER BY agent_name
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    pub async fn contract_services_lookup(&self) -> Result<Vec<IdNameRow>, AppError> {
        let rows = sqlx::query_as::<_, IdNameRow>(
            r#"
            SELECT service_id AS id, service_name AS name FROM sv_service_list
            WHERE is_contract_service = TRUE AND is_active = TRUE
            ORDER BY service_name
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    pub async fn charge_intervals(&self) -> Result<Vec<IdNameRow>, AppError> {
        let rows = sqlx::query_as::<_, IdNameRow>(
            r#"
            SELECT charge_interval_id AS id, charge_interval_name AS name
            FROM sv_charge_interval ORDER BY charge_interval_id
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    /// 收费类型，类型 2 不在合同服务中使用
    pub async fn charge_types(&self) -> Result<Vec<IdNameRow>, AppError> {
        let rows = sqlx::query_as::<_, IdNameRow>(
            r#"
            SELECT charge_type_id AS id, charge_type_name AS name
            FROM sv_charge_type WHERE charge_type_id <> 2 ORDER BY charge_type_id
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    /// 已用短租编号中最大的数字部分，忽略 `-xx` 后缀
    pub async fn max_st_number(&self) -> Result<Option<i64>, AppError> {
        let max_no: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MAX(SUBSTRING(split_part(TRIM(contract_no), '-', 1) FROM 3)::BIGINT)
            FROM cm_contract
            WHERE is_short_term = TRUE
              AND UPPER(split_part(TRIM(contract_no), '-', 1)) ~ '^ST[0-9]{1,18}$'
            "#,
        )
        .fetch_one(&self.db)
        .await?;
        Ok(max_no)
    }

    pub async fn short_term_contract(
        &self,
        contract_id: i32,
    ) -> Result<Option<ShortTermContract>, AppError> {
        let sql = format!(
            "SELECT {} FROM cm_contract WHERE contract_id = $1 AND is_short_term = TRUE",
            ST_CONTRACT_COLUMNS
        );
        let contract = sqlx::query_as::<_, ShortTermContract>(&sql)
            .bind(contract_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(contract)
    }

    pub async fn short_term_info(&self, contract_id: i32) -> Result<Option<ShortTermInfo>, AppError> {
        let info = sqlx::query_as::<_, ShortTermInfo>(
            r#"
            SELECT agent_company, agent_person, cancellation_charge, payment_infor,
                   deposit_infor, special_req
            FROM cm_st_info WHERE st_contract_id = $1
            "#,
        )
        .bind(contract_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(info)
    }

    pub async fn contract_apartment(
        &self,
        contract_id: i32,
    ) -> Result<Option<ContractApartment>, AppError> {
        let row = sqlx::query_as::<_, ContractApartment>(
            "SELECT apartment_no, from_date, to_date FROM cm_contract_apmt WHERE contract_id = $1",
        )
        .bind(contract_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    pub async fn contract_no_exists(&self, contract_no: &str, exclude_id: Option<i32>) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM cm_contract
                WHERE TRIM(contract_no) = TRIM($1)
                  AND ($2::INT IS NULL OR contract_id <> $2)
            )
            "#,
        )
        .bind(contract_no)
        .bind(exclude_id)
        .fetch_one(&self.db)
        .await?;
        Ok(exists)
    }

    /// 保存短租合同：合同主表、合同公寓、短租信息在同一事务中写入
    pub async fn save_short_term(
        &self,
        form: &ShortTermContractForm,
        operator_code: &str,
    ) -> Result<i32, AppError> {
        let mut tx = self.db.begin().await?;

        let apartment_no: Option<String> = match form.apmt_id {
            Some(apmt_id) => {
                sqlx::query_scalar("SELECT apartment_no FROM am_apmt WHERE apmt_id = $1")
                    .bind(apmt_id)
                    .fetch_optional(&mut *tx)
                    .await?
            }
            None => None,
        };

        let contract_no = form.contract_no.trim();
        let contract_id = match form.existing_id() {
            None => {
                sqlx::query_scalar::<_, i32>(
                    r#"
                    INSERT INTO cm_contract (
                        contract_no, is_short_term, contract_date, apmt_id, contract_apartment_no,
                        current_apartment_no, customer_name, current_rent_rate_vnd, per_vat,
                        total_price_exc_vat_vnd, display_vat_from_id, contract_status, company_id,
                        contract_from_date, contract_to_date, plan_checkin_date, plan_checkout_date,
                        is_repeater, occupy, contract_source_id, received_by_id, remarks,
                        created_by, created_date
                    )
                    VALUES ($1, TRUE, $2, $3, $4, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                            $12, $13, $14, $15, $16, $17, $18, $19, NOW())
                    RETURNING contract_id
                    "#,
                )
                .bind(contract_no)
                .bind(form.contract_date)
                .bind(form.apmt_id)
                .bind(&apartment_no)
                .bind(&form.customer_name)
                .bind(form.current_rent_rate_vnd)
                .bind(form.per_vat)
                .bind(form.total_price_exc_vat_vnd)
                .bind(form.display_vat_from_id)
                .bind(form.status())
                .bind(form.company_id)
                .bind(form.contract_from_date)
                .bind(form.contract_to_date)
                .bind(form.is_repeater)
                .bind(form.occupy)
                .bind(form.contract_source_id)
                .bind(form.received_by_id)
                .bind(&form.remarks)
                .bind(operator_code)
                .fetch_one(&mut *tx)
                .await?
            }
            Some(id) => {
                let result = sqlx::query(
                    r#"
                    UPDATE cm_contract
                    SET contract_no = $2, contract_date = $3, apmt_id = $4,
                        contract_apartment_no = $5, current_apartment_no = $5, customer_name = $6,
                        current_rent_rate_vnd = $7, per_vat = $8, total_price_exc_vat_vnd = $9,
                        display_vat_from_id = $10, contract_status = $11, company_id = $12,
                        contract_from_date = $13, contract_to_date = $14,
                        plan_checkin_date = $13, plan_checkout_date = $14, is_repeater = $15,
                        occupy = $16, contract_source_id = $17, received_by_id = $18,
                        remarks = $19, updated_by = $20, updated_date = NOW()
                    WHERE contract_id = $1 AND is_short_term = TRUE
                    "#,
                )
                .bind(id)
                .bind(contract_no)
                .bind(form.contract_date)
                .bind(form.apmt_id)
                .bind(&apartment_no)
                .bind(&form.customer_name)
                .bind(form.current_rent_rate_vnd)
                .bind(form.per_vat)
                .bind(form.total_price_exc_vat_vnd)
                .bind(form.display_vat_from_id)
                .bind(form.status())
                .bind(form.company_id)
                .bind(form.contract_from_date)
                .bind(form.contract_to_date)
                .bind(form.is_repeater)
                .bind(form.occupy)
                .bind(form.contract_source_id)
                .bind(form.received_by_id)
                .bind(&form.remarks)
                .bind(operator_code)
                .execute(&mut *tx)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(AppError::NotFound);
                }
                id
            }
        };

        if let Some(apartment_no) = &apartment_no {
            sqlx::query(
                r#"
                INSERT INTO cm_contract_apmt (contract_id, apartment_no, from_date, to_date)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (contract_id) DO UPDATE
                SET apartment_no = EXCLUDED.apartment_no,
                    from_date = EXCLUDED.from_date,
                    to_date = EXCLUDED.to_date
                "#,
            )
            .bind(contract_id)
            .bind(apartment_no)
            .bind(form.contract_from_date)
            .bind(form.contract_to_date)
            .execute(&mut *tx)
            .await?;
        }

        let info = &form.st_info;
        sqlx::query(
            r#"
            INSERT INTO cm_st_info (
                st_contract_id, agent_company, agent_person, cancellation_charge,
                payment_infor, deposit_infor, special_req
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (st_contract_id) DO UPDATE
            SET agent_company = EXCLUDED.agent_company,
                agent_person = EXCLUDED.agent_person,
                cancellation_charge = EXCLUDED.cancellation_charge,
                payment_infor = EXCLUDED.payment_infor,
                deposit_infor = EXCLUDED.deposit_infor,
                special_req = EXCLUDED.special_req
            "#,
        )
        .bind(contract_id)
        .bind(info.agent_company.filter(|id| *id > 0))
        .bind(info.agent_person.filter(|id| *id > 0))
        .bind(&info.cancellation_charge)
        .bind(&info.payment_infor)
        .bind(&info.deposit_infor)
        .bind(&info.special_req)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(contract_id)
    }

    /// 区间内与该公寓重叠的未取消合同：(短租重叠, 长租重叠)
    pub async fn overlaps(
        &self,
        apartment_no: &str,
        from: NaiveDate,
        to: NaiveDate,
        exclude_id: i32,
    ) -> Result<(bool, bool), AppError> {
        let overlaps: (bool, bool) = sqlx::query_as(
            r#"
            SELECT COALESCE(BOOL_OR(c.is_short_term), FALSE),
                   COALESCE(BOOL_OR(NOT c.is_short_term), FALSE)
            FROM cm_contract c
            LEFT JOIN cm_contract_apmt ca ON ca.contract_id = c.contract_id
            WHERE c.contract_status <> $5
              AND c.contract_id <> $4
              AND TRIM(COALESCE(ca.apartment_no, c.current_apartment_no)) = TRIM($1)
              AND COALESCE(ca.from_date, c.contract_from_date) <= $3
              AND COALESCE(ca.to_date, c.contract_to_date) >= $2
            "#,
        )
        .bind(apartment_no)
        .bind(from)
        .bind(to)
        .bind(exclude_id)
        .bind(CONTRACT_STATUS_CANCELLED)
        .fetch_one(&self.db)
        .await?;
        Ok(overlaps)
    }

    pub async fn contract_services(&self, contract_id: i32) -> Result<Vec<ContractServiceRow>, AppError> {
        let rows = sqlx::query_as::<_, ContractServiceRow>(
            r#"
            SELECT cs.contract_service_id, s.service_name, cs.service_from_date, cs.service_to_date,
                   ci.charge_interval_name, ct.charge_type_name, cs.max_quantity, cs.notes
            FROM cm_contract_service cs
            JOIN sv_service_list s ON s.service_id = cs.service_id
            LEFT JOIN sv_charge_interval ci ON ci.charge_interval_id = cs.charge_interval
            LEFT JOIN sv_charge_type ct ON ct.charge_type_id = cs.charge_type
            WHERE cs.contract_id = $1
            ORDER BY cs.contract_service_id
            "#,
        )
        .bind(contract_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    pub async fn insert_service(&self, form: &ContractServiceForm) -> Result<i64, AppError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO cm_contract_service (
                contract_id, service_id, service_from_date, service_to_date,
                charge_interval, charge_type, max_quantity, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING contract_service_id
            "#,
        )
        .bind(form.contract_id)
        .bind(form.service_id)
        .bind(form.service_from_date)
        .bind(form.service_to_date)
        .bind(form.charge_interval)
        .bind(form.charge_type)
        .bind(form.max_quantity)
        .bind(&form.notes)
        .fetch_one(&self.db)
        .await?;
        Ok(id)
    }

    pub async fn short_term_exists(&self, contract_id: i32) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM cm_contract WHERE contract_id = $1 AND is_short_term = TRUE)",
        )
        .bind(contract_id)
        .fetch_one(&self.db)
        .await?;
        Ok(exists)
    }
}
