//! Supplier repository (供应商数据访问)

use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    error::AppError,
    models::{
        common::{IdNameRow, Paging},
        supplier::*,
    },
};

const LIST_COLUMNS: &str = r#"
    SELECT s.supplier_id, s.supplier_code, s.supplier_name, s.address, s.phone, s.mobile,
           s.fax, s.contact, s.position, s.business, s.approved_date, s.document,
           s.certificate, s.service, s.comment, s.is_new, s.code_of_acc, s.dept_id,
           d.dept_code, st.status_name, s.status
"#;

const DETAIL_COLUMNS: &str = r#"
    supplier_id, supplier_code, supplier_name, address, phone, mobile, fax, contact,
    position, business, approved_date, document, certificate, service, comment,
    is_new, code_of_acc, dept_id, status, is_deleted
"#;

/// One page of list results
#[derive(Debug)]
pub struct SupplierPage {
    pub rows: Vec<SupplierListRow>,
    pub total: i64,
    pub paging: Paging,
}

pub struct SupplierRepository {
    db: PgPool,
}

impl SupplierRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn source_table(mode: ViewMode) -> &'static str {
        match mode {
            ViewMode::Current => "pc_supplier",
            ViewMode::ByYear => "pc_supplier_annual",
        }
    }

    fn push_from_where(qb: &mut QueryBuilder<'_, Postgres>, criteria: &SupplierCriteria) {
        qb.push(" FROM ")
            .push(Self::source_table(criteria.view_mode))
            .push(
                " s LEFT JOIN pc_supplier_status st ON s.status = st.status_id \
                 LEFT JOIN ms_department d ON s.dept_id = d.dept_id WHERE 1=1",
            );

        match criteria.view_mode {
            ViewMode::Current => {
                qb.push(" AND s.is_deleted = FALSE");
            }
            ViewMode::ByYear => {
                if let Some(year) = criteria.year {
                    qb.push(" AND s.for_year = ").push_bind(year);
                }
            }
        }

        for (column, value) in [
            ("s.supplier_code", &criteria.supplier_code),
            ("s.supplier_name", &criteria.supplier_name),
            ("s.business", &criteria.business),
            ("s.contact", &criteria.contact),
        ] {
            if let Some(v) = value {
                qb.push(" AND ")
                    .push(column)
                    .push(" ILIKE ")
                    .push_bind(format!("%{}%", v));
            }
        }

        if let Some(dept_id) = criteria.dept_id {
            qb.push(" AND s.dept_id = ").push_bind(dept_id);
        }
        if let Some(status_id) = criteria.status_id {
            qb.push(" AND s.status = ").push_bind(status_id);
        }
        if criteria.is_new {
            qb.push(" AND s.is_new = TRUE");
        }
    }

    async fn count(&self, criteria: &SupplierCriteria) -> Result<i64, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(1)");
        Self::push_from_where(&mut qb, criteria);
        let total: i64 = qb.build_query_scalar().fetch_one(&self.db).await?;
        Ok(total)
    }

    async fn fetch_rows(
        &self,
        criteria: &SupplierCriteria,
        paging: Option<Paging>,
    ) -> Result<Vec<SupplierListRow>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new(LIST_COLUMNS);
        Self::push_from_where(&mut qb, criteria);
        qb.push(" ORDER BY s.supplier_id DESC");

        if let Some(paging) = paging {
            qb.push(" LIMIT ")
                .push_bind(paging.page_size)
                .push(" OFFSET ")
                .push_bind(paging.offset());
        }

        let rows = qb.build_query_as::<SupplierListRow>().fetch_all(&self.db).await?;
        Ok(rows)
    }

    /// 分页查询；页码超出范围时回退到最后一页
    pub async fn search(&self, criteria: &SupplierCriteria) -> Result<SupplierPage, AppError> {
        let total = self.count(criteria).await?;
        let paging = criteria.paging.clamp_to(total);
        let rows = self.fetch_rows(criteria, Some(paging)).await?;

        Ok(SupplierPage { rows, total, paging })
    }

    /// 不分页，供导出使用
    pub async fn search_all(&self, criteria: &SupplierCriteria) -> Result<Vec<SupplierListRow>, AppError> {
        self.fetch_rows(criteria, None).await
    }

    /// 供应商所属部门；外层 None 表示记录不存在
    pub async fn department_of(
        &self,
        supplier_id: i32,
        mode: ViewMode,
        year: Option<i32>,
    ) -> Result<Option<Option<i32>>, AppError> {
        let dept = match mode {
            ViewMode::Current => {
                sqlx::query_scalar::<_, Option<i32>>(
                    "SELECT dept_id FROM pc_supplier WHERE supplier_id = $1",
                )
                .bind(supplier_id)
                .fetch_optional(&self.db)
                .await?
            }
            ViewMode::ByYear => {
                sqlx::query_scalar::<_, Option<i32>>(
                    "SELECT dept_id FROM pc_supplier_annual WHERE supplier_id = $1 AND for_year = $2",
                )
                .bind(supplier_id)
                .bind(year)
                .fetch_optional(&self.db)
                .await?
            }
        };

        Ok(dept)
    }

    pub async fn state(&self, supplier_id: i32) -> Result<Option<SupplierState>, AppError> {
        let state = sqlx::query_as::<_, SupplierState>(
            "SELECT supplier_id, dept_id, status, is_deleted FROM pc_supplier WHERE supplier_id = $1",
        )
        .bind(supplier_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(state)
    }

    /// 复制当前供应商到年度表，已复制过的跳过，返回新增行数
    pub async fn copy_to_year(&self, year: i32, supplier_ids: &[i32]) -> Result<u64, AppError> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO pc_supplier_annual (
                supplier_id, for_year, supplier_code, supplier_name, address, phone, mobile, fax,
                contact, position, business, approved_date, document, certificate, service,
                comment, is_new, code_of_acc, dept_id, status, is_deleted,
                purchaser_code, purchaser_prepared_date, purchaser_cpt,
                department_code, department_approve_date, department_cpt,
                financial_code, financial_approve_date, financial_cpt,
                bod_code, bod_approve_date, bod_cpt
            )
            SELECT
                s.supplier_id, $1, s.supplier_code, s.supplier_name, s.address, s.phone, s.mobile, s.fax,
                s.contact, s.position, s.business, s.approved_date, s.document, s.certificate, s.service,
                s.comment, s.is_new, s.code_of_acc, s.dept_id, s.status, s.is_deleted,
                s.purchaser_code, s.purchaser_prepared_date, s.purchaser_cpt,
                s.department_code, s.department_approve_date, s.department_cpt,
                s.financial_code, s.financial_approve_date, s.financial_cpt,
                s.bod_code, s.bod_approve_date, s.bod_cpt
            FROM pc_supplier s
            WHERE s.supplier_id = ANY($2)
              AND NOT EXISTS (
                  SELECT 1 FROM pc_supplier_annual a
                  WHERE a.supplier_id = s.supplier_id AND a.for_year = $1
              )
            "#,
        )
        .bind(year)
        .bind(supplier_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    pub async fn detail(&self, supplier_id: i32) -> Result<Option<SupplierDetail>, AppError> {
        let sql = format!("SELECT {} FROM pc_supplier WHERE supplier_id = $1", DETAIL_COLUMNS);
        let detail = sqlx::query_as::<_, SupplierDetail>(&sql)
            .bind(supplier_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(detail)
    }

    pub async fn annual_detail(
        &self,
        supplier_id: i32,
        year: i32,
    ) -> Result<Option<SupplierDetail>, AppError> {
        let sql = format!(
            "SELECT {} FROM pc_supplier_annual WHERE supplier_id = $1 AND for_year = $2",
            DETAIL_COLUMNS
        );
        let detail = sqlx::query_as::<_, SupplierDetail>(&sql)
            .bind(supplier_id)
            .bind(year)
            .fetch_optional(&self.db)
            .await?;

        Ok(detail)
    }

    /// 四个审批环节的记录，按提交、部门、财务、董事会顺序
    pub async fn approval_history(
        &self,
        supplier_id: i32,
        year: Option<i32>,
    ) -> Result<Vec<ApprovalHistoryEntry>, AppError> {
        let (table, year_filter) = match year {
            Some(_) => ("pc_supplier_annual", " AND for_year = $2"),
            None => ("pc_supplier", ""),
        };

        let sql = format!(
            r#"
            WITH src AS (SELECT * FROM {table} WHERE supplier_id = $1{year_filter}),
            history AS (
                SELECT 1 AS step, 'Purchasing Officer submitted' AS action,
                       purchaser_code AS user_code, purchaser_prepared_date AS action_date FROM src
                UNION ALL
                SELECT 2, 'Head Department approved/dis', department_code, department_approve_date FROM src
                UNION ALL
                SELECT 3, 'Head Financial approved/dis', financial_code, financial_approve_date FROM src
                UNION ALL
                SELECT 4, 'BOD approved/dis', bod_code, bod_approve_date FROM src
            )
            SELECT h.action,
                   COALESCE(NULLIF(e.employee_name, ''), h.user_code, '') AS user_name,
                   h.action_date
            FROM history h
            LEFT JOIN ms_employee e ON e.employee_code = h.user_code
            ORDER BY h.step
            "#
        );

        let mut query = sqlx::query_as::<_, ApprovalHistoryEntry>(&sql).bind(supplier_id);
        if let Some(year) = year {
            query = query.bind(year);
        }

        Ok(query.fetch_all(&self.db).await?)
    }

    pub async fn code_exists(&self, code: &str, exclude_id: Option<i32>) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM pc_supplier
                WHERE TRIM(supplier_code) = TRIM($1)
                  AND ($2::INT IS NULL OR supplier_id <> $2)
            )
            "#,
        )
        .bind(code)
        .bind(exclude_id)
        .fetch_one(&self.db)
        .await?;

        Ok(exists)
    }

    /// 下一个 `SP` 编码
    pub async fn suggested_code(&self) -> Result<String, AppError> {
        let (max_no, width): (Option<i64>, Option<i32>) = sqlx::query_as(
            r#"
            SELECT MAX(SUBSTRING(TRIM(supplier_code) FROM 3)::BIGINT),
                   MAX(LENGTH(TRIM(supplier_code)) - 2)
            FROM pc_supplier
            WHERE UPPER(TRIM(supplier_code)) ~ '^SP[0-9]{1,18}$'
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        Ok(suggest_supplier_code(max_no, width))
    }

    pub async fn create(
        &self,
        form: &SupplierForm,
        code: &str,
        status: i32,
        operator_code: &str,
    ) -> Result<i32, AppError> {
        let submitted = status == STATUS_SUBMITTED;
        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO pc_supplier (
                supplier_code, supplier_name, address, phone, mobile, fax, contact, position,
                business, document, certificate, service, comment, is_new, code_of_acc, dept_id,
                status, purchaser_code, purchaser_prepared_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    CASE WHEN $18 THEN $19 END, CASE WHEN $18 THEN NOW() END)
            RETURNING supplier_id
            "#,
        )
        .bind(code)
        .bind(&form.supplier_name)
        .bind(&form.address)
        .bind(&form.phone)
        .bind(&form.mobile)
        .bind(&form.fax)
        .bind(&form.contact)
        .bind(&form.position)
        .bind(&form.business)
        .bind(form.document)
        .bind(&form.certificate)
        .bind(&form.service)
        .bind(&form.comment)
        .bind(form.is_new)
        .bind(&form.code_of_acc)
        .bind(form.dept_id)
        .bind(status)
        .bind(submitted)
        .bind(operator_code)
        .fetch_one(&self.db)
        .await?;

        Ok(id)
    }

    pub async fn update(&self, supplier_id: i32, form: &SupplierForm, code: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE pc_supplier
            SET supplier_code = $2, supplier_name = $3, address = $4, phone = $5, mobile = $6,
                fax = $7, contact = $8, position = $9, business = $10, document = $11,
                certificate = $12, service = $13, comment = $14, is_new = $15,
                code_of_acc = $16, dept_id = $17
            WHERE supplier_id = $1
            "#,
        )
        .bind(supplier_id)
        .bind(code)
        .bind(&form.supplier_name)
        .bind(&form.address)
        .bind(&form.phone)
        .bind(&form.mobile)
        .bind(&form.fax)
        .bind(&form.contact)
        .bind(&form.position)
        .bind(&form.business)
        .bind(form.document)
        .bind(&form.certificate)
        .bind(&form.service)
        .bind(&form.comment)
        .bind(form.is_new)
        .bind(&form.code_of_acc)
        .bind(form.dept_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    pub async fn submit_approval(&self, supplier_id: i32, operator_code: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE pc_supplier
            SET status = 1, purchaser_code = $2, purchaser_prepared_date = NOW()
            WHERE supplier_id = $1
            "#,
        )
        .bind(supplier_id)
        .bind(operator_code)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// 退回准备状态并清空全部审批记录
    pub async fn reset_to_preparing(&self, supplier_id: i32) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE pc_supplier
            SET status = 0, approved_date = NULL,
                purchaser_code = NULL, purchaser_prepared_date = NULL, purchaser_cpt = NULL,
                department_code = NULL, department_approve_date = NULL, department_cpt = NULL,
                financial_code = NULL, financial_approve_date = NULL, financial_cpt = NULL,
                bod_code = NULL, bod_approve_date = NULL, bod_cpt = NULL
            WHERE supplier_id = $1
            "#,
        )
        .bind(supplier_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    pub async fn departments(&self) -> Result<Vec<IdNameRow>, AppError> {
        let rows = sqlx::query_as::<_, IdNameRow>(
            "SELECT dept_id AS id, dept_code AS name FROM ms_department ORDER BY dept_code",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    pub async fn statuses(&self) -> Result<Vec<IdNameRow>, AppError> {
        let rows = sqlx::query_as::<_, IdNameRow>(
            "SELECT status_id AS id, status_name AS name FROM pc_supplier_status ORDER BY status_id",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }
}
