use chrono::NaiveDate;
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{
        common::{IdNameRow, SelectOption},
        lookup::{LookupType, LOOKUP_LIMIT},
    },
};

pub struct LookupRepository {
    db: PgPool,
}

impl LookupRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 按关键字过滤的前 20 条 `{id, text}`
    pub async fn search(
        &self,
        kind: LookupType,
        pattern: &str,
        today: NaiveDate,
    ) -> Result<Vec<SelectOption>, AppError> {
        let rows = match kind {
            LookupType::Company => {
                sqlx::query_as::<_, IdNameRow>(
                    r#"
                    SELECT company_id AS id, company_name AS name FROM cm_company
                    WHERE company_name ILIKE $1
                    ORDER BY company_name
                    LIMIT $2
                    "#,
                )
                .bind(pattern)
                .bind(LOOKUP_LIMIT)
                .fetch_all(&self.db)
                .await?
            }
            LookupType::Apartment => {
                sqlx::query_as::<_, IdNameRow>(
                    r#"
                    SELECT apmt_id AS id, apartment_no AS name FROM am_apmt
                    WHERE apartment_no ILIKE $1 AND exist_from <= $3 AND exist_to >= $3
                    ORDER BY apartment_no
                    LIMIT $2
                    "#,
                )
                .bind(pattern)
                .bind(LOOKUP_LIMIT)
                .bind(today)
                .fetch_all(&self.db)
                .await?
            }
            LookupType::ContractStatus => {
                sqlx::query_as::<_, IdNameRow>(
                    r#"
                    SELECT status_id AS id, status_name AS name FROM cm_contract_status
                    WHERE status_name ILIKE $1
                    ORDER BY status_name
                    LIMIT $2
                    "#,
                )
                .bind(pattern)
                .bind(LOOKUP_LIMIT)
                .fetch_all(&self.db)
                .await?
            }
        };

        Ok(rows.into_iter().map(SelectOption::from).collect())
    }
}
