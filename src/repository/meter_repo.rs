//! Meter reading repository (抄表数据访问)

use sqlx::PgPool;

use crate::{
    error::AppError,
    models::meter::{MeterMonth, MeterReading},
};

const READING_COLUMNS: &str = r#"
    r.id, r.file_name, r.the_month, r.the_year, r.user_code, r.apartment_code,
    r.electric_index, r.raw_text, r.is_recognized, a.floor_no, a.block_no
"#;

pub struct MeterRepository {
    db: PgPool,
}

impl MeterRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn insert(
        &self,
        file_name: &str,
        month: MeterMonth,
        user_code: &str,
    ) -> Result<i64, AppError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO pw_meter_reading (file_name, the_month, the_year, user_code)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(file_name)
        .bind(month.month as i32)
        .bind(month.year)
        .bind(user_code)
        .fetch_one(&self.db)
        .await?;
        Ok(id)
    }

    /// 当月读数，按楼层、楼栋排序
    pub async fn for_month(&self, month: MeterMonth) -> Result<Vec<MeterReading>, AppError> {
        let sql = format!(
            r#"
            SELECT {READING_COLUMNS}
            FROM pw_meter_reading r
            LEFT JOIN am_apmt a ON TRIM(a.apartment_no) = TRIM(r.apartment_code)
            WHERE r.the_month = $1 AND r.the_year = $2
            ORDER BY a.floor_no NULLS LAST, a.block_no NULLS LAST, r.id
            "#
        );
        let rows = sqlx::query_as::<_, MeterReading>(&sql)
            .bind(month.month as i32)
            .bind(month.year)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    pub async fn by_ids(&self, ids: &[i64]) -> Result<Vec<MeterReading>, AppError> {
        let sql = format!(
            r#"
            SELECT {READING_COLUMNS}
            FROM pw_meter_reading r
            LEFT JOIN am_apmt a ON TRIM(a.apartment_no) = TRIM(r.apartment_code)
            WHERE r.id = ANY($1)
            ORDER BY r.id
            "#
        );
        let rows = sqlx::query_as::<_, MeterReading>(&sql)
            .bind(ids)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    pub async fn save_recognition(
        &self,
        id: i64,
        apartment_code: Option<&str>,
        electric_index: Option<i64>,
        raw_text: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE pw_meter_reading
            SET apartment_code = $2, electric_index = $3, raw_text = $4, is_recognized = TRUE
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(apartment_code)
        .bind(electric_index)
        .bind(raw_text)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    pub async fn update(
        &self,
        id: i64,
        apartment_code: Option<&str>,
        electric_index: Option<i64>,
        raw_text: Option<&str>,
        file_name: &str,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE pw_meter_reading
            SET apartment_code = $2, electric_index = $3, raw_text = $4, file_name = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(apartment_code)
        .bind(electric_index)
        .bind(raw_text)
        .bind(file_name)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }
}
