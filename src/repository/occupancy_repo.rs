//! Occupancy repository (入住日历数据访问)

use sqlx::PgPool;

use crate::{
    error::AppError,
    models::occupancy::{OccTypeRow, Period, RoomOccupancyRow},
};

pub struct OccupancyRepository {
    db: PgPool,
}

impl OccupancyRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn occupancy_types(&self) -> Result<Vec<OccTypeRow>, AppError> {
        let rows = sqlx::query_as::<_, OccTypeRow>(
            r#"
            SELECT occ_type_id, status_name, occ_type_name, back_color, fore_color
            FROM am_occ_type
            ORDER BY occ_type_id
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    /// 期间内存在的公寓及其与期间重叠的入住记录，按公寓号排序
    pub async fn rooms(&self, period: &Period) -> Result<Vec<RoomOccupancyRow>, AppError> {
        let rows = sqlx::query_as::<_, RoomOccupancyRow>(
            r#"
            SELECT a.apartment_no, a.double_beds, a.is_remodeling, a.is_refresh, a.timber_floor,
                   o.occ_type_id, o.from_date, o.to_date, t.status_name,
                   t.back_color, t.fore_color
            FROM am_apmt a
            LEFT JOIN am_occupancy o
                   ON o.apmt_id = a.apmt_id AND o.from_date <= $2 AND o.to_date >= $1
            LEFT JOIN am_occ_type t ON t.occ_type_id = o.occ_type_id
            WHERE a.exist_from <= $2 AND a.exist_to >= $1
            ORDER BY a.apartment_no, o.from_date
            "#,
        )
        .bind(period.from)
        .bind(period.to)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}
