//! 入住日历

use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::{
    error::AppError,
    models::occupancy::*,
    repository::occupancy_repo::OccupancyRepository,
};

#[derive(Debug, Serialize)]
pub struct OccupancyCalendar {
    pub date_range: String,
    pub period: Period,
    pub days: Vec<NaiveDate>,
    pub occupancy_types: Vec<OccupancyType>,
    pub selected_status: StatusFilter,
    pub rooms: Vec<Room>,
    pub stats: OccupancyStats,
    pub can_make_short_term_reservation: bool,
}

pub struct OccupancyService {
    repo: OccupancyRepository,
}

impl OccupancyService {
    pub fn new(repo: OccupancyRepository) -> Self {
        Self { repo }
    }

    pub async fn calendar(
        &self,
        query: &OccupancyQuery,
        can_make_short_term_reservation: bool,
    ) -> Result<OccupancyCalendar, AppError> {
        let period = Period::parse(query.date_range.as_deref(), Local::now().date_naive());
        let days = period.days();
        let selected_status = StatusFilter::parse(query.status.as_deref());

        let occupancy_types = std::iter::once(OccupancyType::not_occupied())
            .chain(self.repo.occupancy_types().await?.into_iter().map(OccupancyType::from))
            .collect();

        let rooms = apply_filter(group_rooms(self.repo.rooms(&period).await?), selected_status);
        let stats = OccupancyStats::compute(&rooms, &days);

        tracing::debug!(
            from = %period.from,
            to = %period.to,
            rooms = rooms.len(),
            "Occupancy calendar built"
        );

        Ok(OccupancyCalendar {
            date_range: period.label(),
            period,
            days,
            occupancy_types,
            selected_status,
            rooms,
            stats,
            can_make_short_term_reservation,
        })
    }
}
