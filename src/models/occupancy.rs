//! Occupancy calendar models

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::common::DateRange;

/// Widest calendar the page renders
pub const MAX_CALENDAR_DAYS: usize = 101;
const DEFAULT_SPAN_DAYS: i64 = 30;
const DEFAULT_BACK_COLOR: &str = "#ffffff";
const DEFAULT_FORE_COLOR: &str = "#000000";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OccupancyQuery {
    /// `dd/MM/yyyy - dd/MM/yyyy`
    pub date_range: Option<String>,
    /// Occupancy type id or `all`
    pub status: Option<String>,
}

/// Occupancy type filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "occ_type_id")]
pub enum StatusFilter {
    All,
    /// Type 0: rooms without any occupancy in the period
    NotOccupied,
    Type(i32),
}

impl StatusFilter {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim).and_then(|r| r.parse::<i32>().ok()) {
            Some(0) => StatusFilter::NotOccupied,
            Some(id) if id > 0 => StatusFilter::Type(id),
            _ => StatusFilter::All,
        }
    }
}

/// Inclusive period shown by the calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Period {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl Period {
    pub fn default_from(today: NaiveDate) -> Self {
        Self {
            from: today,
            to: today + Duration::days(DEFAULT_SPAN_DAYS),
        }
    }

    /// Falls back to today..+30 days when the range is missing or unusable
    pub fn parse(raw: Option<&str>, today: NaiveDate) -> Self {
        match DateRange::parse(raw) {
            DateRange {
                from: Some(from),
                to: Some(to),
            } if from <= to => Self { from, to },
            _ => Self::default_from(today),
        }
    }

    /// Calendar columns, capped at [`MAX_CALENDAR_DAYS`]
    pub fn days(&self) -> Vec<NaiveDate> {
        self.from
            .iter_days()
            .take_while(|d| *d <= self.to)
            .take(MAX_CALENDAR_DAYS)
            .collect()
    }

    pub fn label(&self) -> String {
        DateRange::format(self.from, self.to)
    }
}

/// Win32 `COLORREF` (0x00BBGGRR) to `#RRGGBB`; missing or out-of-range values are white
pub fn win32_to_hex(color: Option<i64>) -> String {
    match color {
        Some(c) if (0..=0x00FF_FFFF).contains(&c) => {
            let r = c & 0xFF;
            let g = (c >> 8) & 0xFF;
            let b = (c >> 16) & 0xFF;
            format!("#{:02X}{:02X}{:02X}", r, g, b)
        }
        _ => DEFAULT_BACK_COLOR.to_string(),
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OccTypeRow {
    pub occ_type_id: i32,
    pub status_name: String,
    pub occ_type_name: String,
    pub back_color: Option<i64>,
    pub fore_color: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OccupancyType {
    pub occ_type_id: i32,
    pub status_name: String,
    pub occ_type_name: String,
    pub back_color: String,
    pub fore_color: String,
}

impl OccupancyType {
    pub fn not_occupied() -> Self {
        Self {
            occ_type_id: 0,
            status_name: "NO".to_string(),
            occ_type_name: "Not Occupied".to_string(),
            back_color: DEFAULT_BACK_COLOR.to_string(),
            fore_color: DEFAULT_FORE_COLOR.to_string(),
        }
    }
}

impl From<OccTypeRow> for OccupancyType {
    fn from(row: OccTypeRow) -> Self {
        Self {
            occ_type_id: row.occ_type_id,
            status_name: row.status_name,
            occ_type_name: row.occ_type_name,
            back_color: win32_to_hex(row.back_color),
            fore_color: win32_to_hex(row.fore_color),
        }
    }
}

/// One apartment joined to at most one of its occupancies
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RoomOccupancyRow {
    pub apartment_no: String,
    pub double_beds: i32,
    pub is_remodeling: bool,
    pub is_refresh: bool,
    pub timber_floor: bool,
    pub occ_type_id: Option<i32>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub status_name: Option<String>,
    pub back_color: Option<i64>,
    pub fore_color: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OccupancySpan {
    pub occ_type_id: i32,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub status_name: String,
    pub back_color: String,
    pub fore_color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Room {
    pub apartment_no: String,
    pub double_beds: i32,
    pub is_remodeling: bool,
    pub is_refresh: bool,
    pub timber_floor: bool,
    pub occupancies: Vec<OccupancySpan>,
}

/// Group rows (ordered by apartment) into rooms
pub fn group_rooms(rows: Vec<RoomOccupancyRow>) -> Vec<Room> {
    let mut rooms: Vec<Room> = Vec::new();

    for row in rows {
        let span = match (row.occ_type_id, row.from_date, row.to_date) {
            (Some(occ_type_id), Some(from), Some(to)) => Some(OccupancySpan {
                occ_type_id,
                from,
                to,
                status_name: row.status_name.unwrap_or_default(),
                back_color: win32_to_hex(row.back_color),
                fore_color: win32_to_hex(row.fore_color),
            }),
            _ => None,
        };

        let same_room = rooms
            .last()
            .is_some_and(|r| r.apartment_no == row.apartment_no);

        if same_room {
            if let Some(room) = rooms.last_mut() {
                room.occupancies.extend(span);
            }
        } else {
            rooms.push(Room {
                apartment_no: row.apartment_no,
                double_beds: row.double_beds,
                is_remodeling: row.is_remodeling,
                is_refresh: row.is_refresh,
                timber_floor: row.timber_floor,
                occupancies: span.into_iter().collect(),
            });
        }
    }

    rooms
}

/// Keep rooms matching the type filter; typed filters also drop other spans
pub fn apply_filter(rooms: Vec<Room>, filter: StatusFilter) -> Vec<Room> {
    match filter {
        StatusFilter::All => rooms,
        StatusFilter::NotOccupied => rooms.into_iter().filter(|r| r.occupancies.is_empty()).collect(),
        StatusFilter::Type(id) => rooms
            .into_iter()
            .filter_map(|mut room| {
                room.occupancies.retain(|o| o.occ_type_id == id);
                (!room.occupancies.is_empty()).then_some(room)
            })
            .collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OccupancyStats {
    pub total_room_days: i64,
    pub occupied_days: i64,
}

impl OccupancyStats {
    /// Occupied days are counted inside the displayed columns only
    pub fn compute(rooms: &[Room], days: &[NaiveDate]) -> Self {
        let (Some(first), Some(last)) = (days.first(), days.last()) else {
            return Self {
                total_room_days: 0,
                occupied_days: 0,
            };
        };

        let occupied_days = rooms
            .iter()
            .flat_map(|r| r.occupancies.iter())
            .map(|o| {
                let from = o.from.max(*first);
                let to = o.to.min(*last);
                if from > to {
                    0
                } else {
                    (to - from).num_days() + 1
                }
            })
            .sum();

        Self {
            total_room_days: rooms.len() as i64 * days.len() as i64,
            occupied_days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(apartment: &str, span: Option<(i32, NaiveDate, NaiveDate)>) -> RoomOccupancyRow {
        RoomOccupancyRow {
            apartment_no: apartment.to_string(),
            double_beds: 1,
            is_remodeling: false,
            is_refresh: false,
            timber_floor: true,
            occ_type_id: span.map(|s| s.0),
            from_date: span.map(|s| s.1),
            to_date: span.map(|s| s.2),
            status_name: span.map(|_| "ST".to_string()),
            back_color: Some(0x0000FF),
            fore_color: None,
        }
    }

    #[test]
    fn test_win32_color_conversion() {
        assert_eq!(win32_to_hex(Some(0x0000FF)), "#FF0000");
        assert_eq!(win32_to_hex(Some(0x00FF00)), "#00FF00");
        assert_eq!(win32_to_hex(Some(0xFF0000)), "#0000FF");
        assert_eq!(win32_to_hex(Some(0x123456)), "#563412");
        assert_eq!(win32_to_hex(None), "#ffffff");
        assert_eq!(win32_to_hex(Some(-1)), "#ffffff");
        assert_eq!(win32_to_hex(Some(0x1000000)), "#ffffff");
    }

    #[test]
    fn test_period_defaults_and_fallback() {
        let today = date(2025, 6, 1);
        assert_eq!(Period::parse(None, today), Period::default_from(today));
        assert_eq!(Period::parse(Some("garbage"), today).to, date(2025, 7, 1));
        assert_eq!(
            Period::parse(Some("10/06/2025 - 01/06/2025"), today),
            Period::default_from(today)
        );

        let p = Period::parse(Some("01/06/2025 - 05/06/2025"), today);
        assert_eq!(p.days().len(), 5);
    }

    #[test]
    fn test_days_capped() {
        let p = Period {
            from: date(2025, 1, 1),
            to: date(2025, 12, 31),
        };
        let days = p.days();
        assert_eq!(days.len(), MAX_CALENDAR_DAYS);
        assert_eq!(days[0], date(2025, 1, 1));
    }

    #[test]
    fn test_status_filter_parse() {
        assert_eq!(StatusFilter::parse(None), StatusFilter::All);
        assert_eq!(StatusFilter::parse(Some("all")), StatusFilter::All);
        assert_eq!(StatusFilter::parse(Some("0")), StatusFilter::NotOccupied);
        assert_eq!(StatusFilter::parse(Some(" 3 ")), StatusFilter::Type(3));
    }

    #[test]
    fn test_group_rooms_and_stats() {
        let rows = vec![
            row("A101", Some((1, date(2025, 6, 1), date(2025, 6, 3)))),
            row("A101", Some((2, date(2025, 6, 8), date(2025, 6, 20)))),
            row("A102", None),
        ];
        let rooms = group_rooms(rows);
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0].occupancies.len(), 2);
        assert_eq!(rooms[0].occupancies[0].back_color, "#FF0000");
        assert!(rooms[1].occupancies.is_empty());

        let period = Period {
            from: date(2025, 6, 1),
            to: date(2025, 6, 10),
        };
        let stats = OccupancyStats::compute(&rooms, &period.days());
        assert_eq!(stats.total_room_days, 20);
        // 3 天 + 6 月 8-10 日的 3 天
        assert_eq!(stats.occupied_days, 6);
    }

    #[test]
    fn test_apply_filter() {
        let rows = vec![
            row("A101", Some((1, date(2025, 6, 1), date(2025, 6, 3)))),
            row("A101", Some((2, date(2025, 6, 8), date(2025, 6, 20)))),
            row("A102", None),
        ];

        let typed = apply_filter(group_rooms(rows.clone()), StatusFilter::Type(2));
        assert_eq!(typed.len(), 1);
        assert_eq!(typed[0].occupancies.len(), 1);

        let free = apply_filter(group_rooms(rows.clone()), StatusFilter::NotOccupied);
        assert_eq!(free.len(), 1);
        assert_eq!(free[0].apartment_no, "A102");

        assert_eq!(apply_filter(group_rooms(rows), StatusFilter::All).len(), 2);
    }
}
