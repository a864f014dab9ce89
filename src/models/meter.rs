//! Meter reading models and OCR text parsing

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

use crate::error::AppError;

/// `#A1203#` style apartment marker painted next to the meter
static APARTMENT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#\s*(.*?)\s*#").expect("valid apartment marker regex"));

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{3,}").expect("valid digit regex"));

/// Lines after the marker searched for the index
const INDEX_LOOKAHEAD_LINES: usize = 3;

/// Until this day of the month the previous month is still being read
const READING_BOUNDARY_DAY: u32 = 5;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct MonthQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

/// Reading period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MeterMonth {
    pub month: u32,
    pub year: i32,
}

impl MeterMonth {
    /// Month being read on `today`
    pub fn current(today: NaiveDate) -> Self {
        match (today.day() <= READING_BOUNDARY_DAY, today.month()) {
            (false, month) => Self {
                month,
                year: today.year(),
            },
            (true, 1) => Self {
                month: 12,
                year: today.year() - 1,
            },
            (true, month) => Self {
                month: month - 1,
                year: today.year(),
            },
        }
    }

    /// Missing parts default to the month being read
    pub fn resolve(query: MonthQuery, today: NaiveDate) -> Result<Self, AppError> {
        let current = Self::current(today);
        let month = query.month.unwrap_or(current.month);
        let year = query.year.unwrap_or(current.year);

        if !(1..=12).contains(&month) || !(2000..=9999).contains(&year) {
            return Err(AppError::BadRequest("Invalid month or year.".to_string()));
        }
        Ok(Self { month, year })
    }

    /// Upload sub-directory, `YYYY-MM`
    pub fn folder(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MeterReading {
    pub id: i64,
    pub file_name: String,
    pub the_month: i32,
    pub the_year: i32,
    pub user_code: String,
    pub apartment_code: Option<String>,
    pub electric_index: Option<i64>,
    pub raw_text: Option<String>,
    pub is_recognized: bool,
    pub floor_no: Option<i32>,
    pub block_no: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecognizeRequest {
    #[serde(default)]
    pub ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterUpdate {
    pub id: i64,
    pub apartment_code: Option<String>,
    pub electric_index: Option<i64>,
    pub raw_text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAllRequest {
    #[serde(default)]
    pub records: Vec<MeterUpdate>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailRequest {
    #[validate(email(message = "Please enter a valid email address."))]
    pub email: String,
    #[validate(length(min = 1, message = "File name is required."))]
    pub file_name: String,
    pub apartment: Option<String>,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

/// What the OCR text says about one photo
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedReading {
    pub apartment_code: Option<String>,
    pub electric_index: Option<i64>,
}

/// Digits of one OCR line without leading zeros; an all-zero line has no index
fn line_index(line: &str) -> Option<i64> {
    let digits: String = line.chars().filter(char::is_ascii_digit).collect();
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse().ok()
}

/// Find the `#apartment#` marker and the index digits on one of the next three
/// non-empty lines. Only text without a marker falls back to the longest run of
/// 3+ digits.
pub fn extract_reading(text: &str) -> ExtractedReading {
    let lines: Vec<&str> = text.split(['\r', '\n']).filter(|l| !l.trim().is_empty()).collect();

    let marker = lines.iter().enumerate().find_map(|(i, line)| {
        APARTMENT_MARKER
            .captures(line.trim())
            .and_then(|c| c.get(1))
            .map(|m| (i, m.as_str().trim().to_string()))
    });

    if let Some((line_no, apartment)) = marker {
        return ExtractedReading {
            apartment_code: Some(apartment).filter(|a| !a.is_empty()),
            electric_index: lines
                .iter()
                .skip(line_no + 1)
                .take(INDEX_LOOKAHEAD_LINES)
                .find_map(|line| line_index(line)),
        };
    }

    // 同样长度取第一个
    let longest = DIGIT_RUN
        .find_iter(text)
        .map(|m| m.as_str())
        .fold(None, |longest: Option<&str>, run| match longest {
            Some(l) if l.len() >= run.len() => Some(l),
            _ => Some(run),
        });

    ExtractedReading {
        apartment_code: None,
        electric_index: longest.and_then(|digits| digits.parse().ok()),
    }
}

/// Keep only the file name part and characters safe on every filesystem
pub fn sanitize_file_name(original: &str) -> String {
    let name = Path::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("meter");

    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();

    if cleaned.trim_matches(['.', '_']).is_empty() {
        "meter".to_string()
    } else {
        cleaned
    }
}

/// Stored name of a processed upload; the photo is always re-encoded as JPEG
pub fn stored_file_name(id: &str, original: &str) -> String {
    let sanitized = sanitize_file_name(original);
    let stem = Path::new(&sanitized)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("meter");
    format!("{}_{}.jpg", id, stem)
}

/// `{apartment}{ext}` when the photo is not named after its apartment yet
pub fn renamed_file_name(current: &str, apartment: &str) -> Option<String> {
    let apartment = sanitize_file_name(apartment.trim());
    let ext = Path::new(current)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    let target = format!("{}{}", apartment, ext);

    (target != current).then_some(target)
}

pub fn email_subject(apartment: &str, month: MeterMonth) -> String {
    format!("Meter Reading {} - {}/{}", apartment, month.month, month.year)
}

pub fn email_body(apartment: &str, month: MeterMonth) -> String {
    format!(
        "Dear Sir/Madam,\r\n\r\nThis is the end-of-month meter reading.\r\n\r\n\
         Month: {}\r\nYear: {}\r\nApartment: {}\r\n\r\nBest regards.",
        month.month, month.year, apartment
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_marker_and_index() {
        let text = "ELECTRIC METER\n# A1203 #\n0012345\nkWh";
        let r = extract_reading(text);
        assert_eq!(r.apartment_code.as_deref(), Some("A1203"));
        assert_eq!(r.electric_index, Some(12345));
    }

    #[test]
    fn test_extract_index_skips_blank_lines() {
        let text = "#B0501#\n\nkWh\n0 0 4 5 6 7\n999999";
        let r = extract_reading(text);
        assert_eq!(r.apartment_code.as_deref(), Some("B0501"));
        assert_eq!(r.electric_index, Some(4567));

        // 空行不占用向后查找的三行
        let r = extract_reading("#A1#\n\n\n\n42");
        assert_eq!(r.apartment_code.as_deref(), Some("A1"));
        assert_eq!(r.electric_index, Some(42));

        let r = extract_reading("#A1#\r\n   \r\n7788");
        assert_eq!(r.electric_index, Some(7788));
    }

    #[test]
    fn test_extract_all_zero_line_is_skipped() {
        let r = extract_reading("#A1#\n0000\n5321");
        assert_eq!(r.electric_index, Some(5321));

        assert_eq!(extract_reading("##\n0000").electric_index, None);
    }

    #[test]
    fn test_extract_falls_back_to_longest_run() {
        let r = extract_reading("no marker here 12 4567 000123456 89");
        assert_eq!(r.apartment_code, None);
        assert_eq!(r.electric_index, Some(123456));

        let r = extract_reading("SN 4455 and 7788");
        assert_eq!(r.electric_index, Some(4455));
    }

    #[test]
    fn test_extract_marker_without_index_has_no_fallback() {
        // 标记后三行内没有数字，不再取全文最长数字
        let r = extract_reading("#C01#\nkWh\nx\ny\nSN 98765");
        assert_eq!(r.apartment_code.as_deref(), Some("C01"));
        assert_eq!(r.electric_index, None);
    }

    #[test]
    fn test_extract_nothing() {
        assert_eq!(extract_reading("kWh 12"), ExtractedReading::default());
        assert_eq!(extract_reading(""), ExtractedReading::default());
    }

    #[test]
    fn test_current_month_boundary() {
        let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        assert_eq!(MeterMonth::current(day(2025, 3, 2)), MeterMonth { month: 2, year: 2025 });
        assert_eq!(MeterMonth::current(day(2025, 3, 5)), MeterMonth { month: 2, year: 2025 });
        assert_eq!(MeterMonth::current(day(2025, 3, 6)), MeterMonth { month: 3, year: 2025 });
        assert_eq!(MeterMonth::current(day(2025, 1, 1)), MeterMonth { month: 12, year: 2024 });
        assert_eq!(MeterMonth::current(day(2025, 1, 31)), MeterMonth { month: 1, year: 2025 });
    }

    #[test]
    fn test_month_resolution() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        assert_eq!(
            MeterMonth::resolve(MonthQuery::default(), today).unwrap(),
            MeterMonth { month: 2, year: 2025 }
        );
        assert_eq!(
            MeterMonth::resolve(MonthQuery { month: Some(4), year: None }, today).unwrap(),
            MeterMonth { month: 4, year: 2025 }
        );
        assert_eq!(
            MeterMonth::resolve(MonthQuery { month: Some(12), year: Some(2024) }, today).unwrap(),
            MeterMonth { month: 12, year: 2024 }
        );
        assert!(MeterMonth::resolve(MonthQuery { month: Some(13), year: None }, today).is_err());
        assert_eq!(MeterMonth { month: 3, year: 2025 }.folder(), "2025-03");
    }

    #[test]
    fn test_file_names() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("photo 1 (a).png"), "photo_1__a_.png");
        assert_eq!(sanitize_file_name(".."), "meter");
        assert_eq!(stored_file_name("abc", "IMG 001.PNG"), "abc_IMG_001.jpg");

        assert_eq!(renamed_file_name("abc_IMG.jpg", "A1203").as_deref(), Some("A1203.jpg"));
        assert_eq!(renamed_file_name("A1203.jpg", "A1203"), None);
    }

    #[test]
    fn test_email_texts() {
        let month = MeterMonth { month: 5, year: 2025 };
        assert_eq!(email_subject("A1203", month), "Meter Reading A1203 - 5/2025");
        assert!(email_body("A1203", month).contains("Apartment: A1203"));
    }
}
