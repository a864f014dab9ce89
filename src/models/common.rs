//! 页面通用模型：下拉选项、分页、日期区间

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 下拉框 / Select2 选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub id: String,
    pub text: String,
}

impl SelectOption {
    pub fn new(id: impl ToString, text: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            text: text.into(),
        }
    }

    /// "全部" 占位项，值为空串
    pub fn all() -> Self {
        Self::new("", "--- All ---")
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IdNameRow {
    pub id: i32,
    pub name: String,
}

impl From<IdNameRow> for SelectOption {
    fn from(row: IdNameRow) -> Self {
        SelectOption::new(row.id, row.name)
    }
}

pub const DEFAULT_PAGE_SIZE: i64 = 25;
pub const MAX_PAGE_SIZE: i64 = 200;

/// 规范化后的分页参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Paging {
    pub page: i64,
    pub page_size: i64,
}

impl Paging {
    /// 页码 <= 0 取 1，页大小 <= 0 取默认值，且不超过上限
    pub fn normalize(page: Option<i64>, page_size: Option<i64>, default_size: i64) -> Self {
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        let page_size = page_size
            .filter(|s| *s > 0)
            .unwrap_or(default_size)
            .min(MAX_PAGE_SIZE);
        Self { page, page_size }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        if total <= 0 {
            0
        } else {
            (total + self.page_size - 1) / self.page_size
        }
    }

    /// 页码超过总页数时回退到最后一页
    pub fn clamp_to(&self, total: i64) -> Self {
        let last = self.total_pages(total).max(1);
        Self {
            page: self.page.min(last),
            page_size: self.page_size,
        }
    }
}

pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// `dd/MM/yyyy - dd/MM/yyyy` 形式的日期区间，任一端可能解析失败
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
            return Self::default();
        };

        let parts: Vec<&str> = raw.split('-').filter(|p| !p.trim().is_empty()).collect();
        if parts.len() != 2 {
            return Self::default();
        }

        let parse = |s: &str| NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok();
        Self {
            from: parse(parts[0]),
            to: parse(parts[1]),
        }
    }

    pub fn format(from: NaiveDate, to: NaiveDate) -> String {
        format!("{} - {}", from.format(DATE_FORMAT), to.format(DATE_FORMAT))
    }
}

/// 逗号分隔的 id 列表，加上单独传入的 id；只保留正数并去重，保持顺序
pub fn collect_ids(single: Option<i32>, csv: Option<&str>) -> Vec<i32> {
    let mut ids = Vec::new();
    let candidates = single.into_iter().chain(
        csv.unwrap_or_default()
            .split(',')
            .filter_map(|s| s.trim().parse::<i32>().ok()),
    );
    for id in candidates {
        if id > 0 && !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paging_normalize() {
        assert_eq!(
            Paging::normalize(None, None, DEFAULT_PAGE_SIZE),
            Paging { page: 1, page_size: 25 }
        );
        assert_eq!(
            Paging::normalize(Some(-3), Some(0), DEFAULT_PAGE_SIZE),
            Paging { page: 1, page_size: 25 }
        );
        assert_eq!(Paging::normalize(Some(2), Some(500), 10).page_size, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_paging_clamp() {
        let paging = Paging { page: 9, page_size: 25 };
        assert_eq!(paging.total_pages(51), 3);
        assert_eq!(paging.clamp_to(51).page, 3);
        assert_eq!(paging.clamp_to(0).page, 1);
        assert_eq!(paging.clamp_to(51).offset(), 50);
    }

    #[test]
    fn test_date_range_parse() {
        let range = DateRange::parse(Some("01/02/2025 - 28/02/2025"));
        assert_eq!(range.from, NaiveDate::from_ymd_opt(2025, 2, 1));
        assert_eq!(range.to, NaiveDate::from_ymd_opt(2025, 2, 28));

        let range = DateRange::parse(Some("01/02/2025 - garbage"));
        assert!(range.from.is_some());
        assert!(range.to.is_none());

        assert_eq!(DateRange::parse(Some("   ")), DateRange::default());
        assert_eq!(DateRange::parse(None), DateRange::default());
        assert_eq!(DateRange::parse(Some("01/02/2025")), DateRange::default());
    }

    #[test]
    fn test_collect_ids() {
        assert_eq!(collect_ids(Some(3), Some("1, 2,3,-4,x,0,2")), vec![3, 1, 2]);
        assert!(collect_ids(None, None).is_empty());
        assert!(collect_ids(Some(0), Some("")).is_empty());
    }
}
