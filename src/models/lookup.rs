//! Select2 lookup types

use serde::Deserialize;
use std::str::FromStr;

use crate::error::AppError;

/// Rows returned per lookup
pub const LOOKUP_LIMIT: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupType {
    Company,
    Apartment,
    ContractStatus,
}

impl FromStr for LookupType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "company" => Ok(Self::Company),
            "apartment" => Ok(Self::Apartment),
            "contractstatus" => Ok(Self::ContractStatus),
            _ => Err(AppError::BadRequest(format!("Unknown lookup type: {}", s.trim()))),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupQuery {
    pub term: Option<String>,
}

impl LookupQuery {
    /// `ILIKE` pattern; `%` and `_` typed by the user match literally
    pub fn pattern(&self) -> String {
        let term = self.term.as_deref().map(str::trim).unwrap_or_default();
        let escaped = term
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        format!("%{}%", escaped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_type_whitelist() {
        assert_eq!("company".parse::<LookupType>().unwrap(), LookupType::Company);
        assert_eq!("Apartment".parse::<LookupType>().unwrap(), LookupType::Apartment);
        assert_eq!(
            "ContractStatus".parse::<LookupType>().unwrap(),
            LookupType::ContractStatus
        );
        assert!(matches!("employee".parse::<LookupType>(), Err(AppError::BadRequest(_))));
        assert!("".parse::<LookupType>().is_err());
    }

    #[test]
    fn test_pattern_escapes_wildcards() {
        let q = |t: Option<&str>| LookupQuery { term: t.map(str::to_string) };
        assert_eq!(q(None).pattern(), "%%");
        assert_eq!(q(Some(" A12 ")).pattern(), "%A12%");
        assert_eq!(q(Some("50%_off")).pattern(), "%50\\%\\_off%");
    }
}
