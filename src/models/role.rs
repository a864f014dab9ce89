//! Identity, permission set and data-scope domain models

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::repository::role_repo::LookupError;

/// Employee code, the login name and the key of every per-employee lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeCode(String);

impl EmployeeCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key under which the allowed-URL list of this employee is cached
    pub fn cache_key(&self) -> String {
        format!("Perm_{}", self.0)
    }
}

impl fmt::Display for EmployeeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authenticated caller, passed explicitly into every permission and scope check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub employee_code: EmployeeCode,
    pub full_name: String,
    /// 0 when the role could not be resolved; role 0 never holds permissions
    pub role_id: i32,
    pub is_admin: bool,
}

impl Identity {
    /// Build an identity from the raw session claim values.
    ///
    /// An unparseable role id resolves to 0 and admin status requires the
    /// exact string `"True"`.
    pub fn from_claim_values(
        employee_code: &str,
        full_name: &str,
        role_id: Option<&str>,
        is_admin_role: Option<&str>,
    ) -> Self {
        Self {
            employee_code: EmployeeCode::new(employee_code),
            full_name: full_name.to_string(),
            role_id: role_id.and_then(|r| r.trim().parse().ok()).unwrap_or(0),
            is_admin: is_admin_role == Some("True"),
        }
    }
}

/// Highest permission number granted to admin roles
pub const ADMIN_SUPERSET_MAX: u16 = 10;

/// Set of page-local permission numbers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PermissionSet(BTreeSet<u16>);

impl PermissionSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every number from 1 through [`ADMIN_SUPERSET_MAX`]
    pub fn admin_superset() -> Self {
        Self((1..=ADMIN_SUPERSET_MAX).collect())
    }

    /// Parse a stored comma-separated permission string such as `"2,3,4,6"`.
    ///
    /// Any empty, non-numeric or zero token rejects the whole string.
    pub fn parse(raw: &str) -> Result<Self, LookupError> {
        let malformed = || LookupError::Malformed {
            raw: raw.to_string(),
        };

        let mut numbers = BTreeSet::new();
        for token in raw.split(',') {
            let number: u16 = token.trim().parse().map_err(|_| malformed())?;
            if number == 0 {
                return Err(malformed());
            }
            numbers.insert(number);
        }

        Ok(Self(numbers))
    }

    pub fn contains(&self, number: u16) -> bool {
        self.0.contains(&number)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<u16> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = u16>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Stored data-scope columns of an employee
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct EmployeeScopeRow {
    pub dept_id: Option<i32>,
    pub see_data_all_dept: bool,
}

/// Which departments' rows an employee may read or change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "dept_id", rename_all = "snake_case")]
pub enum DataScope {
    AllDepartments,
    Department(i32),
    /// No department and no global override: nothing is visible
    Unassigned,
}

impl DataScope {
    /// Scope of a non-admin employee from their stored row (absent row included)
    pub fn from_row(row: Option<&EmployeeScopeRow>) -> Self {
        match row {
            Some(r) if r.see_data_all_dept => DataScope::AllDepartments,
            Some(EmployeeScopeRow {
                dept_id: Some(dept),
                ..
            }) => DataScope::Department(*dept),
            _ => DataScope::Unassigned,
        }
    }

    /// Row-level rule for a record owned by `dept_id`
    pub fn can_access(&self, dept_id: Option<i32>) -> bool {
        match self {
            DataScope::AllDepartments => true,
            DataScope::Department(own) => dept_id == Some(*own),
            DataScope::Unassigned => false,
        }
    }

    /// Department filter to apply to a list query.
    ///
    /// Restricted employees always get their own department regardless of what
    /// they asked for; unassigned employees are refused.
    pub fn department_filter(
        &self,
        requested: Option<i32>,
    ) -> Result<Option<i32>, crate::error::AppError> {
        match self {
            DataScope::AllDepartments => Ok(requested),
            DataScope::Department(own) => Ok(Some(*own)),
            DataScope::Unassigned => Err(crate::error::AppError::Forbidden),
        }
    }

    /// Refuse employees without a department before any data is touched
    pub fn require_assigned(&self) -> Result<(), crate::error::AppError> {
        match self {
            DataScope::Unassigned => Err(crate::error::AppError::Forbidden),
            _ => Ok(()),
        }
    }

    pub fn is_restricted(&self) -> bool {
        !matches!(self, DataScope::AllDepartments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_permission_string() {
        let set = PermissionSet::parse("2,3,4,6").unwrap();
        assert!(set.contains(2));
        assert!(set.contains(6));
        assert!(!set.contains(1));

        let set = PermissionSet::parse(" 1 , 5 ").unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 5]);
    }

    #[test]
    fn test_parse_rejects_malformed_strings() {
        for raw in ["", "1,2,", ",1", "1,,2", "1,a", "x", "1;2", "0", "-1", "70000"] {
            assert!(PermissionSet::parse(raw).is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn test_admin_superset() {
        let set = PermissionSet::admin_superset();
        assert!((1..=10).all(|n| set.contains(n)));
        assert!(!set.contains(11));
    }

    #[test]
    fn test_identity_from_claims() {
        let identity = Identity::from_claim_values("EMP001", "Nguyen Van A", Some("5"), Some("False"));
        assert_eq!(identity.role_id, 5);
        assert!(!identity.is_admin);

        let identity = Identity::from_claim_values("EMP001", "", Some("abc"), Some("true"));
        assert_eq!(identity.role_id, 0);
        assert!(!identity.is_admin, "admin claim is compared to \"True\" exactly");

        let identity = Identity::from_claim_values("ADMIN", "", None, Some("True"));
        assert_eq!(identity.role_id, 0);
        assert!(identity.is_admin);
    }

    #[test]
    fn test_employee_code_cache_key() {
        assert_eq!(EmployeeCode::new(" EMP001 ").cache_key(), "Perm_EMP001");
    }

    #[test]
    fn test_data_scope_from_row() {
        assert_eq!(DataScope::from_row(None), DataScope::Unassigned);
        assert_eq!(
            DataScope::from_row(Some(&EmployeeScopeRow {
                dept_id: None,
                see_data_all_dept: false
            })),
            DataScope::Unassigned
        );
        assert_eq!(
            DataScope::from_row(Some(&EmployeeScopeRow {
                dept_id: Some(4),
                see_data_all_dept: false
            })),
            DataScope::Department(4)
        );
        assert_eq!(
            DataScope::from_row(Some(&EmployeeScopeRow {
                dept_id: None,
                see_data_all_dept: true
            })),
            DataScope::AllDepartments
        );
    }

    #[test]
    fn test_data_scope_row_access() {
        assert!(DataScope::AllDepartments.can_access(None));
        assert!(DataScope::AllDepartments.can_access(Some(9)));
        assert!(DataScope::Department(4).can_access(Some(4)));
        assert!(!DataScope::Department(4).can_access(Some(5)));
        assert!(!DataScope::Department(4).can_access(None));
        assert!(!DataScope::Unassigned.can_access(Some(4)));
        assert!(!DataScope::Unassigned.can_access(None));
    }

    #[test]
    fn test_department_filter() {
        assert_eq!(DataScope::AllDepartments.department_filter(Some(3)).unwrap(), Some(3));
        assert_eq!(DataScope::AllDepartments.department_filter(None).unwrap(), None);
        assert_eq!(DataScope::Department(4).department_filter(Some(3)).unwrap(), Some(4));
        assert_eq!(DataScope::Department(4).department_filter(None).unwrap(), Some(4));
        assert!(DataScope::Unassigned.department_filter(None).is_err());
    }

    #[test]
    fn test_require_assigned() {
        assert!(DataScope::AllDepartments.require_assigned().is_ok());
        assert!(DataScope::Department(4).require_assigned().is_ok());
        assert!(matches!(
            DataScope::Unassigned.require_assigned(),
            Err(crate::error::AppError::Forbidden)
        ));
    }
}
