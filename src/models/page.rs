//! Page catalog: every permission-gated page, its function id and the
//! permission number behind each of its actions.
//!
//! Permission numbers are page-local: `4` is "Submit" on the supplier page
//! and "Edit" on the contract pages. Actions are therefore typed per page and
//! a [`PagePermissions`] resolved for one page never answers for another.

use serde::Serialize;
use std::fmt;

use crate::error::AppError;
use crate::models::role::{EmployeeCode, PermissionSet, ADMIN_SUPERSET_MAX};

/// Permission-gated pages and their function ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Page {
    Supplier,
    LongTermContract,
    ShortTermContract,
    PeriodOccupied,
    MeterReading,
}

impl Page {
    pub const ALL: [Page; 5] = [
        Page::Supplier,
        Page::LongTermContract,
        Page::ShortTermContract,
        Page::PeriodOccupied,
        Page::MeterReading,
    ];

    pub fn function_id(self) -> i32 {
        match self {
            Page::Supplier => 71,
            Page::LongTermContract => 1,
            Page::ShortTermContract => 2,
            Page::PeriodOccupied => 53,
            Page::MeterReading => 90,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Page::Supplier => "Supplier",
            Page::LongTermContract => "LongTermContract",
            Page::ShortTermContract => "ShortTermContract",
            Page::PeriodOccupied => "PeriodOccupied",
            Page::MeterReading => "MeterReading",
        }
    }

    /// `(action name, permission number)` pairs declared for this page
    pub fn actions(self) -> Vec<(&'static str, u16)> {
        fn collect<A: PageAction>(all: &[A]) -> Vec<(&'static str, u16)> {
            all.iter().map(|a| (a.name(), a.permission_no())).collect()
        }

        match self {
            Page::Supplier => collect(SupplierAction::ALL),
            Page::LongTermContract => collect(LongTermContractAction::ALL),
            Page::ShortTermContract => collect(ShortTermContractAction::ALL),
            Page::PeriodOccupied => collect(PeriodOccupiedAction::ALL),
            Page::MeterReading => collect(MeterReadingAction::ALL),
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.function_id())
    }
}

/// An action on one specific page
pub trait PageAction: Copy + fmt::Debug + Send + Sync + 'static {
    const PAGE: Page;

    fn permission_no(self) -> u16;

    fn name(self) -> &'static str;
}

macro_rules! page_actions {
    ($(#[$meta:meta])* $name:ident for $page:path { $($variant:ident = $no:expr),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl PageAction for $name {
            const PAGE: Page = $page;

            fn permission_no(self) -> u16 {
                match self {
                    $($name::$variant => $no),+
                }
            }

            fn name(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }
    };
}

page_actions! {
    /// Supplier list and detail. Export is gated by `ViewList`.
    SupplierAction for Page::Supplier {
        ViewList = 1,
        Add = 2,
        Edit = 3,
        Submit = 4,
        CopyToYear = 5,
        ViewDetail = 6,
    }
}

page_actions! {
    LongTermContractAction for Page::LongTermContract {
        ViewList = 1,
        View = 2,
        Add = 3,
        Edit = 4,
        Cancel = 5,
        Copy = 6,
        GenerateBill = 7,
    }
}

page_actions! {
    ShortTermContractAction for Page::ShortTermContract {
        ViewList = 1,
        View = 2,
        Add = 3,
        Edit = 4,
        Cancel = 6,
        ToLiving = 7,
    }
}

page_actions! {
    PeriodOccupiedAction for Page::PeriodOccupied {
        View = 1,
        MakeShortTermReservation = 3,
    }
}

page_actions! {
    /// Meter photo upload, OCR check, confirmation and e-mail
    MeterReadingAction for Page::MeterReading {
        View = 1,
        Upload = 2,
        Recognize = 3,
        Confirm = 4,
        SendEmail = 5,
    }
}

/// Catalog inconsistencies detected at startup
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("function id {function_id} is used by both {first} and {second}")]
    DuplicateFunctionId {
        function_id: i32,
        first: &'static str,
        second: &'static str,
    },

    #[error("{page}: actions {first} and {second} share permission number {number}")]
    DuplicatePermissionNumber {
        page: &'static str,
        number: u16,
        first: &'static str,
        second: &'static str,
    },

    #[error("{page}: action {action} uses permission number {number} outside 1..={max}")]
    OutOfRange {
        page: &'static str,
        action: &'static str,
        number: u16,
        max: u16,
    },
}

/// A page as seen by the registry check
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub page: &'static str,
    pub function_id: i32,
    pub actions: Vec<(&'static str, u16)>,
}

/// Validate the compiled-in page catalog
pub fn validate_registry() -> Result<(), RegistryError> {
    let entries: Vec<RegistryEntry> = Page::ALL
        .iter()
        .map(|p| RegistryEntry {
            page: p.name(),
            function_id: p.function_id(),
            actions: p.actions(),
        })
        .collect();

    validate_entries(&entries)
}

pub fn validate_entries(entries: &[RegistryEntry]) -> Result<(), RegistryError> {
    for (i, entry) in entries.iter().enumerate() {
        if let Some(other) = entries[..i]
            .iter()
            .find(|e| e.function_id == entry.function_id)
        {
            return Err(RegistryError::DuplicateFunctionId {
                function_id: entry.function_id,
                first: other.page,
                second: entry.page,
            });
        }

        let mut seen: Vec<(&'static str, u16)> = Vec::with_capacity(entry.actions.len());
        for &(action, number) in &entry.actions {
            if number == 0 || number > ADMIN_SUPERSET_MAX {
                return Err(RegistryError::OutOfRange {
                    page: entry.page,
                    action,
                    number,
                    max: ADMIN_SUPERSET_MAX,
                });
            }
            if let Some(&(first, _)) = seen.iter().find(|(_, n)| *n == number) {
                return Err(RegistryError::DuplicatePermissionNumber {
                    page: entry.page,
                    number,
                    first,
                    second: action,
                });
            }
            seen.push((action, number));
        }
    }

    Ok(())
}

/// Effective permissions of one caller on one page
#[derive(Debug, Clone)]
pub struct PagePermissions {
    page: Page,
    employee_code: EmployeeCode,
    granted: PermissionSet,
}

impl PagePermissions {
    pub fn new(page: Page, employee_code: EmployeeCode, granted: PermissionSet) -> Self {
        Self {
            page,
            employee_code,
            granted,
        }
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub fn granted(&self) -> &PermissionSet {
        &self.granted
    }

    pub fn is_empty(&self) -> bool {
        self.granted.is_empty()
    }

    /// Does the caller hold the permission behind `action`
    pub fn allows<A: PageAction>(&self, action: A) -> bool {
        A::PAGE == self.page && self.granted.contains(action.permission_no())
    }

    pub fn allows_any<A: PageAction>(&self, actions: &[A]) -> bool {
        actions.iter().any(|a| self.allows(*a))
    }

    /// Refuse with `Forbidden` unless `action` is allowed
    pub fn require<A: PageAction>(&self, action: A) -> Result<(), AppError> {
        if self.allows(action) {
            return Ok(());
        }

        tracing::warn!(
            employee_code = %self.employee_code,
            page = %self.page,
            action = action.name(),
            permission_no = action.permission_no(),
            "Permission denied"
        );
        Err(AppError::Forbidden)
    }

    pub fn require_any<A: PageAction>(&self, actions: &[A]) -> Result<(), AppError> {
        match actions.iter().find(|a| self.allows(**a)) {
            Some(_) => Ok(()),
            None => {
                tracing::warn!(
                    employee_code = %self.employee_code,
                    page = %self.page,
                    actions = ?actions,
                    "Permission denied"
                );
                Err(AppError::Forbidden)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perms(page: Page, raw: &str) -> PagePermissions {
        PagePermissions::new(page, EmployeeCode::new("EMP001"), PermissionSet::parse(raw).unwrap())
    }

    #[test]
    fn test_registry_is_valid() {
        assert_eq!(validate_registry(), Ok(()));
    }

    #[test]
    fn test_registry_rejects_duplicate_function_id() {
        let entries = vec![
            RegistryEntry { page: "A", function_id: 1, actions: vec![("View", 1)] },
            RegistryEntry { page: "B", function_id: 1, actions: vec![("View", 1)] },
        ];
        assert!(matches!(
            validate_entries(&entries),
            Err(RegistryError::DuplicateFunctionId { function_id: 1, .. })
        ));
    }

    #[test]
    fn test_registry_rejects_duplicate_number_within_page() {
        let entries = vec![RegistryEntry {
            page: "A",
            function_id: 1,
            actions: vec![("Edit", 4), ("ToLiving", 4)],
        }];
        assert!(matches!(
            validate_entries(&entries),
            Err(RegistryError::DuplicatePermissionNumber { number: 4, .. })
        ));
    }

    #[test]
    fn test_registry_rejects_out_of_range() {
        let entries = vec![RegistryEntry {
            page: "A",
            function_id: 1,
            actions: vec![("Archive", 11)],
        }];
        assert!(matches!(validate_entries(&entries), Err(RegistryError::OutOfRange { number: 11, .. })));
    }

    #[test]
    fn test_same_number_means_different_actions() {
        assert_eq!(SupplierAction::Submit.permission_no(), 4);
        assert_eq!(LongTermContractAction::Edit.permission_no(), 4);
        assert_eq!(ShortTermContractAction::Edit.permission_no(), 4);
    }

    #[test]
    fn test_permissions_do_not_cross_pages() {
        let supplier = perms(Page::Supplier, "4");
        assert!(supplier.allows(SupplierAction::Submit));
        assert!(!supplier.allows(LongTermContractAction::Edit));
        assert!(supplier.require(LongTermContractAction::Edit).is_err());
    }

    #[test]
    fn test_supplier_role_with_view_add_and_detail() {
        let p = perms(Page::Supplier, "1,2,6");
        assert!(p.allows(SupplierAction::ViewList));
        assert!(p.allows(SupplierAction::ViewDetail));
        assert!(p.allows(SupplierAction::Add));
        assert!(!p.allows(SupplierAction::Edit));
        assert!(!p.allows(SupplierAction::Submit));
        assert!(!p.allows(SupplierAction::CopyToYear));
    }

    #[test]
    fn test_require_any() {
        let p = perms(Page::ShortTermContract, "2");
        assert!(p
            .require_any(&[ShortTermContractAction::View, ShortTermContractAction::Edit])
            .is_ok());
        assert!(p.require_any(&[ShortTermContractAction::Cancel]).is_err());
    }
}
