//! Database repository layer

pub mod contract_repo;
pub mod employee_repo;
pub mod lookup_repo;
pub mod meter_repo;
pub mod occupancy_repo;
pub mod role_repo;
pub mod supplier_repo;

pub use contract_repo::ContractRepository;
pub use employee_repo::EmployeeRepository;
pub use lookup_repo::LookupRepository;
pub use meter_repo::MeterRepository;
pub use occupancy_repo::OccupancyRepository;
pub use role_repo::{LookupError, PermissionStore, PgPermissionStore};
pub use supplier_repo::SupplierRepository;
