//! Business logic services layer

pub mod auth_service;
pub mod contract_service;
pub mod mail_service;
pub mod menu_service;
pub mod meter_service;
pub mod occupancy_service;
pub mod ocr_service;
pub mod permission_cache;
pub mod permission_service;
pub mod supplier_service;

pub use auth_service::AuthService;
pub use contract_service::ContractService;
pub use menu_service::MenuService;
pub use meter_service::MeterService;
pub use occupancy_service::OccupancyService;
pub use permission_service::PermissionService;
pub use supplier_service::SupplierService;
