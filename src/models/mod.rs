//! 数据模型模块

pub mod auth;
pub mod common;
pub mod contract;
pub mod lookup;
pub mod meter;
pub mod occupancy;
pub mod page;
pub mod role;
pub mod supplier;
