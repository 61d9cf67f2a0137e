//! # Golden Hour Core
//!
//! 急救响应系统的核心模块，提供基础数据结构、错误定义、外部协作方接口和通用工具。

pub mod error;
pub mod models;
pub mod providers;
pub mod utils;

pub use error::{GoldenError, Result};
pub use models::*;
pub use providers::{
    AlertDeliveryProvider, CaseStore, FacilityStore, GeocodeProvider, RouteMetricsProvider,
};
