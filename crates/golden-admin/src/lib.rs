//! # 急救系统运维模块
//!
//! 提供配置加载与校验、日志初始化，以及按配置装配编排器和 API 状态

pub mod bootstrap;
pub mod config;
pub mod logging;

pub use bootstrap::{build_alert_delivery, build_geocoder, build_route_provider, build_state, load_facilities};
pub use config::{
    AlertDeliveryConfig, ConfigValidator, FacilitiesConfig, GeocoderConfig, GoldenConfig,
    LoggingConfig, RouteProviderConfig, ServerConfig, WorkflowConfig,
};
pub use logging::init_tracing;
