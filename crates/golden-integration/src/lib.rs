//! # 急救系统集成模块
//!
//! 提供编排核心所依赖的外部协作方的具体实现，包括：
//! - 路线与逆地理编码连接器（离线估算或外部 HTTP 服务）
//! - 告警投递（日志或签名 Webhook）
//! - 内存医院存储与病例存储
//! - RESTful API接口

pub mod api;
pub mod connectors;
pub mod store;
pub mod webhook;

pub use api::{create_api_routes, validate_intake, ApiError, ApiServer, ApiState};
pub use connectors::{
    CoordinatesGeocoder, EstimatedRouteProvider, EstimatedRouteSettings, HttpEndpoint,
    HttpGeocoder, HttpRouteProvider,
};
pub use store::{
    seed_facilities, BedUpdate, CaseHistory, CaseTransition, InMemoryCaseStore,
    InMemoryFacilityStore, MAX_BEDS_PER_CATEGORY,
};
pub use webhook::{LogDelivery, WebhookDelivery, WebhookSettings};
