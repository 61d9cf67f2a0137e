//! 外部协作方接口
//!
//! 编排核心只依赖这些接口，具体实现位于集成模块或测试替身中。

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{CaseRecord, ContactChannel, Coordinates, FacilitySnapshot, RouteMetrics};

/// 路线指标提供者（距离与预计到达时间）
#[async_trait]
pub trait RouteMetricsProvider: Send + Sync {
    /// 查询从起点到终点的路线指标，失败时返回 `GoldenError::Lookup`
    async fn get_route(&self, origin: Coordinates, destination: Coordinates) -> Result<RouteMetrics>;
}

/// 逆地理编码提供者
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    async fn reverse_lookup(&self, lat: f64, lng: f64) -> Result<String>;
}

/// 告警投递提供者（邮件、短信等）
#[async_trait]
pub trait AlertDeliveryProvider: Send + Sync {
    /// 发送消息并返回投递凭据
    async fn send(&self, channel: &ContactChannel, subject: &str, body: &str) -> Result<String>;
}

/// 医院数据存储
#[async_trait]
pub trait FacilityStore: Send + Sync {
    /// 返回当前医院数据的只读快照
    async fn list_all(&self) -> Result<FacilitySnapshot>;
}

/// 病例记录存储
#[async_trait]
pub trait CaseStore: Send + Sync {
    async fn create(&self, record: CaseRecord) -> Result<()>;

    async fn update(&self, record: CaseRecord) -> Result<()>;

    async fn get(&self, case_id: Uuid) -> Result<Option<CaseRecord>>;
}
