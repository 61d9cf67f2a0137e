//! 错误定义模块

use crate::models::TriageResult;
use thiserror::Error;
use uuid::Uuid;

/// 急救响应系统统一错误类型
#[derive(Error, Debug)]
pub enum GoldenError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("验证错误: {0}")]
    Validation(String),

    /// 路线或地理编码查询失败，由调用方排除或降级处理
    #[error("外部查询失败: {0}")]
    Lookup(String),

    /// 告警投递失败，只在告警阶段内记录
    #[error("告警投递失败: {0}")]
    Delivery(String),

    #[error("存储错误: {0}")]
    Storage(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("系统内部错误: {0}")]
    Internal(String),

    #[error("网络错误: {0}")]
    Network(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("无效状态转换: 从 {from} 到 {event}")]
    InvalidStateTransition { from: String, event: String },

    /// 候选医院筛选结果为空
    #[error("未找到合适的医院: 病例 {case_id}")]
    NoSuitableFacility {
        case_id: Uuid,
        triage: Box<TriageResult>,
    },

    /// 没有任何可到达的医院
    #[error("没有可到达的医院: 病例 {case_id}")]
    NoReachableFacility {
        case_id: Uuid,
        triage: Box<TriageResult>,
    },
}

impl GoldenError {
    /// 是否为正常的业务终止结果（而非系统故障）
    pub fn is_terminal_outcome(&self) -> bool {
        matches!(
            self,
            GoldenError::NoSuitableFacility { .. } | GoldenError::NoReachableFacility { .. }
        )
    }

    /// 业务终止结果附带的分诊结论
    pub fn triage(&self) -> Option<&TriageResult> {
        match self {
            GoldenError::NoSuitableFacility { triage, .. }
            | GoldenError::NoReachableFacility { triage, .. } => Some(triage),
            _ => None,
        }
    }
}

/// 急救响应系统统一结果类型
pub type Result<T> = std::result::Result<T, GoldenError>;
