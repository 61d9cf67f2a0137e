//! # 急救病例编排模块
//!
//! 把一次急救上报转化为明确的医院分配和对外告警：
//! - 能力注册表：编排器与各阶段实现之间的类型化间接层
//! - 分诊：症状关键词与生命体征阈值规则
//! - 候选筛选与路线评估：按床位、专科、距离和到达时间选择医院
//! - 告警：格式化消息并由后台队列投递
//! - 病例状态机：保证状态只向前推进

pub mod alert;
pub mod alert_queue;
pub mod candidates;
pub mod engine;
pub mod metrics;
pub mod registry;
pub mod routing;
pub mod state_machine;
pub mod triage;

// 重新导出主要类型
pub use alert::{format_alert, AlertDispatcher, AlertMessage, AlertRequest, AlertService, CaseSummary};
pub use alert_queue::{AlertJob, AlertQueue, AlertQueueHandle};
pub use candidates::{CandidateRequest, CandidateSelector, CandidateService, SelectorSettings};
pub use engine::{CaseOrchestrator, Collaborators, OrchestratorSettings, FALLBACK_ADDRESS};
pub use metrics::WorkflowMetrics;
pub use registry::CapabilityRegistry;
pub use routing::{RouteEvaluator, RouteRequest, RouteService};
pub use state_machine::{CaseEvent, CaseStateMachine};
pub use triage::{RuleBasedTriage, TriagePolicy, TriageRequest, TriageService, VitalThresholds};
