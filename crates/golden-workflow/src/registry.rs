//! 能力注册表
//!
//! 编排器与各阶段实现之间唯一的间接层。四个能力槽在启动时一次性装配，
//! 缺少任何一个都无法构造注册表，因此运行期不存在“未注册能力”。

use std::sync::Arc;

use crate::alert::AlertService;
use crate::candidates::CandidateService;
use crate::routing::RouteService;
use crate::triage::TriageService;

/// 按能力类型划分的处理器槽位
#[derive(Clone)]
pub struct CapabilityRegistry {
    triage: Arc<dyn TriageService>,
    candidates: Arc<dyn CandidateService>,
    routes: Arc<dyn RouteService>,
    alerts: Arc<dyn AlertService>,
}

impl CapabilityRegistry {
    pub fn new(
        triage: Arc<dyn TriageService>,
        candidates: Arc<dyn CandidateService>,
        routes: Arc<dyn RouteService>,
        alerts: Arc<dyn AlertService>,
    ) -> Self {
        Self {
            triage,
            candidates,
            routes,
            alerts,
        }
    }

    pub fn triage(&self) -> Arc<dyn TriageService> {
        self.triage.clone()
    }

    pub fn candidates(&self) -> Arc<dyn CandidateService> {
        self.candidates.clone()
    }

    pub fn routes(&self) -> Arc<dyn RouteService> {
        self.routes.clone()
    }

    pub fn alerts(&self) -> Arc<dyn AlertService> {
        self.alerts.clone()
    }

    // 替换槽位：后写入者生效

    pub fn replace_triage(&mut self, service: Arc<dyn TriageService>) {
        tracing::debug!("Replacing triage capability");
        self.triage = service;
    }

    pub fn replace_candidates(&mut self, service: Arc<dyn CandidateService>) {
        tracing::debug!("Replacing candidate capability");
        self.candidates = service;
    }

    pub fn replace_routes(&mut self, service: Arc<dyn RouteService>) {
        tracing::debug!("Replacing route capability");
        self.routes = service;
    }

    pub fn replace_alerts(&mut self, service: Arc<dyn AlertService>) {
        tracing::debug!("Replacing alert capability");
        self.alerts = service;
    }
}
