//! 候选医院筛选
//!
//! 按严重程度的床位要求和专科要求过滤医院，逐个查询路线指标，
//! 按距离升序（同距离按总空床数降序）排序后保留前 N 个。

use async_trait::async_trait;
use futures::future::join_all;
use golden_core::{
    Candidate, CandidateSet, Coordinates, Facility, FacilitySnapshot, Result,
    RouteMetricsProvider, Severity,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::metrics::WorkflowMetrics;
use crate::routing::timed_route_lookup;

/// 候选筛选阶段的输入
#[derive(Debug, Clone)]
pub struct CandidateRequest {
    pub severity: Severity,
    pub required_specialists: BTreeSet<String>,
    pub origin: Coordinates,
    pub facilities: FacilitySnapshot,
}

/// 候选筛选能力
#[async_trait]
pub trait CandidateService: Send + Sync {
    /// 没有医院满足条件时返回空集合而不是错误
    async fn select(&self, request: CandidateRequest) -> Result<CandidateSet>;
}

/// 筛选参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorSettings {
    pub lookup_timeout: Duration,
    pub max_candidates: usize,
}

impl Default for SelectorSettings {
    fn default() -> Self {
        Self {
            lookup_timeout: Duration::from_secs(3),
            max_candidates: CandidateSet::DEFAULT_LIMIT,
        }
    }
}

/// 候选医院筛选器
pub struct CandidateSelector {
    route_provider: Arc<dyn RouteMetricsProvider>,
    settings: SelectorSettings,
    metrics: Option<Arc<WorkflowMetrics>>,
}

impl CandidateSelector {
    pub fn new(route_provider: Arc<dyn RouteMetricsProvider>, settings: SelectorSettings) -> Self {
        Self {
            route_provider,
            settings,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<WorkflowMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// 床位与专科过滤
    ///
    /// RED 需要至少一张 ICU 空床，YELLOW 需要至少一张急诊空床，GREEN 不检查床位。
    pub fn is_eligible(facility: &Facility, severity: Severity, required: &BTreeSet<String>) -> bool {
        let has_beds = match severity {
            Severity::Red => facility.critical_care_beds > 0,
            Severity::Yellow => facility.emergency_beds > 0,
            Severity::Green => true,
        };

        has_beds && facility.supports_all(required)
    }
}

#[async_trait]
impl CandidateService for CandidateSelector {
    async fn select(&self, request: CandidateRequest) -> Result<CandidateSet> {
        let eligible: Vec<&Facility> = request
            .facilities
            .iter()
            .filter(|f| Self::is_eligible(f, request.severity, &request.required_specialists))
            .collect();

        tracing::debug!(
            "{} of {} facilities pass bed/specialist filters for {}",
            eligible.len(),
            request.facilities.len(),
            request.severity
        );

        // 各医院的查询相互独立，并发发起；join_all 保持输入顺序，排序结果与完成顺序无关
        let lookups = eligible.iter().map(|facility| {
            timed_route_lookup(
                self.route_provider.as_ref(),
                request.origin,
                facility.location,
                self.settings.lookup_timeout,
            )
        });
        let routes = join_all(lookups).await;

        let mut candidates = Vec::with_capacity(eligible.len());
        let mut unreachable = 0;
        for (facility, route) in eligible.into_iter().zip(routes) {
            match route {
                Ok(route) => candidates.push(Candidate {
                    facility: facility.clone(),
                    route,
                }),
                Err(e) => {
                    tracing::warn!("Excluding facility {} from candidates: {}", facility.id, e);
                    unreachable += 1;
                    if let Some(metrics) = &self.metrics {
                        metrics.record_excluded_lookup("candidates");
                    }
                }
            }
        }

        let set = CandidateSet::rank(candidates, self.settings.max_candidates).with_unreachable(unreachable);
        tracing::info!("Selected {} candidate facilities", set.len());
        Ok(set)
    }
}
