//! 路线评估
//!
//! 对候选医院逐个查询路线，选出预计到达时间最短的一家。
//! 查询失败或超时的医院被排除，不重试。

use async_trait::async_trait;
use futures::future::join_all;
use golden_core::{
    Assignment, Coordinates, FacilityRef, GoldenError, Result, RouteMetrics, RouteMetricsProvider,
};
use std::sync::Arc;
use std::time::Duration;

use crate::metrics::WorkflowMetrics;

/// 路线评估阶段的输入
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub origin: Coordinates,
    pub facilities: Vec<FacilityRef>,
}

/// 路线评估能力
#[async_trait]
pub trait RouteService: Send + Sync {
    /// `Ok(None)` 表示没有可到达的医院，这不是错误
    async fn evaluate(&self, request: RouteRequest) -> Result<Option<Assignment>>;
}

/// 带超时的单次路线查询，超时与失败等同处理
pub(crate) async fn timed_route_lookup(
    provider: &dyn RouteMetricsProvider,
    origin: Coordinates,
    destination: Coordinates,
    timeout: Duration,
) -> Result<RouteMetrics> {
    match tokio::time::timeout(timeout, provider.get_route(origin, destination)).await {
        Ok(result) => result,
        Err(_) => Err(GoldenError::Lookup(format!(
            "Route lookup to ({}) timed out after {:?}",
            destination, timeout
        ))),
    }
}

/// 按预计到达时间选择医院
pub struct RouteEvaluator {
    route_provider: Arc<dyn RouteMetricsProvider>,
    lookup_timeout: Duration,
    metrics: Option<Arc<WorkflowMetrics>>,
}

impl RouteEvaluator {
    pub fn new(route_provider: Arc<dyn RouteMetricsProvider>, lookup_timeout: Duration) -> Self {
        Self {
            route_provider,
            lookup_timeout,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<WorkflowMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

#[async_trait]
impl RouteService for RouteEvaluator {
    async fn evaluate(&self, request: RouteRequest) -> Result<Option<Assignment>> {
        if request.facilities.is_empty() {
            tracing::debug!("No facilities to evaluate routes for");
            return Ok(None);
        }

        let lookups = request.facilities.iter().map(|facility| {
            timed_route_lookup(
                self.route_provider.as_ref(),
                request.origin,
                facility.location,
                self.lookup_timeout,
            )
        });
        let routes = join_all(lookups).await;

        let mut best: Option<Assignment> = None;
        for (facility, route) in request.facilities.into_iter().zip(routes) {
            let route = match route {
                Ok(route) => route,
                Err(e) => {
                    tracing::warn!("Excluding facility {} from routing: {}", facility.id, e);
                    if let Some(metrics) = &self.metrics {
                        metrics.record_excluded_lookup("routing");
                    }
                    continue;
                }
            };

            // 严格小于：ETA 相同时保留先出现的医院
            let better = best
                .as_ref()
                .map_or(true, |current| route.eta_minutes < current.route.eta_minutes);
            if better {
                best = Some(Assignment { facility, route });
            }
        }

        match &best {
            Some(assignment) => tracing::info!(
                "Assigned facility {} (ETA {:.1} min, {:.2} km)",
                assignment.facility.id,
                assignment.route.eta_minutes,
                assignment.route.distance_km
            ),
            None => tracing::warn!("All route lookups failed, no reachable facility"),
        }

        Ok(best)
    }
}
