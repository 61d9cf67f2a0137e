//! 编排流程指标

use golden_core::{CaseStatus, GoldenError, Result};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Duration;

/// 编排流程的 Prometheus 指标
#[derive(Clone)]
pub struct WorkflowMetrics {
    registry: Registry,
    cases_total: IntCounterVec,
    alerts_total: IntCounterVec,
    excluded_lookups_total: IntCounterVec,
    stage_duration: HistogramVec,
}

impl WorkflowMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let cases_total = IntCounterVec::new(
            Opts::new("golden_cases_total", "Cases handled, by outcome status"),
            &["status"],
        )
        .map_err(metric_error)?;

        let alerts_total = IntCounterVec::new(
            Opts::new("golden_alerts_total", "Alert jobs, by result"),
            &["result"],
        )
        .map_err(metric_error)?;

        let excluded_lookups_total = IntCounterVec::new(
            Opts::new(
                "golden_excluded_lookups_total",
                "Facilities excluded because a route lookup failed or timed out",
            ),
            &["stage"],
        )
        .map_err(metric_error)?;

        let stage_duration = HistogramVec::new(
            HistogramOpts::new("golden_stage_duration_seconds", "Workflow stage latency in seconds"),
            &["stage"],
        )
        .map_err(metric_error)?;

        registry.register(Box::new(cases_total.clone())).map_err(metric_error)?;
        registry.register(Box::new(alerts_total.clone())).map_err(metric_error)?;
        registry
            .register(Box::new(excluded_lookups_total.clone()))
            .map_err(metric_error)?;
        registry.register(Box::new(stage_duration.clone())).map_err(metric_error)?;

        Ok(Self {
            registry,
            cases_total,
            alerts_total,
            excluded_lookups_total,
            stage_duration,
        })
    }

    /// 记录病例编排结果（终态，或告警排队时的 ASSIGNED）
    pub fn record_case(&self, status: CaseStatus) {
        self.cases_total.with_label_values(&[&status.to_string()]).inc();
    }

    /// result 取值：delivered / failed / dropped
    pub fn record_alert(&self, result: &str) {
        self.alerts_total.with_label_values(&[result]).inc();
    }

    pub fn record_excluded_lookup(&self, stage: &str) {
        self.excluded_lookups_total.with_label_values(&[stage]).inc();
    }

    pub fn observe_stage(&self, stage: &str, elapsed: Duration) {
        self.stage_duration
            .with_label_values(&[stage])
            .observe(elapsed.as_secs_f64());
    }

    pub fn case_count(&self, status: CaseStatus) -> u64 {
        self.cases_total.with_label_values(&[&status.to_string()]).get()
    }

    pub fn alert_count(&self, result: &str) -> u64 {
        self.alerts_total.with_label_values(&[result]).get()
    }

    pub fn excluded_lookup_count(&self, stage: &str) -> u64 {
        self.excluded_lookups_total.with_label_values(&[stage]).get()
    }

    /// Prometheus 文本格式导出
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).map_err(metric_error)?;

        String::from_utf8(buffer).map_err(|e| GoldenError::Internal(e.to_string()))
    }
}

fn metric_error(e: prometheus::Error) -> GoldenError {
    GoldenError::Internal(format!("Metrics error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_render() {
        let metrics = WorkflowMetrics::new().unwrap();

        metrics.record_case(CaseStatus::NoRoute);
        metrics.record_case(CaseStatus::NoRoute);
        metrics.record_alert("delivered");
        metrics.record_excluded_lookup("routing");
        metrics.observe_stage("triage", Duration::from_millis(3));

        assert_eq!(metrics.case_count(CaseStatus::NoRoute), 2);
        assert_eq!(metrics.case_count(CaseStatus::Assigned), 0);
        assert_eq!(metrics.alert_count("delivered"), 1);
        assert_eq!(metrics.excluded_lookup_count("routing"), 1);

        let text = metrics.render().unwrap();
        assert!(text.contains("golden_cases_total{status=\"NO_ROUTE\"} 2"));
        assert!(text.contains("golden_stage_duration_seconds"));
    }
}
