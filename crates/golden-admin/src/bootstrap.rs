//! 按配置装配运行时
//!
//! 把配置中选定的路线、地理编码和告警投递实现接入能力注册表，
//! 并构造编排器与 API 共享状态。

use crate::config::{AlertDeliveryConfig, GeocoderConfig, GoldenConfig, RouteProviderConfig};
use anyhow::{Context, Result};
use golden_core::{AlertDeliveryProvider, GeocodeProvider, RouteMetricsProvider};
use golden_integration::{
    ApiState, CoordinatesGeocoder, EstimatedRouteProvider, HttpGeocoder, HttpRouteProvider,
    InMemoryCaseStore, InMemoryFacilityStore, LogDelivery, WebhookDelivery,
};
use golden_workflow::{
    AlertDispatcher, CandidateSelector, CapabilityRegistry, CaseOrchestrator, Collaborators,
    RouteEvaluator, RuleBasedTriage, WorkflowMetrics,
};
use std::sync::Arc;
use tracing::info;

pub fn build_route_provider(config: &RouteProviderConfig) -> Result<Arc<dyn RouteMetricsProvider>> {
    let provider: Arc<dyn RouteMetricsProvider> = match config {
        RouteProviderConfig::Estimated(settings) => {
            info!(
                "Using estimated routes (road factor {}, {} km/h)",
                settings.road_factor, settings.average_speed_kmh
            );
            Arc::new(EstimatedRouteProvider::new(settings.clone()))
        }
        RouteProviderConfig::Http(endpoint) => {
            info!("Using HTTP route service at {}", endpoint.url);
            Arc::new(HttpRouteProvider::new(endpoint.clone())?)
        }
    };
    Ok(provider)
}

pub fn build_geocoder(config: &GeocoderConfig) -> Result<Arc<dyn GeocodeProvider>> {
    let geocoder: Arc<dyn GeocodeProvider> = match config {
        GeocoderConfig::Coordinates => Arc::new(CoordinatesGeocoder),
        GeocoderConfig::Http(endpoint) => {
            info!("Using HTTP geocoder at {}", endpoint.url);
            Arc::new(HttpGeocoder::new(endpoint.clone())?)
        }
    };
    Ok(geocoder)
}

pub fn build_alert_delivery(config: &AlertDeliveryConfig) -> Result<Arc<dyn AlertDeliveryProvider>> {
    let delivery: Arc<dyn AlertDeliveryProvider> = match config {
        AlertDeliveryConfig::Log => Arc::new(LogDelivery),
        AlertDeliveryConfig::Webhook(settings) => {
            info!("Delivering alerts to webhook {}", settings.url);
            Arc::new(WebhookDelivery::new(settings.clone())?)
        }
    };
    Ok(delivery)
}

/// 加载医院数据：配置了文件则读取文件，否则使用内置数据
pub async fn load_facilities(config: &GoldenConfig) -> Result<InMemoryFacilityStore> {
    let store = match &config.facilities.file {
        Some(path) => InMemoryFacilityStore::from_json_file(path)
            .await
            .with_context(|| format!("Failed to load facilities from {}", path))?,
        None => InMemoryFacilityStore::with_seed_data().context("Failed to load seed facilities")?,
    };
    Ok(store)
}

/// 构造编排器和 API 状态，必须在 tokio 运行时内调用
pub async fn build_state(config: &GoldenConfig) -> Result<ApiState> {
    let metrics = Arc::new(WorkflowMetrics::new().context("Failed to create metrics registry")?);
    let route_provider = build_route_provider(&config.route_provider)?;
    let lookup_timeout = config.workflow.lookup_timeout();

    let registry = CapabilityRegistry::new(
        Arc::new(RuleBasedTriage::new(config.triage.clone())),
        Arc::new(
            CandidateSelector::new(route_provider.clone(), config.workflow.selector_settings())
                .with_metrics(metrics.clone()),
        ),
        Arc::new(RouteEvaluator::new(route_provider, lookup_timeout).with_metrics(metrics.clone())),
        Arc::new(AlertDispatcher::new(build_alert_delivery(&config.alert_delivery)?)),
    );

    let facilities = Arc::new(load_facilities(config).await?);
    let cases = Arc::new(InMemoryCaseStore::new());
    let collaborators = Collaborators {
        facilities: facilities.clone(),
        cases: cases.clone(),
        geocoder: build_geocoder(&config.geocoder)?,
    };

    let orchestrator = Arc::new(CaseOrchestrator::new(
        registry,
        collaborators,
        metrics,
        config.workflow.orchestrator_settings(),
    ));

    Ok(ApiState {
        orchestrator,
        facilities,
        cases,
    })
}
