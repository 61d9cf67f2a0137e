//! 外部服务连接器
//!
//! 路线指标与逆地理编码的具体实现：
//! - 估算路线：球面距离乘道路系数，按平均车速换算到达时间，不依赖网络
//! - HTTP 路线服务：调用外部路线服务获取距离和到达时间
//! - 逆地理编码：直接回显坐标，或调用外部地理编码服务

use async_trait::async_trait;
use golden_core::utils::{haversine_km, round2};
use golden_core::{Coordinates, GeocodeProvider, GoldenError, Result, RouteMetrics, RouteMetricsProvider};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// 估算路线参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatedRouteSettings {
    /// 道路距离与直线距离之比
    pub road_factor: f64,
    /// 平均车速（公里/小时）
    pub average_speed_kmh: f64,
}

impl Default for EstimatedRouteSettings {
    fn default() -> Self {
        Self {
            road_factor: 1.3,
            average_speed_kmh: 30.0,
        }
    }
}

/// 离线估算的路线提供者
#[derive(Debug, Clone, Default)]
pub struct EstimatedRouteProvider {
    settings: EstimatedRouteSettings,
}

impl EstimatedRouteProvider {
    pub fn new(settings: EstimatedRouteSettings) -> Self {
        Self { settings }
    }

    pub fn estimate(&self, origin: Coordinates, destination: Coordinates) -> Result<RouteMetrics> {
        if !origin.is_valid() || !destination.is_valid() {
            return Err(GoldenError::Lookup(format!(
                "Cannot route between ({}) and ({})",
                origin, destination
            )));
        }
        if self.settings.average_speed_kmh <= 0.0 {
            return Err(GoldenError::Config("average speed must be positive".to_string()));
        }

        let distance_km = haversine_km(origin, destination) * self.settings.road_factor;
        let eta_minutes = distance_km / self.settings.average_speed_kmh * 60.0;

        Ok(RouteMetrics {
            distance_km: round2(distance_km),
            eta_minutes: round2(eta_minutes),
        })
    }
}

#[async_trait]
impl RouteMetricsProvider for EstimatedRouteProvider {
    async fn get_route(&self, origin: Coordinates, destination: Coordinates) -> Result<RouteMetrics> {
        self.estimate(origin, destination)
    }
}

/// 外部 HTTP 服务连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpEndpoint {
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// 单次请求超时（毫秒）
    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    5000
}

impl HttpEndpoint {
    fn client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_millis(self.timeout_ms))
            .user_agent("GoldenHour/1.0")
            .build()
            .map_err(|e| GoldenError::Config(format!("Failed to build HTTP client: {}", e)))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("X-API-Key", key),
            None => request,
        }
    }
}

/// 路线服务响应
#[derive(Debug, Deserialize)]
struct RouteResponse {
    distance_km: f64,
    #[serde(alias = "duration_min")]
    eta_minutes: f64,
}

/// 调用外部路线服务的提供者
pub struct HttpRouteProvider {
    endpoint: HttpEndpoint,
    client: reqwest::Client,
}

impl HttpRouteProvider {
    pub fn new(endpoint: HttpEndpoint) -> Result<Self> {
        let client = endpoint.client()?;
        Ok(Self { endpoint, client })
    }
}

#[async_trait]
impl RouteMetricsProvider for HttpRouteProvider {
    async fn get_route(&self, origin: Coordinates, destination: Coordinates) -> Result<RouteMetrics> {
        let request = self.client.get(&self.endpoint.url).query(&[
            ("origin", format!("{},{}", origin.lat, origin.lng)),
            ("destination", format!("{},{}", destination.lat, destination.lng)),
        ]);

        let response = self
            .endpoint
            .authorize(request)
            .send()
            .await
            .map_err(|e| GoldenError::Lookup(format!("Route request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(GoldenError::Lookup(format!(
                "Route service returned {}",
                response.status()
            )));
        }

        let body: RouteResponse = response
            .json()
            .await
            .map_err(|e| GoldenError::Lookup(format!("Invalid route response: {}", e)))?;

        debug!("Route to ({}): {:.2} km / {:.1} min", destination, body.distance_km, body.eta_minutes);
        Ok(RouteMetrics {
            distance_km: body.distance_km,
            eta_minutes: body.eta_minutes,
        })
    }
}

/// 不调用外部服务的地理编码器，直接返回坐标文本
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinatesGeocoder;

#[async_trait]
impl GeocodeProvider for CoordinatesGeocoder {
    async fn reverse_lookup(&self, lat: f64, lng: f64) -> Result<String> {
        let coordinates = Coordinates::new(lat, lng);
        if !coordinates.is_valid() {
            return Err(GoldenError::Lookup(format!("Invalid coordinates: {}", coordinates)));
        }
        Ok(format!("Lat {:.4}, Lng {:.4}", lat, lng))
    }
}

/// 逆地理编码响应（Nominatim 风格）
#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
}

/// 调用外部逆地理编码服务
pub struct HttpGeocoder {
    endpoint: HttpEndpoint,
    client: reqwest::Client,
}

impl HttpGeocoder {
    pub fn new(endpoint: HttpEndpoint) -> Result<Self> {
        let client = endpoint.client()?;
        Ok(Self { endpoint, client })
    }
}

#[async_trait]
impl GeocodeProvider for HttpGeocoder {
    async fn reverse_lookup(&self, lat: f64, lng: f64) -> Result<String> {
        let request = self.client.get(&self.endpoint.url).query(&[
            ("lat", lat.to_string()),
            ("lon", lng.to_string()),
            ("format", "json".to_string()),
        ]);

        let response = self
            .endpoint
            .authorize(request)
            .send()
            .await
            .map_err(|e| GoldenError::Lookup(format!("Geocode request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(GoldenError::Lookup(format!(
                "Geocode service returned {}",
                response.status()
            )));
        }

        let body: ReverseResponse = response
            .json()
            .await
            .map_err(|e| GoldenError::Lookup(format!("Invalid geocode response: {}", e)))?;

        body.display_name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| GoldenError::Lookup("Geocode response has no address".to_string()))
    }
}
