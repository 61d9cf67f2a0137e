//! 配置管理
//!
//! 可选的配置文件叠加 `GOLDEN__` 前缀的环境变量，例如 `GOLDEN__SERVER__PORT=8080`。
//! 所有配置段都有默认值，不提供任何配置也能启动。

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use golden_integration::{EstimatedRouteSettings, HttpEndpoint, WebhookSettings};
use golden_workflow::{OrchestratorSettings, SelectorSettings, TriagePolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

/// 系统完整配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GoldenConfig {
    /// 服务器配置
    pub server: ServerConfig,
    /// 编排流程配置
    pub workflow: WorkflowConfig,
    /// 分诊策略表
    pub triage: TriagePolicy,
    pub route_provider: RouteProviderConfig,
    pub geocoder: GeocoderConfig,
    pub alert_delivery: AlertDeliveryConfig,
    pub facilities: FacilitiesConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听主机
    pub host: String,
    /// 监听端口
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// 编排流程配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// 单次路线查询超时（毫秒）
    pub lookup_timeout_ms: u64,
    pub max_candidates: usize,
    pub alert_queue_capacity: usize,
    /// 逆地理编码超时（毫秒）
    pub geocode_timeout_ms: u64,
}

impl WorkflowConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn selector_settings(&self) -> SelectorSettings {
        SelectorSettings {
            lookup_timeout: self.lookup_timeout(),
            max_candidates: self.max_candidates,
        }
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            geocode_timeout: Duration::from_millis(self.geocode_timeout_ms),
            alert_queue_capacity: self.alert_queue_capacity,
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            lookup_timeout_ms: 3000,
            max_candidates: 5,
            alert_queue_capacity: 256,
            geocode_timeout_ms: 3000,
        }
    }
}

/// 路线提供者
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteProviderConfig {
    Estimated(EstimatedRouteSettings),
    Http(HttpEndpoint),
}

impl Default for RouteProviderConfig {
    fn default() -> Self {
        RouteProviderConfig::Estimated(EstimatedRouteSettings::default())
    }
}

/// 逆地理编码
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeocoderConfig {
    #[default]
    Coordinates,
    Http(HttpEndpoint),
}

/// 告警投递
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertDeliveryConfig {
    #[default]
    Log,
    Webhook(WebhookSettings),
}

/// 医院数据来源
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FacilitiesConfig {
    /// JSON 文件路径，未配置时使用内置数据
    pub file: Option<String>,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别或 EnvFilter 指令
    pub level: String,
    /// 输出 JSON 格式
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl GoldenConfig {
    /// 加载配置：文件（可选）叠加环境变量
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix("GOLDEN")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: GoldenConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        match config_path {
            Some(path) => info!("Configuration loaded from: {}", path),
            None => info!("Configuration loaded from defaults and environment"),
        }
        Ok(config)
    }
}

/// 配置验证器
#[derive(Debug)]
pub struct ConfigValidator {
    /// 验证规则
    validation_rules: Vec<ValidationRule>,
}

/// 验证规则
#[derive(Debug)]
struct ValidationRule {
    /// 字段路径
    field_path: &'static str,
    /// 验证函数，返回 false 表示不通过
    check: fn(&GoldenConfig) -> bool,
    /// 错误消息
    error_message: &'static str,
}

impl ConfigValidator {
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "server.port",
                check: |c| c.server.port != 0,
                error_message: "Server port cannot be 0",
            },
            ValidationRule {
                field_path: "workflow.lookup_timeout_ms",
                check: |c| c.workflow.lookup_timeout_ms > 0,
                error_message: "Lookup timeout must be positive",
            },
            ValidationRule {
                field_path: "workflow.geocode_timeout_ms",
                check: |c| c.workflow.geocode_timeout_ms > 0,
                error_message: "Geocode timeout must be positive",
            },
            ValidationRule {
                field_path: "workflow.max_candidates",
                check: |c| c.workflow.max_candidates > 0,
                error_message: "Max candidates cannot be 0",
            },
            ValidationRule {
                field_path: "workflow.alert_queue_capacity",
                check: |c| c.workflow.alert_queue_capacity > 0,
                error_message: "Alert queue capacity cannot be 0",
            },
            ValidationRule {
                field_path: "route_provider",
                check: |c| match &c.route_provider {
                    RouteProviderConfig::Estimated(s) => s.average_speed_kmh > 0.0 && s.road_factor > 0.0,
                    RouteProviderConfig::Http(endpoint) => valid_endpoint(&endpoint.url, endpoint.timeout_ms),
                },
                error_message: "Route provider needs a positive speed and road factor, or a non-empty URL",
            },
            ValidationRule {
                field_path: "geocoder",
                check: |c| match &c.geocoder {
                    GeocoderConfig::Coordinates => true,
                    GeocoderConfig::Http(endpoint) => valid_endpoint(&endpoint.url, endpoint.timeout_ms),
                },
                error_message: "Geocoder URL cannot be empty",
            },
            ValidationRule {
                field_path: "alert_delivery",
                check: |c| match &c.alert_delivery {
                    AlertDeliveryConfig::Log => true,
                    AlertDeliveryConfig::Webhook(webhook) => valid_endpoint(&webhook.url, webhook.timeout_ms),
                },
                error_message: "Webhook URL cannot be empty",
            },
            ValidationRule {
                field_path: "logging.level",
                check: |c| !c.logging.level.trim().is_empty(),
                error_message: "Log level cannot be empty",
            },
        ];

        Self { validation_rules }
    }

    /// 验证配置，返回第一条不通过的规则
    pub fn validate(&self, config: &GoldenConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if !(rule.check)(config) {
                error!("Configuration validation failed for {}", rule.field_path);
                return Err(anyhow::anyhow!("{}: {}", rule.field_path, rule.error_message));
            }
        }

        info!("Configuration validation passed");
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn valid_endpoint(url: &str, timeout_ms: u64) -> bool {
    !url.trim().is_empty() && timeout_ms > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GoldenConfig::default();
        assert!(ConfigValidator::new().validate(&config).is_ok());
        assert_eq!(config.server.bind_address(), "0.0.0.0:8000");
        assert_eq!(config.workflow.selector_settings().max_candidates, 5);
    }

    #[test]
    fn test_validator_rejects_bad_values() {
        let validator = ConfigValidator::new();

        let mut config = GoldenConfig::default();
        config.server.port = 0;
        assert!(validator.validate(&config).is_err());

        let mut config = GoldenConfig::default();
        config.workflow.max_candidates = 0;
        assert!(validator.validate(&config).is_err());

        let mut config = GoldenConfig::default();
        config.workflow.alert_queue_capacity = 0;
        assert!(validator.validate(&config).is_err());

        let mut config = GoldenConfig::default();
        config.route_provider = RouteProviderConfig::Estimated(EstimatedRouteSettings {
            road_factor: 1.3,
            average_speed_kmh: 0.0,
        });
        assert!(validator.validate(&config).is_err());

        let mut config = GoldenConfig::default();
        config.alert_delivery = AlertDeliveryConfig::Webhook(WebhookSettings {
            url: " ".to_string(),
            secret: None,
            timeout_ms: 1000,
        });
        let err = validator.validate(&config).unwrap_err();
        assert!(err.to_string().contains("alert_delivery"));
    }

    #[test]
    fn test_tagged_sections_deserialize() {
        let config: GoldenConfig = serde_json::from_value(serde_json::json!({
            "server": { "port": 9000 },
            "route_provider": { "kind": "http", "url": "http://routes.local/route" },
            "alert_delivery": { "kind": "webhook", "url": "http://gw.local/alerts", "secret": "s3cret" },
            "triage": { "elderly_age": 70 }
        }))
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(matches!(config.route_provider, RouteProviderConfig::Http(ref e) if e.timeout_ms == 5000));
        assert!(matches!(config.geocoder, GeocoderConfig::Coordinates));
        assert_eq!(config.triage.elderly_age, 70);
        assert!(!config.triage.critical_keywords.is_empty());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = GoldenConfig::load(None).unwrap();
        assert_eq!(config.workflow.lookup_timeout(), Duration::from_millis(3000));
    }
}
