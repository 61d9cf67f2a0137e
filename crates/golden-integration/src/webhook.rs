//! 告警投递
//!
//! - 日志投递：只写入日志，适合本地运行和演示
//! - Webhook 投递：把告警以 JSON 推送到外部网关（邮件/短信），附带签名头

use async_trait::async_trait;
use golden_core::{AlertDeliveryProvider, ContactChannel, GoldenError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

/// 只记录日志的投递实现
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDelivery;

#[async_trait]
impl AlertDeliveryProvider for LogDelivery {
    async fn send(&self, channel: &ContactChannel, subject: &str, body: &str) -> Result<String> {
        let token = format!("log-{}", Uuid::new_v4());
        info!("Alert to {} [{}]: {}\n{}", channel, token, subject, body);
        Ok(token)
    }
}

/// Webhook 投递配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSettings {
    pub url: String,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default = "default_webhook_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_webhook_timeout_ms() -> u64 {
    5000
}

impl WebhookSettings {
    /// 生成签名：sha256(payload + secret)
    pub fn generate_signature(&self, payload: &str) -> Option<String> {
        use sha2::{Digest, Sha256};

        self.secret.as_ref().map(|secret| {
            let mut hasher = Sha256::new();
            hasher.update(payload);
            hasher.update(secret);
            format!("sha256={:x}", hasher.finalize())
        })
    }
}

/// 推送给网关的告警内容
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertPayload {
    pub id: String,
    pub channel: ContactChannel,
    pub subject: String,
    pub body: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// 网关响应，可携带网关侧的消息编号
#[derive(Debug, Default, Deserialize)]
struct GatewayResponse {
    #[serde(default)]
    message_id: Option<String>,
}

/// 通过 Webhook 投递告警
pub struct WebhookDelivery {
    settings: WebhookSettings,
    client: reqwest::Client,
}

impl WebhookDelivery {
    pub fn new(settings: WebhookSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .map_err(|e| GoldenError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { settings, client })
    }
}

#[async_trait]
impl AlertDeliveryProvider for WebhookDelivery {
    async fn send(&self, channel: &ContactChannel, subject: &str, body: &str) -> Result<String> {
        let payload = AlertPayload {
            id: Uuid::new_v4().to_string(),
            channel: channel.clone(),
            subject: subject.to_string(),
            body: body.to_string(),
            timestamp: chrono::Utc::now(),
        };
        let payload_text = serde_json::to_string(&payload)?;

        let mut request = self
            .client
            .post(&self.settings.url)
            .header("Content-Type", "application/json")
            .header("User-Agent", "GoldenHour-Webhook/1.0")
            .header("X-Golden-Alert", payload.id.as_str());

        if let Some(signature) = self.settings.generate_signature(&payload_text) {
            request = request.header("X-Golden-Signature", signature);
        }

        let response = request.body(payload_text).send().await.map_err(|e| {
            error!("Failed to send alert webhook to {}: {}", self.settings.url, e);
            GoldenError::Delivery(format!("Failed to send webhook: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            error!("Alert webhook failed with status {}: {}", status, self.settings.url);
            return Err(GoldenError::Delivery(format!("Webhook failed with status: {}", status)));
        }

        // 网关不返回消息编号时以本地编号作为凭据
        let gateway: GatewayResponse = response.json().await.unwrap_or_default();
        let token = gateway.message_id.unwrap_or(payload.id);

        info!("Alert webhook delivered to {} (token {})", self.settings.url, token);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_delivery_returns_unique_tokens() {
        let channel = ContactChannel::Email("er@example.com".to_string());

        let first = LogDelivery.send(&channel, "subject", "body").await.unwrap();
        let second = LogDelivery.send(&channel, "subject", "body").await.unwrap();

        assert!(first.starts_with("log-"));
        assert_ne!(first, second);
    }

    #[test]
    fn test_webhook_signature() {
        let settings = WebhookSettings {
            url: "https://example.com/alerts".to_string(),
            secret: Some("test-secret".to_string()),
            timeout_ms: 1000,
        };

        let payload = r#"{"test": "data"}"#;
        let signature = settings.generate_signature(payload).unwrap();
        assert!(signature.starts_with("sha256="));
        assert_eq!(signature.len(), "sha256=".len() + 64);
        assert_eq!(settings.generate_signature(payload), Some(signature));

        let unsigned = WebhookSettings {
            secret: None,
            ..settings
        };
        assert!(unsigned.generate_signature(payload).is_none());
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_delivery_error() {
        let delivery = WebhookDelivery::new(WebhookSettings {
            url: "http://127.0.0.1:9/alerts".to_string(),
            secret: None,
            timeout_ms: 500,
        })
        .unwrap();

        let result = delivery
            .send(&ContactChannel::Sms("+911234567890".to_string()), "subject", "body")
            .await;
        assert!(matches!(result, Err(GoldenError::Delivery(_))));
    }
}
