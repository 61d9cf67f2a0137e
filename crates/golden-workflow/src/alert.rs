//! 告警发送
//!
//! 医院分配完成后，格式化告警消息并交给投递提供者。

use async_trait::async_trait;
use chrono::Utc;
use golden_core::{
    AlertDeliveryProvider, Assignment, ContactChannel, DeliveryReceipt, GoldenError, Result,
    Severity,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// 告警中使用的病例摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSummary {
    pub severity: Severity,
    pub priority: u8,
    pub description: String,
    pub address: String,
    pub contact: Option<ContactChannel>,
}

/// 告警阶段的输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRequest {
    pub case_id: Uuid,
    pub summary: CaseSummary,
    pub assignment: Assignment,
}

/// 格式化后的告警消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
}

/// 告警能力
#[async_trait]
pub trait AlertService: Send + Sync {
    async fn dispatch(&self, request: AlertRequest) -> Result<DeliveryReceipt>;
}

/// 生成告警主题与正文
pub fn format_alert(summary: &CaseSummary, assignment: &Assignment) -> AlertMessage {
    let subject = format!("URGENT: Incoming Emergency - {}", summary.severity);

    let description = if summary.description.trim().is_empty() {
        "Not provided"
    } else {
        summary.description.trim()
    };

    let body = [
        "EMERGENCY ALERT".to_string(),
        "--------------------------------".to_string(),
        format!("Severity: {}", summary.severity),
        format!("Priority: {}", summary.priority),
        format!("Type: {}", description),
        format!("Patient Location: {}", summary.address),
        format!(
            "Assigned Facility: {} ({})",
            assignment.facility.name, assignment.facility.id
        ),
        format!("ETA: {:.1} minutes", assignment.route.eta_minutes),
        format!("Distance: {:.2} km", assignment.route.distance_km),
    ]
    .join("\n");

    AlertMessage { subject, body }
}

/// 告警发送器
pub struct AlertDispatcher {
    delivery: Arc<dyn AlertDeliveryProvider>,
}

impl AlertDispatcher {
    pub fn new(delivery: Arc<dyn AlertDeliveryProvider>) -> Self {
        Self { delivery }
    }
}

#[async_trait]
impl AlertService for AlertDispatcher {
    async fn dispatch(&self, request: AlertRequest) -> Result<DeliveryReceipt> {
        let channel = request.summary.contact.clone().ok_or_else(|| {
            GoldenError::Delivery(format!("Case {} has no contact channel", request.case_id))
        })?;

        let message = format_alert(&request.summary, &request.assignment);
        let token = self
            .delivery
            .send(&channel, &message.subject, &message.body)
            .await?;

        tracing::info!(
            "Alert for case {} delivered to {} (token {})",
            request.case_id,
            channel,
            token
        );

        Ok(DeliveryReceipt {
            token,
            channel,
            delivered_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use golden_core::{Coordinates, FacilityRef, RouteMetrics};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDelivery {
        sent: Mutex<Vec<(ContactChannel, String, String)>>,
    }

    #[async_trait]
    impl AlertDeliveryProvider for RecordingDelivery {
        async fn send(&self, channel: &ContactChannel, subject: &str, body: &str) -> Result<String> {
            let mut sent = self.sent.lock().unwrap();
            sent.push((channel.clone(), subject.to_string(), body.to_string()));
            Ok(format!("msg-{}", sent.len()))
        }
    }

    fn request(contact: Option<ContactChannel>) -> AlertRequest {
        AlertRequest {
            case_id: Uuid::new_v4(),
            summary: CaseSummary {
                severity: Severity::Red,
                priority: 1,
                description: "Collapsed at home".to_string(),
                address: "Saket, New Delhi".to_string(),
                contact,
            },
            assignment: Assignment {
                facility: FacilityRef {
                    id: "H001".to_string(),
                    name: "AIIMS Trauma Centre".to_string(),
                    location: Coordinates::new(28.5672, 77.21),
                },
                route: RouteMetrics {
                    distance_km: 4.5,
                    eta_minutes: 9.0,
                },
            },
        }
    }

    #[test]
    fn test_format_alert() {
        let req = request(None);
        let message = format_alert(&req.summary, &req.assignment);

        assert_eq!(message.subject, "URGENT: Incoming Emergency - RED");
        assert!(message.body.contains("Severity: RED"));
        assert!(message.body.contains("Priority: 1"));
        assert!(message.body.contains("Patient Location: Saket, New Delhi"));
        assert!(message.body.contains("AIIMS Trauma Centre"));
        assert!(message.body.contains("ETA: 9.0 minutes"));
        assert!(message.body.contains("Distance: 4.50 km"));
    }

    #[tokio::test]
    async fn test_dispatch_returns_token() {
        let delivery = Arc::new(RecordingDelivery::default());
        let dispatcher = AlertDispatcher::new(delivery.clone());

        let receipt = dispatcher
            .dispatch(request(Some(ContactChannel::Sms("+911234567890".to_string()))))
            .await
            .unwrap();

        assert_eq!(receipt.token, "msg-1");
        let sent = delivery.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ContactChannel::Sms("+911234567890".to_string()));
    }

    #[tokio::test]
    async fn test_missing_contact_is_delivery_error() {
        let delivery = Arc::new(RecordingDelivery::default());
        let dispatcher = AlertDispatcher::new(delivery.clone());

        let result = dispatcher.dispatch(request(None)).await;
        assert!(matches!(result, Err(GoldenError::Delivery(_))));
        assert!(delivery.sent.lock().unwrap().is_empty());
    }
}
