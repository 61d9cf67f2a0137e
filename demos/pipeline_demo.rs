//! 编排流程演示程序
//!
//! 使用内置医院数据、离线路线估算和日志告警，依次处理几个典型病例

use golden_core::{CaseIntake, ContactChannel, GoldenError, Location, PatientAge, Vitals};
use golden_integration::{
    CoordinatesGeocoder, EstimatedRouteProvider, InMemoryCaseStore, InMemoryFacilityStore,
    LogDelivery,
};
use golden_workflow::{
    AlertDispatcher, CandidateSelector, CapabilityRegistry, CaseOrchestrator, Collaborators,
    OrchestratorSettings, RouteEvaluator, RuleBasedTriage, SelectorSettings, TriagePolicy,
    WorkflowMetrics,
};
use std::sync::Arc;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    println!("🚑 急救编排流程演示\n");

    let metrics = Arc::new(WorkflowMetrics::new()?);
    let routes = Arc::new(EstimatedRouteProvider::default());
    let settings = SelectorSettings::default();

    let registry = CapabilityRegistry::new(
        Arc::new(RuleBasedTriage::new(TriagePolicy::default())),
        Arc::new(CandidateSelector::new(routes.clone(), settings.clone()).with_metrics(metrics.clone())),
        Arc::new(RouteEvaluator::new(routes, settings.lookup_timeout).with_metrics(metrics.clone())),
        Arc::new(AlertDispatcher::new(Arc::new(LogDelivery))),
    );

    let cases = Arc::new(InMemoryCaseStore::new());
    let orchestrator = CaseOrchestrator::new(
        registry,
        Collaborators {
            facilities: Arc::new(InMemoryFacilityStore::with_seed_data()?),
            cases: cases.clone(),
            geocoder: Arc::new(CoordinatesGeocoder),
        },
        metrics.clone(),
        OrchestratorSettings::default(),
    );
    println!("✅ 编排器已就绪（3 家内置医院）\n");

    let mut case_ids = Vec::new();
    for (label, intake) in sample_cases() {
        let case_id = Uuid::new_v4();
        case_ids.push(case_id);
        println!("📋 处理病例 {} ({})", case_id, label);

        match orchestrator.handle_case(case_id, intake).await {
            Ok(result) => {
                println!("   分诊: {} / 优先级 {}", result.triage.severity, result.triage.priority);
                println!(
                    "   指派: {} (ETA {:.1} 分钟, {:.2} km)",
                    result.assignment.facility.name,
                    result.assignment.route.eta_minutes,
                    result.assignment.route.distance_km
                );
                println!("   地址: {}", result.detected_address);
            }
            Err(e @ (GoldenError::NoSuitableFacility { .. } | GoldenError::NoReachableFacility { .. })) => {
                if let Some(triage) = e.triage() {
                    println!("   分诊: {} / 优先级 {}", triage.severity, triage.priority);
                }
                println!("   ⚠️  {}", e);
            }
            Err(e) => println!("   ❌ 处理失败: {}", e),
        }
        println!();
    }

    // 等待告警投递完成后再查看最终状态
    orchestrator.shutdown().await;

    println!("📊 病例最终状态:");
    for case_id in case_ids {
        if let Some(history) = cases.history(case_id).await {
            let path: Vec<String> = history.transitions.iter().map(|t| t.status.to_string()).collect();
            println!("   {} → {}", case_id, path.join(" → "));
        }
    }

    println!("\n📈 指标:\n{}", metrics.render()?);
    Ok(())
}

fn sample_cases() -> Vec<(&'static str, CaseIntake)> {
    vec![
        (
            "心脏骤停",
            CaseIntake {
                symptoms: vec!["cardiac arrest".to_string(), "unconscious".to_string()],
                vitals: Vitals {
                    oxygen_saturation: Some(84),
                    heart_rate: Some(42),
                    ..Vitals::default()
                },
                age: Some(PatientAge::Years(68)),
                location: Some(Location::new(28.5355, 77.2100)),
                description: "Collapsed at a market".to_string(),
                contact: Some(ContactChannel::Email("er-dispatch@example.com".to_string())),
            },
        ),
        (
            "轻度骨折",
            CaseIntake {
                symptoms: vec!["fracture".to_string()],
                vitals: Vitals {
                    blood_pressure: Some("150/95".to_string()),
                    ..Vitals::default()
                },
                age: Some(PatientAge::Bracket { min: 30, max: 40 }),
                location: Some(Location::new(28.6900, 77.1100)),
                description: "Fell from a bicycle".to_string(),
                contact: Some(ContactChannel::Sms("+911234567890".to_string())),
            },
        ),
        (
            "缺少定位",
            CaseIntake {
                symptoms: vec!["stroke".to_string()],
                ..CaseIntake::default()
            },
        ),
    ]
}
