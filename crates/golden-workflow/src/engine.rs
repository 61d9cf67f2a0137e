//! 病例编排引擎
//!
//! 通过能力注册表依次驱动分诊、候选筛选、路线评估和告警四个阶段。
//! 每个阶段只接收从上一阶段结果重塑出的输入，每次状态转换都写入病例存储。

use chrono::Utc;
use golden_core::{
    AlertTicketStatus, Assignment, CandidateSet, CaseIntake, CaseRecord, CaseResult, CaseStore,
    Coordinates, FacilitySnapshot, FacilityStore, GeocodeProvider, GoldenError, Result, Severity,
    TriageResult,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::alert::{AlertRequest, CaseSummary};
use crate::alert_queue::{AlertQueue, AlertQueueHandle};
use crate::candidates::CandidateRequest;
use crate::metrics::WorkflowMetrics;
use crate::registry::CapabilityRegistry;
use crate::routing::RouteRequest;
use crate::state_machine::{CaseEvent, CaseStateMachine};
use crate::triage::TriageRequest;

/// 逆地理编码失败时使用的地址
pub const FALLBACK_ADDRESS: &str = "GPS coordinates only";

/// 编排器参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    pub geocode_timeout: Duration,
    pub alert_queue_capacity: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            geocode_timeout: Duration::from_secs(3),
            alert_queue_capacity: 256,
        }
    }
}

/// 编排器依赖的外部协作方
#[derive(Clone)]
pub struct Collaborators {
    pub facilities: Arc<dyn FacilityStore>,
    pub cases: Arc<dyn CaseStore>,
    pub geocoder: Arc<dyn GeocodeProvider>,
}

/// 病例编排器
pub struct CaseOrchestrator {
    registry: CapabilityRegistry,
    collaborators: Collaborators,
    alert_queue: AlertQueueHandle,
    state_machine: CaseStateMachine,
    metrics: Arc<WorkflowMetrics>,
    settings: OrchestratorSettings,
}

impl CaseOrchestrator {
    /// 创建编排器并启动告警队列，必须在 tokio 运行时内调用
    pub fn new(
        registry: CapabilityRegistry,
        collaborators: Collaborators,
        metrics: Arc<WorkflowMetrics>,
        settings: OrchestratorSettings,
    ) -> Self {
        let alert_queue = AlertQueue::start(
            registry.alerts(),
            collaborators.cases.clone(),
            metrics.clone(),
            settings.alert_queue_capacity,
        );

        Self {
            registry,
            collaborators,
            alert_queue,
            state_machine: CaseStateMachine::new(),
            metrics,
            settings,
        }
    }

    pub fn metrics(&self) -> &Arc<WorkflowMetrics> {
        &self.metrics
    }

    /// 处理一个急救病例
    ///
    /// 没有合适医院时返回 `NoSuitableFacility`，没有可到达医院（含缺少定位）时返回
    /// `NoReachableFacility`，两者都携带分诊结论。告警在后台投递，返回时不等待。
    #[tracing::instrument(name = "handle_case", skip_all, fields(case_id = %case_id))]
    pub async fn handle_case(&self, case_id: Uuid, intake: CaseIntake) -> Result<CaseResult> {
        info!("Handling emergency case");

        let mut record = CaseRecord::new(case_id);
        self.collaborators.cases.create(record.clone()).await?;

        let outcome = self.run_pipeline(case_id, &intake, &mut record).await;

        if let Err(e) = &outcome {
            if e.is_terminal_outcome() {
                self.metrics.record_case(record.status);
            } else {
                error!("Case pipeline aborted in {}: {}", record.status, e);
                // 保留最后到达的状态，附带失败原因
                record.note = Some(e.to_string());
                record.updated_at = Utc::now();
                if let Err(store_err) = self.collaborators.cases.update(record).await {
                    error!("Failed to record pipeline failure: {}", store_err);
                }
            }
        }

        outcome
    }

    async fn run_pipeline(
        &self,
        case_id: Uuid,
        intake: &CaseIntake,
        record: &mut CaseRecord,
    ) -> Result<CaseResult> {
        // 1. 分诊
        let started = Instant::now();
        let triage = self.registry.triage().classify(triage_request(intake)).await?;
        self.metrics.observe_stage("triage", started.elapsed());
        info!(
            "Triage complete: {} (priority {}), specialists {:?}",
            triage.severity, triage.priority, triage.recommended_specialists
        );

        record.triage = Some(triage.clone());
        self.advance(record, CaseEvent::Triaged).await?;

        // 缺少定位时无法计算任何路线
        let Some(origin) = intake.coordinates() else {
            warn!("Case has no usable location, no facility can be routed");
            record.note = Some("location missing or invalid".to_string());
            self.advance(record, CaseEvent::RouteUnavailable).await?;
            return Err(GoldenError::NoReachableFacility {
                case_id,
                triage: Box::new(triage),
            });
        };

        // 2. 候选筛选
        let started = Instant::now();
        let facilities = self.collaborators.facilities.list_all().await?;
        let candidates = self
            .registry
            .candidates()
            .select(candidate_request(&triage, origin, facilities))
            .await?;
        self.metrics.observe_stage("candidates", started.elapsed());

        if candidates.is_empty() && candidates.unreachable() > 0 {
            warn!(
                "{} suitable facilities found but none could be routed",
                candidates.unreachable()
            );
            self.advance(record, CaseEvent::RouteUnavailable).await?;
            return Err(GoldenError::NoReachableFacility {
                case_id,
                triage: Box::new(triage),
            });
        }

        if candidates.is_empty() {
            warn!(
                "No facility satisfies {} with specialists {:?}",
                triage.severity, triage.recommended_specialists
            );
            self.advance(record, CaseEvent::CandidatesExhausted).await?;
            return Err(GoldenError::NoSuitableFacility {
                case_id,
                triage: Box::new(triage),
            });
        }
        self.advance(record, CaseEvent::CandidatesSelected).await?;

        // 3. 路线评估
        let started = Instant::now();
        let assignment = self
            .registry
            .routes()
            .evaluate(RouteRequest {
                origin,
                facilities: candidates.facility_refs(),
            })
            .await?;
        self.metrics.observe_stage("routing", started.elapsed());

        let Some(assignment) = assignment else {
            self.advance(record, CaseEvent::RouteUnavailable).await?;
            return Err(GoldenError::NoReachableFacility {
                case_id,
                triage: Box::new(triage),
            });
        };

        record.assignment = Some(assignment.clone());
        self.advance(record, CaseEvent::Assigned).await?;

        // 4. 告警（后台投递）
        let detected_address = self.detect_address(origin).await;
        let alert = self.alert_queue.enqueue(alert_request(
            case_id,
            intake,
            &triage,
            &detected_address,
            &assignment,
        ));

        if alert.status == AlertTicketStatus::Dropped {
            record.note = Some("alert queue unavailable".to_string());
            self.advance(record, CaseEvent::AlertFailed).await?;
            self.metrics.record_case(record.status);
        }

        Ok(CaseResult {
            case_id,
            intake: intake.clone(),
            triage,
            candidates,
            assignment,
            detected_address,
            alert,
            status: record.status,
            completed_at: Utc::now(),
        })
    }

    /// 仅执行分诊
    pub async fn classify(&self, request: TriageRequest) -> Result<TriageResult> {
        self.registry.triage().classify(request).await
    }

    /// 针对指定严重程度和专科查询候选医院，不创建病例
    pub async fn query_candidates(
        &self,
        severity: Severity,
        required_specialists: BTreeSet<String>,
        origin: Coordinates,
    ) -> Result<CandidateSet> {
        if !origin.is_valid() {
            return Err(GoldenError::Validation(format!("Invalid coordinates: {}", origin)));
        }

        let facilities = self.collaborators.facilities.list_all().await?;
        self.registry
            .candidates()
            .select(CandidateRequest {
                severity,
                required_specialists,
                origin,
                facilities,
            })
            .await
    }

    pub async fn case_record(&self, case_id: Uuid) -> Result<Option<CaseRecord>> {
        self.collaborators.cases.get(case_id).await
    }

    pub async fn facilities(&self) -> Result<FacilitySnapshot> {
        self.collaborators.facilities.list_all().await
    }

    /// 停止告警队列并等待已排队告警投递完毕
    pub async fn shutdown(&self) {
        self.alert_queue.shutdown().await;
    }

    async fn advance(&self, record: &mut CaseRecord, event: CaseEvent) -> Result<()> {
        let next = self.state_machine.transition(record.status, event)?;
        record.advance(next);
        self.collaborators.cases.update(record.clone()).await?;
        info!("Case advanced to {}", next);
        Ok(())
    }

    async fn detect_address(&self, origin: Coordinates) -> String {
        let lookup = self.collaborators.geocoder.reverse_lookup(origin.lat, origin.lng);
        match tokio::time::timeout(self.settings.geocode_timeout, lookup).await {
            Ok(Ok(address)) => address,
            Ok(Err(e)) => {
                warn!("Reverse geocoding failed: {}", e);
                FALLBACK_ADDRESS.to_string()
            }
            Err(_) => {
                warn!("Reverse geocoding timed out after {:?}", self.settings.geocode_timeout);
                FALLBACK_ADDRESS.to_string()
            }
        }
    }
}

fn triage_request(intake: &CaseIntake) -> TriageRequest {
    TriageRequest {
        symptoms: intake.symptoms.clone(),
        vitals: intake.vitals.clone(),
        age: intake.age,
    }
}

fn candidate_request(triage: &TriageResult, origin: Coordinates, facilities: FacilitySnapshot) -> CandidateRequest {
    CandidateRequest {
        severity: triage.severity,
        required_specialists: triage.recommended_specialists.clone(),
        origin,
        facilities,
    }
}

fn alert_request(
    case_id: Uuid,
    intake: &CaseIntake,
    triage: &TriageResult,
    address: &str,
    assignment: &Assignment,
) -> AlertRequest {
    AlertRequest {
        case_id,
        summary: CaseSummary {
            severity: triage.severity,
            priority: triage.priority,
            description: intake.description.clone(),
            address: address.to_string(),
            contact: intake.contact.clone(),
        },
        assignment: assignment.clone(),
    }
}
