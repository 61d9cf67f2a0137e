//! 编排流程场景测试

use async_trait::async_trait;
use golden_core::{
    AlertDeliveryProvider, AlertTicketStatus, CaseIntake, CaseRecord, CaseStatus, CaseStore,
    ContactChannel, Coordinates, Facility, FacilitySnapshot, FacilityStore, GeocodeProvider,
    GoldenError, Location, PatientAge, Result, RouteMetrics, RouteMetricsProvider, Severity,
    TriageResult, Vitals,
};
use golden_workflow::{
    AlertDispatcher, CandidateSelector, CapabilityRegistry, CaseOrchestrator, Collaborators,
    OrchestratorSettings, RouteEvaluator, RuleBasedTriage, SelectorSettings, TriageRequest,
    TriageService, WorkflowMetrics, FALLBACK_ADDRESS,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

// ---- 测试替身 ----

/// 按目的地坐标查表，未登记的目的地查询失败
struct ScriptedRoutes {
    table: HashMap<String, RouteMetrics>,
}

impl ScriptedRoutes {
    fn new(entries: &[(Coordinates, f64, f64)]) -> Self {
        let table = entries
            .iter()
            .map(|(c, distance_km, eta_minutes)| {
                (
                    c.to_string(),
                    RouteMetrics {
                        distance_km: *distance_km,
                        eta_minutes: *eta_minutes,
                    },
                )
            })
            .collect();
        Self { table }
    }
}

#[async_trait]
impl RouteMetricsProvider for ScriptedRoutes {
    async fn get_route(&self, _origin: Coordinates, destination: Coordinates) -> Result<RouteMetrics> {
        self.table
            .get(&destination.to_string())
            .copied()
            .ok_or_else(|| GoldenError::Lookup(format!("no route to {}", destination)))
    }
}

struct FailingRoutes;

#[async_trait]
impl RouteMetricsProvider for FailingRoutes {
    async fn get_route(&self, _origin: Coordinates, _destination: Coordinates) -> Result<RouteMetrics> {
        Err(GoldenError::Lookup("routing service down".to_string()))
    }
}

struct FixedGeocoder(Option<&'static str>);

#[async_trait]
impl GeocodeProvider for FixedGeocoder {
    async fn reverse_lookup(&self, _lat: f64, _lng: f64) -> Result<String> {
        self.0
            .map(str::to_string)
            .ok_or_else(|| GoldenError::Lookup("geocoder down".to_string()))
    }
}

struct StaticFacilities(FacilitySnapshot);

#[async_trait]
impl FacilityStore for StaticFacilities {
    async fn list_all(&self) -> Result<FacilitySnapshot> {
        Ok(self.0.clone())
    }
}

/// 记录每次写入，便于检查状态历史
#[derive(Default)]
struct RecordingCaseStore {
    records: Mutex<HashMap<Uuid, CaseRecord>>,
    history: Mutex<HashMap<Uuid, Vec<CaseStatus>>>,
}

impl RecordingCaseStore {
    fn history(&self, case_id: Uuid) -> Vec<CaseStatus> {
        self.history.lock().unwrap().get(&case_id).cloned().unwrap_or_default()
    }

    fn status(&self, case_id: Uuid) -> Option<CaseStatus> {
        self.records.lock().unwrap().get(&case_id).map(|r| r.status)
    }

    fn write(&self, record: CaseRecord) {
        let mut history = self.history.lock().unwrap();
        let statuses = history.entry(record.case_id).or_default();
        if statuses.last() != Some(&record.status) {
            statuses.push(record.status);
        }
        self.records.lock().unwrap().insert(record.case_id, record);
    }
}

#[async_trait]
impl CaseStore for RecordingCaseStore {
    async fn create(&self, record: CaseRecord) -> Result<()> {
        self.write(record);
        Ok(())
    }

    async fn update(&self, record: CaseRecord) -> Result<()> {
        self.write(record);
        Ok(())
    }

    async fn get(&self, case_id: Uuid) -> Result<Option<CaseRecord>> {
        Ok(self.records.lock().unwrap().get(&case_id).cloned())
    }
}

#[derive(Default)]
struct RecordingDelivery {
    sent: Mutex<Vec<(ContactChannel, String, String)>>,
}

impl RecordingDelivery {
    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl AlertDeliveryProvider for RecordingDelivery {
    async fn send(&self, channel: &ContactChannel, subject: &str, body: &str) -> Result<String> {
        let mut sent = self.sent.lock().unwrap();
        sent.push((channel.clone(), subject.to_string(), body.to_string()));
        Ok(format!("delivery-{}", sent.len()))
    }
}

struct BrokenTriage;

#[async_trait]
impl TriageService for BrokenTriage {
    async fn classify(&self, _request: TriageRequest) -> Result<TriageResult> {
        Err(GoldenError::Internal("classifier crashed".to_string()))
    }
}

// ---- 组装 ----

struct Harness {
    orchestrator: CaseOrchestrator,
    cases: Arc<RecordingCaseStore>,
    delivery: Arc<RecordingDelivery>,
    metrics: Arc<WorkflowMetrics>,
}

fn registry(routes: Arc<dyn RouteMetricsProvider>, delivery: Arc<RecordingDelivery>) -> CapabilityRegistry {
    CapabilityRegistry::new(
        Arc::new(RuleBasedTriage::default()),
        Arc::new(CandidateSelector::new(routes.clone(), SelectorSettings::default())),
        Arc::new(RouteEvaluator::new(routes, Duration::from_secs(1))),
        Arc::new(AlertDispatcher::new(delivery)),
    )
}

fn harness_with(
    registry: CapabilityRegistry,
    delivery: Arc<RecordingDelivery>,
    geocoder: FixedGeocoder,
    facilities: Vec<Facility>,
) -> Harness {
    let cases = Arc::new(RecordingCaseStore::default());
    let metrics = Arc::new(WorkflowMetrics::new().unwrap());

    let orchestrator = CaseOrchestrator::new(
        registry,
        Collaborators {
            facilities: Arc::new(StaticFacilities(FacilitySnapshot::new(facilities))),
            cases: cases.clone(),
            geocoder: Arc::new(geocoder),
        },
        metrics.clone(),
        OrchestratorSettings::default(),
    );

    Harness {
        orchestrator,
        cases,
        delivery,
        metrics,
    }
}

fn harness(routes: Arc<dyn RouteMetricsProvider>, geocoder: FixedGeocoder, facilities: Vec<Facility>) -> Harness {
    let delivery = Arc::new(RecordingDelivery::default());
    harness_with(registry(routes, delivery.clone()), delivery, geocoder, facilities)
}

fn facility(id: &str, location: Coordinates, icu: u32, er: u32, specialists: &[&str]) -> Facility {
    Facility {
        id: id.to_string(),
        name: format!("{} Hospital", id),
        location,
        critical_care_beds: icu,
        emergency_beds: er,
        specialists: specialists.iter().map(|s| s.to_string()).collect(),
    }
}

fn cardiac_intake() -> CaseIntake {
    CaseIntake {
        symptoms: vec!["cardiac arrest".to_string()],
        vitals: Vitals {
            oxygen_saturation: Some(82),
            ..Vitals::default()
        },
        age: Some(PatientAge::Years(70)),
        location: Some(Location::new(28.5245, 77.2066)),
        description: "Collapsed while walking".to_string(),
        contact: Some(ContactChannel::Email("dispatch@example.com".to_string())),
    }
}

const FULL_ICU: Coordinates = Coordinates { lat: 28.5300, lng: 77.2100 };
const OPEN_ICU: Coordinates = Coordinates { lat: 28.5400, lng: 77.2100 };

fn cardiac_facilities() -> Vec<Facility> {
    vec![
        facility("full", FULL_ICU, 0, 6, &["cardiologist"]),
        facility("open", OPEN_ICU, 1, 0, &["cardiologist", "neurologist"]),
    ]
}

fn cardiac_routes() -> Arc<ScriptedRoutes> {
    Arc::new(ScriptedRoutes::new(&[(FULL_ICU, 1.0, 3.0), (OPEN_ICU, 2.0, 5.0)]))
}

// ---- 场景 ----

#[tokio::test]
async fn cardiac_arrest_is_assigned_to_facility_with_icu_bed() {
    let h = harness(cardiac_routes(), FixedGeocoder(Some("Saket, New Delhi")), cardiac_facilities());
    let case_id = Uuid::new_v4();

    let result = h.orchestrator.handle_case(case_id, cardiac_intake()).await.unwrap();

    assert_eq!(result.triage.severity, Severity::Red);
    assert!(result.triage.recommended_specialists.contains("cardiologist"));
    assert_eq!(result.assignment.facility.id, "open");
    assert_eq!(result.candidates.len(), 1);
    assert!(result.candidates.iter().all(|c| c.facility.critical_care_beds >= 1));
    assert_eq!(result.detected_address, "Saket, New Delhi");
    assert_eq!(result.alert.status, AlertTicketStatus::Queued);
    assert_eq!(result.status, CaseStatus::Assigned);

    h.orchestrator.shutdown().await;

    assert_eq!(
        h.cases.history(case_id),
        vec![
            CaseStatus::IntakeReceived,
            CaseStatus::Triaged,
            CaseStatus::CandidatesSelected,
            CaseStatus::Assigned,
            CaseStatus::AlertDispatched,
        ]
    );

    let sent = h.delivery.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, "URGENT: Incoming Emergency - RED");
    assert!(sent[0].2.contains("open Hospital"));
    assert_eq!(h.metrics.case_count(CaseStatus::AlertDispatched), 1);
}

#[tokio::test]
async fn missing_location_still_triages_and_reports_unreachable() {
    let h = harness(cardiac_routes(), FixedGeocoder(Some("unused")), cardiac_facilities());
    let case_id = Uuid::new_v4();
    let intake = CaseIntake {
        location: None,
        ..cardiac_intake()
    };

    let err = h.orchestrator.handle_case(case_id, intake).await.unwrap_err();

    match &err {
        GoldenError::NoReachableFacility { case_id: id, triage } => {
            assert_eq!(*id, case_id);
            assert_eq!(triage.severity, Severity::Red);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    h.orchestrator.shutdown().await;
    assert_eq!(h.cases.status(case_id), Some(CaseStatus::NoRoute));
    assert_eq!(h.delivery.count(), 0);
}

#[tokio::test]
async fn all_route_lookups_failing_is_unreachable_without_alert() {
    let h = harness(Arc::new(FailingRoutes), FixedGeocoder(Some("unused")), cardiac_facilities());
    let case_id = Uuid::new_v4();

    let err = h.orchestrator.handle_case(case_id, cardiac_intake()).await.unwrap_err();
    assert!(matches!(err, GoldenError::NoReachableFacility { .. }));

    h.orchestrator.shutdown().await;
    assert_eq!(h.cases.status(case_id), Some(CaseStatus::NoRoute));
    assert_eq!(h.delivery.count(), 0);
    assert_eq!(h.metrics.case_count(CaseStatus::NoRoute), 1);
    assert!(h.metrics.excluded_lookup_count("candidates") >= 1);
}

#[tokio::test]
async fn no_matching_specialist_is_no_suitable_facility() {
    let h = harness(cardiac_routes(), FixedGeocoder(Some("unused")), cardiac_facilities());
    let case_id = Uuid::new_v4();
    let intake = CaseIntake {
        symptoms: vec!["gunshot wound".to_string()],
        ..cardiac_intake()
    };

    let err = h.orchestrator.handle_case(case_id, intake).await.unwrap_err();
    match err {
        GoldenError::NoSuitableFacility { triage, .. } => {
            assert!(triage.recommended_specialists.contains("trauma_surgeon"));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    h.orchestrator.shutdown().await;
    assert_eq!(
        h.cases.history(case_id),
        vec![CaseStatus::IntakeReceived, CaseStatus::Triaged, CaseStatus::NoCandidates]
    );
    assert_eq!(h.delivery.count(), 0);
}

#[tokio::test]
async fn ranking_uses_distance_but_assignment_uses_eta() {
    let near_slow = Coordinates::new(28.60, 77.20);
    let far_fast = Coordinates::new(28.70, 77.20);
    let routes = Arc::new(ScriptedRoutes::new(&[(near_slow, 2.0, 25.0), (far_fast, 6.0, 9.0)]));
    let facilities = vec![
        facility("near_slow", near_slow, 2, 2, &["cardiologist"]),
        facility("far_fast", far_fast, 2, 2, &["cardiologist"]),
    ];
    let h = harness(routes, FixedGeocoder(Some("Saket")), facilities);

    let result = h.orchestrator.handle_case(Uuid::new_v4(), cardiac_intake()).await.unwrap();

    // 候选按距离排序，最终分配按到达时间
    assert_eq!(result.candidates.as_slice()[0].facility.id, "near_slow");
    assert_eq!(result.assignment.facility.id, "far_fast");
    h.orchestrator.shutdown().await;
}

#[tokio::test]
async fn identical_inputs_yield_identical_results() {
    let h = harness(cardiac_routes(), FixedGeocoder(Some("Saket")), cardiac_facilities());
    let intake = CaseIntake {
        symptoms: vec!["high fever".to_string()],
        ..cardiac_intake()
    };

    let first = h.orchestrator.handle_case(Uuid::new_v4(), intake.clone()).await.unwrap();
    let second = h.orchestrator.handle_case(Uuid::new_v4(), intake).await.unwrap();

    assert_eq!(first.candidates, second.candidates);
    assert_eq!(first.assignment, second.assignment);
    h.orchestrator.shutdown().await;
}

#[tokio::test]
async fn geocoding_failure_falls_back_to_coordinates_only() {
    let h = harness(cardiac_routes(), FixedGeocoder(None), cardiac_facilities());

    let result = h.orchestrator.handle_case(Uuid::new_v4(), cardiac_intake()).await.unwrap();
    assert_eq!(result.detected_address, FALLBACK_ADDRESS);

    h.orchestrator.shutdown().await;
    assert!(h.delivery.sent.lock().unwrap()[0].2.contains(FALLBACK_ADDRESS));
}

#[tokio::test]
async fn alert_failure_is_recorded_out_of_band() {
    let h = harness(cardiac_routes(), FixedGeocoder(Some("Saket")), cardiac_facilities());
    let case_id = Uuid::new_v4();
    let intake = CaseIntake {
        contact: None,
        ..cardiac_intake()
    };

    // 调用方拿到的是成功结果，投递失败只体现在病例存储中
    let result = h.orchestrator.handle_case(case_id, intake).await.unwrap();
    assert_eq!(result.alert.status, AlertTicketStatus::Queued);

    h.orchestrator.shutdown().await;
    assert_eq!(h.cases.status(case_id), Some(CaseStatus::AlertFailed));
    assert_eq!(h.metrics.alert_count("failed"), 1);
}

#[tokio::test]
async fn stage_failure_leaves_last_status_with_note() {
    let delivery = Arc::new(RecordingDelivery::default());
    let mut registry = registry(cardiac_routes(), delivery.clone());
    registry.replace_triage(Arc::new(BrokenTriage));
    let h = harness_with(registry, delivery, FixedGeocoder(Some("Saket")), cardiac_facilities());
    let case_id = Uuid::new_v4();

    let err = h.orchestrator.handle_case(case_id, cardiac_intake()).await.unwrap_err();
    assert!(matches!(err, GoldenError::Internal(_)));

    let record = h.orchestrator.case_record(case_id).await.unwrap().unwrap();
    assert_eq!(record.status, CaseStatus::IntakeReceived);
    assert!(record.note.unwrap().contains("classifier crashed"));
    h.orchestrator.shutdown().await;
}

#[tokio::test]
async fn concurrent_cases_do_not_interfere() {
    let h = Arc::new(harness(cardiac_routes(), FixedGeocoder(Some("Saket")), cardiac_facilities()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            let case_id = Uuid::new_v4();
            let result = h.orchestrator.handle_case(case_id, cardiac_intake()).await;
            (case_id, result)
        }));
    }

    for handle in handles {
        let (case_id, result) = handle.await.unwrap();
        let result = result.unwrap();
        assert_eq!(result.case_id, case_id);
        assert_eq!(result.assignment.facility.id, "open");
    }

    h.orchestrator.shutdown().await;
    assert_eq!(h.delivery.count(), 8);
}
