//! RESTful API接口模块
//!
//! 对外提供急救上报、分诊、候选医院查询、病例查询和床位维护接口

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use golden_core::{
    CandidateSet, CaseIntake, CaseResult, Coordinates, Facility, GoldenError, Severity,
    TriageResult,
};
use golden_core::utils::normalize_tag;
use golden_workflow::{CaseOrchestrator, TriageRequest};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};
use uuid::Uuid;

use crate::store::{BedUpdate, CaseHistory, InMemoryCaseStore, InMemoryFacilityStore};

/// API状态
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<CaseOrchestrator>,
    pub facilities: Arc<InMemoryFacilityStore>,
    pub cases: Arc<InMemoryCaseStore>,
}

/// 错误响应
///
/// 病例终止结果（无合适/无可到达医院）返回 404，并附带分诊结论。
#[derive(Debug)]
pub struct ApiError(pub GoldenError);

impl From<GoldenError> for ApiError {
    fn from(e: GoldenError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            GoldenError::NoSuitableFacility { .. }
            | GoldenError::NoReachableFacility { .. }
            | GoldenError::NotFound(_) => StatusCode::NOT_FOUND,
            GoldenError::Validation(_) | GoldenError::Serialization(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }

        let mut body = json!({ "error": self.0.to_string() });
        if let Some(triage) = self.0.triage() {
            body["triage"] = json!(triage);
        }
        if let GoldenError::NoSuitableFacility { case_id, .. }
        | GoldenError::NoReachableFacility { case_id, .. } = &self.0
        {
            body["case_id"] = json!(case_id);
        }

        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// 候选医院查询请求
#[derive(Debug, Deserialize)]
pub struct HospitalQuery {
    pub severity: Severity,
    pub location: Coordinates,
    #[serde(default)]
    pub required_specialists: Vec<String>,
}

/// 健康检查响应
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub version: &'static str,
    pub facilities: usize,
}

/// 校验上报内容
///
/// 只拒绝明显错误的输入；缺失字段交给分诊处理。
pub fn validate_intake(intake: &CaseIntake) -> golden_core::Result<()> {
    if intake.symptoms.iter().all(|s| s.trim().is_empty()) {
        return Err(GoldenError::Validation("At least one symptom is required".to_string()));
    }

    if let Some(location) = &intake.location {
        let lat_ok = location.lat.map_or(true, |lat| (-90.0..=90.0).contains(&lat));
        let lng_ok = location.lng.map_or(true, |lng| (-180.0..=180.0).contains(&lng));
        if !lat_ok || !lng_ok {
            return Err(GoldenError::Validation("Location out of range".to_string()));
        }
    }

    if let Some(hr) = intake.vitals.heart_rate {
        if !(30..=200).contains(&hr) {
            return Err(GoldenError::Validation(format!("Heart rate {} out of range", hr)));
        }
    }
    if let Some(spo2) = intake.vitals.oxygen_saturation {
        if !(50..=100).contains(&spo2) {
            return Err(GoldenError::Validation(format!(
                "Oxygen saturation {} out of range",
                spo2
            )));
        }
    }

    if let Some(contact) = &intake.contact {
        if contact.address().trim().is_empty() {
            return Err(GoldenError::Validation("Contact address is empty".to_string()));
        }
    }

    Ok(())
}

/// API处理器
pub struct ApiHandler;

impl ApiHandler {
    /// 完整编排流程
    pub async fn report_emergency(
        State(state): State<ApiState>,
        Json(intake): Json<CaseIntake>,
    ) -> ApiResult<CaseResult> {
        validate_intake(&intake)?;

        let case_id = Uuid::new_v4();
        info!("Emergency reported, case {}", case_id);

        let result = state.orchestrator.handle_case(case_id, intake).await?;
        Ok(Json(result))
    }

    /// 仅分诊
    pub async fn triage(
        State(state): State<ApiState>,
        Json(request): Json<TriageRequest>,
    ) -> ApiResult<TriageResult> {
        debug!("Triage request with {} symptoms", request.symptoms.len());
        Ok(Json(state.orchestrator.classify(request).await?))
    }

    /// 指定严重程度和专科的候选医院查询
    pub async fn query_hospitals(
        State(state): State<ApiState>,
        Json(query): Json<HospitalQuery>,
    ) -> ApiResult<CandidateSet> {
        let specialists = query
            .required_specialists
            .iter()
            .map(|s| normalize_tag(s))
            .filter(|s| !s.is_empty())
            .collect();

        let candidates = state
            .orchestrator
            .query_candidates(query.severity, specialists, query.location)
            .await?;
        Ok(Json(candidates))
    }

    /// 病例记录及状态历史
    pub async fn get_case(
        State(state): State<ApiState>,
        Path(case_id): Path<Uuid>,
    ) -> ApiResult<CaseHistory> {
        state
            .cases
            .history(case_id)
            .await
            .map(Json)
            .ok_or_else(|| GoldenError::NotFound(format!("Case {}", case_id)).into())
    }

    pub async fn list_facilities(State(state): State<ApiState>) -> ApiResult<Vec<Facility>> {
        let snapshot = state.orchestrator.facilities().await?;
        Ok(Json(snapshot.as_slice().to_vec()))
    }

    /// 床位更新，之后的病例使用新快照
    pub async fn update_beds(
        State(state): State<ApiState>,
        Path(facility_id): Path<String>,
        Json(update): Json<BedUpdate>,
    ) -> ApiResult<Facility> {
        Ok(Json(state.facilities.update_beds(&facility_id, update).await?))
    }

    /// 健康检查
    pub async fn health_check(State(state): State<ApiState>) -> ApiResult<HealthResponse> {
        let snapshot = state.orchestrator.facilities().await?;
        Ok(Json(HealthResponse {
            status: "healthy",
            timestamp: chrono::Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION"),
            facilities: snapshot.len(),
        }))
    }

    /// Prometheus 指标
    pub async fn metrics(State(state): State<ApiState>) -> Result<Response, ApiError> {
        let text = state.orchestrator.metrics().render()?;
        Ok((
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response())
    }
}

/// 创建API路由
pub fn create_api_routes(state: ApiState) -> Router {
    let api = Router::new()
        .route("/emergency", post(ApiHandler::report_emergency))
        .route("/triage", post(ApiHandler::triage))
        .route("/hospitals", post(ApiHandler::query_hospitals))
        .route("/cases/:id", get(ApiHandler::get_case))
        .route("/facilities", get(ApiHandler::list_facilities))
        .route("/facilities/:id/beds", put(ApiHandler::update_beds));

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(ApiHandler::health_check))
        .route("/metrics", get(ApiHandler::metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// API服务器
pub struct ApiServer {
    app: Router,
}

impl ApiServer {
    pub fn new(state: ApiState) -> Self {
        let app = create_api_routes(state).layer(CorsLayer::permissive());
        Self { app }
    }

    /// 运行直到 `shutdown` 完成
    pub async fn run<F>(self, addr: &str, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("Starting API server on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("API server stopped");
        Ok(())
    }
}
