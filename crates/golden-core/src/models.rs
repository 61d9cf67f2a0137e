//! 核心数据模型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::GoldenError;

/// 经纬度坐标
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// 纬度在 [-90, 90]，经度在 [-180, 180]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.lat, self.lng)
    }
}

/// 上报位置，经纬度均可缺失
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl Location {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat: Some(lat),
            lng: Some(lng),
        }
    }

    /// 只有经纬度都存在且合法时才返回坐标
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)).filter(Coordinates::is_valid),
            _ => None,
        }
    }
}

/// 血压读数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloodPressure {
    pub systolic: u32,
    pub diastolic: u32,
}

impl FromStr for BloodPressure {
    type Err = GoldenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (systolic, diastolic) = s
            .split_once('/')
            .ok_or_else(|| GoldenError::Validation(format!("Invalid blood pressure: {}", s)))?;

        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .map_err(|_| GoldenError::Validation(format!("Invalid blood pressure: {}", s)))
        };

        Ok(Self {
            systolic: parse(systolic)?,
            diastolic: parse(diastolic)?,
        })
    }
}

/// 生命体征，各字段均可缺失
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    /// 形如 "140/90"
    #[serde(default, alias = "bloodPressure")]
    pub blood_pressure: Option<String>,
    #[serde(default, alias = "heartRate")]
    pub heart_rate: Option<u32>,
    /// 血氧饱和度（百分比）
    #[serde(default, alias = "oxygenLevel", alias = "oxygenSaturation")]
    pub oxygen_saturation: Option<u32>,
}

impl Vitals {
    /// 解析血压，格式错误时视为缺失
    pub fn blood_pressure_reading(&self) -> Option<BloodPressure> {
        self.blood_pressure
            .as_deref()
            .and_then(|bp| bp.parse().ok())
    }
}

/// 患者年龄：具体岁数或年龄段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAge", into = "String")]
pub enum PatientAge {
    Years(u32),
    Bracket { min: u32, max: u32 },
}

impl PatientAge {
    /// 用于风险评估的年龄上限
    pub fn upper_bound(&self) -> u32 {
        match self {
            PatientAge::Years(years) => *years,
            PatientAge::Bracket { max, .. } => *max,
        }
    }
}

impl FromStr for PatientAge {
    type Err = GoldenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GoldenError::Validation(format!("Invalid age: {}", s));
        let s = s.trim();

        match s.split_once('-') {
            Some((min, max)) => {
                let min: u32 = min.trim().parse().map_err(|_| invalid())?;
                let max: u32 = max.trim().parse().map_err(|_| invalid())?;
                if min > max {
                    return Err(invalid());
                }
                Ok(PatientAge::Bracket { min, max })
            }
            None => s.parse().map(PatientAge::Years).map_err(|_| invalid()),
        }
    }
}

impl fmt::Display for PatientAge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatientAge::Years(years) => write!(f, "{}", years),
            PatientAge::Bracket { min, max } => write!(f, "{}-{}", min, max),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAge {
    Number(u32),
    Text(String),
}

impl TryFrom<RawAge> for PatientAge {
    type Error = GoldenError;

    fn try_from(raw: RawAge) -> Result<Self, Self::Error> {
        match raw {
            RawAge::Number(years) => Ok(PatientAge::Years(years)),
            RawAge::Text(text) => text.parse(),
        }
    }
}

impl From<PatientAge> for String {
    fn from(age: PatientAge) -> Self {
        age.to_string()
    }
}

/// 告警联系渠道
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "address", rename_all = "lowercase")]
pub enum ContactChannel {
    Email(String),
    Sms(String),
}

impl ContactChannel {
    pub fn address(&self) -> &str {
        match self {
            ContactChannel::Email(address) | ContactChannel::Sms(address) => address,
        }
    }
}

impl fmt::Display for ContactChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactChannel::Email(address) => write!(f, "email:{}", address),
            ContactChannel::Sms(number) => write!(f, "sms:{}", number),
        }
    }
}

/// 症状列表：接受字符串数组，或逗号分隔的单个字符串
pub fn deserialize_symptoms<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Symptoms {
        List(Vec<String>),
        Text(String),
    }

    Ok(match Symptoms::deserialize(deserializer)? {
        Symptoms::List(list) => list,
        Symptoms::Text(text) => text
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
    })
}

/// 急救上报信息，提交给编排器后不可变
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseIntake {
    #[serde(deserialize_with = "deserialize_symptoms")]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub vitals: Vitals,
    #[serde(default)]
    pub age: Option<PatientAge>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub contact: Option<ContactChannel>,
}

impl CaseIntake {
    pub fn coordinates(&self) -> Option<Coordinates> {
        self.location.as_ref().and_then(Location::coordinates)
    }
}

/// 分诊严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Red,    // 危及生命
    Yellow, // 中度风险
    Green,  // 轻症
}

impl Severity {
    /// 优先级排名，数值越小越紧急
    pub fn priority(&self) -> u8 {
        match self {
            Severity::Red => 1,
            Severity::Yellow => 2,
            Severity::Green => 3,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Red => write!(f, "RED"),
            Severity::Yellow => write!(f, "YELLOW"),
            Severity::Green => write!(f, "GREEN"),
        }
    }
}

impl FromStr for Severity {
    type Err = GoldenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RED" => Ok(Severity::Red),
            "YELLOW" => Ok(Severity::Yellow),
            "GREEN" => Ok(Severity::Green),
            _ => Err(GoldenError::Validation(format!("Unknown severity: {}", s))),
        }
    }
}

/// 分诊结论
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageResult {
    pub severity: Severity,
    pub priority: u8,
    pub recommended_specialists: BTreeSet<String>,
    /// 命中的判定依据，便于人工复核
    #[serde(default)]
    pub indicators: Vec<String>,
}

/// 医院信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: String,
    pub name: String,
    pub location: Coordinates,
    /// ICU（重症监护）空床数
    pub critical_care_beds: u32,
    /// 急诊空床数
    pub emergency_beds: u32,
    pub specialists: BTreeSet<String>,
}

impl Facility {
    /// 空床总数，按 u64 计算避免溢出
    pub fn total_beds(&self) -> u64 {
        u64::from(self.critical_care_beds) + u64::from(self.emergency_beds)
    }

    /// 是否具备全部所需专科
    pub fn supports_all(&self, required: &BTreeSet<String>) -> bool {
        required.is_subset(&self.specialists)
    }

    pub fn to_ref(&self) -> FacilityRef {
        FacilityRef {
            id: self.id.clone(),
            name: self.name.clone(),
            location: self.location,
        }
    }
}

/// 路线评估所需的医院引用（不含床位等完整信息）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityRef {
    pub id: String,
    pub name: String,
    pub location: Coordinates,
}

/// 医院只读快照
///
/// 每次编排使用一份快照，床位更新通过存储产生新的快照，不修改旧快照。
#[derive(Debug, Clone, Default)]
pub struct FacilitySnapshot(Arc<Vec<Facility>>);

impl FacilitySnapshot {
    pub fn new(facilities: Vec<Facility>) -> Self {
        Self(Arc::new(facilities))
    }

    pub fn get(&self, id: &str) -> Option<&Facility> {
        self.0.iter().find(|facility| facility.id == id)
    }

    pub fn as_slice(&self) -> &[Facility] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Facility> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// 路线指标
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteMetrics {
    pub distance_km: f64,
    pub eta_minutes: f64,
}

/// 候选医院
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub facility: Facility,
    pub route: RouteMetrics,
}

/// 候选医院集合
///
/// 按距离升序排列，距离相同时按总空床数降序，最多保留 `limit` 个。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateSet {
    candidates: Vec<Candidate>,
    /// 通过床位与专科过滤、但路线查询失败的医院数
    #[serde(skip)]
    unreachable: usize,
}

impl CandidateSet {
    pub const DEFAULT_LIMIT: usize = 5;

    /// 排序并截断。排序是稳定的，完全相同的键保持输入顺序。
    pub fn rank(mut candidates: Vec<Candidate>, limit: usize) -> Self {
        candidates.sort_by(|a, b| {
            a.route
                .distance_km
                .total_cmp(&b.route.distance_km)
                .then_with(|| b.facility.total_beds().cmp(&a.facility.total_beds()))
        });
        candidates.truncate(limit);
        Self {
            candidates,
            unreachable: 0,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_unreachable(mut self, unreachable: usize) -> Self {
        self.unreachable = unreachable;
        self
    }

    /// 为空且存在被排除的医院时，说明有合适医院但都无法到达
    pub fn unreachable(&self) -> usize {
        self.unreachable
    }

    pub fn as_slice(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.candidates.iter()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// 为路线评估阶段重塑的医院引用
    pub fn facility_refs(&self) -> Vec<FacilityRef> {
        self.candidates.iter().map(|c| c.facility.to_ref()).collect()
    }
}

/// 最终分配结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub facility: FacilityRef,
    pub route: RouteMetrics,
}

/// 告警投递回执
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub token: String,
    pub channel: ContactChannel,
    pub delivered_at: DateTime<Utc>,
}

/// 告警排队状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertTicketStatus {
    Queued,  // 已进入后台队列
    Dropped, // 队列已满或已关闭
}

/// 告警调度凭据，表示告警已交给后台任务（而非已送达）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertTicket {
    pub alert_id: Uuid,
    pub status: AlertTicketStatus,
}

/// 病例状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    IntakeReceived,     // 已接收
    Triaged,            // 已分诊
    CandidatesSelected, // 已筛选候选医院
    Assigned,           // 已分配医院
    AlertDispatched,    // 告警已送达
    AlertFailed,        // 告警投递失败
    NoCandidates,       // 无合适医院
    NoRoute,            // 无可到达医院
}

impl CaseStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CaseStatus::AlertDispatched
                | CaseStatus::AlertFailed
                | CaseStatus::NoCandidates
                | CaseStatus::NoRoute
        )
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaseStatus::IntakeReceived => "INTAKE_RECEIVED",
            CaseStatus::Triaged => "TRIAGED",
            CaseStatus::CandidatesSelected => "CANDIDATES_SELECTED",
            CaseStatus::Assigned => "ASSIGNED",
            CaseStatus::AlertDispatched => "ALERT_DISPATCHED",
            CaseStatus::AlertFailed => "ALERT_FAILED",
            CaseStatus::NoCandidates => "NO_CANDIDATES",
            CaseStatus::NoRoute => "NO_ROUTE",
        };
        f.write_str(name)
    }
}

/// 持久化的病例记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub case_id: Uuid,
    pub status: CaseStatus,
    pub triage: Option<TriageResult>,
    pub assignment: Option<Assignment>,
    pub delivery_token: Option<String>,
    pub note: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl CaseRecord {
    pub fn new(case_id: Uuid) -> Self {
        Self {
            case_id,
            status: CaseStatus::IntakeReceived,
            triage: None,
            assignment: None,
            delivery_token: None,
            note: None,
            updated_at: Utc::now(),
        }
    }

    /// 推进到新状态并刷新时间戳
    pub fn advance(&mut self, status: CaseStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// 一次编排的最终结果，返回后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    pub case_id: Uuid,
    pub intake: CaseIntake,
    pub triage: TriageResult,
    pub candidates: CandidateSet,
    pub assignment: Assignment,
    pub detected_address: String,
    pub alert: AlertTicket,
    pub status: CaseStatus,
    pub completed_at: DateTime<Utc>,
}
