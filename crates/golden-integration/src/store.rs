//! 内存存储
//!
//! 医院数据以不可变快照形式提供，床位更新生成新快照；
//! 病例存储保留每次状态转换的历史。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use golden_core::utils::normalize_tag;
use golden_core::{
    CaseRecord, CaseStatus, CaseStore, Coordinates, Facility, FacilitySnapshot, FacilityStore,
    GoldenError, Result,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// 内置的医院数据
pub fn seed_facilities() -> Vec<Facility> {
    let tags = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();

    vec![
        Facility {
            id: "max_hospital_saket".to_string(),
            name: "Max Hospital, Saket".to_string(),
            location: Coordinates::new(28.5245, 77.2060),
            critical_care_beds: 5,
            emergency_beds: 10,
            specialists: tags(&["cardiologist", "trauma_surgeon"]),
        },
        Facility {
            id: "aiims_trauma_center".to_string(),
            name: "AIIMS Trauma Center".to_string(),
            location: Coordinates::new(28.5650, 77.2060),
            critical_care_beds: 2,
            emergency_beds: 5,
            specialists: tags(&["cardiologist", "emergency_physician", "trauma_surgeon"]),
        },
        Facility {
            id: "city_general".to_string(),
            name: "City General Hospital".to_string(),
            location: Coordinates::new(28.7041, 77.1025),
            critical_care_beds: 0,
            emergency_beds: 5,
            specialists: tags(&["general_physician"]),
        },
    ]
}

/// 单类床位数上限，超出视为数据错误
pub const MAX_BEDS_PER_CATEGORY: u32 = 100_000;

fn check_beds(facility_id: &str, critical_care_beds: u32, emergency_beds: u32) -> Result<()> {
    if critical_care_beds > MAX_BEDS_PER_CATEGORY || emergency_beds > MAX_BEDS_PER_CATEGORY {
        return Err(GoldenError::Validation(format!(
            "Facility {} bed counts exceed {} (ICU {}, emergency {})",
            facility_id, MAX_BEDS_PER_CATEGORY, critical_care_beds, emergency_beds
        )));
    }
    Ok(())
}

/// 床位更新请求
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BedUpdate {
    pub critical_care_beds: u32,
    pub emergency_beds: u32,
}

/// 内存医院存储
pub struct InMemoryFacilityStore {
    snapshot: RwLock<FacilitySnapshot>,
}

impl InMemoryFacilityStore {
    pub fn new(facilities: Vec<Facility>) -> Result<Self> {
        let facilities = normalize(facilities)?;
        info!("Facility store initialised with {} facilities", facilities.len());
        Ok(Self {
            snapshot: RwLock::new(FacilitySnapshot::new(facilities)),
        })
    }

    pub fn with_seed_data() -> Result<Self> {
        Self::new(seed_facilities())
    }

    /// 从 JSON 文件加载医院列表
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let facilities: Vec<Facility> = serde_json::from_str(&content)?;
        info!("Loaded {} facilities from {}", facilities.len(), path.display());
        Self::new(facilities)
    }

    /// 更新床位，生成新的快照；已分发的旧快照不受影响
    pub async fn update_beds(&self, facility_id: &str, update: BedUpdate) -> Result<Facility> {
        check_beds(facility_id, update.critical_care_beds, update.emergency_beds)?;
        let mut snapshot = self.snapshot.write().await;

        let mut facilities = snapshot.as_slice().to_vec();
        let facility = facilities
            .iter_mut()
            .find(|f| f.id == facility_id)
            .ok_or_else(|| GoldenError::NotFound(format!("Facility {}", facility_id)))?;

        facility.critical_care_beds = update.critical_care_beds;
        facility.emergency_beds = update.emergency_beds;
        let updated = facility.clone();

        *snapshot = FacilitySnapshot::new(facilities);
        info!(
            "Facility {} beds updated: ICU {}, emergency {}",
            facility_id, update.critical_care_beds, update.emergency_beds
        );

        Ok(updated)
    }
}

#[async_trait]
impl FacilityStore for InMemoryFacilityStore {
    async fn list_all(&self) -> Result<FacilitySnapshot> {
        Ok(self.snapshot.read().await.clone())
    }
}

fn normalize(mut facilities: Vec<Facility>) -> Result<Vec<Facility>> {
    let mut seen = std::collections::HashSet::new();
    for facility in &mut facilities {
        if !facility.location.is_valid() {
            return Err(GoldenError::Validation(format!(
                "Facility {} has invalid location ({})",
                facility.id, facility.location
            )));
        }
        check_beds(&facility.id, facility.critical_care_beds, facility.emergency_beds)?;
        if !seen.insert(facility.id.clone()) {
            return Err(GoldenError::Validation(format!("Duplicate facility id {}", facility.id)));
        }
        facility.specialists = facility.specialists.iter().map(|s| normalize_tag(s)).collect();
    }
    Ok(facilities)
}

/// 病例状态转换记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseTransition {
    pub status: CaseStatus,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

/// 病例记录及其状态历史
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseHistory {
    pub record: CaseRecord,
    pub transitions: Vec<CaseTransition>,
}

/// 内存病例存储
#[derive(Default)]
pub struct InMemoryCaseStore {
    cases: RwLock<HashMap<Uuid, CaseHistory>>,
}

impl InMemoryCaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn history(&self, case_id: Uuid) -> Option<CaseHistory> {
        self.cases.read().await.get(&case_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.cases.read().await.len()
    }
}

fn transition_of(record: &CaseRecord) -> CaseTransition {
    CaseTransition {
        status: record.status,
        at: record.updated_at,
        note: record.note.clone(),
    }
}

#[async_trait]
impl CaseStore for InMemoryCaseStore {
    async fn create(&self, record: CaseRecord) -> Result<()> {
        let mut cases = self.cases.write().await;
        if cases.contains_key(&record.case_id) {
            return Err(GoldenError::Storage(format!("Case {} already exists", record.case_id)));
        }

        let transitions = vec![transition_of(&record)];
        cases.insert(record.case_id, CaseHistory { record, transitions });
        Ok(())
    }

    async fn update(&self, record: CaseRecord) -> Result<()> {
        let mut cases = self.cases.write().await;
        let history = cases
            .get_mut(&record.case_id)
            .ok_or_else(|| GoldenError::Storage(format!("Case {} does not exist", record.case_id)))?;

        // 只在状态变化时追加历史，同状态的更新只刷新记录
        if history.record.status != record.status {
            history.transitions.push(transition_of(&record));
        }
        history.record = record;
        Ok(())
    }

    async fn get(&self, case_id: Uuid) -> Result<Option<CaseRecord>> {
        Ok(self.cases.read().await.get(&case_id).map(|h| h.record.clone()))
    }
}
