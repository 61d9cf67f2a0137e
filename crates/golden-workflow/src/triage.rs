//! 分诊分类
//!
//! 基于症状关键词和生命体征阈值的确定性规则评估：
//! - 危及生命的症状或体征超出危险区间 → RED
//! - 中度风险指征 → YELLOW
//! - 其余 → GREEN
//!
//! 缺失的体征字段不提供证据，也不会导致失败。

use async_trait::async_trait;
use golden_core::utils::normalize_tag;
use golden_core::{deserialize_symptoms, PatientAge, Result, Severity, TriageResult, Vitals};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// 分诊阶段的输入（由编排器从上报信息中重塑）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriageRequest {
    #[serde(deserialize_with = "deserialize_symptoms")]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub vitals: Vitals,
    #[serde(default)]
    pub age: Option<PatientAge>,
}

/// 分诊能力
#[async_trait]
pub trait TriageService: Send + Sync {
    async fn classify(&self, request: TriageRequest) -> Result<TriageResult>;
}

/// 生命体征阈值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VitalThresholds {
    /// 血氧低于该值为危险
    pub critical_oxygen_below: u32,
    /// 血氧低于该值为中度风险
    pub moderate_oxygen_below: u32,
    pub critical_heart_rate_low: u32,
    pub critical_heart_rate_high: u32,
    pub moderate_heart_rate_low: u32,
    pub moderate_heart_rate_high: u32,
    /// 收缩压低于该值为危险（休克）
    pub critical_systolic_below: u32,
    /// 收缩压达到该值为危险（高血压危象）
    pub critical_systolic_at_least: u32,
    pub moderate_systolic_at_least: u32,
}

impl Default for VitalThresholds {
    fn default() -> Self {
        Self {
            critical_oxygen_below: 90,
            moderate_oxygen_below: 95,
            critical_heart_rate_low: 40,
            critical_heart_rate_high: 140,
            moderate_heart_rate_low: 50,
            moderate_heart_rate_high: 110,
            critical_systolic_below: 90,
            critical_systolic_at_least: 180,
            moderate_systolic_at_least: 160,
        }
    }
}

/// 分诊策略表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriagePolicy {
    /// 危及生命的症状关键词
    pub critical_keywords: Vec<String>,
    /// 中度风险症状关键词
    pub moderate_keywords: Vec<String>,
    /// 专科 → 触发关键词
    pub specialist_keywords: BTreeMap<String, Vec<String>>,
    pub vitals: VitalThresholds,
    /// 达到该年龄视为中度风险指征
    pub elderly_age: u32,
}

impl Default for TriagePolicy {
    fn default() -> Self {
        let words = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        let mut specialist_keywords = BTreeMap::new();
        specialist_keywords.insert(
            "cardiologist".to_string(),
            words(&["cardiac", "chest pain", "heart attack", "palpitation"]),
        );
        specialist_keywords.insert(
            "neurologist".to_string(),
            words(&["stroke", "seizure", "paralysis", "slurred speech"]),
        );
        specialist_keywords.insert(
            "trauma_surgeon".to_string(),
            words(&["severe bleeding", "fracture", "accident", "trauma", "gunshot", "stab"]),
        );

        Self {
            critical_keywords: words(&[
                "cardiac arrest",
                "chest pain",
                "heart attack",
                "unconscious",
                "unresponsive",
                "not breathing",
                "difficulty breathing",
                "severe bleeding",
                "stroke",
                "seizure",
                "anaphylaxis",
                "gunshot",
            ]),
            moderate_keywords: words(&[
                "fracture",
                "high fever",
                "vomiting",
                "abdominal pain",
                "dizziness",
                "burn",
                "head injury",
                "shortness of breath",
                "palpitation",
                "accident",
            ]),
            specialist_keywords,
            vitals: VitalThresholds::default(),
            elderly_age: 65,
        }
    }
}

/// 基于规则的分诊器
#[derive(Debug, Clone, Default)]
pub struct RuleBasedTriage {
    policy: TriagePolicy,
}

impl RuleBasedTriage {
    pub fn new(policy: TriagePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &TriagePolicy {
        &self.policy
    }

    /// 同步评估，不做任何 I/O
    pub fn evaluate(&self, request: &TriageRequest) -> TriageResult {
        let symptoms: Vec<String> = request
            .symptoms
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let mut critical = Vec::new();
        let mut moderate = Vec::new();

        for keyword in matched_keywords(&symptoms, &self.policy.critical_keywords) {
            critical.push(format!("symptom: {}", keyword));
        }
        for keyword in matched_keywords(&symptoms, &self.policy.moderate_keywords) {
            moderate.push(format!("symptom: {}", keyword));
        }

        self.assess_vitals(&request.vitals, &mut critical, &mut moderate);

        if let Some(age) = request.age {
            if age.upper_bound() >= self.policy.elderly_age {
                moderate.push(format!("age: {}", age));
            }
        }

        let severity = if !critical.is_empty() {
            Severity::Red
        } else if !moderate.is_empty() {
            Severity::Yellow
        } else {
            Severity::Green
        };

        let recommended_specialists: BTreeSet<String> = self
            .policy
            .specialist_keywords
            .iter()
            .filter(|(_, keywords)| !matched_keywords(&symptoms, keywords).is_empty())
            .map(|(specialist, _)| normalize_tag(specialist))
            .collect();

        let mut indicators = critical;
        indicators.extend(moderate);

        TriageResult {
            severity,
            priority: severity.priority(),
            recommended_specialists,
            indicators,
        }
    }

    fn assess_vitals(&self, vitals: &Vitals, critical: &mut Vec<String>, moderate: &mut Vec<String>) {
        let t = &self.policy.vitals;

        if let Some(spo2) = vitals.oxygen_saturation {
            if spo2 < t.critical_oxygen_below {
                critical.push(format!("oxygen saturation {}%", spo2));
            } else if spo2 < t.moderate_oxygen_below {
                moderate.push(format!("oxygen saturation {}%", spo2));
            }
        }

        if let Some(hr) = vitals.heart_rate {
            if hr < t.critical_heart_rate_low || hr > t.critical_heart_rate_high {
                critical.push(format!("heart rate {} bpm", hr));
            } else if hr < t.moderate_heart_rate_low || hr > t.moderate_heart_rate_high {
                moderate.push(format!("heart rate {} bpm", hr));
            }
        }

        if let Some(bp) = vitals.blood_pressure_reading() {
            if bp.systolic < t.critical_systolic_below || bp.systolic >= t.critical_systolic_at_least {
                critical.push(format!("blood pressure {}/{}", bp.systolic, bp.diastolic));
            } else if bp.systolic >= t.moderate_systolic_at_least {
                moderate.push(format!("blood pressure {}/{}", bp.systolic, bp.diastolic));
            }
        }
    }
}

#[async_trait]
impl TriageService for RuleBasedTriage {
    async fn classify(&self, request: TriageRequest) -> Result<TriageResult> {
        let result = self.evaluate(&request);
        tracing::debug!(
            "Triage classified {} (priority {}) from {} indicators",
            result.severity,
            result.priority,
            result.indicators.len()
        );
        Ok(result)
    }
}

/// 返回在任一症状中出现的关键词（按策略表顺序）
///
/// 按词匹配：关键词的词序列必须在症状中连续出现，
/// 最后一个词允许复数形式（"palpitations" 命中 "palpitation"，"stable" 不命中 "stab"）。
fn matched_keywords<'a>(symptoms: &[String], keywords: &'a [String]) -> Vec<&'a str> {
    let symptom_tokens: Vec<Vec<String>> = symptoms.iter().map(|s| tokenize(s)).collect();

    keywords
        .iter()
        .map(|k| k.as_str())
        .filter(|keyword| {
            let keyword_tokens = tokenize(keyword);
            !keyword_tokens.is_empty()
                && symptom_tokens
                    .iter()
                    .any(|tokens| contains_phrase(tokens, &keyword_tokens))
        })
        .collect()
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn contains_phrase(tokens: &[String], phrase: &[String]) -> bool {
    let Some((last, head)) = phrase.split_last() else {
        return false;
    };

    tokens.windows(phrase.len()).any(|window| {
        let (window_last, window_head) = match window.split_last() {
            Some(parts) => parts,
            None => return false,
        };
        window_head == head && word_matches(window_last, last)
    })
}

fn word_matches(word: &str, keyword: &str) -> bool {
    match word.strip_prefix(keyword) {
        Some(rest) => rest.is_empty() || rest == "s" || rest == "es",
        None => false,
    }
}
