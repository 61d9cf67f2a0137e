//! 病例状态机
//!
//! 管理急救病例从接收到告警的状态转换，所有转换只能向前。

use golden_core::{CaseStatus, GoldenError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 病例状态转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CaseEvent {
    Triaged,
    CandidatesSelected,
    CandidatesExhausted,
    Assigned,
    RouteUnavailable,
    AlertDelivered,
    AlertFailed,
}

/// 病例状态机
#[derive(Debug, Clone)]
pub struct CaseStateMachine {
    transitions: HashMap<(CaseStatus, CaseEvent), CaseStatus>,
}

impl CaseStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        transitions.insert((CaseStatus::IntakeReceived, CaseEvent::Triaged), CaseStatus::Triaged);
        transitions.insert((CaseStatus::Triaged, CaseEvent::CandidatesSelected), CaseStatus::CandidatesSelected);
        transitions.insert((CaseStatus::Triaged, CaseEvent::CandidatesExhausted), CaseStatus::NoCandidates);
        // 缺少定位时无法计算任何路线
        transitions.insert((CaseStatus::Triaged, CaseEvent::RouteUnavailable), CaseStatus::NoRoute);
        transitions.insert((CaseStatus::CandidatesSelected, CaseEvent::Assigned), CaseStatus::Assigned);
        transitions.insert((CaseStatus::CandidatesSelected, CaseEvent::RouteUnavailable), CaseStatus::NoRoute);
        transitions.insert((CaseStatus::Assigned, CaseEvent::AlertDelivered), CaseStatus::AlertDispatched);
        transitions.insert((CaseStatus::Assigned, CaseEvent::AlertFailed), CaseStatus::AlertFailed);

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: CaseStatus, event: CaseEvent) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    /// 执行状态转换
    pub fn transition(&self, from: CaseStatus, event: CaseEvent) -> Result<CaseStatus> {
        self.transitions
            .get(&(from, event))
            .copied()
            .ok_or_else(|| GoldenError::InvalidStateTransition {
                from: from.to_string(),
                event: format!("{:?}", event),
            })
    }

    /// 获取所有可能的状态
    pub fn get_all_states() -> Vec<CaseStatus> {
        vec![
            CaseStatus::IntakeReceived,
            CaseStatus::Triaged,
            CaseStatus::CandidatesSelected,
            CaseStatus::Assigned,
            CaseStatus::AlertDispatched,
            CaseStatus::AlertFailed,
            CaseStatus::NoCandidates,
            CaseStatus::NoRoute,
        ]
    }

    /// 获取状态的所有可能事件
    pub fn get_possible_events(&self, current_state: CaseStatus) -> Vec<CaseEvent> {
        self.transitions
            .keys()
            .filter(|(state, _)| *state == current_state)
            .map(|(_, event)| *event)
            .collect()
    }
}

impl Default for CaseStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
