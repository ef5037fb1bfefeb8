//! CAPA (Corrective and Preventive Action) register entity

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::derived::closure_rate;
use crate::core::entity::{cell, trimmed, SheetRecord};
use crate::core::validate::{is_non_empty, parse_calendar_date};
use crate::core::workflow::WorkflowStatus;

/// CAPA type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CapaType {
    #[default]
    Corrective,
    Preventive,
}

impl fmt::Display for CapaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapaType::Corrective => write!(f, "Corrective"),
            CapaType::Preventive => write!(f, "Preventive"),
        }
    }
}

impl std::str::FromStr for CapaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "corrective" => Ok(CapaType::Corrective),
            "preventive" => Ok(CapaType::Preventive),
            _ => Err(format!(
                "Unknown CAPA type: {}. Use 'Corrective' or 'Preventive'",
                s
            )),
        }
    }
}

/// CAPA workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CapaStatus {
    #[default]
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Under Verification")]
    UnderVerification,
    Closed,
}

impl fmt::Display for CapaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapaStatus::Open => write!(f, "Open"),
            CapaStatus::InProgress => write!(f, "In Progress"),
            CapaStatus::UnderVerification => write!(f, "Under Verification"),
            CapaStatus::Closed => write!(f, "Closed"),
        }
    }
}

impl std::str::FromStr for CapaStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match super::normalize_label(s).as_str() {
            "open" => Ok(CapaStatus::Open),
            "in progress" => Ok(CapaStatus::InProgress),
            "under verification" => Ok(CapaStatus::UnderVerification),
            "closed" => Ok(CapaStatus::Closed),
            _ => Err(format!(
                "Unknown CAPA status: {}. Use 'Open', 'In Progress', 'Under Verification' or 'Closed'",
                s
            )),
        }
    }
}

impl WorkflowStatus for CapaStatus {
    const ALL: &'static [Self] = &[
        CapaStatus::Open,
        CapaStatus::InProgress,
        CapaStatus::UnderVerification,
        CapaStatus::Closed,
    ];

    fn allowed_transitions(self) -> &'static [Self] {
        match self {
            CapaStatus::Open => &[CapaStatus::InProgress],
            CapaStatus::InProgress => &[CapaStatus::UnderVerification, CapaStatus::Open],
            CapaStatus::UnderVerification => &[CapaStatus::Closed, CapaStatus::InProgress],
            CapaStatus::Closed => &[],
        }
    }
}

/// One row of the CAPA register
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capa {
    /// Business key, `CAPA-YY-NNN`
    pub id: String,
    pub source: String,
    pub capa_type: CapaType,
    pub description: String,
    pub reference: String,
    pub root_cause: String,
    pub corrective_action: String,
    pub preventive_action: String,
    pub responsible: String,
    pub target_date: String,
    pub status: CapaStatus,
    pub effectiveness_check: String,
    pub effectiveness_review_date: String,
    pub closure_approval: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub related_risk: String,
}

impl Capa {
    /// First closure precondition that is not met, as a user-facing message
    pub fn missing_closure_field(&self) -> Option<&'static str> {
        if !is_non_empty(&self.effectiveness_check) {
            return Some("Effectiveness Check is required before closing a CAPA");
        }
        if !is_non_empty(&self.effectiveness_review_date) {
            return Some("Effectiveness Review Date is required before closing a CAPA");
        }
        if !is_non_empty(&self.closure_approval) {
            return Some("Closure Approval is required before closing a CAPA");
        }
        None
    }

    pub fn target(&self) -> Option<NaiveDate> {
        parse_calendar_date(&self.target_date)
    }

    /// Target date strictly before `today` while still open
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status != CapaStatus::Closed && self.target().is_some_and(|target| target < today)
    }
}

impl SheetRecord for Capa {
    const ENTITY: &'static str = "CAPA";
    const KEY_HEADER: &'static str = "CAPA ID";
    const HEADER: &'static [&'static str] = &[
        "CAPA ID",
        "Source of CAPA",
        "Type",
        "Description",
        "Reference",
        "Root Cause Analysis",
        "Corrective Action",
        "Preventive Action",
        "Responsible Person",
        "Target Completion Date",
        "Status",
        "Effectiveness Check",
        "Effectiveness Review Date",
        "Closure Approval",
        "Related Risk",
    ];

    fn key(&self) -> &str {
        &self.id
    }

    fn decode(row: &[String]) -> Option<Self> {
        let id = trimmed(row, 0);
        if id.is_empty() {
            return None;
        }
        Some(Self {
            id,
            source: cell(row, 1),
            capa_type: trimmed(row, 2).parse().unwrap_or_default(),
            description: cell(row, 3),
            reference: cell(row, 4),
            root_cause: cell(row, 5),
            corrective_action: cell(row, 6),
            preventive_action: cell(row, 7),
            responsible: cell(row, 8),
            target_date: cell(row, 9),
            status: trimmed(row, 10).parse().unwrap_or_default(),
            effectiveness_check: cell(row, 11),
            effectiveness_review_date: cell(row, 12),
            closure_approval: cell(row, 13),
            related_risk: cell(row, 14),
        })
    }

    fn encode(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.source.clone(),
            self.capa_type.to_string(),
            self.description.clone(),
            self.reference.clone(),
            self.root_cause.clone(),
            self.corrective_action.clone(),
            self.preventive_action.clone(),
            self.responsible.clone(),
            self.target_date.clone(),
            self.status.to_string(),
            self.effectiveness_check.clone(),
            self.effectiveness_review_date.clone(),
            self.closure_approval.clone(),
            self.related_risk.clone(),
        ]
    }
}

/// Fields supplied when opening a new CAPA
#[derive(Debug, Clone, Default)]
pub struct NewCapa {
    pub source: String,
    pub capa_type: String,
    pub description: String,
    pub reference: String,
    pub root_cause: String,
    pub corrective_action: String,
    pub preventive_action: String,
    pub responsible: String,
    pub target_date: String,
    pub related_risk: String,
}

/// Partial update; `None` leaves the stored value unchanged
#[derive(Debug, Clone, Default)]
pub struct CapaUpdate {
    pub source: Option<String>,
    pub capa_type: Option<String>,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub root_cause: Option<String>,
    pub corrective_action: Option<String>,
    pub preventive_action: Option<String>,
    pub responsible: Option<String>,
    pub target_date: Option<String>,
    pub status: Option<String>,
    pub effectiveness_check: Option<String>,
    pub effectiveness_review_date: Option<String>,
    pub closure_approval: Option<String>,
    pub related_risk: Option<String>,
}

/// Aggregate figures over the CAPA register
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CapaStats {
    pub total: usize,
    pub open: usize,
    pub in_progress: usize,
    pub under_verification: usize,
    pub closed: usize,
    pub corrective: usize,
    pub preventive: usize,
    pub overdue: usize,
    /// Closed / total × 100, rounded
    pub closure_rate: u32,
}

impl CapaStats {
    pub fn compute<'a>(capas: impl IntoIterator<Item = &'a Capa>, today: NaiveDate) -> Self {
        let mut stats = CapaStats::default();

        for capa in capas {
            stats.total += 1;
            match capa.status {
                CapaStatus::Open => stats.open += 1,
                CapaStatus::InProgress => stats.in_progress += 1,
                CapaStatus::UnderVerification => stats.under_verification += 1,
                CapaStatus::Closed => stats.closed += 1,
            }
            match capa.capa_type {
                CapaType::Corrective => stats.corrective += 1,
                CapaType::Preventive => stats.preventive += 1,
            }
            if capa.is_overdue(today) {
                stats.overdue += 1;
            }
        }

        stats.closure_rate = closure_rate(stats.closed, stats.total);
        stats
    }
}
