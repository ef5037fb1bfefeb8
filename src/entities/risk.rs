//! Risk register entity

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::derived::{mean_one_decimal, risk_score, RiskLevel};
use crate::core::entity::{cell, trimmed, SheetRecord};
use crate::core::workflow::WorkflowStatus;

/// Risk status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RiskStatus {
    #[default]
    Open,
    #[serde(rename = "Under Review")]
    UnderReview,
    Controlled,
    Closed,
}

impl fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskStatus::Open => write!(f, "Open"),
            RiskStatus::UnderReview => write!(f, "Under Review"),
            RiskStatus::Controlled => write!(f, "Controlled"),
            RiskStatus::Closed => write!(f, "Closed"),
        }
    }
}

impl std::str::FromStr for RiskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match super::normalize_label(s).as_str() {
            "open" => Ok(RiskStatus::Open),
            "under review" => Ok(RiskStatus::UnderReview),
            "controlled" => Ok(RiskStatus::Controlled),
            "closed" => Ok(RiskStatus::Closed),
            _ => Err(format!(
                "Unknown risk status: {}. Use 'Open', 'Under Review', 'Controlled' or 'Closed'",
                s
            )),
        }
    }
}

impl WorkflowStatus for RiskStatus {
    const ALL: &'static [Self] = &[
        RiskStatus::Open,
        RiskStatus::UnderReview,
        RiskStatus::Controlled,
        RiskStatus::Closed,
    ];

    /// Risk statuses carry no ordering: any status may follow any other
    fn allowed_transitions(self) -> &'static [Self] {
        match self {
            RiskStatus::Open => &[
                RiskStatus::UnderReview,
                RiskStatus::Controlled,
                RiskStatus::Closed,
            ],
            RiskStatus::UnderReview => &[
                RiskStatus::Open,
                RiskStatus::Controlled,
                RiskStatus::Closed,
            ],
            RiskStatus::Controlled => &[
                RiskStatus::Open,
                RiskStatus::UnderReview,
                RiskStatus::Closed,
            ],
            RiskStatus::Closed => &[
                RiskStatus::Open,
                RiskStatus::UnderReview,
                RiskStatus::Controlled,
            ],
        }
    }
}

/// One row of the risk register
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Risk {
    /// Business key, `RISK-YY-NNN`
    pub id: String,
    pub department: String,
    pub description: String,
    pub cause: String,
    /// 1..=5
    pub likelihood: u8,
    /// 1..=5
    pub impact: u8,
    /// Action / control
    pub action: String,
    pub owner: String,
    pub status: RiskStatus,
    pub review_date: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub linked_capa: String,
}

impl Risk {
    /// Always likelihood × impact
    pub fn score(&self) -> u32 {
        risk_score(self.likelihood, self.impact)
    }

    pub fn level(&self) -> RiskLevel {
        RiskLevel::from_score(self.score())
    }

    /// Record plus its derived fields, for structured output
    pub fn report(&self) -> RiskReport<'_> {
        RiskReport {
            risk: self,
            score: self.score(),
            level: self.level(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RiskReport<'a> {
    #[serde(flatten)]
    pub risk: &'a Risk,
    pub score: u32,
    pub level: RiskLevel,
}

/// Leading integer of a rating cell; unreadable or zero ratings become 1.
/// Other out-of-range values are kept so that `update` can refuse them.
fn parse_rating(raw: &str) -> u8 {
    let digits: String = raw.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    match digits.parse::<u64>() {
        Ok(0) | Err(_) => 1,
        Ok(n) => u8::try_from(n).unwrap_or(u8::MAX),
    }
}

impl SheetRecord for Risk {
    const ENTITY: &'static str = "Risk";
    const KEY_HEADER: &'static str = "Risk ID";
    const HEADER: &'static [&'static str] = &[
        "Risk ID",
        "Process/Department",
        "Risk Description",
        "Cause",
        "Likelihood",
        "Impact",
        "Risk Score",
        "Action/Control",
        "Owner",
        "Status",
        "Review Date",
        "Linked CAPA",
    ];

    fn key(&self) -> &str {
        &self.id
    }

    fn decode(row: &[String]) -> Option<Self> {
        let id = trimmed(row, 0);
        if id.is_empty() {
            return None;
        }
        // column G (stored score) is ignored and recomputed
        Some(Self {
            id,
            department: cell(row, 1),
            description: cell(row, 2),
            cause: cell(row, 3),
            likelihood: parse_rating(&cell(row, 4)),
            impact: parse_rating(&cell(row, 5)),
            action: cell(row, 7),
            owner: cell(row, 8),
            status: trimmed(row, 9).parse().unwrap_or_default(),
            review_date: cell(row, 10),
            linked_capa: cell(row, 11),
        })
    }

    fn encode(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.department.clone(),
            self.description.clone(),
            self.cause.clone(),
            self.likelihood.to_string(),
            self.impact.to_string(),
            self.score().to_string(),
            self.action.clone(),
            self.owner.clone(),
            self.status.to_string(),
            self.review_date.clone(),
            self.linked_capa.clone(),
        ]
    }
}

/// Fields supplied when raising a new risk
#[derive(Debug, Clone, Default)]
pub struct NewRisk {
    pub department: String,
    pub description: String,
    pub cause: String,
    pub likelihood: i64,
    pub impact: i64,
    pub action: String,
    pub owner: String,
    pub review_date: String,
    pub linked_capa: String,
}

/// Partial update; `None` leaves the stored value unchanged
#[derive(Debug, Clone, Default)]
pub struct RiskUpdate {
    pub department: Option<String>,
    pub description: Option<String>,
    pub cause: Option<String>,
    pub likelihood: Option<i64>,
    pub impact: Option<i64>,
    pub action: Option<String>,
    pub owner: Option<String>,
    pub status: Option<String>,
    pub review_date: Option<String>,
    pub linked_capa: Option<String>,
}

/// Aggregate figures over the risk register
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RiskStats {
    pub total: usize,
    pub open: usize,
    pub under_review: usize,
    pub controlled: usize,
    pub closed: usize,
    /// Score ≥ 15
    pub high: usize,
    /// Score 8..15
    pub medium: usize,
    /// Score < 8
    pub low: usize,
    pub average_score: f64,
}

impl RiskStats {
    pub fn compute<'a>(risks: impl IntoIterator<Item = &'a Risk>) -> Self {
        let mut stats = RiskStats::default();
        let mut scores = Vec::new();

        for risk in risks {
            stats.total += 1;
            match risk.status {
                RiskStatus::Open => stats.open += 1,
                RiskStatus::UnderReview => stats.under_review += 1,
                RiskStatus::Controlled => stats.controlled += 1,
                RiskStatus::Closed => stats.closed += 1,
            }

            let score = risk.score();
            match score {
                s if s >= 15 => stats.high += 1,
                s if s >= 8 => stats.medium += 1,
                _ => stats.low += 1,
            }
            scores.push(score);
        }

        stats.average_score = mean_one_decimal(scores);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::workflow::is_valid_transition;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn sample() -> Risk {
        Risk {
            id: "RISK-25-001".to_string(),
            department: "Production".to_string(),
            description: "Supplier delivers out-of-spec resin".to_string(),
            cause: "No incoming inspection".to_string(),
            likelihood: 3,
            impact: 4,
            action: "Add incoming inspection".to_string(),
            owner: "J. Smith".to_string(),
            status: RiskStatus::UnderReview,
            review_date: "2025-06-30".to_string(),
            linked_capa: "CAPA-25-002".to_string(),
        }
    }

    #[test]
    fn test_score_and_level() {
        let risk = sample();
        assert_eq!(risk.score(), 12);
        assert_eq!(risk.level(), RiskLevel::Medium);
    }

    #[test]
    fn test_round_trip_full_and_minimal() {
        let risk = sample();
        assert_eq!(Risk::decode(&risk.encode()), Some(risk));

        let minimal = Risk {
            id: "RISK-25-002".to_string(),
            department: String::new(),
            description: String::new(),
            cause: String::new(),
            likelihood: 1,
            impact: 1,
            action: String::new(),
            owner: String::new(),
            status: RiskStatus::Open,
            review_date: String::new(),
            linked_capa: String::new(),
        };
        assert_eq!(Risk::decode(&minimal.encode()), Some(minimal));
    }

    #[test]
    fn test_encode_writes_score_column() {
        let cells = sample().encode();
        assert_eq!(cells.len(), Risk::HEADER.len());
        assert_eq!(cells[6], "12");
        assert_eq!(cells[9], "Under Review");
    }

    #[test]
    fn test_decode_short_row_defaults() {
        let risk = Risk::decode(&row(&["RISK-25-009", "QA"])).unwrap();
        assert_eq!(risk.likelihood, 1);
        assert_eq!(risk.impact, 1);
        assert_eq!(risk.status, RiskStatus::Open);
        assert_eq!(risk.linked_capa, "");
    }

    #[test]
    fn test_decode_ignores_stored_score() {
        let risk = Risk::decode(&row(&[
            "RISK-25-003", "", "", "", "4 - Likely", "5", "3", "", "", "Closed",
        ]))
        .unwrap();
        assert_eq!(risk.likelihood, 4);
        assert_eq!(risk.score(), 20);
        assert_eq!(risk.level(), RiskLevel::Critical);
        assert_eq!(risk.status, RiskStatus::Closed);
    }

    #[test]
    fn test_decode_bad_status_and_rating() {
        let risk = Risk::decode(&row(&["RISK-25-004", "", "", "", "x", "0", "", "", "", "Pending"]))
            .unwrap();
        assert_eq!(risk.likelihood, 1);
        assert_eq!(risk.impact, 1);
        assert_eq!(risk.status, RiskStatus::Open);
    }

    #[test]
    fn test_decode_keeps_oversized_rating() {
        let risk = Risk::decode(&row(&["RISK-25-005", "", "", "", "9", "300"])).unwrap();
        assert_eq!(risk.likelihood, 9);
        assert_eq!(risk.impact, u8::MAX);
    }

    #[test]
    fn test_status_parse_is_lenient() {
        assert_eq!("under_review".parse::<RiskStatus>().unwrap(), RiskStatus::UnderReview);
        assert_eq!("CLOSED".parse::<RiskStatus>().unwrap(), RiskStatus::Closed);
        assert!("Archived".parse::<RiskStatus>().is_err());
    }

    #[test]
    fn test_every_risk_edge_allowed() {
        for from in RiskStatus::ALL {
            for to in RiskStatus::ALL {
                assert!(is_valid_transition(*from, *to));
            }
        }
    }

    #[test]
    fn test_stats() {
        let mut high = sample();
        high.likelihood = 5;
        high.impact = 4;
        high.status = RiskStatus::Open;
        let mut low = sample();
        low.likelihood = 1;
        low.impact = 4;
        low.status = RiskStatus::Closed;

        let risks = [sample(), high, low];
        let stats = RiskStats::compute(&risks);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.open, 1);
        assert_eq!(stats.under_review, 1);
        assert_eq!(stats.closed, 1);
        assert_eq!(stats.high, 1);
        assert_eq!(stats.medium, 1);
        assert_eq!(stats.low, 1);
        assert_eq!(stats.average_score, 12.0);
    }

    #[test]
    fn test_stats_empty() {
        let stats = RiskStats::compute(&Vec::<Risk>::new());
        assert_eq!(stats.total, 0);
        assert_eq!(stats.average_score, 0.0);
    }
}
