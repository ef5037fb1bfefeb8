//! Process interaction register entity

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::core::derived::percent;
use crate::core::entity::{cell, trimmed, SheetRecord};
use crate::core::validate::is_non_empty;

/// Record-code token embedded in free text, e.g. `F/12`
static RECORD_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"F/\d+").expect("record code pattern compiles"));

/// Distinct record codes in `text`, in first-seen order
pub fn extract_record_codes(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    RECORD_CODE_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|code| seen.insert(*code))
        .map(str::to_string)
        .collect()
}

/// One row of the process interaction sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInteraction {
    /// Business key; unique case-insensitively
    pub name: String,
    pub owner: String,
    pub inputs: String,
    pub activities: String,
    pub outputs: String,
    pub receiver: String,
    pub kpi: String,
}

impl ProcessInteraction {
    /// Record codes referenced by this process's outputs
    pub fn record_codes(&self) -> Vec<String> {
        extract_record_codes(&self.outputs)
    }

    pub fn has_kpi(&self) -> bool {
        is_non_empty(&self.kpi)
    }

    /// True when this process consumes `other` (by inputs or receiver)
    pub fn depends_on(&self, other: &str) -> bool {
        let other = other.trim();
        if other.is_empty() || self.name.trim().eq_ignore_ascii_case(other) {
            return false;
        }
        self.inputs.to_lowercase().contains(&other.to_lowercase()) || self.receiver.trim() == other
    }
}

impl SheetRecord for ProcessInteraction {
    const ENTITY: &'static str = "Process";
    const KEY_HEADER: &'static str = "Process Name";
    const HEADER: &'static [&'static str] = &[
        "Process Name",
        "Process Owner",
        "Inputs",
        "Main Activities",
        "Outputs",
        "Receiver",
        "KPI",
    ];

    fn key(&self) -> &str {
        &self.name
    }

    fn decode(row: &[String]) -> Option<Self> {
        let name = trimmed(row, 0);
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name,
            owner: cell(row, 1),
            inputs: cell(row, 2),
            activities: cell(row, 3),
            outputs: cell(row, 4),
            receiver: cell(row, 5),
            kpi: cell(row, 6),
        })
    }

    fn encode(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.owner.clone(),
            self.inputs.clone(),
            self.activities.clone(),
            self.outputs.clone(),
            self.receiver.clone(),
            self.kpi.clone(),
        ]
    }
}

/// Fields supplied when adding a process
#[derive(Debug, Clone, Default)]
pub struct NewProcess {
    pub name: String,
    pub owner: String,
    pub inputs: String,
    pub activities: String,
    pub outputs: String,
    pub receiver: String,
    pub kpi: String,
}

/// Partial update; the name is the key and cannot change
#[derive(Debug, Clone, Default)]
pub struct ProcessUpdate {
    pub owner: Option<String>,
    pub inputs: Option<String>,
    pub activities: Option<String>,
    pub outputs: Option<String>,
    pub receiver: Option<String>,
    pub kpi: Option<String>,
}

/// A `process → receiver` hand-off
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowEdge {
    pub from: String,
    pub to: String,
}

/// Every hand-off between processes with a receiver
pub fn process_flow(processes: &[ProcessInteraction]) -> Vec<FlowEdge> {
    processes
        .iter()
        .filter(|p| is_non_empty(&p.receiver))
        .map(|p| FlowEdge {
            from: p.name.clone(),
            to: p.receiver.trim().to_string(),
        })
        .collect()
}

/// Processes that consume the output of `name`
pub fn dependents<'a>(
    processes: &'a [ProcessInteraction],
    name: &str,
) -> Vec<&'a ProcessInteraction> {
    processes.iter().filter(|p| p.depends_on(name)).collect()
}

/// Aggregate figures over the process interaction sheet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessStats {
    pub total: usize,
    pub unique_owners: usize,
    pub with_kpi: usize,
    /// Processes with a KPI / total × 100, rounded
    pub kpi_coverage: u32,
    /// Distinct record codes referenced across all outputs
    pub record_references: usize,
    pub unique_receivers: usize,
}

impl ProcessStats {
    pub fn compute(processes: &[ProcessInteraction]) -> Self {
        let owners: HashSet<&str> = processes
            .iter()
            .map(|p| p.owner.trim())
            .filter(|o| !o.is_empty())
            .collect();
        let receivers: HashSet<&str> = processes
            .iter()
            .map(|p| p.receiver.trim())
            .filter(|r| !r.is_empty())
            .collect();
        let references: HashSet<String> = processes
            .iter()
            .flat_map(ProcessInteraction::record_codes)
            .collect();
        let with_kpi = processes.iter().filter(|p| p.has_kpi()).count();

        Self {
            total: processes.len(),
            unique_owners: owners.len(),
            with_kpi,
            kpi_coverage: percent(with_kpi, processes.len()),
            record_references: references.len(),
            unique_receivers: receivers.len(),
        }
    }
}
