//! Entity type definitions
//!
//! One typed record per register, each with its fixed column layout:
//!
//! - [`Risk`] - risk register, score and level derived from likelihood × impact
//! - [`Capa`] - corrective/preventive actions with a closure-gated workflow
//! - [`ProcessInteraction`] - process hand-offs, KPIs and record references
//! - [`QmsRecord`] - form templates with fill tracking and per-file reviews

pub mod capa;
pub mod process;
pub mod record;
pub mod risk;

pub use capa::{Capa, CapaStatus, CapaType};
pub use process::ProcessInteraction;
pub use record::{QmsRecord, ReviewStatus};
pub use risk::{Risk, RiskStatus};

/// Canonical form of a status label for matching: lowercase, `_`/`-` as
/// spaces, runs of whitespace collapsed
pub(crate) fn normalize_label(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
