//! Derived fields: risk score and level, fill-due classification, rates
//!
//! Everything here is recomputed from stored fields on every read and
//! write; none of it is ever taken from caller input.

use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Frequency label that never becomes overdue
pub const WHEN_NEEDED: &str = "When needed";

/// Default window (days) in which an upcoming fill counts as near due
pub const DEFAULT_NEAR_DUE_DAYS: i64 = 7;

/// Longest fill interval a frequency may carry, a century in days
pub const MAX_INTERVAL_DAYS: i64 = 36_525;

/// Risk score: likelihood × impact
pub fn risk_score(likelihood: u8, impact: u8) -> u32 {
    u32::from(likelihood) * u32::from(impact)
}

/// Risk level assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Band a score: ≥20 Critical, ≥15 High, ≥8 Medium, else Low
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s >= 20 => RiskLevel::Critical,
            s if s >= 15 => RiskLevel::High,
            s if s >= 8 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::High => write!(f, "High"),
            RiskLevel::Critical => write!(f, "Critical"),
        }
    }
}

/// `part / total × 100` rounded to the nearest integer; 0 when total is 0
pub fn percent(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((part as f64 / total as f64) * 100.0).round() as u32
}

/// Closed / total × 100, rounded
pub fn closure_rate(closed: usize, total: usize) -> u32 {
    percent(closed, total)
}

/// Mean rounded to one decimal place; 0 for an empty set
pub fn mean_one_decimal(values: impl IntoIterator<Item = u32>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0u64, 0u64), |(sum, n), v| (sum + u64::from(v), n + 1));
    if count == 0 {
        return 0.0;
    }
    (sum as f64 / count as f64 * 10.0).round() / 10.0
}

/// How often a form must be filled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillInterval {
    /// Periodic, every N days
    Days(i64),
    /// Event-based; exempt from due tracking
    WhenNeeded,
}

/// A frequency whose interval is not a usable day count
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("frequency '{label}' must repeat every 1 to {max} days (got {days})", max = MAX_INTERVAL_DAYS)]
pub struct IntervalError {
    pub label: String,
    pub days: i64,
}

/// Frequency label → interval mapping, loaded from configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FrequencyTable {
    intervals: BTreeMap<String, i64>,
}

impl Default for FrequencyTable {
    fn default() -> Self {
        let intervals = [
            ("Daily", 1),
            ("Weekly", 7),
            ("Bi-Weekly", 14),
            ("Monthly", 30),
            ("Quarterly", 90),
            ("Semi-Annually", 182),
            ("Annually", 365),
        ]
        .into_iter()
        .map(|(label, days)| (label.to_string(), days))
        .collect();
        Self { intervals }
    }
}

impl FrequencyTable {
    /// Add or replace a label; intervals outside `1..=MAX_INTERVAL_DAYS`
    /// are refused
    pub fn set(&mut self, label: impl Into<String>, days: i64) -> Result<(), IntervalError> {
        let label = label.into();
        if !(1..=MAX_INTERVAL_DAYS).contains(&days) {
            return Err(IntervalError { label, days });
        }
        self.intervals.insert(label, days);
        Ok(())
    }

    /// Resolve a label (case-insensitive, surrounding whitespace ignored)
    pub fn interval(&self, label: &str) -> Option<FillInterval> {
        let label = label.trim();
        if label.eq_ignore_ascii_case(WHEN_NEEDED) {
            return Some(FillInterval::WhenNeeded);
        }
        self.intervals
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(label))
            .map(|(_, days)| FillInterval::Days(*days))
    }

    /// Every configured label plus "When needed"
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<(i64, String)> = self
            .intervals
            .iter()
            .map(|(label, days)| (*days, label.clone()))
            .collect();
        labels.sort();
        let mut labels: Vec<String> = labels.into_iter().map(|(_, l)| l).collect();
        labels.push(WHEN_NEEDED.to_string());
        labels
    }
}

/// Due classification of a form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DueState {
    OnTrack,
    NearDue,
    Overdue,
    /// "When needed" or an unrecognised frequency label
    Exempt,
}

impl std::fmt::Display for DueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DueState::OnTrack => write!(f, "On Track"),
            DueState::NearDue => write!(f, "Due Soon"),
            DueState::Overdue => write!(f, "Overdue"),
            DueState::Exempt => write!(f, "Exempt"),
        }
    }
}

/// Derived due fields of a form template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DueStatus {
    pub days_until_next_fill: Option<i64>,
    pub is_overdue: bool,
    pub near_due: bool,
    pub state: DueState,
}

impl DueStatus {
    pub fn exempt() -> Self {
        Self {
            days_until_next_fill: None,
            is_overdue: false,
            near_due: false,
            state: DueState::Exempt,
        }
    }

    /// Classify a day count: negative is overdue, `0..=near_window` near due
    pub fn from_days(days: i64, near_window: i64) -> Self {
        let is_overdue = days < 0;
        let near_due = (0..=near_window).contains(&days);
        let state = if is_overdue {
            DueState::Overdue
        } else if near_due {
            DueState::NearDue
        } else {
            DueState::OnTrack
        };
        Self {
            days_until_next_fill: Some(days),
            is_overdue,
            near_due,
            state,
        }
    }

    /// A periodic form that has never been filled
    pub fn never_filled() -> Self {
        Self {
            days_until_next_fill: None,
            is_overdue: true,
            near_due: false,
            state: DueState::Overdue,
        }
    }
}

/// Days from `today` until the next fill falls due, or `None` when the due
/// date falls outside the calendar
pub fn days_until_next_fill(
    interval_days: i64,
    last_fill: NaiveDate,
    today: NaiveDate,
) -> Option<i64> {
    let due = last_fill.checked_add_signed(TimeDelta::try_days(interval_days)?)?;
    Some((due - today).num_days())
}

/// Full due classification for a frequency label and last fill date
pub fn due_status(
    frequencies: &FrequencyTable,
    frequency: &str,
    last_fill: Option<NaiveDate>,
    today: NaiveDate,
    near_window: i64,
) -> DueStatus {
    match frequencies.interval(frequency) {
        None | Some(FillInterval::WhenNeeded) => DueStatus::exempt(),
        Some(FillInterval::Days(days)) => match last_fill {
            Some(last) => match days_until_next_fill(days, last, today) {
                Some(remaining) => DueStatus::from_days(remaining, near_window),
                None => DueStatus::exempt(),
            },
            None => DueStatus::never_filled(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_risk_score_and_level() {
        assert_eq!(risk_score(3, 4), 12);
        assert_eq!(RiskLevel::from_score(12), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(7), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(8), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(15), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(20), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(25).to_string(), "Critical");
    }

    #[test]
    fn test_percent_rounding() {
        assert_eq!(closure_rate(2, 3), 67);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(1, 2), 50);
        assert_eq!(percent(0, 0), 0);
    }

    #[test]
    fn test_mean_one_decimal() {
        assert_eq!(mean_one_decimal([12, 4, 9]), 8.3);
        assert_eq!(mean_one_decimal(std::iter::empty()), 0.0);
    }

    #[test]
    fn test_classify_days() {
        let overdue = DueStatus::from_days(-2, DEFAULT_NEAR_DUE_DAYS);
        assert!(overdue.is_overdue);
        assert!(!overdue.near_due);

        let soon = DueStatus::from_days(5, DEFAULT_NEAR_DUE_DAYS);
        assert!(soon.near_due);
        assert!(!soon.is_overdue);

        let today = DueStatus::from_days(0, DEFAULT_NEAR_DUE_DAYS);
        assert!(today.near_due);

        let later = DueStatus::from_days(8, DEFAULT_NEAR_DUE_DAYS);
        assert_eq!(later.state, DueState::OnTrack);
    }

    #[test]
    fn test_monthly_due_status() {
        let table = FrequencyTable::default();
        let today = date(2025, 3, 3);

        let status = due_status(&table, "Monthly", Some(date(2025, 1, 30)), today, 7);
        assert_eq!(status.days_until_next_fill, Some(-2));
        assert!(status.is_overdue);

        let status = due_status(&table, "monthly", Some(date(2025, 2, 6)), today, 7);
        assert_eq!(status.days_until_next_fill, Some(5));
        assert!(status.near_due);
        assert!(!status.is_overdue);
    }

    #[test]
    fn test_when_needed_is_exempt() {
        let table = FrequencyTable::default();
        let status = due_status(&table, "When needed", None, date(2025, 1, 1), 7);
        assert_eq!(status.state, DueState::Exempt);
        assert!(!status.is_overdue);
    }

    #[test]
    fn test_never_filled_is_overdue() {
        let table = FrequencyTable::default();
        let status = due_status(&table, "Weekly", None, date(2025, 1, 1), 7);
        assert!(status.is_overdue);
        assert_eq!(status.days_until_next_fill, None);
    }

    #[test]
    fn test_custom_interval() {
        let mut table = FrequencyTable::default();
        table.set("Monthly", 31).unwrap();
        assert_eq!(table.interval("Monthly"), Some(FillInterval::Days(31)));
        assert_eq!(table.interval("Fortnightly"), None);
    }

    #[test]
    fn test_unusable_intervals_refused() {
        let mut table = FrequencyTable::default();
        for days in [0, -30, MAX_INTERVAL_DAYS + 1, i64::MAX] {
            let err = table.set("Forever", days).unwrap_err();
            assert_eq!(err.days, days);
        }
        assert_eq!(table.interval("Forever"), None);
        assert!(table.set("Centennial", MAX_INTERVAL_DAYS).is_ok());

        let err = table.set("Never", 0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "frequency 'Never' must repeat every 1 to 36525 days (got 0)"
        );
    }

    #[test]
    fn test_days_until_next_fill_off_calendar() {
        let last = date(2025, 1, 1);
        assert_eq!(days_until_next_fill(i64::MAX, last, last), None);
        assert_eq!(days_until_next_fill(3_000_000_000, last, last), None);
        assert_eq!(days_until_next_fill(30, last, date(2025, 1, 11)), Some(20));
    }

    #[test]
    fn test_labels_ordered_by_interval() {
        let labels = FrequencyTable::default().labels();
        assert_eq!(labels.first().map(String::as_str), Some("Daily"));
        assert_eq!(labels.last().map(String::as_str), Some(WHEN_NEEDED));
        assert_eq!(labels.len(), 8);
    }
}
