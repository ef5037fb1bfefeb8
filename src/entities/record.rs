//! QMS record entity: a form template row plus its per-file reviews

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

use crate::core::derived::{due_status, percent, DueStatus, FrequencyTable};
use crate::core::entity::{cell, trimmed, SheetRecord};
use crate::core::error::{self, RegisterError};
use crate::core::validate::parse_calendar_date;
use crate::core::workflow::WorkflowStatus;

/// Review status of a record or of one filled file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    #[default]
    Draft,
    PendingReview,
    Approved,
    Rejected,
}

impl ReviewStatus {
    /// Label written to the audit status column
    pub fn audit_label(&self) -> &'static str {
        match self {
            ReviewStatus::Draft => "Draft",
            ReviewStatus::PendingReview => "Pending Review",
            ReviewStatus::Approved => "Approved",
            ReviewStatus::Rejected => "Rejected",
        }
    }

    /// Approved and rejected are reviewer decisions; the others are not
    pub fn is_decision(&self) -> bool {
        matches!(self, ReviewStatus::Approved | ReviewStatus::Rejected)
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewStatus::Draft => write!(f, "draft"),
            ReviewStatus::PendingReview => write!(f, "pending_review"),
            ReviewStatus::Approved => write!(f, "approved"),
            ReviewStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match super::normalize_label(s).as_str() {
            "draft" => Ok(ReviewStatus::Draft),
            "pending review" | "pending" => Ok(ReviewStatus::PendingReview),
            "approved" => Ok(ReviewStatus::Approved),
            "rejected" => Ok(ReviewStatus::Rejected),
            _ => Err(format!(
                "Unknown review status: {}. Use 'draft', 'pending_review', 'approved' or 'rejected'",
                s
            )),
        }
    }
}

impl WorkflowStatus for ReviewStatus {
    const ALL: &'static [Self] = &[
        ReviewStatus::Draft,
        ReviewStatus::PendingReview,
        ReviewStatus::Approved,
        ReviewStatus::Rejected,
    ];

    fn allowed_transitions(self) -> &'static [Self] {
        match self {
            ReviewStatus::Draft => &[ReviewStatus::PendingReview],
            ReviewStatus::PendingReview => &[ReviewStatus::Approved, ReviewStatus::Rejected],
            ReviewStatus::Approved => &[],
            // resubmission
            ReviewStatus::Rejected => &[ReviewStatus::Draft],
        }
    }
}

/// Infer a record's status from its audit column.
///
/// The reviewed flag wins, then the presence of filled files; only then is
/// the free-text audit label inspected.
pub fn status_from_audit_field(audit: &str, reviewed: bool, has_files: bool) -> ReviewStatus {
    if reviewed {
        return ReviewStatus::Approved;
    }
    if has_files {
        return ReviewStatus::PendingReview;
    }

    let lower = audit.trim().to_lowercase();
    if lower.contains("rejected") || lower.contains('❌') || lower.contains("nc") {
        return ReviewStatus::Rejected;
    }
    if lower.contains("pending") || lower.contains("review") || lower.contains("waiting") {
        return ReviewStatus::PendingReview;
    }
    ReviewStatus::Draft
}

/// Review of one filled file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReview {
    pub status: ReviewStatus,
    #[serde(default)]
    pub comment: String,
    #[serde(default, rename = "reviewedBy")]
    pub reviewed_by: String,
    #[serde(default)]
    pub date: String,
}

const RECORD_STATUS_KEY: &str = "recordStatus";
const LAST_UPDATED_KEY: &str = "lastUpdated";

/// The JSON review map kept in the File Reviews column
///
/// Keys other than file entries and the two record-level keys are kept
/// verbatim so another writer's data survives a rewrite.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileReviews {
    pub files: BTreeMap<String, FileReview>,
    pub record_status: Option<ReviewStatus>,
    pub last_updated: Option<String>,
    pub extra: Map<String, Value>,
}

impl FileReviews {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
            && self.record_status.is_none()
            && self.last_updated.is_none()
            && self.extra.is_empty()
    }

    /// Parse the column; blank or unreadable JSON yields an empty map
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Self::default();
        }

        let object = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(object)) => object,
            Ok(_) | Err(_) => {
                warn!("file review cell is not a JSON object; treating as empty");
                return Self::default();
            }
        };

        let mut reviews = Self::default();
        for (key, value) in object {
            if key == RECORD_STATUS_KEY {
                reviews.record_status = value.as_str().and_then(|s| s.parse().ok());
                if reviews.record_status.is_none() {
                    reviews.extra.insert(key, value);
                }
            } else if key == LAST_UPDATED_KEY {
                match value {
                    Value::String(s) => reviews.last_updated = Some(s),
                    other => {
                        reviews.extra.insert(key, other);
                    }
                }
            } else if value.get("status").is_some() {
                match serde_json::from_value::<FileReview>(value.clone()) {
                    Ok(review) => {
                        reviews.files.insert(key, review);
                    }
                    Err(_) => {
                        reviews.extra.insert(key, value);
                    }
                }
            } else {
                reviews.extra.insert(key, value);
            }
        }
        reviews
    }

    /// Serialize for the column; an empty map is a blank cell
    pub fn to_cell(&self) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut object = self.extra.clone();
        for (file_id, review) in &self.files {
            if let Ok(value) = serde_json::to_value(review) {
                object.insert(file_id.clone(), value);
            }
        }
        if let Some(status) = self.record_status {
            object.insert(RECORD_STATUS_KEY.to_string(), Value::String(status.to_string()));
        }
        if let Some(ref updated) = self.last_updated {
            object.insert(LAST_UPDATED_KEY.to_string(), Value::String(updated.clone()));
        }
        Value::Object(object).to_string()
    }
}

impl Serialize for FileReviews {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.files.len()))?;
        for (file_id, review) in &self.files {
            map.serialize_entry(file_id, review)?;
        }
        map.end()
    }
}

/// One row of the QMS records sheet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QmsRecord {
    /// Business key, e.g. `F/11`
    pub code: String,
    pub category: String,
    pub name: String,
    pub description: String,
    /// When to fill: a frequency label
    pub frequency: String,
    pub template_link: String,
    pub folder_link: String,
    pub last_serial: String,
    pub next_serial: String,
    pub last_file_date: String,
    pub record_count: u32,
    pub audit_status: String,
    pub department: String,
    pub reviewed_by: String,
    pub review_date: String,
    pub file_reviews: FileReviews,
    pub files: Vec<String>,
    pub reviewed: bool,
}

impl QmsRecord {
    /// A fresh template row with no fills
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            next_serial: format!("{}-001", code),
            code,
            category: String::new(),
            name: name.into(),
            description: String::new(),
            frequency: String::new(),
            template_link: String::new(),
            folder_link: String::new(),
            last_serial: String::new(),
            last_file_date: String::new(),
            record_count: 0,
            audit_status: ReviewStatus::Draft.audit_label().to_string(),
            department: String::new(),
            reviewed_by: String::new(),
            review_date: String::new(),
            file_reviews: FileReviews::default(),
            files: Vec::new(),
            reviewed: false,
        }
    }

    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }

    /// Overall status: the stored record status, else inferred from the audit column
    pub fn review_status(&self) -> ReviewStatus {
        self.file_reviews
            .record_status
            .unwrap_or_else(|| status_from_audit_field(&self.audit_status, self.reviewed, self.has_files()))
    }

    /// Current review status of one file; unknown files count as drafts
    pub fn file_status(&self, file_id: &str) -> ReviewStatus {
        match self.file_reviews.files.get(file_id) {
            Some(review) => review.status,
            None if self.files.iter().any(|f| f == file_id) => ReviewStatus::PendingReview,
            None => ReviewStatus::Draft,
        }
    }

    pub fn last_fill(&self) -> Option<NaiveDate> {
        parse_calendar_date(&self.last_file_date)
    }

    pub fn due(&self, frequencies: &FrequencyTable, today: NaiveDate, near_window: i64) -> DueStatus {
        due_status(frequencies, &self.frequency, self.last_fill(), today, near_window)
    }
}

/// Serial following `last_serial`: `{code}-{n+1:03}`, or `{code}-001` when
/// it carries no trailing number
pub fn next_serial(code: &str, last_serial: &str) -> error::Result<String> {
    let trailing: String = last_serial
        .trim()
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if trailing.is_empty() {
        return Ok(format!("{}-001", code));
    }
    trailing
        .parse::<u32>()
        .ok()
        .and_then(|n| n.checked_add(1))
        .map(|n| format!("{}-{:03}", code, n))
        .ok_or_else(|| {
            RegisterError::invalid(
                "serial",
                format!("'{}' has no room for a following serial", last_serial.trim()),
            )
        })
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "true" | "yes" | "1" | "✓" | "✅"
    )
}

fn parse_files(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

impl SheetRecord for QmsRecord {
    const ENTITY: &'static str = "Record";
    const KEY_HEADER: &'static str = "Code";
    const HEADER: &'static [&'static str] = &[
        "Code",
        "Category",
        "Record Name",
        "Description",
        "When to Fill",
        "Template Link",
        "Folder Link",
        "Last Serial",
        "Next Serial",
        "Last File Date",
        "Actual Record Count",
        "Audit Status",
        "Department",
        "Reviewed By",
        "Review Date",
        "File Reviews",
        "Files",
        "Reviewed",
    ];

    fn key(&self) -> &str {
        &self.code
    }

    fn decode(row: &[String]) -> Option<Self> {
        let code = trimmed(row, 0);
        if code.is_empty() {
            return None;
        }
        let count: String = trimmed(row, 10)
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        Some(Self {
            code,
            category: cell(row, 1),
            name: cell(row, 2),
            description: cell(row, 3),
            frequency: cell(row, 4),
            template_link: cell(row, 5),
            folder_link: cell(row, 6),
            last_serial: cell(row, 7),
            next_serial: cell(row, 8),
            last_file_date: cell(row, 9),
            record_count: count.parse().unwrap_or(0),
            audit_status: cell(row, 11),
            department: cell(row, 12),
            reviewed_by: cell(row, 13),
            review_date: cell(row, 14),
            file_reviews: FileReviews::parse(&cell(row, 15)),
            files: parse_files(&cell(row, 16)),
            reviewed: parse_flag(&cell(row, 17)),
        })
    }

    fn encode(&self) -> Vec<String> {
        vec![
            self.code.clone(),
            self.category.clone(),
            self.name.clone(),
            self.description.clone(),
            self.frequency.clone(),
            self.template_link.clone(),
            self.folder_link.clone(),
            self.last_serial.clone(),
            self.next_serial.clone(),
            self.last_file_date.clone(),
            self.record_count.to_string(),
            self.audit_status.clone(),
            self.department.clone(),
            self.reviewed_by.clone(),
            self.review_date.clone(),
            self.file_reviews.to_cell(),
            self.files.join(", "),
            if self.reviewed { "TRUE" } else { "FALSE" }.to_string(),
        ]
    }
}

/// Fields supplied when adding a form template
#[derive(Debug, Clone, Default)]
pub struct NewRecord {
    pub code: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub frequency: String,
    pub template_link: String,
    pub folder_link: String,
    pub department: String,
}

/// Record-level review counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReviewStats {
    pub draft: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub total: usize,
}

impl ReviewStats {
    pub fn compute<'a>(records: impl IntoIterator<Item = &'a QmsRecord>) -> Self {
        let mut stats = ReviewStats::default();
        for record in records {
            stats.total += 1;
            match record.review_status() {
                ReviewStatus::Draft => stats.draft += 1,
                ReviewStatus::PendingReview => stats.pending += 1,
                ReviewStatus::Approved => stats.approved += 1,
                ReviewStatus::Rejected => stats.rejected += 1,
            }
        }
        stats
    }
}

/// Audit readiness across all records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditSummary {
    pub total: usize,
    /// Approved
    pub compliant: usize,
    /// Draft or awaiting review
    pub pending: usize,
    /// Rejected
    pub issues: usize,
    pub compliance_rate: u32,
}

impl AuditSummary {
    pub fn compute<'a>(records: impl IntoIterator<Item = &'a QmsRecord>) -> Self {
        let stats = ReviewStats::compute(records);
        Self {
            total: stats.total,
            compliant: stats.approved,
            pending: stats.draft + stats.pending,
            issues: stats.rejected,
            compliance_rate: percent(stats.approved, stats.total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::derived::DueState;
    use crate::core::workflow::is_valid_transition;

    fn full() -> QmsRecord {
        let mut reviews = FileReviews::default();
        reviews.files.insert(
            "F/11-004".to_string(),
            FileReview {
                status: ReviewStatus::Approved,
                comment: "OK".to_string(),
                reviewed_by: "Auditor".to_string(),
                date: "2025-03-01T10:00:00Z".to_string(),
            },
        );
        reviews.record_status = Some(ReviewStatus::PendingReview);
        reviews.last_updated = Some("2025-03-01T10:00:00Z".to_string());

        QmsRecord {
            code: "F/11".to_string(),
            category: "Production".to_string(),
            name: "Line clearance checklist".to_string(),
            description: "Before each batch".to_string(),
            frequency: "Monthly".to_string(),
            template_link: "https://drive.example/t/11".to_string(),
            folder_link: "https://drive.example/f/11".to_string(),
            last_serial: "F/11-004".to_string(),
            next_serial: "F/11-005".to_string(),
            last_file_date: "2025-02-06".to_string(),
            record_count: 4,
            audit_status: "Pending Review".to_string(),
            department: "Production".to_string(),
            reviewed_by: String::new(),
            review_date: String::new(),
            file_reviews: reviews,
            files: vec!["F/11-003".to_string(), "F/11-004".to_string()],
            reviewed: false,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_round_trip_full_and_minimal() {
        let record = full();
        assert_eq!(QmsRecord::decode(&record.encode()), Some(record));

        let minimal = QmsRecord::new("F/20", "Training log");
        assert_eq!(minimal.next_serial, "F/20-001");
        assert_eq!(QmsRecord::decode(&minimal.encode()), Some(minimal));
    }

    #[test]
    fn test_encode_layout() {
        let cells = full().encode();
        assert_eq!(cells.len(), 18);
        assert_eq!(QmsRecord::last_column(), "R");
        assert_eq!(cells[16], "F/11-003, F/11-004");
        assert_eq!(cells[17], "FALSE");
        assert_eq!(QmsRecord::new("F/1", "x").encode()[15], "");
    }

    #[test]
    fn test_unknown_json_keys_survive() {
        let raw = r#"{"F/11-001":{"status":"rejected","comment":"blurry","reviewedBy":"QA","date":"2025-01-02"},"note":"keep me","recordStatus":"rejected"}"#;
        let reviews = FileReviews::parse(raw);
        assert_eq!(reviews.files.len(), 1);
        assert_eq!(reviews.record_status, Some(ReviewStatus::Rejected));
        assert_eq!(reviews.extra.get("note"), Some(&Value::String("keep me".to_string())));

        let again = FileReviews::parse(&reviews.to_cell());
        assert_eq!(again, reviews);
    }

    #[test]
    fn test_invalid_json_is_empty() {
        assert!(FileReviews::parse("{not json").is_empty());
        assert!(FileReviews::parse("[1,2]").is_empty());
    }

    #[test]
    fn test_status_from_audit_field_priority() {
        assert_eq!(status_from_audit_field("Rejected", true, true), ReviewStatus::Approved);
        assert_eq!(status_from_audit_field("Rejected", false, true), ReviewStatus::PendingReview);
        assert_eq!(status_from_audit_field("❌ missing", false, false), ReviewStatus::Rejected);
        assert_eq!(status_from_audit_field("NC raised", false, false), ReviewStatus::Rejected);
        assert_eq!(status_from_audit_field("Waiting", false, false), ReviewStatus::PendingReview);
        assert_eq!(status_from_audit_field("", false, false), ReviewStatus::Draft);
    }

    #[test]
    fn test_review_transitions() {
        use ReviewStatus::*;
        assert!(is_valid_transition(Draft, PendingReview));
        assert!(is_valid_transition(PendingReview, Approved));
        assert!(is_valid_transition(PendingReview, Rejected));
        assert!(is_valid_transition(Rejected, Draft));
        assert!(!is_valid_transition(Draft, Approved));
        assert!(!is_valid_transition(Approved, Rejected));
        assert!(Approved.is_terminal());
    }

    #[test]
    fn test_status_labels() {
        assert_eq!("pending_review".parse::<ReviewStatus>().unwrap(), ReviewStatus::PendingReview);
        assert_eq!("Pending Review".parse::<ReviewStatus>().unwrap(), ReviewStatus::PendingReview);
        assert_eq!(ReviewStatus::PendingReview.to_string(), "pending_review");
        assert_eq!(ReviewStatus::PendingReview.audit_label(), "Pending Review");
    }

    #[test]
    fn test_next_serial() {
        assert_eq!(next_serial("F/11", "F/11-004").unwrap(), "F/11-005");
        assert_eq!(next_serial("F/11", "F/11-999").unwrap(), "F/11-1000");
        assert_eq!(next_serial("F/11", "").unwrap(), "F/11-001");
        assert_eq!(next_serial("F/11", "none yet").unwrap(), "F/11-001");
    }

    #[test]
    fn test_next_serial_out_of_range() {
        for last in ["F/11-4294967295", "F/11-99999999999"] {
            assert!(matches!(
                next_serial("F/11", last).unwrap_err(),
                RegisterError::InvalidValue { field: "serial", .. }
            ));
        }
    }

    #[test]
    fn test_due_classification() {
        let table = FrequencyTable::default();
        let mut record = full();

        record.last_file_date = "2025-01-30".to_string();
        let due = record.due(&table, date(2025, 3, 3), 7);
        assert_eq!(due.days_until_next_fill, Some(-2));
        assert!(due.is_overdue);

        record.last_file_date = "2025-02-06".to_string();
        let due = record.due(&table, date(2025, 3, 3), 7);
        assert!(due.near_due);
        assert!(!due.is_overdue);

        record.frequency = "When needed".to_string();
        assert_eq!(record.due(&table, date(2025, 3, 3), 7).state, DueState::Exempt);
    }

    #[test]
    fn test_file_status() {
        let record = full();
        assert_eq!(record.file_status("F/11-004"), ReviewStatus::Approved);
        assert_eq!(record.file_status("F/11-003"), ReviewStatus::PendingReview);
        assert_eq!(record.file_status("F/11-999"), ReviewStatus::Draft);
    }

    #[test]
    fn test_summaries() {
        let pending = full();
        let mut approved = full();
        approved.file_reviews.record_status = Some(ReviewStatus::Approved);
        let mut rejected = full();
        rejected.file_reviews.record_status = Some(ReviewStatus::Rejected);
        let draft = QmsRecord::new("F/30", "Empty");

        let records = [pending, approved, rejected, draft];
        let stats = ReviewStats::compute(&records);
        assert_eq!(
            stats,
            ReviewStats {
                draft: 1,
                pending: 1,
                approved: 1,
                rejected: 1,
                total: 4
            }
        );

        let summary = AuditSummary::compute(&records);
        assert_eq!(summary.compliant, 1);
        assert_eq!(summary.pending, 2);
        assert_eq!(summary.issues, 1);
        assert_eq!(summary.compliance_rate, 25);
    }
}
