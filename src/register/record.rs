use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::Serialize;
use tracing::warn;

use super::{same_key, today, RegisterTab};
use crate::core::derived::{DueStatus, FrequencyTable, DEFAULT_NEAR_DUE_DAYS};
use crate::core::error::{RegisterError, Result};
use crate::core::validate::{is_valid_enum_member, require_non_empty};
use crate::core::workflow::check_transition;
use crate::entities::record::{
    next_serial, AuditSummary, FileReview, NewRecord, QmsRecord, ReviewStats, ReviewStatus,
};
use crate::sheets::SheetStore;

/// A record with its derived due classification
#[derive(Debug, Clone, Serialize)]
pub struct DueEntry {
    pub record: QmsRecord,
    pub due: DueStatus,
}

/// Result of one code in a bulk approve/reject
#[derive(Debug)]
pub struct BulkOutcome {
    pub code: String,
    pub result: Result<QmsRecord>,
}

/// The QMS records sheet: form templates, fills and reviews
#[derive(Debug)]
pub struct RecordRegister<S> {
    tab: RegisterTab<S>,
    today: NaiveDate,
    frequencies: FrequencyTable,
    near_due_days: i64,
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl<S: SheetStore> RecordRegister<S> {
    pub fn new(store: S, tab: impl Into<String>) -> Self {
        Self {
            tab: RegisterTab::new(store, tab),
            today: today(),
            frequencies: FrequencyTable::default(),
            near_due_days: DEFAULT_NEAR_DUE_DAYS,
        }
    }

    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    #[must_use]
    pub fn with_frequencies(mut self, frequencies: FrequencyTable, near_due_days: i64) -> Self {
        self.frequencies = frequencies;
        self.near_due_days = near_due_days;
        self
    }

    pub fn into_store(self) -> S {
        self.tab.into_store()
    }

    pub fn frequencies(&self) -> &FrequencyTable {
        &self.frequencies
    }

    pub fn list(&mut self) -> Result<Vec<QmsRecord>> {
        self.tab.records()
    }

    pub fn get(&mut self, code: &str) -> Result<QmsRecord> {
        Ok(self.tab.locate::<QmsRecord>(code)?.record)
    }

    /// Canonical spelling of a frequency label, or `InvalidValue`
    fn resolve_frequency(&self, label: &str) -> Result<String> {
        let label = label.trim();
        let labels = self.frequencies.labels();
        let allowed: Vec<&str> = labels.iter().map(String::as_str).collect();
        if is_valid_enum_member(label, &allowed) {
            return Ok(label.to_string());
        }
        match allowed.iter().find(|known| known.eq_ignore_ascii_case(label)) {
            Some(known) => Ok(known.to_string()),
            None => Err(RegisterError::invalid(
                "frequency",
                format!("'{}' is not one of: {}", label, allowed.join(", ")),
            )),
        }
    }

    /// Add a form template; codes are unique regardless of case
    pub fn add(&mut self, input: NewRecord) -> Result<QmsRecord> {
        require_non_empty("code", &input.code)?;
        require_non_empty("record name", &input.name)?;
        let frequency = if input.frequency.trim().is_empty() {
            String::new()
        } else {
            self.resolve_frequency(&input.frequency)?
        };

        let code = input.code.trim().to_string();
        let duplicate = self
            .list()?
            .into_iter()
            .any(|r| same_key(&r.code, &code));
        if duplicate {
            return Err(RegisterError::DuplicateKey {
                entity: "Record",
                key: code,
            });
        }

        let mut record = QmsRecord::new(code, input.name);
        record.category = input.category;
        record.description = input.description;
        record.frequency = frequency;
        record.template_link = input.template_link;
        record.folder_link = input.folder_link;
        record.department = input.department;

        self.tab.append(&record)?;
        Ok(record)
    }

    /// Every record with its due classification, most urgent first
    pub fn due_report(&mut self) -> Result<Vec<DueEntry>> {
        let (today, near) = (self.today, self.near_due_days);
        let mut entries: Vec<DueEntry> = self
            .list()?
            .into_iter()
            .map(|record| {
                let due = record.due(&self.frequencies, today, near);
                DueEntry { record, due }
            })
            .collect();
        entries.sort_by_key(|e| (!e.due.is_overdue, e.due.days_until_next_fill.unwrap_or(i64::MAX)));
        Ok(entries)
    }

    /// Set the review status of one file, following the review workflow
    pub fn review_file(
        &mut self,
        code: &str,
        file_id: &str,
        status: ReviewStatus,
        comment: &str,
        reviewer: &str,
    ) -> Result<QmsRecord> {
        require_non_empty("file", file_id)?;
        let located = self.tab.locate::<QmsRecord>(code)?;
        let mut record = located.record;

        let file_id = file_id.trim();
        check_transition(record.file_status(file_id), status)?;

        let now = timestamp();
        record.file_reviews.files.insert(
            file_id.to_string(),
            FileReview {
                status,
                comment: comment.to_string(),
                reviewed_by: reviewer.to_string(),
                date: now.clone(),
            },
        );
        record.file_reviews.last_updated = Some(now);

        self.tab.overwrite(located.row, &record)?;
        Ok(record)
    }

    /// Move the whole record through the review workflow.
    ///
    /// A decision (approved/rejected) stamps the reviewed flag, reviewer and
    /// review date; any other status clears them.
    pub fn set_record_status(
        &mut self,
        code: &str,
        status: ReviewStatus,
        reviewer: &str,
    ) -> Result<QmsRecord> {
        let located = self.tab.locate::<QmsRecord>(code)?;
        let mut record = located.record;
        check_transition(record.review_status(), status)?;

        record.file_reviews.record_status = Some(status);
        record.file_reviews.last_updated = Some(timestamp());
        record.audit_status = status.audit_label().to_string();
        if status.is_decision() {
            record.reviewed = true;
            record.reviewed_by = reviewer.to_string();
            record.review_date = self.today.format("%Y-%m-%d").to_string();
        } else {
            record.reviewed = false;
            record.reviewed_by.clear();
            record.review_date.clear();
        }

        self.tab.overwrite(located.row, &record)?;
        Ok(record)
    }

    pub fn set_frequency(&mut self, code: &str, label: &str) -> Result<QmsRecord> {
        let frequency = self.resolve_frequency(label)?;
        let located = self.tab.locate::<QmsRecord>(code)?;
        let mut record = located.record;
        record.frequency = frequency;

        self.tab.overwrite(located.row, &record)?;
        Ok(record)
    }

    /// Register a filled form: advance the serials, bump the count and queue
    /// the file for review. The file id defaults to the issued serial.
    pub fn register_fill(
        &mut self,
        code: &str,
        file_id: Option<&str>,
        date: Option<NaiveDate>,
    ) -> Result<QmsRecord> {
        let located = self.tab.locate::<QmsRecord>(code)?;
        let mut record = located.record;

        let serial = if record.next_serial.trim().is_empty() {
            next_serial(&record.code, &record.last_serial)?
        } else {
            record.next_serial.trim().to_string()
        };
        let file_id = match file_id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => serial.clone(),
        };
        if record.files.iter().any(|f| f == &file_id)
            || record.file_reviews.files.contains_key(&file_id)
        {
            return Err(RegisterError::DuplicateKey {
                entity: "File",
                key: file_id,
            });
        }

        let date = date.unwrap_or(self.today);
        record.next_serial = next_serial(&record.code, &serial)?;
        record.last_serial = serial;
        record.record_count = record
            .record_count
            .checked_add(1)
            .ok_or_else(|| RegisterError::invalid("record count", "has reached its maximum"))?;
        record.last_file_date = date.format("%Y-%m-%d").to_string();
        record.files.push(file_id.clone());

        let now = timestamp();
        record.file_reviews.files.insert(
            file_id,
            FileReview {
                status: ReviewStatus::PendingReview,
                comment: String::new(),
                reviewed_by: String::new(),
                date: now.clone(),
            },
        );
        record.file_reviews.last_updated = Some(now);

        self.tab.overwrite(located.row, &record)?;
        Ok(record)
    }

    /// Apply one status to many records; each is its own read-modify-write
    pub fn bulk_set_status(
        &mut self,
        codes: &[String],
        status: ReviewStatus,
        reviewer: &str,
    ) -> Vec<BulkOutcome> {
        codes
            .iter()
            .map(|code| {
                let result = self.set_record_status(code, status, reviewer);
                if let Err(ref e) = result {
                    warn!(code = %code, error = %e, "bulk status change skipped");
                }
                BulkOutcome {
                    code: code.clone(),
                    result,
                }
            })
            .collect()
    }

    pub fn bulk_approve(&mut self, codes: &[String], reviewer: &str) -> Vec<BulkOutcome> {
        self.bulk_set_status(codes, ReviewStatus::Approved, reviewer)
    }

    pub fn bulk_reject(&mut self, codes: &[String], reviewer: &str) -> Vec<BulkOutcome> {
        self.bulk_set_status(codes, ReviewStatus::Rejected, reviewer)
    }

    pub fn review_stats(&mut self) -> Result<ReviewStats> {
        Ok(ReviewStats::compute(&self.list()?))
    }

    pub fn audit_summary(&mut self) -> Result<AuditSummary> {
        Ok(AuditSummary::compute(&self.list()?))
    }
}
