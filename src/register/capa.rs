use chrono::{Datelike, NaiveDate};

use super::{merge_field, today, RegisterTab};
use crate::core::error::{RegisterError, Result};
use crate::core::identity::{BusinessKey, KeyPrefix};
use crate::core::validate::{require_date, require_enum, require_non_empty};
use crate::core::workflow::{check_transition, parse_status};
use crate::entities::capa::{Capa, CapaStats, CapaStatus, CapaType, CapaUpdate, NewCapa};
use crate::sheets::SheetStore;

/// The CAPA register
#[derive(Debug)]
pub struct CapaRegister<S> {
    tab: RegisterTab<S>,
    today: NaiveDate,
}

impl<S: SheetStore> CapaRegister<S> {
    pub fn new(store: S, tab: impl Into<String>) -> Self {
        Self {
            tab: RegisterTab::new(store, tab),
            today: today(),
        }
    }

    /// Pin the date used for key years and overdue checks
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn into_store(self) -> S {
        self.tab.into_store()
    }

    pub fn list(&mut self) -> Result<Vec<Capa>> {
        self.tab.records()
    }

    pub fn get(&mut self, id: &str) -> Result<Capa> {
        Ok(self.tab.locate::<Capa>(id)?.record)
    }

    /// Validate, assign the next `CAPA-YY-NNN` key and append
    pub fn add(&mut self, input: NewCapa) -> Result<Capa> {
        let capa_type: CapaType = require_enum("type", &input.capa_type)?;
        require_non_empty("root cause", &input.root_cause)?;
        let target = require_date("target date", &input.target_date)?;

        let existing = self.tab.records::<Capa>()?;
        let id = BusinessKey::next(
            KeyPrefix::Capa,
            self.today.year(),
            existing.iter().map(|c| c.id.as_str()),
        )
        .map_err(|e| RegisterError::invalid("key", e.to_string()))?;

        let capa = Capa {
            id: id.to_string(),
            source: input.source,
            capa_type,
            description: input.description,
            reference: input.reference,
            root_cause: input.root_cause,
            corrective_action: input.corrective_action,
            preventive_action: input.preventive_action,
            responsible: input.responsible,
            target_date: target.format("%Y-%m-%d").to_string(),
            status: CapaStatus::Open,
            effectiveness_check: String::new(),
            effectiveness_review_date: String::new(),
            closure_approval: String::new(),
            related_risk: input.related_risk,
        };
        self.tab.append(&capa)?;
        Ok(capa)
    }

    /// Merge `update` into the current row and overwrite it.
    ///
    /// Enum values and the transition are checked first; entering Closed
    /// additionally requires the effectiveness check, its review date and
    /// the closure approval on the merged record.
    pub fn update(&mut self, id: &str, update: CapaUpdate) -> Result<Capa> {
        let located = self.tab.locate::<Capa>(id)?;
        let current = located.record;

        let capa_type = match update.capa_type {
            Some(ref raw) => require_enum::<CapaType>("type", raw)?,
            None => current.capa_type,
        };
        let status = match update.status {
            Some(ref raw) => parse_status::<CapaStatus>(raw)?,
            None => current.status,
        };
        check_transition(current.status, status)?;

        let target_date = match update.target_date {
            Some(ref raw) => Some(require_date("target date", raw)?.format("%Y-%m-%d").to_string()),
            None => None,
        };
        let entering_closed = status == CapaStatus::Closed && current.status != CapaStatus::Closed;

        let mut merged = current;
        merge_field(&mut merged.source, update.source);
        merge_field(&mut merged.description, update.description);
        merge_field(&mut merged.reference, update.reference);
        merge_field(&mut merged.root_cause, update.root_cause);
        merge_field(&mut merged.corrective_action, update.corrective_action);
        merge_field(&mut merged.preventive_action, update.preventive_action);
        merge_field(&mut merged.responsible, update.responsible);
        merge_field(&mut merged.target_date, target_date);
        merge_field(&mut merged.effectiveness_check, update.effectiveness_check);
        merge_field(
            &mut merged.effectiveness_review_date,
            update.effectiveness_review_date,
        );
        merge_field(&mut merged.closure_approval, update.closure_approval);
        merge_field(&mut merged.related_risk, update.related_risk);
        merged.capa_type = capa_type;
        merged.status = status;

        require_non_empty("root cause", &merged.root_cause)?;
        if entering_closed {
            if let Some(message) = merged.missing_closure_field() {
                return Err(RegisterError::PreconditionFailed {
                    message: message.to_string(),
                });
            }
        }

        self.tab.overwrite(located.row, &merged)?;
        Ok(merged)
    }

    pub fn stats(&mut self) -> Result<CapaStats> {
        let today = self.today;
        Ok(CapaStats::compute(&self.list()?, today))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::header_row;
    use crate::sheets::MemorySheetStore;

    const TAB: &str = "CAPA Register";

    fn register() -> CapaRegister<MemorySheetStore> {
        let store = MemorySheetStore::new().with_tab(TAB, vec![header_row::<Capa>()]);
        CapaRegister::new(store, TAB).with_today(NaiveDate::from_ymd_opt(2025, 5, 20).unwrap())
    }

    fn input() -> NewCapa {
        NewCapa {
            source: "Customer complaint".to_string(),
            capa_type: "Corrective".to_string(),
            description: "Wrong label on carton".to_string(),
            root_cause: "Template not locked".to_string(),
            responsible: "Packing lead".to_string(),
            target_date: "2025-06-30".to_string(),
            ..Default::default()
        }
    }

    fn status(raw: &str) -> CapaUpdate {
        CapaUpdate {
            status: Some(raw.to_string()),
            ..Default::default()
        }
    }

    fn under_verification() -> CapaRegister<MemorySheetStore> {
        let mut reg = register();
        reg.add(input()).unwrap();
        reg.update("CAPA-25-001", status("In Progress")).unwrap();
        reg.update("CAPA-25-001", status("Under Verification")).unwrap();
        reg
    }

    #[test]
    fn test_add_validates() {
        let mut reg = register();

        let mut bad = input();
        bad.capa_type = "Remedial".to_string();
        assert!(matches!(
            reg.add(bad).unwrap_err(),
            RegisterError::InvalidValue { field: "type", .. }
        ));

        let mut bad = input();
        bad.root_cause = "  ".to_string();
        assert!(matches!(
            reg.add(bad).unwrap_err(),
            RegisterError::InvalidValue { field: "root cause", .. }
        ));

        let mut bad = input();
        bad.target_date = "2025-02-30".to_string();
        assert!(matches!(
            reg.add(bad).unwrap_err(),
            RegisterError::InvalidValue { field: "target date", .. }
        ));

        let capa = reg.add(input()).unwrap();
        assert_eq!(capa.id, "CAPA-25-001");
        assert_eq!(capa.status, CapaStatus::Open);
        assert_eq!(reg.into_store().write_count(), 1);
    }

    #[test]
    fn test_skipping_a_step_is_rejected() {
        let mut reg = register();
        reg.add(input()).unwrap();
        let err = reg.update("CAPA-25-001", status("Closed")).unwrap_err();
        assert_eq!(err.to_string(), "Invalid status transition: Open → Closed");
    }

    #[test]
    fn test_close_without_preconditions_fails_and_keeps_status() {
        let mut reg = under_verification();
        let err = reg
            .update(
                "CAPA-25-001",
                CapaUpdate {
                    status: Some("Closed".to_string()),
                    effectiveness_check: Some("Sampled 20 cartons".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, RegisterError::PreconditionFailed { .. }));
        assert_eq!(
            err.to_string(),
            "Effectiveness Review Date is required before closing a CAPA"
        );

        let capa = reg.get("CAPA-25-001").unwrap();
        assert_eq!(capa.status, CapaStatus::UnderVerification);
        assert_eq!(capa.effectiveness_check, "");
    }

    #[test]
    fn test_close_with_preconditions() {
        let mut reg = under_verification();
        let closed = reg
            .update(
                "CAPA-25-001",
                CapaUpdate {
                    status: Some("closed".to_string()),
                    effectiveness_check: Some("Sampled 20 cartons".to_string()),
                    effectiveness_review_date: Some("2025-07-15".to_string()),
                    closure_approval: Some("QA Manager".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(closed.status, CapaStatus::Closed);

        let err = reg.update("CAPA-25-001", status("Open")).unwrap_err();
        assert!(matches!(err, RegisterError::InvalidTransition { .. }));
    }

    #[test]
    fn test_update_cannot_blank_root_cause() {
        let mut reg = register();
        reg.add(input()).unwrap();
        let err = reg
            .update(
                "CAPA-25-001",
                CapaUpdate {
                    root_cause: Some(String::new()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, RegisterError::InvalidValue { .. }));
    }

    #[test]
    fn test_target_date_normalised() {
        let mut reg = register();
        reg.add(input()).unwrap();
        let capa = reg
            .update(
                "CAPA-25-001",
                CapaUpdate {
                    target_date: Some("31/07/2025".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(capa.target_date, "2025-07-31");
    }

    #[test]
    fn test_stats_overdue() {
        let mut reg = register();
        let mut late = input();
        late.target_date = "2025-05-01".to_string();
        reg.add(late).unwrap();
        reg.add(input()).unwrap();

        let stats = reg.stats().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.overdue, 1);
        assert_eq!(stats.corrective, 2);
        assert_eq!(stats.closure_rate, 0);
    }
}
