use chrono::{Datelike, NaiveDate};

use super::{merge_field, today, RegisterTab};
use crate::core::error::{RegisterError, Result};
use crate::core::identity::{BusinessKey, KeyPrefix};
use crate::core::validate::{require_non_empty, require_rating};
use crate::core::workflow::{check_transition, parse_status};
use crate::entities::risk::{NewRisk, Risk, RiskStats, RiskStatus, RiskUpdate};
use crate::sheets::SheetStore;

/// The risk register
#[derive(Debug)]
pub struct RiskRegister<S> {
    tab: RegisterTab<S>,
    today: NaiveDate,
}

impl<S: SheetStore> RiskRegister<S> {
    pub fn new(store: S, tab: impl Into<String>) -> Self {
        Self {
            tab: RegisterTab::new(store, tab),
            today: today(),
        }
    }

    /// Pin the date used for key years
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn into_store(self) -> S {
        self.tab.into_store()
    }

    pub fn list(&mut self) -> Result<Vec<Risk>> {
        self.tab.records()
    }

    pub fn get(&mut self, id: &str) -> Result<Risk> {
        Ok(self.tab.locate::<Risk>(id)?.record)
    }

    /// Validate, assign the next `RISK-YY-NNN` key and append
    pub fn add(&mut self, input: NewRisk) -> Result<Risk> {
        let likelihood = require_rating("likelihood", input.likelihood)?;
        let impact = require_rating("impact", input.impact)?;
        require_non_empty("description", &input.description)?;

        let existing = self.tab.records::<Risk>()?;
        let id = BusinessKey::next(
            KeyPrefix::Risk,
            self.today.year(),
            existing.iter().map(|r| r.id.as_str()),
        )
        .map_err(|e| RegisterError::invalid("key", e.to_string()))?;

        let risk = Risk {
            id: id.to_string(),
            department: input.department,
            description: input.description,
            cause: input.cause,
            likelihood,
            impact,
            action: input.action,
            owner: input.owner,
            status: RiskStatus::Open,
            review_date: input.review_date,
            linked_capa: input.linked_capa,
        };
        self.tab.append(&risk)?;
        Ok(risk)
    }

    /// Merge `update` into the current row and overwrite it
    pub fn update(&mut self, id: &str, update: RiskUpdate) -> Result<Risk> {
        let located = self.tab.locate::<Risk>(id)?;
        let current = located.record;

        let status = match update.status {
            Some(ref raw) => parse_status::<RiskStatus>(raw)?,
            None => current.status,
        };
        let likelihood = match update.likelihood {
            Some(n) => require_rating("likelihood", n)?,
            None => require_rating("likelihood", current.likelihood.into())?,
        };
        let impact = match update.impact {
            Some(n) => require_rating("impact", n)?,
            None => require_rating("impact", current.impact.into())?,
        };
        check_transition(current.status, status)?;

        let mut merged = current;
        merge_field(&mut merged.department, update.department);
        merge_field(&mut merged.description, update.description);
        merge_field(&mut merged.cause, update.cause);
        merge_field(&mut merged.action, update.action);
        merge_field(&mut merged.owner, update.owner);
        merge_field(&mut merged.review_date, update.review_date);
        merge_field(&mut merged.linked_capa, update.linked_capa);
        merged.likelihood = likelihood;
        merged.impact = impact;
        merged.status = status;
        require_non_empty("description", &merged.description)?;

        self.tab.overwrite(located.row, &merged)?;
        Ok(merged)
    }

    pub fn stats(&mut self) -> Result<RiskStats> {
        Ok(RiskStats::compute(&self.list()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::{header_row, SheetRecord};
    use crate::core::error::RegisterError;
    use crate::sheets::MemorySheetStore;

    const TAB: &str = "Risk Register";

    fn register(rows: Vec<Vec<String>>) -> RiskRegister<MemorySheetStore> {
        let mut all = vec![header_row::<Risk>()];
        all.extend(rows);
        let store = MemorySheetStore::new().with_tab(TAB, all);
        RiskRegister::new(store, TAB).with_today(NaiveDate::from_ymd_opt(2025, 5, 20).unwrap())
    }

    fn input(likelihood: i64, impact: i64) -> NewRisk {
        NewRisk {
            department: "QA".to_string(),
            description: "Mislabelled samples".to_string(),
            likelihood,
            impact,
            ..Default::default()
        }
    }

    fn seeded() -> RiskRegister<MemorySheetStore> {
        let mut reg = register(vec![]);
        reg.add(input(3, 4)).unwrap();
        reg
    }

    #[test]
    fn test_add_generates_next_key() {
        let existing = ["RISK-25-001", "RISK-25-003", "RISK-24-010"]
            .iter()
            .map(|id| vec![id.to_string(), "QA".to_string()])
            .collect();
        let mut reg = register(existing);
        let risk = reg.add(input(2, 2)).unwrap();
        assert_eq!(risk.id, "RISK-25-004");
        assert_eq!(risk.status, RiskStatus::Open);

        let store = reg.into_store();
        let rows = store.tab(TAB).unwrap();
        assert_eq!(rows.last().unwrap()[0], "RISK-25-004");
        assert_eq!(rows.last().unwrap()[6], "4");
    }

    #[test]
    fn test_add_rejects_bad_rating_without_writing() {
        let mut reg = register(vec![]);
        let err = reg.add(input(6, 2)).unwrap_err();
        assert!(matches!(err, RegisterError::InvalidValue { field: "likelihood", .. }));
        assert_eq!(reg.into_store().write_count(), 0);
    }

    #[test]
    fn test_score_recomputed_after_partial_update() {
        let mut reg = seeded();
        let updated = reg
            .update(
                "RISK-25-001",
                RiskUpdate {
                    impact: Some(5),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.likelihood, 3);
        assert_eq!(updated.score(), 15);

        let store = reg.into_store();
        let row = &store.tab(TAB).unwrap()[1];
        assert_eq!(row[6], "15");
        assert_eq!(Risk::decode(row).unwrap().score(), 15);
    }

    #[test]
    fn test_score_tracks_every_rating_pair() {
        let mut reg = register(vec![]);
        for likelihood in 1..=5_i64 {
            for impact in 1..=5_i64 {
                let created = reg.add(input(likelihood, impact)).unwrap();
                assert_eq!(created.score(), (likelihood * impact) as u32);

                let (new_likelihood, new_impact, update) = if (likelihood + impact) % 2 == 0 {
                    let l = 6 - likelihood;
                    (l, impact, RiskUpdate { likelihood: Some(l), ..Default::default() })
                } else {
                    let i = 6 - impact;
                    (likelihood, i, RiskUpdate { impact: Some(i), ..Default::default() })
                };
                let updated = reg.update(&created.id, update).unwrap();
                let expected = (new_likelihood * new_impact) as u32;
                assert_eq!(updated.score(), expected);

                let stored = reg.get(&created.id).unwrap();
                assert_eq!(stored.likelihood as i64, new_likelihood);
                assert_eq!(stored.impact as i64, new_impact);
                assert_eq!(stored.score(), expected);
            }
        }

        let store = reg.into_store();
        let rows = store.tab(TAB).unwrap();
        assert_eq!(rows.len(), 26);
        for row in &rows[1..] {
            let risk = Risk::decode(row).unwrap();
            assert_eq!(row[6], risk.score().to_string());
        }
    }

    #[test]
    fn test_stored_rating_out_of_range_blocks_unrelated_update() {
        let cells: Vec<String> = [
            "RISK-25-001", "QA", "Mislabelled samples", "", "9", "2", "18", "", "", "Open", "", "",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();
        let mut reg = register(vec![cells]);

        let err = reg
            .update(
                "RISK-25-001",
                RiskUpdate {
                    owner: Some("Zed".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, RegisterError::InvalidValue { field: "likelihood", .. }));

        let fixed = reg
            .update(
                "RISK-25-001",
                RiskUpdate {
                    likelihood: Some(4),
                    owner: Some("Zed".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(fixed.likelihood, 4);
        assert_eq!(reg.into_store().write_count(), 1);
    }

    #[test]
    fn test_add_at_key_limit_writes_nothing() {
        let mut reg = register(vec![vec!["RISK-25-4294967295".to_string()]]);
        let err = reg.add(input(2, 2)).unwrap_err();
        assert!(matches!(err, RegisterError::InvalidValue { field: "key", .. }));
        assert_eq!(reg.into_store().write_count(), 0);
    }

    #[test]
    fn test_update_unknown_key() {
        let mut reg = seeded();
        let err = reg.update("RISK-25-099", RiskUpdate::default()).unwrap_err();
        assert!(matches!(err, RegisterError::NotFound { .. }));
    }

    #[test]
    fn test_update_bad_status_writes_nothing() {
        let mut reg = seeded();
        let err = reg
            .update(
                "RISK-25-001",
                RiskUpdate {
                    status: Some("Archived".to_string()),
                    owner: Some("Zed".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, RegisterError::InvalidValue { field: "status", .. }));
        let store = reg.into_store();
        assert_eq!(store.write_count(), 1);
        assert_eq!(store.tab(TAB).unwrap()[1][8], "");
    }

    #[test]
    fn test_status_change() {
        let mut reg = seeded();
        let updated = reg
            .update(
                "RISK-25-001",
                RiskUpdate {
                    status: Some("controlled".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.status, RiskStatus::Controlled);
        assert_eq!(reg.get("RISK-25-001").unwrap().status, RiskStatus::Controlled);
    }

    #[test]
    fn test_stats() {
        let mut reg = seeded();
        reg.add(input(5, 5)).unwrap();
        let stats = reg.stats().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.high, 1);
        assert_eq!(stats.medium, 1);
        assert_eq!(stats.average_score, 18.5);
    }
}
