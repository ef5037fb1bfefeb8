//! Merge-and-persist orchestration
//!
//! Every mutation re-reads the whole tab, locates the target row by business
//! key, validates, merges, and then issues exactly one row write. Nothing is
//! cached between calls and nothing is locked: the last writer wins.

mod capa;
mod process;
mod record;
mod risk;

pub use capa::CapaRegister;
pub use process::ProcessRegister;
pub use record::{BulkOutcome, DueEntry, RecordRegister};
pub use risk::RiskRegister;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::core::entity::{decode_all, Located, SheetRecord};
use crate::core::error::{RegisterError, Result};
use crate::sheets::SheetStore;

/// Today's date in local time
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// One register tab behind a [`SheetStore`]
#[derive(Debug)]
pub struct RegisterTab<S> {
    store: S,
    tab: String,
}

impl<S: SheetStore> RegisterTab<S> {
    pub fn new(store: S, tab: impl Into<String>) -> Self {
        Self {
            store,
            tab: tab.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.tab
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Fresh read of every record with its row position
    pub fn fetch_all<R: SheetRecord>(&mut self) -> Result<Vec<Located<R>>> {
        let rows = self.store.read(&self.tab)?;
        let records = decode_all::<R>(&rows);
        debug!(
            tab = %self.tab,
            rows = rows.len(),
            records = records.len(),
            "fetched register"
        );
        Ok(records)
    }

    /// Records only, in sheet order
    pub fn records<R: SheetRecord>(&mut self) -> Result<Vec<R>> {
        Ok(self
            .fetch_all::<R>()?
            .into_iter()
            .map(|located| located.record)
            .collect())
    }

    /// Fresh read, then the record whose key equals `key` exactly
    pub fn locate<R: SheetRecord>(&mut self, key: &str) -> Result<Located<R>> {
        let key = key.trim();
        let found = self
            .fetch_all::<R>()?
            .into_iter()
            .find(|located| located.record.key() == key);
        match found {
            Some(located) => {
                debug!(entity = R::ENTITY, key, row = located.row, "located record");
                Ok(located)
            }
            None => Err(RegisterError::not_found(R::ENTITY, key)),
        }
    }

    /// Full-row overwrite of `record` at `row`
    pub fn overwrite<R: SheetRecord>(&mut self, row: usize, record: &R) -> Result<()> {
        self.store.update_row(&self.tab, row, &record.encode())?;
        info!(entity = R::ENTITY, key = record.key(), row, "record updated");
        Ok(())
    }

    pub fn append<R: SheetRecord>(&mut self, record: &R) -> Result<()> {
        self.store.append_row(&self.tab, &record.encode())?;
        info!(entity = R::ENTITY, key = record.key(), "record added");
        Ok(())
    }
}

/// Replace `field` when an update carries a value
pub(crate) fn merge_field(field: &mut String, value: Option<String>) {
    if let Some(value) = value {
        *field = value;
    }
}

/// Key equality ignoring surrounding whitespace and letter case, including
/// non-ASCII letters
pub(crate) fn same_key(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ProcessInteraction;
    use crate::sheets::MemorySheetStore;

    fn store() -> MemorySheetStore {
        MemorySheetStore::new().with_tab(
            "P",
            [
                vec!["Process Name", "Process Owner"],
                vec!["Sales", "Ann"],
                vec!["", "ghost"],
                vec!["Design", "Bo"],
            ],
        )
    }

    #[test]
    fn test_same_key_folds_unicode_case() {
        assert!(same_key("étude", "ÉTUDE"));
        assert!(same_key(" Größe ", "GRÖßE"));
        assert!(!same_key("F/11", "F/12"));
    }

    #[test]
    fn test_locate_reports_sheet_row() {
        let mut tab = RegisterTab::new(store(), "P");
        let found = tab.locate::<ProcessInteraction>("Design").unwrap();
        assert_eq!(found.row, 4);
        assert_eq!(found.record.owner, "Bo");
    }

    #[test]
    fn test_locate_is_exact() {
        let mut tab = RegisterTab::new(store(), "P");
        let err = tab.locate::<ProcessInteraction>("design").unwrap_err();
        assert!(matches!(err, RegisterError::NotFound { entity: "Process", .. }));
    }

    #[test]
    fn test_overwrite_is_one_full_row_write() {
        let mut tab = RegisterTab::new(store(), "P");
        let mut found = tab.locate::<ProcessInteraction>("Sales").unwrap();
        found.record.owner = "Cy".to_string();
        tab.overwrite(found.row, &found.record).unwrap();

        let store = tab.into_store();
        assert_eq!(store.write_count(), 1);
        let row = &store.tab("P").unwrap()[1];
        assert_eq!(row.len(), 7);
        assert_eq!(row[1], "Cy");
    }

    #[test]
    fn test_remote_error_surfaces() {
        let mut backing = store();
        backing.fail_next_write("Service unavailable");
        let mut tab = RegisterTab::new(backing, "P");
        let found = tab.locate::<ProcessInteraction>("Sales").unwrap();
        let err = tab.overwrite(found.row, &found.record).unwrap_err();
        assert!(matches!(err, RegisterError::Remote(_)));
        assert_eq!(err.to_string(), "Service unavailable");
    }
}
