use std::collections::HashMap;

use super::{SheetError, SheetStore};

/// In-process spreadsheet, used by tests and dry runs
#[derive(Debug, Default)]
pub struct MemorySheetStore {
    tabs: HashMap<String, Vec<Vec<String>>>,
    writes: usize,
    reads: usize,
    fail_next_write: Option<String>,
}

impl MemorySheetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style tab seeding
    pub fn with_tab<I, R, C>(mut self, tab: &str, rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.set_tab(tab, rows);
        self
    }

    pub fn set_tab<I, R, C>(&mut self, tab: &str, rows: I)
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = C>,
        C: Into<String>,
    {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(Into::into).collect())
            .collect();
        self.tabs.insert(tab.to_string(), rows);
    }

    pub fn tab(&self, tab: &str) -> Option<&Vec<Vec<String>>> {
        self.tabs.get(tab)
    }

    /// Number of successful row writes (updates plus appends)
    pub fn write_count(&self) -> usize {
        self.writes
    }

    pub fn read_count(&self) -> usize {
        self.reads
    }

    /// Make the next write fail with `SheetError::Remote(message)`
    pub fn fail_next_write(&mut self, message: impl Into<String>) {
        self.fail_next_write = Some(message.into());
    }

    fn check_write(&mut self) -> Result<(), SheetError> {
        match self.fail_next_write.take() {
            Some(message) => Err(SheetError::Remote(message)),
            None => Ok(()),
        }
    }
}

impl SheetStore for MemorySheetStore {
    fn read(&mut self, tab: &str) -> Result<Vec<Vec<String>>, SheetError> {
        self.reads += 1;
        self.tabs
            .get(tab)
            .cloned()
            .ok_or_else(|| SheetError::TabNotFound(tab.to_string()))
    }

    fn update_row(&mut self, tab: &str, row: usize, values: &[String]) -> Result<(), SheetError> {
        self.check_write()?;
        let rows = self
            .tabs
            .get_mut(tab)
            .ok_or_else(|| SheetError::TabNotFound(tab.to_string()))?;
        if row == 0 || row > rows.len() {
            return Err(SheetError::RowOutOfRange {
                tab: tab.to_string(),
                row,
            });
        }
        rows[row - 1] = values.to_vec();
        self.writes += 1;
        Ok(())
    }

    fn append_row(&mut self, tab: &str, values: &[String]) -> Result<(), SheetError> {
        self.check_write()?;
        let rows = self
            .tabs
            .get_mut(tab)
            .ok_or_else(|| SheetError::TabNotFound(tab.to_string()))?;
        rows.push(values.to_vec());
        self.writes += 1;
        Ok(())
    }
}
