use csv::{ReaderBuilder, WriterBuilder};
use std::path::{Path, PathBuf};

use super::{SheetError, SheetStore};

/// A workbook on disk: one CSV file per tab
///
/// Every write rewrites the whole file, so a row update is always a full-row
/// overwrite just as it is against the remote sheet.
#[derive(Debug, Clone)]
pub struct CsvSheetStore {
    dir: PathBuf,
}

impl CsvSheetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `tab`: lowercase, spaces and slashes become dashes
    pub fn tab_path(&self, tab: &str) -> PathBuf {
        let stem: String = tab
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '/' | '\\' => '-',
                c => c.to_ascii_lowercase(),
            })
            .collect();
        self.dir.join(format!("{}.csv", stem))
    }

    /// Create `tab` with a header row; leaves an existing tab untouched.
    /// Returns whether the tab was created.
    pub fn create_tab(&self, tab: &str, header: &[String]) -> Result<bool, SheetError> {
        let path = self.tab_path(tab);
        if path.exists() {
            return Ok(false);
        }
        std::fs::create_dir_all(&self.dir)?;
        self.write_rows(&path, &[header.to_vec()])?;
        Ok(true)
    }

    fn read_rows(&self, tab: &str) -> Result<Vec<Vec<String>>, SheetError> {
        let path = self.tab_path(tab);
        if !path.exists() {
            return Err(SheetError::TabNotFound(tab.to_string()));
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(rows)
    }

    fn write_rows(&self, path: &Path, rows: &[Vec<String>]) -> Result<(), SheetError> {
        let mut writer = WriterBuilder::new().flexible(true).from_path(path)?;
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl SheetStore for CsvSheetStore {
    fn read(&mut self, tab: &str) -> Result<Vec<Vec<String>>, SheetError> {
        self.read_rows(tab)
    }

    fn update_row(&mut self, tab: &str, row: usize, values: &[String]) -> Result<(), SheetError> {
        let mut rows = self.read_rows(tab)?;
        if row == 0 || row > rows.len() {
            return Err(SheetError::RowOutOfRange {
                tab: tab.to_string(),
                row,
            });
        }
        rows[row - 1] = values.to_vec();
        self.write_rows(&self.tab_path(tab), &rows)
    }

    fn append_row(&mut self, tab: &str, values: &[String]) -> Result<(), SheetError> {
        let mut rows = self.read_rows(tab)?;
        rows.push(values.to_vec());
        self.write_rows(&self.tab_path(tab), &rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_tab_file_name() {
        let store = CsvSheetStore::new("/tmp/wb");
        assert_eq!(
            store.tab_path("CAPA Register"),
            PathBuf::from("/tmp/wb/capa-register.csv")
        );
    }

    #[test]
    fn test_create_append_update() {
        let tmp = tempdir().unwrap();
        let mut store = CsvSheetStore::new(tmp.path());

        assert!(store.create_tab("Risk Register", &row(&["Risk ID", "Cause"])).unwrap());
        assert!(!store.create_tab("Risk Register", &row(&["other"])).unwrap());

        store
            .append_row("Risk Register", &row(&["RISK-25-001", "comma, inside"]))
            .unwrap();
        store
            .append_row("Risk Register", &row(&["RISK-25-002", "{\"json\": \"cell\"}"]))
            .unwrap();
        store
            .update_row("Risk Register", 2, &row(&["RISK-25-001", "rewritten"]))
            .unwrap();

        let rows = store.read("Risk Register").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], row(&["RISK-25-001", "rewritten"]));
        assert_eq!(rows[2][1], "{\"json\": \"cell\"}");
    }

    #[test]
    fn test_short_rows_survive() {
        let tmp = tempdir().unwrap();
        let mut store = CsvSheetStore::new(tmp.path());
        store.create_tab("T", &row(&["A", "B", "C"])).unwrap();
        store.append_row("T", &row(&["only"])).unwrap();
        assert_eq!(store.read("T").unwrap()[1], row(&["only"]));
    }

    #[test]
    fn test_missing_tab_and_bad_row() {
        let tmp = tempdir().unwrap();
        let mut store = CsvSheetStore::new(tmp.path());
        assert!(matches!(store.read("Nope"), Err(SheetError::TabNotFound(_))));

        store.create_tab("T", &row(&["A"])).unwrap();
        assert!(matches!(
            store.update_row("T", 3, &row(&["x"])),
            Err(SheetError::RowOutOfRange { row: 3, .. })
        ));
    }
}
