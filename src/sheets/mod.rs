//! Spreadsheet collaborators
//!
//! The registers only ever see a [`SheetStore`]: read a whole tab, overwrite
//! one full row, or append one row. Rows are addressed by their 1-based sheet
//! position with the header on row 1.

mod csv_store;
mod http;
mod memory;

pub use csv_store::CsvSheetStore;
pub use http::{SheetsApiStore, TokenSource};
pub use memory::MemorySheetStore;

use thiserror::Error;

/// Errors raised by a spreadsheet backend
#[derive(Debug, Error)]
pub enum SheetError {
    /// Non-success reply from the backing store, message passed through
    #[error("{0}")]
    Remote(String),

    #[error("sheet tab '{0}' not found")]
    TabNotFound(String),

    #[error("row {row} is outside sheet tab '{tab}'")]
    RowOutOfRange { tab: String, row: usize },

    #[error("spreadsheet backend not configured: {0}")]
    NotConfigured(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Row-level access to a spreadsheet
pub trait SheetStore {
    /// Every row of `tab`, header first
    fn read(&mut self, tab: &str) -> Result<Vec<Vec<String>>, SheetError>;

    /// Overwrite the whole row at 1-based position `row`
    fn update_row(&mut self, tab: &str, row: usize, values: &[String]) -> Result<(), SheetError>;

    /// Append one row after the last populated row
    fn append_row(&mut self, tab: &str, values: &[String]) -> Result<(), SheetError>;
}

impl<S: SheetStore + ?Sized> SheetStore for &mut S {
    fn read(&mut self, tab: &str) -> Result<Vec<Vec<String>>, SheetError> {
        (**self).read(tab)
    }

    fn update_row(&mut self, tab: &str, row: usize, values: &[String]) -> Result<(), SheetError> {
        (**self).update_row(tab, row, values)
    }

    fn append_row(&mut self, tab: &str, values: &[String]) -> Result<(), SheetError> {
        (**self).append_row(tab, values)
    }
}

impl<S: SheetStore + ?Sized> SheetStore for Box<S> {
    fn read(&mut self, tab: &str) -> Result<Vec<Vec<String>>, SheetError> {
        (**self).read(tab)
    }

    fn update_row(&mut self, tab: &str, row: usize, values: &[String]) -> Result<(), SheetError> {
        (**self).update_row(tab, row, values)
    }

    fn append_row(&mut self, tab: &str, values: &[String]) -> Result<(), SheetError> {
        (**self).append_row(tab, values)
    }
}
