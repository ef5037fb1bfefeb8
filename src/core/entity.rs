//! Row codec contract shared by every register entity

use tracing::warn;

/// A typed record stored as one spreadsheet row
///
/// Column position is the only join key between the raw row and the typed
/// record, so `encode` must emit cells in exactly the order `decode` reads
/// them.
pub trait SheetRecord: Sized {
    /// Entity name used in error messages ("Risk", "CAPA", ...)
    const ENTITY: &'static str;

    /// Header label of the key column
    const KEY_HEADER: &'static str;

    /// Full header row, one label per column
    const HEADER: &'static [&'static str];

    /// Business key of this record
    fn key(&self) -> &str;

    /// Build a record from a row; `None` when the row carries no key.
    /// Short rows are padded with defaults and never fail.
    fn decode(row: &[String]) -> Option<Self>;

    /// Serialize into exactly `HEADER.len()` cells
    fn encode(&self) -> Vec<String>;

    /// Index of the last column as a sheet letter (A, B, ..., AA)
    fn last_column() -> String {
        column_letter(Self::HEADER.len().saturating_sub(1))
    }
}

/// A record together with its 1-based sheet row (header is row 1)
#[derive(Debug, Clone, PartialEq)]
pub struct Located<R> {
    pub row: usize,
    pub record: R,
}

/// Decode every data row, skipping the header and keyless rows
pub fn decode_all<R: SheetRecord>(rows: &[Vec<String>]) -> Vec<Located<R>> {
    rows.iter()
        .enumerate()
        .skip(1)
        .filter_map(|(index, row)| {
            if !is_key_cell::<R>(row.first().map(String::as_str).unwrap_or("")) {
                return None;
            }
            match R::decode(row) {
                Some(record) => Some(Located {
                    row: index + 1,
                    record,
                }),
                None => {
                    warn!(entity = R::ENTITY, row = index + 1, "skipping undecodable row");
                    None
                }
            }
        })
        .collect()
}

/// True when a first cell holds a usable business key
pub fn is_key_cell<R: SheetRecord>(cell: &str) -> bool {
    let cell = cell.trim();
    !cell.is_empty() && cell != R::KEY_HEADER
}

/// Cell `index` of `row`, empty when the row is short
pub fn cell(row: &[String], index: usize) -> String {
    row.get(index).cloned().unwrap_or_default()
}

/// Trimmed cell `index` of `row`
pub fn trimmed(row: &[String], index: usize) -> String {
    row.get(index).map(|c| c.trim().to_string()).unwrap_or_default()
}

/// Sheet column letter for a 0-based index
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Header row as owned strings
pub fn header_row<R: SheetRecord>() -> Vec<String> {
    R::HEADER.iter().map(|h| h.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Pair {
        key: String,
        value: String,
    }

    impl SheetRecord for Pair {
        const ENTITY: &'static str = "Pair";
        const KEY_HEADER: &'static str = "Key";
        const HEADER: &'static [&'static str] = &["Key", "Value"];

        fn key(&self) -> &str {
            &self.key
        }

        fn decode(row: &[String]) -> Option<Self> {
            Some(Self {
                key: trimmed(row, 0),
                value: cell(row, 1),
            })
        }

        fn encode(&self) -> Vec<String> {
            vec![self.key.clone(), self.value.clone()]
        }
    }

    fn rows(raw: &[&[&str]]) -> Vec<Vec<String>> {
        raw.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_decode_all_skips_header_and_blank_keys() {
        let sheet = rows(&[
            &["Key", "Value"],
            &["a", "1"],
            &["", "orphan"],
            &["Key", "repeated header"],
            &["b"],
        ]);
        let decoded = decode_all::<Pair>(&sheet);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].row, 2);
        assert_eq!(decoded[1].row, 5);
        assert_eq!(decoded[1].record.value, "");
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(17), "R");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(Pair::last_column(), "B");
    }
}
