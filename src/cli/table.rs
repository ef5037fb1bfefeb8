//! Table formatting for list commands
//!
//! Commands build a [`Table`] of display strings and render it in the
//! requested row-oriented format. JSON and YAML are handled by the caller,
//! which serializes the records themselves for full fidelity.

use console::style;
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{escape_csv, truncate_str};
use crate::cli::OutputFormat;

/// Widest a TSV column may get before its text is truncated
const MAX_TSV_WIDTH: usize = 40;

#[derive(Debug, Clone)]
pub struct Table {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// The first column is the key printed by `--format id`
    pub fn new(headers: &[&'static str]) -> Self {
        Self {
            headers: headers.to_vec(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                self.rows
                    .iter()
                    .filter_map(|r| r.get(i))
                    .map(|c| c.chars().count())
                    .chain(std::iter::once(h.len()))
                    .max()
                    .unwrap_or(0)
                    .min(MAX_TSV_WIDTH)
            })
            .collect()
    }

    pub fn format_tsv(&self) -> String {
        let widths = self.widths();
        let mut out = String::new();

        let header: Vec<String> = self
            .headers
            .iter()
            .zip(&widths)
            .map(|(h, w)| style(format!("{:<w$}", h.to_uppercase(), w = w)).bold().to_string())
            .collect();
        out.push_str(header.join(" ").trim_end());
        out.push('\n');
        out.push_str(&"-".repeat(widths.iter().sum::<usize>() + widths.len().saturating_sub(1)));
        out.push('\n');

        for row in &self.rows {
            let cells: Vec<String> = widths
                .iter()
                .enumerate()
                .map(|(i, w)| {
                    let text = truncate_str(row.get(i).map(String::as_str).unwrap_or(""), *w);
                    format!("{:<w$}", text, w = w)
                })
                .collect();
            out.push_str(cells.join(" ").trim_end());
            out.push('\n');
        }
        out
    }

    pub fn format_csv(&self) -> String {
        let mut out = self.headers.join(",");
        out.push('\n');
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(|c| escape_csv(c)).collect();
            out.push_str(&cells.join(","));
            out.push('\n');
        }
        out
    }

    pub fn format_md(&self) -> String {
        let mut builder = Builder::default();
        builder.push_record(self.headers.iter().copied());
        for row in &self.rows {
            builder.push_record(row.iter().map(String::as_str));
        }
        let mut out = builder.build().with(Style::markdown()).to_string();
        out.push('\n');
        out
    }

    pub fn format_ids(&self) -> String {
        self.rows
            .iter()
            .filter_map(|r| r.first())
            .map(|id| format!("{}\n", id))
            .collect()
    }

    /// Render for a row-oriented format; `Auto` means TSV
    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Csv => self.format_csv(),
            OutputFormat::Md => self.format_md(),
            OutputFormat::Id => self.format_ids(),
            _ => self.format_tsv(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut table = Table::new(&["id", "description"]);
        table.push(vec!["RISK-25-001".to_string(), "Label, mixed up".to_string()]);
        table.push(vec!["RISK-25-002".to_string(), "Late \"urgent\" orders".to_string()]);
        table
    }

    #[test]
    fn test_csv_escapes() {
        let csv = sample().format_csv();
        assert!(csv.starts_with("id,description\n"));
        assert!(csv.contains("\"Label, mixed up\""));
        assert!(csv.contains("\"Late \"\"urgent\"\" orders\""));
    }

    #[test]
    fn test_ids() {
        assert_eq!(sample().format_ids(), "RISK-25-001\nRISK-25-002\n");
    }

    #[test]
    fn test_markdown_has_header_rule() {
        let md = sample().format_md();
        assert!(md.contains("| id"));
        assert!(md.contains("|---"));
    }

    #[test]
    fn test_tsv_truncates_long_cells() {
        let mut table = Table::new(&["id", "text"]);
        table.push(vec!["1".to_string(), "x".repeat(80)]);
        let tsv = table.format_tsv();
        assert!(tsv.contains("..."));
        assert!(!tsv.contains(&"x".repeat(41)));
    }
}
