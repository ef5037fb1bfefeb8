//! Shared helper functions for CLI commands

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::time::Duration;

use crate::cli::table::Table;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::config::Backend;
use crate::core::project::Project;
use crate::core::{Config, TtlCache};
use crate::sheets::{CsvSheetStore, SheetStore, SheetsApiStore, TokenSource};

/// Fallback lifetime for tokens the proxy hands out without `expires_in`
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(55 * 60);

/// Project and configuration for one command invocation
pub struct Context {
    pub project: Project,
    pub config: Config,
}

impl Context {
    /// Discover the project (or use `--project`) and load its configuration
    pub fn load(global: &GlobalOpts) -> Result<Self> {
        let project = match global.project {
            Some(ref root) => Project::discover_from(root),
            None => Project::discover(),
        }
        .map_err(|e| miette::miette!("{}", e))?;
        let config = Config::load_for(Some(&project));
        config.validate().map_err(|e| {
            miette::miette!(help = "Fix the value in .qms/config.yaml", "{}", e)
        })?;
        Ok(Self { project, config })
    }

    /// The spreadsheet backend selected by configuration
    pub fn store(&self) -> Result<Box<dyn SheetStore>> {
        match self.config.backend() {
            Backend::Csv => Ok(Box::new(CsvSheetStore::new(self.project.workbook_dir()))),
            Backend::Sheets => {
                let id = self.config.sheets.spreadsheet_id.clone().ok_or_else(|| {
                    miette::miette!(
                        help = "Set sheets.spreadsheet_id in .qms/config.yaml or QMS_SPREADSHEET_ID",
                        "No spreadsheet configured for the sheets backend"
                    )
                })?;
                let mut store = SheetsApiStore::new(self.config.api_base(), id);
                if let Some(ref key) = self.config.sheets.api_key {
                    store = store.with_api_key(key.clone());
                }
                if let Some(ref url) = self.config.sheets.token_url {
                    let tokens = TokenSource::new(url.clone(), TtlCache::new(DEFAULT_TOKEN_TTL));
                    store = store.with_token_source(tokens);
                }
                Ok(Box::new(store))
            }
        }
    }

    /// `--reviewer` if given, else the configured author
    pub fn reviewer(&self, given: Option<String>) -> String {
        given.unwrap_or_else(|| self.config.author())
    }
}

/// Print a single value as YAML (default) or JSON
pub fn print_item<T: Serialize>(item: &T, format: OutputFormat) -> Result<()> {
    match format.or(OutputFormat::Yaml) {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(item).into_diagnostic()?);
        }
        _ => {
            print!("{}", serde_yml::to_string(item).into_diagnostic()?);
        }
    }
    Ok(())
}

/// Print records as JSON/YAML, or `table` in the row-oriented formats
pub fn print_list<T: Serialize>(
    items: &[T],
    table: &Table,
    global: &GlobalOpts,
    noun: &str,
    hint: &str,
) -> Result<()> {
    let format = global.format.or(OutputFormat::Tsv);
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).into_diagnostic()?);
        }
        OutputFormat::Yaml => {
            if items.is_empty() {
                println!("[]");
            } else {
                print!("{}", serde_yml::to_string(&items).into_diagnostic()?);
            }
        }
        OutputFormat::Tsv if table.is_empty() => {
            println!("No {} found.", noun);
            if !global.quiet {
                println!();
                println!("Create one with: {}", style(hint).yellow());
            }
        }
        _ => {
            print!("{}", table.render(format));
            if format == OutputFormat::Tsv && !global.quiet {
                println!();
                println!("{} {}(s) found.", style(table.len()).cyan(), noun);
            }
        }
    }
    Ok(())
}

/// Success line, suppressed by `--quiet`
pub fn success(global: &GlobalOpts, message: impl std::fmt::Display) {
    if !global.quiet {
        println!("{} {}", style("✓").green(), message);
    }
}

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Escape a string for CSV output
///
/// Handles commas, quotes, and newlines according to RFC 4180.
pub fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Case-insensitive substring match; an absent needle always matches
pub fn contains_ci(haystack: &str, needle: Option<&str>) -> bool {
    needle.map_or(true, |n| haystack.to_lowercase().contains(&n.to_lowercase()))
}
