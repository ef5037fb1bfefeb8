//! Configuration management with layered hierarchy

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::derived::{FrequencyTable, IntervalError, DEFAULT_NEAR_DUE_DAYS, MAX_INTERVAL_DAYS};
use crate::core::Project;

/// Default spreadsheet values API base URL
pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Where register rows live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// One CSV file per tab under the project workbook directory
    #[default]
    Csv,
    /// Remote spreadsheet values API
    Sheets,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Csv => write!(f, "csv"),
            Backend::Sheets => write!(f, "sheets"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Backend::Csv),
            "sheets" => Ok(Backend::Sheets),
            _ => Err(format!("Unknown backend: {}. Use 'csv' or 'sheets'", s)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    pub spreadsheet_id: Option<String>,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    /// OAuth proxy endpoint that hands out access tokens
    pub token_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TabsConfig {
    pub risk: Option<String>,
    pub capa: Option<String>,
    pub process: Option<String>,
    pub records: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub users_api: Option<String>,
    pub users_file: Option<PathBuf>,
}

/// Configured values the registers cannot work with
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid frequencies: {0}")]
    Frequency(#[from] IntervalError),

    #[error("invalid near_due_days: must be between 0 and {max} (got {0})", max = MAX_INTERVAL_DAYS)]
    NearDueDays(i64),
}

/// QMS configuration with layered hierarchy
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default reviewer/approver name
    pub author: Option<String>,

    pub backend: Option<Backend>,

    pub sheets: SheetsConfig,

    pub tabs: TabsConfig,

    /// Frequency label → interval in days
    pub frequencies: Option<BTreeMap<String, i64>>,

    /// Days ahead of the due date at which a form counts as near due
    pub near_due_days: Option<i64>,

    pub auth: AuthConfig,
}

impl Config {
    /// Load configuration from all sources, discovering the project from cwd
    pub fn load() -> Self {
        let project = Project::discover().ok();
        Self::load_for(project.as_ref())
    }

    /// Load configuration from all sources, merging in priority order
    pub fn load_for(project: Option<&Project>) -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (already in Default impl)

        // 2. Global user config (~/.config/qms/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global) = Self::read_file(&global_path) {
                config.merge(global);
            }
        }

        // 3. Project config (.qms/config.yaml)
        if let Some(project) = project {
            if let Some(project_config) = Self::read_file(&project.config_path()) {
                config.merge(project_config);
            }
        }

        // 4. Environment variables
        config.apply_env(|name| std::env::var(name).ok());

        config
    }

    fn read_file(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = std::fs::read_to_string(path).ok()?;
        if contents
            .lines()
            .all(|line| line.trim().is_empty() || line.trim_start().starts_with('#'))
        {
            return None;
        }
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config");
                None
            }
        }
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "qms")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Apply `QMS_*` overrides read through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(author) = lookup("QMS_AUTHOR") {
            self.author = Some(author);
        }
        if let Some(backend) = lookup("QMS_BACKEND") {
            match backend.parse() {
                Ok(backend) => self.backend = Some(backend),
                Err(e) => tracing::warn!("QMS_BACKEND ignored: {}", e),
            }
        }
        if let Some(id) = lookup("QMS_SPREADSHEET_ID") {
            self.sheets.spreadsheet_id = Some(id);
        }
        if let Some(key) = lookup("QMS_API_KEY") {
            self.sheets.api_key = Some(key);
        }
        if let Some(url) = lookup("QMS_TOKEN_URL") {
            self.sheets.token_url = Some(url);
        }
        if let Some(url) = lookup("QMS_USERS_API") {
            self.auth.users_api = Some(url);
        }
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.author.is_some() {
            self.author = other.author;
        }
        if other.backend.is_some() {
            self.backend = other.backend;
        }

        let sheets = other.sheets;
        if sheets.spreadsheet_id.is_some() {
            self.sheets.spreadsheet_id = sheets.spreadsheet_id;
        }
        if sheets.api_key.is_some() {
            self.sheets.api_key = sheets.api_key;
        }
        if sheets.api_base.is_some() {
            self.sheets.api_base = sheets.api_base;
        }
        if sheets.token_url.is_some() {
            self.sheets.token_url = sheets.token_url;
        }

        let tabs = other.tabs;
        if tabs.risk.is_some() {
            self.tabs.risk = tabs.risk;
        }
        if tabs.capa.is_some() {
            self.tabs.capa = tabs.capa;
        }
        if tabs.process.is_some() {
            self.tabs.process = tabs.process;
        }
        if tabs.records.is_some() {
            self.tabs.records = tabs.records;
        }

        if let Some(frequencies) = other.frequencies {
            self.frequencies
                .get_or_insert_with(BTreeMap::new)
                .extend(frequencies);
        }
        if other.near_due_days.is_some() {
            self.near_due_days = other.near_due_days;
        }

        if other.auth.users_api.is_some() {
            self.auth.users_api = other.auth.users_api;
        }
        if other.auth.users_file.is_some() {
            self.auth.users_file = other.auth.users_file;
        }
    }

    /// Get the author name, falling back to the login name
    pub fn author(&self) -> String {
        if let Some(ref author) = self.author {
            return author.clone();
        }

        std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string())
    }

    pub fn backend(&self) -> Backend {
        self.backend.unwrap_or_default()
    }

    pub fn api_base(&self) -> &str {
        self.sheets.api_base.as_deref().unwrap_or(DEFAULT_API_BASE)
    }

    pub fn risk_tab(&self) -> &str {
        self.tabs.risk.as_deref().unwrap_or("Risk Register")
    }

    pub fn capa_tab(&self) -> &str {
        self.tabs.capa.as_deref().unwrap_or("CAPA Register")
    }

    pub fn process_tab(&self) -> &str {
        self.tabs.process.as_deref().unwrap_or("Process Interaction Sheet")
    }

    pub fn records_tab(&self) -> &str {
        self.tabs.records.as_deref().unwrap_or("QMS Records")
    }

    /// Built-in frequency table with configured labels layered on top
    pub fn frequency_table(&self) -> Result<FrequencyTable, ConfigError> {
        let mut table = FrequencyTable::default();
        if let Some(ref overrides) = self.frequencies {
            for (label, days) in overrides {
                table.set(label.clone(), *days)?;
            }
        }
        Ok(table)
    }

    /// Check the values that feed date arithmetic
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.frequency_table()?;
        let near = self.near_due_days();
        if !(0..=MAX_INTERVAL_DAYS).contains(&near) {
            return Err(ConfigError::NearDueDays(near));
        }
        Ok(())
    }

    pub fn near_due_days(&self) -> i64 {
        self.near_due_days.unwrap_or(DEFAULT_NEAR_DUE_DAYS)
    }

    /// Local user file, resolved against the project root when relative
    pub fn users_file(&self, project: &Project) -> PathBuf {
        match self.auth.users_file {
            Some(ref path) if path.is_absolute() => path.clone(),
            Some(ref path) => project.root().join(path),
            None => project.qms_dir().join("users.txt"),
        }
    }
}
