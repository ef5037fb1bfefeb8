//! Project discovery and structure

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Represents a QMS project: a `.qms/` directory plus a local workbook
#[derive(Debug, Clone)]
pub struct Project {
    /// Root directory of the project (parent of .qms/)
    root: PathBuf,
}

impl Project {
    /// Find project root by walking up from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let current = std::env::current_dir().map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find project root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        loop {
            if current.join(".qms").is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(ProjectError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Create a new project structure at the given path
    pub fn init(path: &Path) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        if root.join(".qms").exists() {
            return Err(ProjectError::AlreadyExists(root.clone()));
        }

        Self::create_structure(root)
    }

    /// Force initialization even if .qms/ exists
    pub fn init_force(path: &Path) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        Self::create_structure(root)
    }

    fn create_structure(root: PathBuf) -> Result<Self, ProjectError> {
        let project = Self { root };

        std::fs::create_dir_all(project.qms_dir())
            .map_err(|e| ProjectError::IoError(e.to_string()))?;
        std::fs::create_dir_all(project.workbook_dir())
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        std::fs::write(project.config_path(), Self::default_config())
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        Ok(project)
    }

    fn default_config() -> &'static str {
        r#"# QMS Project Configuration

# Default reviewer/approver name (can be overridden by global config)
# author: ""

# Where register rows live: csv (workbook/ directory) or sheets
# backend: csv

# sheets:
#   spreadsheet_id: ""
#   api_key: ""
#   token_url: "http://localhost:3000/api/token"

# tabs:
#   risk: "Risk Register"
#   capa: "CAPA Register"
#   process: "Process Interaction Sheet"
#   records: "QMS Records"

# Fill frequencies in days ("When needed" is never due)
# frequencies:
#   Monthly: 30

# near_due_days: 7

# auth:
#   users_api: "http://localhost:3001"
#   users_file: ".qms/users.txt"
"#
    }

    /// Get the project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .qms configuration directory
    pub fn qms_dir(&self) -> PathBuf {
        self.root.join(".qms")
    }

    pub fn config_path(&self) -> PathBuf {
        self.qms_dir().join("config.yaml")
    }

    /// Directory holding one CSV file per register tab
    pub fn workbook_dir(&self) -> PathBuf {
        self.root.join("workbook")
    }
}

/// Errors that can occur during project operations
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("not a QMS project (searched from {searched_from:?}). Run 'qms init' to create one.")]
    NotFound { searched_from: PathBuf },

    #[error("QMS project already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),
}
