//! Register error taxonomy
//!
//! Every validation failure is raised before the spreadsheet is touched, so
//! any variant other than [`RegisterError::Remote`] guarantees that nothing
//! was written.

use miette::Diagnostic;
use thiserror::Error;

use crate::sheets::SheetError;

/// Errors returned by register operations
#[derive(Debug, Error, Diagnostic)]
pub enum RegisterError {
    #[error("{entity} '{key}' not found")]
    #[diagnostic(
        code(qms::not_found),
        help("Keys are matched exactly; run the matching `list` command to see them")
    )]
    NotFound { entity: &'static str, key: String },

    #[error("Invalid {field}: {message}")]
    #[diagnostic(code(qms::invalid_value))]
    InvalidValue { field: &'static str, message: String },

    #[error("Invalid status transition: {from} → {to}")]
    #[diagnostic(code(qms::invalid_transition))]
    InvalidTransition { from: String, to: String },

    #[error("{message}")]
    #[diagnostic(
        code(qms::precondition_failed),
        help("Record the effectiveness check and closure approval first")
    )]
    PreconditionFailed { message: String },

    #[error("{entity} '{key}' already exists")]
    #[diagnostic(code(qms::duplicate_key))]
    DuplicateKey { entity: &'static str, key: String },

    #[error(transparent)]
    #[diagnostic(code(qms::remote))]
    Remote(#[from] SheetError),
}

impl RegisterError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        RegisterError::InvalidValue {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        RegisterError::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// True when the error was raised before any write was attempted
    pub fn is_validation(&self) -> bool {
        !matches!(self, RegisterError::Remote(_))
    }
}

pub type Result<T> = std::result::Result<T, RegisterError>;
