//! Core module - fundamental types and utilities

pub mod cache;
pub mod config;
pub mod derived;
pub mod entity;
pub mod error;
pub mod identity;
pub mod project;
pub mod validate;
pub mod workflow;

pub use cache::TtlCache;
pub use config::Config;
pub use entity::{Located, SheetRecord};
pub use error::{RegisterError, Result};
pub use identity::{BusinessKey, KeyParseError, KeyPrefix};
pub use project::{Project, ProjectError};
pub use workflow::WorkflowStatus;
