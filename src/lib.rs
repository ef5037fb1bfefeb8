//! QMS: quality management registers kept in a spreadsheet
//!
//! Risk, CAPA, process interaction and record review registers. Every
//! register reads the whole tab, validates a change against its workflow
//! rules, and writes back exactly one full row.

pub mod auth;
pub mod cli;
pub mod core;
pub mod entities;
pub mod register;
pub mod sheets;
