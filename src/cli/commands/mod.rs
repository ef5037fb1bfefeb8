//! CLI command implementations

pub mod capa;
pub mod completions;
pub mod init;
pub mod proc;
pub mod record;
pub mod risk;
pub mod status;
pub mod user;
