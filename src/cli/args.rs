//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    capa::CapaCommands, completions::CompletionsArgs, init::InitArgs, proc::ProcCommands,
    record::RecordCommands, risk::RiskCommands, status::StatusArgs, user::UserCommands,
};

#[derive(Parser)]
#[command(name = "qms")]
#[command(author, version, about = "QMS register toolkit")]
#[command(long_about = "Keep risk, CAPA, process interaction and QMS record registers in spreadsheet tabs, with validated status workflows and derived fields.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Project root (default: auto-detect by finding .qms/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new QMS project with an empty CSV workbook
    Init(InitArgs),

    /// Risk register
    #[command(subcommand)]
    Risk(RiskCommands),

    /// Corrective/preventive action register
    #[command(subcommand)]
    Capa(CapaCommands),

    /// Process interaction register
    #[command(subcommand)]
    Proc(ProcCommands),

    /// QMS records: form templates, fills and reviews
    #[command(subcommand)]
    Record(RecordCommands),

    /// Show a dashboard across all registers
    Status(StatusArgs),

    /// User accounts
    #[command(subcommand)]
    User(UserCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Automatically detect based on context (yaml for show, tsv for list)
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// Tab-separated values (for piping)
    Tsv,
    /// JSON format (for programming)
    Json,
    /// CSV format (for spreadsheets)
    Csv,
    /// Markdown tables
    Md,
    /// Just keys, one per line
    Id,
}

impl OutputFormat {
    /// Resolve `Auto` to a concrete format
    pub fn or(self, fallback: OutputFormat) -> OutputFormat {
        match self {
            OutputFormat::Auto => fallback,
            f => f,
        }
    }
}
