//! `qms risk` command - Risk register

use clap::{Subcommand, ValueEnum};
use console::style;
use miette::Result;

use crate::cli::helpers::{contains_ci, print_item, print_list, success, Context};
use crate::cli::table::Table;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::derived::RiskLevel;
use crate::core::workflow::parse_status;
use crate::entities::risk::{NewRisk, Risk, RiskStatus, RiskUpdate};
use crate::register::RiskRegister;

#[derive(Subcommand, Debug)]
pub enum RiskCommands {
    /// List risks with filtering
    List(ListArgs),

    /// Add a risk to the register
    New(NewArgs),

    /// Show a risk's details
    Show(ShowArgs),

    /// Update fields or status of a risk
    Update(UpdateArgs),

    /// Register statistics
    Stats,
}

/// Risk level filter
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LevelFilter {
    Low,
    Medium,
    High,
    Critical,
    /// High and critical only
    Urgent,
    All,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Filter by status (open, under review, controlled, closed)
    #[arg(long, short = 's')]
    pub status: Option<String>,

    /// Filter by risk level
    #[arg(long, short = 'l', default_value = "all")]
    pub level: LevelFilter,

    /// Filter by process/department (substring)
    #[arg(long, short = 'd')]
    pub department: Option<String>,

    /// Search in description and cause (case-insensitive substring)
    #[arg(long)]
    pub search: Option<String>,

    /// Sort by score (highest first)
    #[arg(long)]
    pub by_score: bool,

    /// Limit output to N items
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Show count only, not the items
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Risk description
    #[arg(long)]
    pub description: String,

    /// Process or department
    #[arg(long, short = 'd', default_value = "")]
    pub department: String,

    /// Cause
    #[arg(long, default_value = "")]
    pub cause: String,

    /// Likelihood rating (1-5)
    #[arg(long, short = 'L')]
    pub likelihood: i64,

    /// Impact rating (1-5)
    #[arg(long, short = 'I')]
    pub impact: i64,

    /// Action/control
    #[arg(long, default_value = "")]
    pub action: String,

    /// Owner
    #[arg(long, default_value = "")]
    pub owner: String,

    /// Review date
    #[arg(long, default_value = "")]
    pub review_date: String,

    /// Linked CAPA ID
    #[arg(long, default_value = "")]
    pub capa: String,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Risk ID (e.g. RISK-25-001)
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct UpdateArgs {
    /// Risk ID (e.g. RISK-25-001)
    pub id: String,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long, short = 'd')]
    pub department: Option<String>,

    #[arg(long)]
    pub cause: Option<String>,

    #[arg(long, short = 'L')]
    pub likelihood: Option<i64>,

    #[arg(long, short = 'I')]
    pub impact: Option<i64>,

    #[arg(long)]
    pub action: Option<String>,

    #[arg(long)]
    pub owner: Option<String>,

    /// New status
    #[arg(long, short = 's')]
    pub status: Option<String>,

    #[arg(long)]
    pub review_date: Option<String>,

    /// Linked CAPA ID
    #[arg(long)]
    pub capa: Option<String>,
}

pub fn run(cmd: RiskCommands, global: &GlobalOpts) -> Result<()> {
    let ctx = Context::load(global)?;
    let mut register = RiskRegister::new(ctx.store()?, ctx.config.risk_tab());

    match cmd {
        RiskCommands::List(args) => run_list(&mut register, args, global),
        RiskCommands::New(args) => run_new(&mut register, args, global),
        RiskCommands::Show(args) => {
            let risk = register.get(&args.id)?;
            print_item(&risk.report(), global.format)
        }
        RiskCommands::Update(args) => run_update(&mut register, args, global),
        RiskCommands::Stats => {
            let stats = register.stats()?;
            if global.format.or(OutputFormat::Tsv) == OutputFormat::Tsv {
                println!("{}", style("Risk Register").bold());
                println!("  Total:          {}", stats.total);
                println!("  Open:           {}", stats.open);
                println!("  Under review:   {}", stats.under_review);
                println!("  Controlled:     {}", stats.controlled);
                println!("  Closed:         {}", stats.closed);
                println!("  High (≥15):     {}", style(stats.high).red());
                println!("  Medium (8-14):  {}", style(stats.medium).yellow());
                println!("  Low (<8):       {}", stats.low);
                println!("  Average score:  {:.1}", stats.average_score);
                Ok(())
            } else {
                print_item(&stats, global.format)
            }
        }
    }
}

type Register = RiskRegister<Box<dyn crate::sheets::SheetStore>>;

fn level_matches(filter: LevelFilter, level: RiskLevel) -> bool {
    match filter {
        LevelFilter::All => true,
        LevelFilter::Urgent => matches!(level, RiskLevel::High | RiskLevel::Critical),
        LevelFilter::Low => level == RiskLevel::Low,
        LevelFilter::Medium => level == RiskLevel::Medium,
        LevelFilter::High => level == RiskLevel::High,
        LevelFilter::Critical => level == RiskLevel::Critical,
    }
}

fn run_list(register: &mut Register, args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let status = match args.status {
        Some(ref raw) => Some(parse_status::<RiskStatus>(raw)?),
        None => None,
    };

    let mut risks: Vec<Risk> = register.list()?;
    risks.retain(|r| {
        status.map_or(true, |s| r.status == s)
            && level_matches(args.level, r.level())
            && contains_ci(&r.department, args.department.as_deref())
            && (contains_ci(&r.description, args.search.as_deref())
                || contains_ci(&r.cause, args.search.as_deref()))
    });

    if args.by_score {
        risks.sort_by(|a, b| b.score().cmp(&a.score()));
    }
    if let Some(limit) = args.limit {
        risks.truncate(limit);
    }
    if args.count {
        println!("{}", risks.len());
        return Ok(());
    }

    let mut table = Table::new(&["id", "department", "description", "score", "level", "status", "owner"]);
    for r in &risks {
        table.push(vec![
            r.id.clone(),
            r.department.clone(),
            r.description.clone(),
            r.score().to_string(),
            r.level().to_string(),
            r.status.to_string(),
            r.owner.clone(),
        ]);
    }
    let reports: Vec<_> = risks.iter().map(Risk::report).collect();
    print_list(&reports, &table, global, "risk", "qms risk new")
}

fn run_new(register: &mut Register, args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let risk = register.add(NewRisk {
        department: args.department,
        description: args.description,
        cause: args.cause,
        likelihood: args.likelihood,
        impact: args.impact,
        action: args.action,
        owner: args.owner,
        review_date: args.review_date,
        linked_capa: args.capa,
    })?;

    if global.format == OutputFormat::Id {
        println!("{}", risk.id);
        return Ok(());
    }
    success(global, format!("Created risk {}", style(&risk.id).cyan()));
    if !global.quiet {
        println!("   Score: {} ({})", style(risk.score()).yellow(), risk.level());
    }
    Ok(())
}

fn run_update(register: &mut Register, args: UpdateArgs, global: &GlobalOpts) -> Result<()> {
    let risk = register.update(
        &args.id,
        RiskUpdate {
            department: args.department,
            description: args.description,
            cause: args.cause,
            likelihood: args.likelihood,
            impact: args.impact,
            action: args.action,
            owner: args.owner,
            status: args.status,
            review_date: args.review_date,
            linked_capa: args.capa,
        },
    )?;

    success(
        global,
        format!(
            "Updated risk {} [{}] score {} ({})",
            style(&risk.id).cyan(),
            risk.status,
            risk.score(),
            risk.level()
        ),
    );
    Ok(())
}
