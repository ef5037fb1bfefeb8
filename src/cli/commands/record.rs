//! `qms record` command - Form templates, fills and reviews

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::cli::helpers::{contains_ci, print_item, print_list, success, Context};
use crate::cli::table::Table;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::derived::{DueState, DueStatus};
use crate::core::validate::require_date;
use crate::core::workflow::parse_status;
use crate::entities::record::{NewRecord, QmsRecord, ReviewStatus};
use crate::register::{BulkOutcome, RecordRegister};
use crate::sheets::SheetStore;

#[derive(Subcommand, Debug)]
pub enum RecordCommands {
    /// List form templates
    List(ListArgs),

    /// Register a new form template
    New(NewArgs),

    /// Show a record's details, reviews and due state
    Show(CodeArgs),

    /// Fill schedule: which forms are overdue or due soon
    Due(DueArgs),

    /// Review one filled file
    Review(ReviewArgs),

    /// Move a whole record through the review workflow
    Status(StatusArgs),

    /// Change how often a form must be filled
    Frequency(FrequencyArgs),

    /// Register a filled form
    Fill(FillArgs),

    /// Approve one or more records
    Approve(BulkArgs),

    /// Reject one or more records
    Reject(BulkArgs),

    /// Review statistics and audit readiness
    Stats,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Filter by category (substring)
    #[arg(long, short = 'c')]
    pub category: Option<String>,

    /// Filter by department (substring)
    #[arg(long, short = 'd')]
    pub department: Option<String>,

    /// Filter by review status (draft, pending_review, approved, rejected)
    #[arg(long, short = 's')]
    pub status: Option<String>,

    /// Show count only, not the items
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Record code (e.g. F/11)
    pub code: String,

    /// Record name
    #[arg(long)]
    pub name: String,

    /// When to fill: a configured frequency or "When needed"
    #[arg(long, default_value = "")]
    pub frequency: String,

    #[arg(long, short = 'c', default_value = "")]
    pub category: String,

    #[arg(long, default_value = "")]
    pub description: String,

    #[arg(long, short = 'd', default_value = "")]
    pub department: String,

    /// Link to the blank template
    #[arg(long, default_value = "")]
    pub template: String,

    /// Link to the folder holding filled forms
    #[arg(long, default_value = "")]
    pub folder: String,
}

#[derive(clap::Args, Debug)]
pub struct CodeArgs {
    /// Record code (e.g. F/11)
    pub code: String,
}

#[derive(clap::Args, Debug)]
pub struct DueArgs {
    /// Only overdue forms
    #[arg(long)]
    pub overdue: bool,

    /// Include forms exempt from due tracking
    #[arg(long)]
    pub all: bool,
}

#[derive(clap::Args, Debug)]
pub struct ReviewArgs {
    /// Record code
    pub code: String,

    /// File identifier (serial or file name)
    pub file: String,

    /// New status (draft, pending_review, approved, rejected)
    pub status: String,

    #[arg(long, short = 'm', default_value = "")]
    pub comment: String,

    /// Reviewer name (default: configured author)
    #[arg(long)]
    pub reviewer: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct StatusArgs {
    /// Record code
    pub code: String,

    /// New status (draft, pending_review, approved, rejected)
    pub status: String,

    /// Reviewer name (default: configured author)
    #[arg(long)]
    pub reviewer: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct FrequencyArgs {
    /// Record code
    pub code: String,

    /// Frequency label (e.g. Monthly, "When needed")
    pub frequency: String,
}

#[derive(clap::Args, Debug)]
pub struct FillArgs {
    /// Record code
    pub code: String,

    /// File identifier (default: the issued serial)
    #[arg(long)]
    pub file: Option<String>,

    /// Fill date (default: today)
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct BulkArgs {
    /// Record codes
    #[arg(required = true)]
    pub codes: Vec<String>,

    /// Reviewer name (default: configured author)
    #[arg(long)]
    pub reviewer: Option<String>,
}

/// A record with its derived review and due state
#[derive(Serialize)]
struct RecordReport<'a> {
    #[serde(flatten)]
    record: &'a QmsRecord,
    review_status: ReviewStatus,
    due: DueStatus,
}

type Register = RecordRegister<Box<dyn SheetStore>>;

pub fn run(cmd: RecordCommands, global: &GlobalOpts) -> Result<()> {
    let ctx = Context::load(global)?;
    let mut register = RecordRegister::new(ctx.store()?, ctx.config.records_tab())
        .with_frequencies(
            ctx.config.frequency_table().into_diagnostic()?,
            ctx.config.near_due_days(),
        );

    match cmd {
        RecordCommands::List(args) => run_list(&mut register, args, global),
        RecordCommands::New(args) => {
            let record = register.add(NewRecord {
                code: args.code,
                name: args.name,
                category: args.category,
                description: args.description,
                frequency: args.frequency,
                template_link: args.template,
                folder_link: args.folder,
                department: args.department,
            })?;
            success(
                global,
                format!(
                    "Registered {} {} (next serial {})",
                    style(&record.code).cyan(),
                    record.name,
                    record.next_serial
                ),
            );
            Ok(())
        }
        RecordCommands::Show(args) => {
            let entry = register
                .due_report()?
                .into_iter()
                .find(|e| e.record.code == args.code.trim())
                .ok_or_else(|| crate::core::RegisterError::not_found("Record", args.code.trim()))?;
            let report = RecordReport {
                record: &entry.record,
                review_status: entry.record.review_status(),
                due: entry.due,
            };
            print_item(&report, global.format)
        }
        RecordCommands::Due(args) => run_due(&mut register, args, global),
        RecordCommands::Review(args) => {
            let status = parse_status::<ReviewStatus>(&args.status)?;
            let reviewer = ctx.reviewer(args.reviewer);
            register.review_file(&args.code, &args.file, status, &args.comment, &reviewer)?;
            success(
                global,
                format!(
                    "{} {} marked {}",
                    style(&args.code).cyan(),
                    args.file,
                    status.audit_label()
                ),
            );
            Ok(())
        }
        RecordCommands::Status(args) => {
            let status = parse_status::<ReviewStatus>(&args.status)?;
            let reviewer = ctx.reviewer(args.reviewer);
            let record = register.set_record_status(&args.code, status, &reviewer)?;
            success(
                global,
                format!("{} is now {}", style(&record.code).cyan(), record.audit_status),
            );
            Ok(())
        }
        RecordCommands::Frequency(args) => {
            let record = register.set_frequency(&args.code, &args.frequency)?;
            success(
                global,
                format!("{} is filled {}", style(&record.code).cyan(), record.frequency),
            );
            Ok(())
        }
        RecordCommands::Fill(args) => {
            let date = match args.date {
                Some(ref raw) => Some(require_date("date", raw)?),
                None => None,
            };
            let record = register.register_fill(&args.code, args.file.as_deref(), date)?;
            success(
                global,
                format!(
                    "Registered fill {} of {} ({} on file)",
                    style(&record.last_serial).cyan(),
                    record.code,
                    record.record_count
                ),
            );
            Ok(())
        }
        RecordCommands::Approve(args) => {
            let reviewer = ctx.reviewer(args.reviewer);
            let outcomes = register.bulk_approve(&args.codes, &reviewer);
            report_bulk(&outcomes, "approved", global)
        }
        RecordCommands::Reject(args) => {
            let reviewer = ctx.reviewer(args.reviewer);
            let outcomes = register.bulk_reject(&args.codes, &reviewer);
            report_bulk(&outcomes, "rejected", global)
        }
        RecordCommands::Stats => {
            let stats = register.review_stats()?;
            let summary = register.audit_summary()?;
            if global.format.or(OutputFormat::Tsv) == OutputFormat::Tsv {
                println!("{}", style("QMS Records").bold());
                println!("  Total:            {}", stats.total);
                println!("  Draft:            {}", stats.draft);
                println!("  Pending review:   {}", stats.pending);
                println!("  Approved:         {}", style(stats.approved).green());
                println!("  Rejected:         {}", style(stats.rejected).red());
                println!("  Compliance rate:  {}%", summary.compliance_rate);
                Ok(())
            } else {
                print_item(
                    &serde_json::json!({ "review": stats, "audit": summary }),
                    global.format,
                )
            }
        }
    }
}

fn run_list(register: &mut Register, args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let status = match args.status {
        Some(ref raw) => Some(parse_status::<ReviewStatus>(raw)?),
        None => None,
    };

    let mut records = register.list()?;
    records.retain(|r| {
        status.map_or(true, |s| r.review_status() == s)
            && contains_ci(&r.category, args.category.as_deref())
            && contains_ci(&r.department, args.department.as_deref())
    });
    if args.count {
        println!("{}", records.len());
        return Ok(());
    }

    let mut table = Table::new(&["code", "name", "frequency", "last serial", "count", "status"]);
    for r in &records {
        table.push(vec![
            r.code.clone(),
            r.name.clone(),
            r.frequency.clone(),
            r.last_serial.clone(),
            r.record_count.to_string(),
            r.review_status().audit_label().to_string(),
        ]);
    }
    print_list(&records, &table, global, "record", "qms record new")
}

fn run_due(register: &mut Register, args: DueArgs, global: &GlobalOpts) -> Result<()> {
    let mut entries = register.due_report()?;
    entries.retain(|e| match e.due.state {
        DueState::Overdue => true,
        DueState::NearDue => !args.overdue,
        DueState::OnTrack => !args.overdue && args.all,
        DueState::Exempt => !args.overdue && args.all,
    });

    let mut table = Table::new(&["code", "name", "frequency", "last fill", "days left", "state"]);
    for e in &entries {
        let days = e
            .due
            .days_until_next_fill
            .map_or_else(|| "-".to_string(), |d| d.to_string());
        table.push(vec![
            e.record.code.clone(),
            e.record.name.clone(),
            e.record.frequency.clone(),
            e.record.last_file_date.clone(),
            days,
            e.due.state.to_string(),
        ]);
    }
    print_list(&entries, &table, global, "form due", "qms record fill")
}

fn report_bulk(outcomes: &[BulkOutcome], verb: &str, global: &GlobalOpts) -> Result<()> {
    let mut failed = 0;
    for outcome in outcomes {
        match outcome.result {
            Ok(_) => success(global, format!("{} {}", style(&outcome.code).cyan(), verb)),
            Err(ref e) => {
                failed += 1;
                eprintln!("{} {}: {}", style("✗").red(), outcome.code, e);
            }
        }
    }
    if failed > 0 {
        return Err(miette::miette!(
            "{} of {} record(s) were not {}",
            failed,
            outcomes.len(),
            verb
        ));
    }
    Ok(())
}
