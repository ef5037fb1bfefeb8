//! `qms status` command - Dashboard across all registers

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::cli::helpers::Context;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::derived::DueState;
use crate::entities::capa::CapaStats;
use crate::entities::process::ProcessStats;
use crate::entities::record::{AuditSummary, ReviewStats};
use crate::entities::risk::RiskStats;
use crate::register::{CapaRegister, ProcessRegister, RecordRegister, RiskRegister};

#[derive(clap::Args, Debug)]
pub struct StatusArgs {
    /// Show only one section (risks, capas, processes, records)
    #[arg(long)]
    pub section: Option<String>,
}

#[derive(Serialize)]
struct RecordMetrics {
    review: ReviewStats,
    audit: AuditSummary,
    overdue: usize,
    due_soon: usize,
}

#[derive(Serialize)]
struct Dashboard {
    risks: RiskStats,
    capas: CapaStats,
    processes: ProcessStats,
    records: RecordMetrics,
}

fn collect(ctx: &Context) -> Result<Dashboard> {
    let config = &ctx.config;
    let risks = RiskRegister::new(ctx.store()?, config.risk_tab()).stats()?;
    let capas = CapaRegister::new(ctx.store()?, config.capa_tab()).stats()?;
    let processes = ProcessRegister::new(ctx.store()?, config.process_tab()).stats()?;

    let mut records = RecordRegister::new(ctx.store()?, config.records_tab())
        .with_frequencies(config.frequency_table().into_diagnostic()?, config.near_due_days());
    let due = records.due_report()?;
    let records = RecordMetrics {
        review: records.review_stats()?,
        audit: records.audit_summary()?,
        overdue: due.iter().filter(|e| e.due.state == DueState::Overdue).count(),
        due_soon: due.iter().filter(|e| e.due.state == DueState::NearDue).count(),
    };

    Ok(Dashboard {
        risks,
        capas,
        processes,
        records,
    })
}

pub fn run(args: StatusArgs, global: &GlobalOpts) -> Result<()> {
    let ctx = Context::load(global)?;
    let dashboard = collect(&ctx)?;

    match global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&dashboard).into_diagnostic()?);
            return Ok(());
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(&dashboard).into_diagnostic()?);
            return Ok(());
        }
        _ => {}
    }

    let width = 60;
    let show = |name: &str| {
        args.section
            .as_deref()
            .map_or(true, |s| s.eq_ignore_ascii_case(name))
    };

    println!("{}", style("QMS Status").bold().underlined());
    println!("{}", "═".repeat(width));

    if show("risks") {
        let r = &dashboard.risks;
        section("RISKS");
        line("Total", r.total.to_string());
        line("Open / under review", format!("{} / {}", r.open, r.under_review));
        line("High (≥15)", style(r.high).red().to_string());
        line("Average score", format!("{:.1}", r.average_score));
    }

    if show("capas") {
        let c = &dashboard.capas;
        section("CAPAS");
        line("Total", c.total.to_string());
        line(
            "Open / in progress / verifying",
            format!("{} / {} / {}", c.open, c.in_progress, c.under_verification),
        );
        line("Overdue", style(c.overdue).red().to_string());
        line("Closure rate", format!("{}%", c.closure_rate));
    }

    if show("processes") {
        let p = &dashboard.processes;
        section("PROCESSES");
        line("Total", p.total.to_string());
        line("KPI coverage", format!("{}%", p.kpi_coverage));
        line("Record references", p.record_references.to_string());
    }

    if show("records") {
        let m = &dashboard.records;
        section("RECORDS");
        line("Total", m.audit.total.to_string());
        line("Compliant", style(m.audit.compliant).green().to_string());
        line("Pending", m.audit.pending.to_string());
        line("Issues", style(m.audit.issues).red().to_string());
        line("Overdue fills", style(m.overdue).red().to_string());
        line("Due soon", style(m.due_soon).yellow().to_string());
        line("Compliance rate", format!("{}%", m.audit.compliance_rate));
    }

    println!();
    println!("{}", "═".repeat(width));
    let health = health(&dashboard);
    let health_style = match health {
        "Healthy" => style(health).green().bold(),
        "Warning" => style(health).yellow().bold(),
        _ => style(health).red().bold(),
    };
    println!("Audit Readiness: {}", health_style);
    Ok(())
}

fn section(title: &str) {
    println!();
    println!("{}", style(title).bold().cyan());
}

fn line(label: &str, value: String) {
    println!("  {:<32} {}", label, value);
}

/// Critical on overdue CAPAs or rejected records, warning on overdue fills
/// or high risks
fn health(d: &Dashboard) -> &'static str {
    if d.capas.overdue > 0 || d.records.audit.issues > 0 {
        "Critical"
    } else if d.records.overdue > 0 || d.risks.high > 0 {
        "Warning"
    } else {
        "Healthy"
    }
}
