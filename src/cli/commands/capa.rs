//! `qms capa` command - Corrective/preventive action register

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{contains_ci, print_item, print_list, success, Context};
use crate::cli::table::Table;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::validate::require_enum;
use crate::core::workflow::parse_status;
use crate::entities::capa::{Capa, CapaStatus, CapaType, CapaUpdate, NewCapa};
use crate::register::{today, CapaRegister};
use crate::sheets::SheetStore;

#[derive(Subcommand, Debug)]
pub enum CapaCommands {
    /// List CAPAs with filtering
    List(ListArgs),

    /// Raise a new CAPA
    New(NewArgs),

    /// Show a CAPA's details
    Show(ShowArgs),

    /// Update fields or move a CAPA through its workflow
    Update(UpdateArgs),

    /// Register statistics
    Stats,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Filter by status (open, in progress, under verification, closed)
    #[arg(long, short = 's')]
    pub status: Option<String>,

    /// Filter by type (corrective, preventive)
    #[arg(long, short = 't')]
    pub r#type: Option<String>,

    /// Only CAPAs past their target date and not closed
    #[arg(long)]
    pub overdue: bool,

    /// Filter by responsible person (substring)
    #[arg(long, short = 'r')]
    pub responsible: Option<String>,

    /// Limit output to N items
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Show count only, not the items
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Corrective or Preventive
    #[arg(long, short = 't', default_value = "Corrective")]
    pub r#type: String,

    /// Root cause analysis
    #[arg(long)]
    pub root_cause: String,

    /// Target completion date (YYYY-MM-DD)
    #[arg(long)]
    pub target_date: String,

    /// Source of the CAPA (audit, complaint, NC...)
    #[arg(long, default_value = "")]
    pub source: String,

    #[arg(long, default_value = "")]
    pub description: String,

    /// External reference (NC number, audit finding...)
    #[arg(long, default_value = "")]
    pub reference: String,

    #[arg(long, default_value = "")]
    pub corrective_action: String,

    #[arg(long, default_value = "")]
    pub preventive_action: String,

    /// Responsible person
    #[arg(long, short = 'r', default_value = "")]
    pub responsible: String,

    /// Related risk ID
    #[arg(long, default_value = "")]
    pub risk: String,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// CAPA ID (e.g. CAPA-25-001)
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct UpdateArgs {
    /// CAPA ID (e.g. CAPA-25-001)
    pub id: String,

    /// New status
    #[arg(long, short = 's')]
    pub status: Option<String>,

    #[arg(long, short = 't')]
    pub r#type: Option<String>,

    #[arg(long)]
    pub source: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub reference: Option<String>,

    #[arg(long)]
    pub root_cause: Option<String>,

    #[arg(long)]
    pub corrective_action: Option<String>,

    #[arg(long)]
    pub preventive_action: Option<String>,

    #[arg(long, short = 'r')]
    pub responsible: Option<String>,

    #[arg(long)]
    pub target_date: Option<String>,

    #[arg(long)]
    pub effectiveness_check: Option<String>,

    #[arg(long)]
    pub effectiveness_review_date: Option<String>,

    /// Name of the person approving closure
    #[arg(long)]
    pub closure_approval: Option<String>,

    /// Related risk ID
    #[arg(long)]
    pub risk: Option<String>,
}

type Register = CapaRegister<Box<dyn SheetStore>>;

pub fn run(cmd: CapaCommands, global: &GlobalOpts) -> Result<()> {
    let ctx = Context::load(global)?;
    let mut register = CapaRegister::new(ctx.store()?, ctx.config.capa_tab());

    match cmd {
        CapaCommands::List(args) => run_list(&mut register, args, global),
        CapaCommands::New(args) => run_new(&mut register, args, global),
        CapaCommands::Show(args) => print_item(&register.get(&args.id)?, global.format),
        CapaCommands::Update(args) => run_update(&mut register, args, global),
        CapaCommands::Stats => {
            let stats = register.stats()?;
            if global.format.or(OutputFormat::Tsv) == OutputFormat::Tsv {
                println!("{}", style("CAPA Register").bold());
                println!("  Total:               {}", stats.total);
                println!("  Open:                {}", stats.open);
                println!("  In progress:         {}", stats.in_progress);
                println!("  Under verification:  {}", stats.under_verification);
                println!("  Closed:              {}", stats.closed);
                println!("  Corrective:          {}", stats.corrective);
                println!("  Preventive:          {}", stats.preventive);
                println!("  Overdue:             {}", style(stats.overdue).red());
                println!("  Closure rate:        {}%", stats.closure_rate);
                Ok(())
            } else {
                print_item(&stats, global.format)
            }
        }
    }
}

fn run_list(register: &mut Register, args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let status = match args.status {
        Some(ref raw) => Some(parse_status::<CapaStatus>(raw)?),
        None => None,
    };
    let capa_type = match args.r#type {
        Some(ref raw) => Some(require_enum::<CapaType>("type", raw)?),
        None => None,
    };
    let today = today();

    let mut capas: Vec<Capa> = register.list()?;
    capas.retain(|c| {
        status.map_or(true, |s| c.status == s)
            && capa_type.map_or(true, |t| c.capa_type == t)
            && (!args.overdue || c.is_overdue(today))
            && contains_ci(&c.responsible, args.responsible.as_deref())
    });
    if let Some(limit) = args.limit {
        capas.truncate(limit);
    }
    if args.count {
        println!("{}", capas.len());
        return Ok(());
    }

    let mut table = Table::new(&["id", "type", "source", "status", "responsible", "target", "overdue"]);
    for c in &capas {
        table.push(vec![
            c.id.clone(),
            c.capa_type.to_string(),
            c.source.clone(),
            c.status.to_string(),
            c.responsible.clone(),
            c.target_date.clone(),
            if c.is_overdue(today) { "yes" } else { "" }.to_string(),
        ]);
    }
    print_list(&capas, &table, global, "CAPA", "qms capa new")
}

fn run_new(register: &mut Register, args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let capa = register.add(NewCapa {
        source: args.source,
        capa_type: args.r#type,
        description: args.description,
        reference: args.reference,
        root_cause: args.root_cause,
        corrective_action: args.corrective_action,
        preventive_action: args.preventive_action,
        responsible: args.responsible,
        target_date: args.target_date,
        related_risk: args.risk,
    })?;

    if global.format == OutputFormat::Id {
        println!("{}", capa.id);
        return Ok(());
    }
    success(
        global,
        format!(
            "Created {} CAPA {} due {}",
            capa.capa_type,
            style(&capa.id).cyan(),
            capa.target_date
        ),
    );
    Ok(())
}

fn run_update(register: &mut Register, args: UpdateArgs, global: &GlobalOpts) -> Result<()> {
    let capa = register.update(
        &args.id,
        CapaUpdate {
            source: args.source,
            capa_type: args.r#type,
            description: args.description,
            reference: args.reference,
            root_cause: args.root_cause,
            corrective_action: args.corrective_action,
            preventive_action: args.preventive_action,
            responsible: args.responsible,
            target_date: args.target_date,
            status: args.status,
            effectiveness_check: args.effectiveness_check,
            effectiveness_review_date: args.effectiveness_review_date,
            closure_approval: args.closure_approval,
            related_risk: args.risk,
        },
    )?;

    success(
        global,
        format!("Updated CAPA {} [{}]", style(&capa.id).cyan(), capa.status),
    );
    Ok(())
}
