//! `qms proc` command - Process interaction register

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{contains_ci, print_item, print_list, success, Context};
use crate::cli::table::Table;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::entities::process::{NewProcess, ProcessInteraction, ProcessUpdate};
use crate::register::ProcessRegister;
use crate::sheets::SheetStore;

#[derive(Subcommand, Debug)]
pub enum ProcCommands {
    /// List processes
    List(ListArgs),

    /// Add a process
    New(NewArgs),

    /// Show a process's details
    Show(ShowArgs),

    /// Update a process
    Update(UpdateArgs),

    /// Register statistics
    Stats,

    /// Show process → receiver hand-offs
    Flow,

    /// Show processes that depend on a process's output
    Deps(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Filter by owner (substring)
    #[arg(long, short = 'o')]
    pub owner: Option<String>,

    /// Only processes without a KPI
    #[arg(long)]
    pub no_kpi: bool,

    /// Show count only, not the items
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Process name
    pub name: String,

    /// Process owner
    #[arg(long, short = 'o')]
    pub owner: String,

    /// Outputs (mention record codes like F/12 to link forms)
    #[arg(long)]
    pub outputs: String,

    /// Process receiving the outputs
    #[arg(long)]
    pub receiver: String,

    /// Key performance indicator
    #[arg(long)]
    pub kpi: String,

    #[arg(long, default_value = "")]
    pub inputs: String,

    /// Main activities
    #[arg(long, default_value = "")]
    pub activities: String,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Process name (exact)
    pub name: String,
}

#[derive(clap::Args, Debug)]
pub struct UpdateArgs {
    /// Process name (exact)
    pub name: String,

    #[arg(long, short = 'o')]
    pub owner: Option<String>,

    #[arg(long)]
    pub inputs: Option<String>,

    #[arg(long)]
    pub activities: Option<String>,

    #[arg(long)]
    pub outputs: Option<String>,

    #[arg(long)]
    pub receiver: Option<String>,

    #[arg(long)]
    pub kpi: Option<String>,
}

type Register = ProcessRegister<Box<dyn SheetStore>>;

pub fn run(cmd: ProcCommands, global: &GlobalOpts) -> Result<()> {
    let ctx = Context::load(global)?;
    let mut register = ProcessRegister::new(ctx.store()?, ctx.config.process_tab());

    match cmd {
        ProcCommands::List(args) => run_list(&mut register, args, global),
        ProcCommands::New(args) => {
            let process = register.add(NewProcess {
                name: args.name,
                owner: args.owner,
                inputs: args.inputs,
                activities: args.activities,
                outputs: args.outputs,
                receiver: args.receiver,
                kpi: args.kpi,
            })?;
            success(global, format!("Added process {}", style(&process.name).cyan()));
            Ok(())
        }
        ProcCommands::Show(args) => print_item(&register.get(&args.name)?, global.format),
        ProcCommands::Update(args) => {
            let process = register.update(
                &args.name,
                ProcessUpdate {
                    owner: args.owner,
                    inputs: args.inputs,
                    activities: args.activities,
                    outputs: args.outputs,
                    receiver: args.receiver,
                    kpi: args.kpi,
                },
            )?;
            success(global, format!("Updated process {}", style(&process.name).cyan()));
            Ok(())
        }
        ProcCommands::Stats => {
            let stats = register.stats()?;
            if global.format.or(OutputFormat::Tsv) == OutputFormat::Tsv {
                println!("{}", style("Process Interactions").bold());
                println!("  Total:              {}", stats.total);
                println!("  Unique owners:      {}", stats.unique_owners);
                println!("  With KPI:           {}", stats.with_kpi);
                println!("  KPI coverage:       {}%", stats.kpi_coverage);
                println!("  Record references:  {}", stats.record_references);
                println!("  Unique receivers:   {}", stats.unique_receivers);
                Ok(())
            } else {
                print_item(&stats, global.format)
            }
        }
        ProcCommands::Flow => {
            let edges = register.flow()?;
            let mut table = Table::new(&["from", "to"]);
            for edge in &edges {
                table.push(vec![edge.from.clone(), edge.to.clone()]);
            }
            print_list(&edges, &table, global, "hand-off", "qms proc new")
        }
        ProcCommands::Deps(args) => {
            let deps = register.dependents(&args.name)?;
            print_list(&deps, &process_table(&deps), global, "dependent process", "qms proc update")
        }
    }
}

fn process_table(processes: &[ProcessInteraction]) -> Table {
    let mut table = Table::new(&["name", "owner", "receiver", "kpi", "records"]);
    for p in processes {
        table.push(vec![
            p.name.clone(),
            p.owner.clone(),
            p.receiver.clone(),
            p.kpi.clone(),
            p.record_codes().join(" "),
        ]);
    }
    table
}

fn run_list(register: &mut Register, args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let mut processes = register.list()?;
    processes.retain(|p| contains_ci(&p.owner, args.owner.as_deref()) && (!args.no_kpi || !p.has_kpi()));

    if args.count {
        println!("{}", processes.len());
        return Ok(());
    }
    print_list(&processes, &process_table(&processes), global, "process", "qms proc new")
}
