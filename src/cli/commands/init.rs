//! `qms init` command - Initialize a new QMS project

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::GlobalOpts;
use crate::core::entity::header_row;
use crate::core::project::{Project, ProjectError};
use crate::core::Config;
use crate::entities::{Capa, ProcessInteraction, QmsRecord, Risk};
use crate::sheets::CsvSheetStore;

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: std::path::PathBuf,

    /// Force initialization even if .qms/ already exists
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs, global: &GlobalOpts) -> Result<()> {
    let path = if args.path.as_os_str() == "." {
        std::env::current_dir().into_diagnostic()?
    } else {
        args.path.clone()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).into_diagnostic()?;
        if !global.quiet {
            println!(
                "{} Created directory {}",
                style("✓").green(),
                style(path.display()).cyan()
            );
        }
    }

    let project = if args.force {
        Project::init_force(&path)
    } else {
        Project::init(&path)
    };

    let project = match project {
        Ok(project) => project,
        Err(ProjectError::AlreadyExists(path)) => {
            println!(
                "{} QMS project already exists at {}",
                style("!").yellow(),
                style(path.display()).cyan()
            );
            println!();
            println!("Use {} to reinitialize", style("qms init --force").yellow());
            return Ok(());
        }
        Err(e) => return Err(miette::miette!("{}", e)),
    };

    let config = Config::load_for(Some(&project));
    let store = CsvSheetStore::new(project.workbook_dir());
    let tabs = [
        (config.risk_tab(), header_row::<Risk>()),
        (config.capa_tab(), header_row::<Capa>()),
        (config.process_tab(), header_row::<ProcessInteraction>()),
        (config.records_tab(), header_row::<QmsRecord>()),
    ];

    let mut created = Vec::new();
    for (tab, header) in &tabs {
        if store.create_tab(tab, header).into_diagnostic()? {
            created.push(store.tab_path(tab));
        }
    }

    if global.quiet {
        return Ok(());
    }

    println!(
        "{} Initialized QMS project at {}",
        style("✓").green(),
        style(project.root().display()).cyan()
    );
    println!();
    println!("Created project structure:");
    println!("  {}", style(".qms/config.yaml").dim());
    for path in &created {
        let relative = path.strip_prefix(project.root()).unwrap_or(path);
        println!("  {}", style(relative.display()).dim());
    }
    println!();
    println!("Next steps:");
    println!("  {} Add your first risk", style("qms risk new").yellow());
    println!("  {} Register a form template", style("qms record new").yellow());
    println!("  {} See the dashboard", style("qms status").yellow());
    Ok(())
}
