use clap::Parser;
use miette::Result;
use qms::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Reset SIGPIPE so piping into `head` exits quietly instead of panicking
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;

    let default_filter = if global.verbose { "qms=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init(args) => qms::cli::commands::init::run(args, &global),
        Commands::Risk(cmd) => qms::cli::commands::risk::run(cmd, &global),
        Commands::Capa(cmd) => qms::cli::commands::capa::run(cmd, &global),
        Commands::Proc(cmd) => qms::cli::commands::proc::run(cmd, &global),
        Commands::Record(cmd) => qms::cli::commands::record::run(cmd, &global),
        Commands::Status(args) => qms::cli::commands::status::run(args, &global),
        Commands::User(cmd) => qms::cli::commands::user::run(cmd, &global),
        Commands::Completions(args) => qms::cli::commands::completions::run(args),
    }
}
