//! `qms user` command - User accounts

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::auth::{AuthChain, FileUserStore, HttpUsersApi, NewUser};
use crate::cli::helpers::{print_list, success, Context};
use crate::cli::table::Table;
use crate::cli::GlobalOpts;

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// List user accounts
    List,

    /// Create a user account
    Add(AddArgs),

    /// Check a user's credentials
    Login(LoginArgs),
}

#[derive(clap::Args, Debug)]
pub struct AddArgs {
    /// Display name
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub email: String,

    #[arg(long, env = "QMS_USER_PASSWORD", default_value = "")]
    pub password: String,

    /// Role (default: user)
    #[arg(long, default_value = "")]
    pub role: String,

    /// Create the account disabled
    #[arg(long)]
    pub inactive: bool,
}

#[derive(clap::Args, Debug)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: String,

    #[arg(long, env = "QMS_USER_PASSWORD")]
    pub password: String,
}

/// Users API first when configured, then the local user file
fn providers(ctx: &Context) -> AuthChain {
    let mut chain = AuthChain::new();
    if let Some(ref url) = ctx.config.auth.users_api {
        chain = chain.with(HttpUsersApi::new(url.clone()));
    }
    chain.with(FileUserStore::new(ctx.config.users_file(&ctx.project)))
}

pub fn run(cmd: UserCommands, global: &GlobalOpts) -> Result<()> {
    let ctx = Context::load(global)?;
    let chain = providers(&ctx);
    let provider = chain.select().into_diagnostic()?;

    match cmd {
        UserCommands::List => {
            let users = provider.fetch_users().into_diagnostic()?;
            let mut table = Table::new(&["id", "name", "email", "role", "active"]);
            for u in &users {
                table.push(vec![
                    u.id.clone(),
                    u.name.clone(),
                    u.email.clone(),
                    u.role.clone(),
                    if u.active { "yes" } else { "no" }.to_string(),
                ]);
            }
            print_list(&users, &table, global, "user", "qms user add")
        }
        UserCommands::Add(args) => {
            let user = provider
                .create_user(NewUser {
                    name: args.name,
                    email: args.email,
                    password: args.password,
                    role: args.role,
                    active: !args.inactive,
                })
                .into_diagnostic()?;
            success(
                global,
                format!(
                    "Created user {} via {}",
                    style(&user.email).cyan(),
                    provider.name()
                ),
            );
            Ok(())
        }
        UserCommands::Login(args) => {
            let user = provider
                .authenticate(&args.email, &args.password)
                .into_diagnostic()?;
            success(
                global,
                format!("Signed in as {} ({})", style(&user.name).cyan(), user.role),
            );
            Ok(())
        }
    }
}
