//! Studia CLI - per-day study notes, memos and reminders from the terminal
//!
//! Drives the same sync client and day view as the app, against a JSON
//! emulator of the remote store and a local cache database.

mod cli;
mod commands;
mod config_profiles;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::{resolve_date, AppContext};
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::memo::run_memo;
use crate::commands::note::run_note;
use crate::commands::purge::run_purge;
use crate::commands::reminders::run_reminders;
use crate::commands::show::run_show;
use crate::commands::status::run_status;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let directive = "studia=info"
        .parse::<Directive>()
        .map_err(|error| CliError::Config(error.to_string()))?;
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .init();

    let cli = Cli::parse();
    let global = cli.global;

    match cli.command {
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
        Commands::Config { command } => run_config(command, &global).await?,
        command => {
            let context = AppContext::open(&global).await?;
            match command {
                Commands::Show {
                    date,
                    format,
                    output,
                } => {
                    let date = resolve_date(date.as_deref())?;
                    run_show(&context, date, format, output.as_deref()).await?;
                }
                Commands::Watch { date, count } => {
                    let date = resolve_date(date.as_deref())?;
                    run_watch(&context, date, count).await?;
                }
                Commands::Note { command } => run_note(&context, command).await?,
                Commands::Memo { command } => run_memo(&context, command).await?,
                Commands::Reminders { command } => run_reminders(&context, command).await?,
                Commands::Purge { yes } => run_purge(&context, yes).await?,
                Commands::Status { json } => run_status(&context, json)?,
                Commands::Completions { .. } | Commands::Config { .. } => {}
            }
        }
    }

    Ok(())
}
