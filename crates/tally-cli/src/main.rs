//! Tally CLI - offline-first ledger sync from the terminal
//!
//! Loads the signed-in user's ledger, queues writes while offline and
//! replays them once Firestore is reachable again.

mod auth;
mod cli;
mod commands;
mod config_profiles;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::common::GlobalOptions;
use crate::commands::config::run_config;
use crate::commands::enqueue::run_enqueue;
use crate::commands::load::run_load;
use crate::commands::queue::run_queue;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "tally=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let options = GlobalOptions {
        db_path: cli.db_path,
        profile: cli.profile,
        offline: cli.offline,
    };

    match cli.command {
        Commands::Config { command } => run_config(command, options.profile.as_deref())?,
        Commands::Auth { command } => run_auth(command, &options).await?,
        Commands::Load { json } => run_load(json, &options).await?,
        Commands::Enqueue {
            kind,
            collection,
            id,
            data,
        } => run_enqueue(kind, collection, &id, data.as_deref(), &options).await?,
        Commands::Queue { json } => run_queue(json, &options).await?,
        Commands::Sync { json } => run_sync(json, &options).await?,
    }

    Ok(())
}
