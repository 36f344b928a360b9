//! Arta CLI - Personal finance tracker with local ML
//!
//! Usage:
//!   arta init                 Initialize database
//!   arta generate             Seed sample transactions
//!   arta train                Train the category classifier
//!   arta status               Show data and model status
//!   arta serve --port 5000    Start the API server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db),
        Commands::Generate { count } => commands::cmd_generate(&cli.db, count),
        Commands::Train => commands::cmd_train(&cli.db, &cli.model_dir),
        Commands::Status => commands::cmd_status(&cli.db, &cli.model_dir),
        Commands::Transactions { list } => commands::cmd_transactions(&cli.db, list.as_deref()),
        Commands::Serve { port, host } => {
            commands::cmd_serve(&cli.db, &cli.model_dir, &host, port).await
        }
    }
}
