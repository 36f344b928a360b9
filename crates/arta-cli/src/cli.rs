//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in the `commands`
//! module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Arta - Track spending and let local models explain it
#[derive(Parser)]
#[command(name = "arta")]
#[command(about = "Personal finance tracker with on-device ML", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "arta.db", global = true)]
    pub db: PathBuf,

    /// Directory for model artifacts
    #[arg(long, default_value = "models", global = true)]
    pub model_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Seed sample transactions for trying out the models
    Generate {
        /// Number of months of history to generate
        #[arg(short, long, default_value = "6")]
        count: u32,
    },

    /// Train the category classifier on labeled transactions
    Train,

    /// Show transaction counts and model training state
    Status,

    /// Transaction commands
    Transactions {
        /// Filter by category
        #[arg(short, long)]
        list: Option<String>,
    },

    /// Start the API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "5000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}
