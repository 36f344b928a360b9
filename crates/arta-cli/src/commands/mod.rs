//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init, train, status, transactions) and shared utilities
//! - `generate` - Sample data seeding for trying out the models
//! - `serve` - Web server command

pub mod core;
pub mod generate;
pub mod serve;

// Re-export command functions for main.rs
pub use core::*;
pub use generate::*;
pub use serve::*;
