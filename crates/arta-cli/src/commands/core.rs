//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `cmd_init` - Initialize the database
//! - `cmd_train` - Train the category classifier
//! - `cmd_status` - Show data and model status
//! - `cmd_transactions` - List stored transactions

use std::path::Path;

use anyhow::{Context, Result};
use arta_core::{build_service, Database, Model};

/// Open (and migrate) the transaction database
pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    Database::new(path_str).context("Failed to open database")
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    open_db(db_path)?;

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Seed sample data: arta generate");
    println!("  2. Train the classifier: arta train");
    println!("  3. Start the API: arta serve");

    Ok(())
}

pub fn cmd_train(db_path: &Path, model_dir: &Path) -> Result<()> {
    println!("🧠 Training category classifier...");

    let db = open_db(db_path)?;
    let service = build_service(db, model_dir);

    let report = service
        .train_category_model()
        .context("Training failed")?;

    println!("✅ Training complete!");
    println!("   Samples:    {}", report.training_samples);
    println!("   Accuracy:   {:.1}%", report.accuracy * 100.0);
    println!("   Categories: {}", report.categories.join(", "));
    if report.model_saved {
        println!("   Artifacts:  {}", model_dir.display());
    } else {
        println!("   ⚠️  Model was not persisted");
    }

    Ok(())
}

pub fn cmd_status(db_path: &Path, model_dir: &Path) -> Result<()> {
    let db = open_db(db_path)?;
    let total = db.all_transactions()?.len();
    let labeled = db.count_labeled()?;

    let service = build_service(db, model_dir);
    let status = service.model_status()?;

    println!("📊 Arta status");
    println!("   Database:       {}", db_path.display());
    println!("   Transactions:   {}", total);
    println!("   Labeled:        {}", labeled);
    println!();
    println!("   Classifier trained:  {}", if status.is_trained { "yes" } else { "no" });
    println!("   Training ready:      {}", if status.training_ready { "yes" } else { "no" });
    if !status.categories.is_empty() {
        println!("   Known categories:    {}", status.categories.join(", "));
    }
    println!(
        "   Forecaster trained:  {}",
        if service.registry().spending.read().is_trained() { "yes" } else { "no" }
    );
    println!(
        "   Detector trained:    {}",
        if service.registry().anomaly.read().is_trained() { "yes" } else { "no" }
    );

    Ok(())
}

pub fn cmd_transactions(db_path: &Path, category: Option<&str>) -> Result<()> {
    let db = open_db(db_path)?;
    let records = db.list_transactions(None, category, 50)?;

    if records.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    println!(
        "{:<12} {:>14} {:<9} {:<14} {}",
        "DATE", "AMOUNT", "TYPE", "CATEGORY", "DESCRIPTION"
    );
    for record in records {
        println!(
            "{:<12} {:>14.0} {:<9} {:<14} {}",
            record.date,
            record.amount,
            record.transaction_type,
            record.category.as_deref().unwrap_or("-"),
            record.description
        );
    }

    Ok(())
}
