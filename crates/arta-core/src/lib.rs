//! Arta Core Library
//!
//! Shared functionality for the Arta personal finance tool:
//! - SQLite transaction store and migrations
//! - Keyword rules and amount heuristics for categorization
//! - TF-IDF + random-forest transaction classifier
//! - Monthly-aggregate spending forecaster
//! - Isolation-forest anomaly detector
//! - Model registry with artifact persistence and lazy training policy

pub mod db;
pub mod error;
pub mod ml;
pub mod models;
pub mod rules;
pub mod service;

pub use db::Database;
pub use error::{Error, Result};
pub use ml::{
    AnomalyConfig, AnomalyDetector, CategoryConfig, CategoryPredictor, Model, ModelRegistry,
    SpendingConfig, SpendingPredictor,
};
pub use models::{
    AnomalyFinding, AnomalyReport, Categorization, CategoryAlternative, FinancialHealth,
    FinancialInsights, ModelStatus, MonthlyTrend, NewTransaction, SpendingForecast,
    SpendingInsights, TrainingReport, TransactionRecord, TransactionType,
};
pub use service::{build_service, AiService};
