//! Orchestration layer tying the record store to the predictors
//!
//! Owns the training policy: explicit training for the classifier (with a
//! hard minimum-sample gate), lazy guarded training for the forecaster and
//! the detector on first use. Every prediction path has a deterministic
//! fallback so callers always get an answer or an actionable error.

use std::sync::Arc;

use tracing::{info, warn};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::ml::{Model, ModelRegistry};
use crate::models::{
    AnomalyReport, Categorization, FinancialHealth, FinancialInsights, ModelStatus, MonthlyTrend,
    SpendingForecast, SpendingInsights, TrainingReport, TransactionRecord, TransactionType,
};
use crate::rules;

/// Minimum labeled rows before explicit classifier training is accepted
pub const MIN_CLASSIFIER_SAMPLES: usize = 10;
/// Minimum distinct expense months before the forecaster self-trains
pub const MIN_FORECAST_MONTHS: usize = 3;
/// Minimum expense rows before the detector self-trains
pub const MIN_DETECTOR_SAMPLES: usize = 10;
/// Default number of anomalies returned
pub const DEFAULT_TOP_ANOMALIES: usize = 5;

pub struct AiService {
    db: Database,
    registry: Arc<ModelRegistry>,
}

impl AiService {
    pub fn new(db: Database, registry: Arc<ModelRegistry>) -> Self {
        Self { db, registry }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Categorize one description. Uses the trained classifier when
    /// available, otherwise the keyword rules; never fails.
    pub fn categorize(&self, description: &str, amount: f64) -> Categorization {
        let category = self.registry.category.read();
        if category.is_trained() {
            let (predicted, confidence) = category.predict_single(description, amount);
            let alternatives = category.get_alternatives(description);
            Categorization {
                description: description.to_string(),
                predicted_category: predicted,
                confidence,
                model_version: "ml_model".to_string(),
                alternative_categories: alternatives,
            }
        } else {
            let predicted = rules::categorize_by_rules(description, amount);
            Categorization {
                description: description.to_string(),
                predicted_category: predicted.to_string(),
                confidence: rules::RULE_CONFIDENCE,
                model_version: "rule_based".to_string(),
                // Untrained predictors answer with the default distribution
                alternative_categories: category.get_alternatives(description),
            }
        }
    }

    /// Explicitly (re)train the classifier on all labeled rows.
    ///
    /// Hard minimum-sample gate: fewer than `MIN_CLASSIFIER_SAMPLES` labeled
    /// rows is an `InsufficientData` error, not a silent no-op.
    pub fn train_category_model(&self) -> Result<TrainingReport> {
        let corpus = self.db.training_corpus()?;
        if corpus.len() < MIN_CLASSIFIER_SAMPLES {
            return Err(Error::InsufficientData(format!(
                "Need at least {} categorized transactions to train, found {}",
                MIN_CLASSIFIER_SAMPLES,
                corpus.len()
            )));
        }

        let mut category = self.registry.category.write();
        let accuracy = category.train(&corpus)?;
        let model_saved = if category.is_trained() {
            match self.registry.persist(&*category) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Trained classifier could not be persisted: {}", e);
                    false
                }
            }
        } else {
            false
        };

        Ok(TrainingReport {
            training_samples: corpus.len(),
            accuracy,
            categories: category.categories().to_vec(),
            model_saved,
        })
    }

    /// Classifier status plus whether enough labeled data exists to train
    pub fn model_status(&self) -> Result<ModelStatus> {
        let labeled = self.db.count_labeled()? as usize;
        let category = self.registry.category.read();
        Ok(ModelStatus {
            is_trained: category.is_trained(),
            categories: category.categories().to_vec(),
            training_ready: labeled >= MIN_CLASSIFIER_SAMPLES,
        })
    }

    /// Forecast next month's spending, lazily training the forecaster on
    /// first use when enough monthly history exists.
    pub fn predict_spending(&self) -> Result<SpendingForecast> {
        let records = self.db.all_transactions()?;
        self.ensure_spending_trained(&records)?;
        self.registry.spending.read().predict_next_month(&records)
    }

    fn ensure_spending_trained(&self, records: &[TransactionRecord]) -> Result<()> {
        if self.registry.spending.read().is_trained() {
            return Ok(());
        }
        let months = crate::ml::spending::aggregate_monthly(records).len();
        if months < MIN_FORECAST_MONTHS {
            return Err(Error::InsufficientData(format!(
                "Need at least {} months of expense history, found {}",
                MIN_FORECAST_MONTHS, months
            )));
        }
        let mut spending = self.registry.spending.write();
        // Another caller may have trained while we waited for the lock
        if spending.is_trained() {
            return Ok(());
        }
        info!("Training spending forecaster on first use");
        let score = spending.train(records)?;
        if score > 0.0 {
            if let Err(e) = self.registry.persist(&*spending) {
                warn!("Trained forecaster could not be persisted: {}", e);
            }
        }
        Ok(())
    }

    /// Detect anomalous expenses, lazily training the detector on first use
    /// when enough expense rows exist.
    pub fn detect_anomalies(&self, top_n: usize) -> Result<AnomalyReport> {
        let records = self.db.all_transactions()?;
        self.ensure_anomaly_trained(&records)?;
        self.registry.anomaly.read().detect_anomalies(&records, top_n)
    }

    fn ensure_anomaly_trained(&self, records: &[TransactionRecord]) -> Result<()> {
        if self.registry.anomaly.read().is_trained() {
            return Ok(());
        }
        let expenses = records
            .iter()
            .filter(|r| r.transaction_type == TransactionType::Expense)
            .count();
        if expenses < MIN_DETECTOR_SAMPLES {
            return Err(Error::InsufficientData(format!(
                "Need at least {} expense transactions, found {}",
                MIN_DETECTOR_SAMPLES, expenses
            )));
        }
        let mut anomaly = self.registry.anomaly.write();
        if anomaly.is_trained() {
            return Ok(());
        }
        info!("Training anomaly detector on first use");
        let score = anomaly.train(records)?;
        if score > 0.0 {
            if let Err(e) = self.registry.persist(&*anomaly) {
                warn!("Trained detector could not be persisted: {}", e);
            }
        }
        Ok(())
    }

    /// Aggregate savings, spending and trend metrics for the dashboard
    pub fn financial_insights(&self) -> Result<FinancialInsights> {
        let records = self.db.all_transactions()?;

        let total_income: f64 = records
            .iter()
            .filter(|r| r.transaction_type == TransactionType::Income)
            .map(|r| r.amount)
            .sum();
        let total_expense: f64 = records
            .iter()
            .filter(|r| r.transaction_type == TransactionType::Expense)
            .map(|r| r.amount)
            .sum();
        let net_savings = total_income - total_expense;
        // Fraction of income saved, e.g. 0.2 for 20%
        let savings_rate = if total_income > 0.0 {
            net_savings / total_income
        } else {
            0.0
        };

        let recommendation = if savings_rate >= 0.2 {
            "Great savings rate, keep it up"
        } else if savings_rate >= 0.1 {
            "Decent savings rate, try to reach 20%"
        } else if savings_rate >= 0.0 {
            "Low savings rate, review your biggest spending categories"
        } else {
            "Spending exceeds income, cut non-essential expenses"
        };

        // Biggest expense category by total amount
        let mut by_category: std::collections::HashMap<String, f64> =
            std::collections::HashMap::new();
        for record in records
            .iter()
            .filter(|r| r.transaction_type == TransactionType::Expense)
        {
            let key = record
                .category
                .clone()
                .unwrap_or_else(|| rules::CATEGORY_OTHER.to_string());
            *by_category.entry(key).or_insert(0.0) += record.amount;
        }
        let top_spending_category = by_category
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(category, _)| category.clone())
            .unwrap_or_else(|| rules::CATEGORY_OTHER.to_string());

        let buckets = crate::ml::spending::aggregate_monthly(&records);
        let (trend, last_month_spending) = match buckets.as_slice() {
            [] => ("stable".to_string(), 0.0),
            [only] => ("stable".to_string(), only.total),
            [.., previous, last] => {
                let direction = if last.total > previous.total * 1.05 {
                    "increasing"
                } else if last.total < previous.total * 0.95 {
                    "decreasing"
                } else {
                    "stable"
                };
                (direction.to_string(), last.total)
            }
        };

        Ok(FinancialInsights {
            financial_health: FinancialHealth {
                savings_rate,
                health_score: (savings_rate * 100.0).clamp(0.0, 100.0),
                recommendation: recommendation.to_string(),
            },
            spending_insights: SpendingInsights {
                top_spending_category,
                total_income,
                total_expense,
                net_savings,
            },
            monthly_trend: MonthlyTrend {
                trend,
                last_month_spending,
            },
        })
    }
}

/// Wire a database and model directory together, rehydrating saved models
pub fn build_service(db: Database, model_dir: &std::path::Path) -> AiService {
    let registry = Arc::new(ModelRegistry::new(model_dir));
    registry.load_all();
    AiService::new(db, registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTransaction;
    use chrono::NaiveDate;

    fn service_with(records: Vec<NewTransaction>) -> AiService {
        let db = Database::in_memory().unwrap();
        for record in &records {
            db.insert_transaction(record).unwrap();
        }
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(ModelRegistry::new(dir.path()));
        AiService::new(db, registry)
    }

    fn expense(year: i32, month: u32, day: u32, amount: f64, description: &str, category: &str) -> NewTransaction {
        NewTransaction {
            date: NaiveDate::from_ymd_opt(year, month, day).unwrap(),
            amount,
            description: description.to_string(),
            transaction_type: TransactionType::Expense,
            category: Some(category.to_string()),
        }
    }

    fn labeled_corpus() -> Vec<NewTransaction> {
        let mut rows = Vec::new();
        for day in 1..=6 {
            rows.push(expense(2024, 1, day, 25_000.0, "makan siang warung padang", "Makanan"));
        }
        for day in 7..=12 {
            rows.push(expense(2024, 1, day, 20_000.0, "isi bensin motor honda", "Transportasi"));
        }
        rows
    }

    #[test]
    fn test_categorize_untrained_falls_back_to_rules() {
        let service = service_with(vec![]);
        let result = service.categorize("Beli bensin di SPBU", 20_000.0);
        assert_eq!(result.predicted_category, "Transportasi");
        assert_eq!(result.confidence, 0.6);
        assert_eq!(result.model_version, "rule_based");
        assert_eq!(result.alternative_categories.len(), 3);
        assert_eq!(result.alternative_categories[2].category, "Lainnya");
    }

    #[test]
    fn test_train_rejects_small_corpus() {
        let service = service_with(vec![expense(
            2024, 1, 1, 25_000.0, "makan siang warung", "Makanan",
        )]);
        let err = service.train_category_model().unwrap_err();
        assert!(matches!(err, Error::InsufficientData(_)));
    }

    #[test]
    fn test_train_then_categorize_uses_model() {
        let service = service_with(labeled_corpus());
        let report = service.train_category_model().unwrap();
        assert_eq!(report.training_samples, 12);
        assert!(report.model_saved);
        assert_eq!(report.categories, vec!["Makanan", "Transportasi"]);

        let result = service.categorize("makan malam restoran", 30_000.0);
        assert_eq!(result.model_version, "ml_model");
        assert_eq!(result.predicted_category, "Makanan");
        assert!(result.confidence > 0.5);
    }

    #[test]
    fn test_model_status_reflects_training_readiness() {
        let service = service_with(vec![]);
        let status = service.model_status().unwrap();
        assert!(!status.is_trained);
        assert!(!status.training_ready);

        let service = service_with(labeled_corpus());
        let status = service.model_status().unwrap();
        assert!(!status.is_trained);
        assert!(status.training_ready);

        service.train_category_model().unwrap();
        let status = service.model_status().unwrap();
        assert!(status.is_trained);
    }

    #[test]
    fn test_predict_spending_insufficient_history() {
        let service = service_with(vec![expense(
            2024, 1, 1, 100_000.0, "belanja bulanan", "Belanja",
        )]);
        let err = service.predict_spending().unwrap_err();
        assert!(matches!(err, Error::InsufficientData(_)));
    }

    #[test]
    fn test_predict_spending_lazy_trains() {
        let mut rows = Vec::new();
        for month in 1..=6 {
            rows.push(expense(2024, month, 5, 500_000.0, "belanja mingguan", "Belanja"));
            rows.push(expense(2024, month, 20, 600_000.0, "belanja mingguan", "Belanja"));
        }
        let service = service_with(rows);
        assert!(!service.registry().spending.read().is_trained());

        let forecast = service.predict_spending().unwrap();
        assert!(service.registry().spending.read().is_trained());
        assert!(forecast.predicted_amount > 0.0);
        assert_eq!(forecast.currency, "IDR");
    }

    #[test]
    fn test_detect_anomalies_insufficient_expenses() {
        let service = service_with(vec![expense(
            2024, 1, 1, 100_000.0, "belanja bulanan", "Belanja",
        )]);
        let err = service.detect_anomalies(DEFAULT_TOP_ANOMALIES).unwrap_err();
        assert!(matches!(err, Error::InsufficientData(_)));
    }

    #[test]
    fn test_detect_anomalies_lazy_trains_and_flags_spike() {
        let mut rows: Vec<NewTransaction> = (1..=19)
            .map(|day| expense(2024, 3, day, 20_000.0 + day as f64 * 500.0, "makan siang warung", "Makanan"))
            .collect();
        rows.push(expense(2024, 3, 20, 9_500_000.0, "beli laptop gaming", "Belanja"));
        let service = service_with(rows);

        let report = service.detect_anomalies(DEFAULT_TOP_ANOMALIES).unwrap();
        assert!(service.registry().anomaly.read().is_trained());
        assert_eq!(report.total_analyzed, 20);
        assert!(report.anomaly_count >= 1);
        assert_eq!(report.anomalies[0].amount, 9_500_000.0);
    }

    #[test]
    fn test_financial_insights_savings_and_trend() {
        let mut rows = vec![NewTransaction {
            date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            amount: 10_000_000.0,
            description: "gaji bulanan".to_string(),
            transaction_type: TransactionType::Income,
            category: None,
        }];
        rows.push(expense(2024, 1, 10, 1_000_000.0, "belanja bulanan", "Belanja"));
        rows.push(expense(2024, 2, 10, 2_000_000.0, "belanja bulanan", "Belanja"));
        let service = service_with(rows);

        let insights = service.financial_insights().unwrap();
        assert_eq!(insights.spending_insights.total_income, 10_000_000.0);
        assert_eq!(insights.spending_insights.total_expense, 3_000_000.0);
        assert_eq!(insights.spending_insights.net_savings, 7_000_000.0);
        assert_eq!(insights.spending_insights.top_spending_category, "Belanja");
        assert_eq!(insights.financial_health.savings_rate, 0.7);
        assert_eq!(insights.financial_health.health_score, 70.0);
        assert_eq!(insights.monthly_trend.trend, "increasing");
        assert_eq!(insights.monthly_trend.last_month_spending, 2_000_000.0);
    }

    #[test]
    fn test_financial_insights_zero_savings_is_positive_band() {
        let mut rows = vec![NewTransaction {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            amount: 1_000_000.0,
            description: "gaji bulanan".to_string(),
            transaction_type: TransactionType::Income,
            category: None,
        }];
        rows.push(expense(2024, 1, 10, 1_000_000.0, "belanja bulanan", "Belanja"));
        let service = service_with(rows);

        let insights = service.financial_insights().unwrap();
        assert_eq!(insights.financial_health.savings_rate, 0.0);
        assert!(
            !insights
                .financial_health
                .recommendation
                .starts_with("Spending exceeds income")
        );
    }

    #[test]
    fn test_financial_insights_no_income() {
        let service = service_with(vec![expense(
            2024, 1, 1, 100_000.0, "belanja bulanan", "Belanja",
        )]);
        let insights = service.financial_insights().unwrap();
        assert_eq!(insights.financial_health.savings_rate, 0.0);
        assert_eq!(insights.financial_health.health_score, 0.0);
    }
}
