//! Next-month spending forecast from monthly expense aggregates
//!
//! Expense rows are bucketed by calendar month; each bucket becomes a
//! feature row (total, count, 3-month moving average, month-over-month
//! trend, month number) and the regression target is the following
//! bucket's total.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::forest::RandomForestRegressor;
use super::{read_artifact, write_artifact, Model};
use crate::error::{Error, Result};
use crate::models::{SpendingForecast, TransactionRecord, TransactionType};

#[derive(Debug, Clone)]
pub struct SpendingConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_months: usize,
    pub forecast_confidence: f64,
    pub currency: &'static str,
    pub seed: u64,
}

impl Default for SpendingConfig {
    fn default() -> Self {
        Self {
            n_trees: 50,
            max_depth: 5,
            min_months: 3,
            forecast_confidence: 0.7,
            currency: "IDR",
            seed: 42,
        }
    }
}

/// One calendar month of expense activity
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyBucket {
    pub year: i32,
    pub month: u32,
    pub total: f64,
    pub count: usize,
    pub moving_average: f64,
    /// Percent change against the previous bucket, 0 for the first
    pub trend_pct: f64,
}

impl MonthlyBucket {
    fn features(&self) -> Vec<f64> {
        vec![
            self.total,
            self.count as f64,
            self.moving_average,
            self.trend_pct,
            self.month as f64,
        ]
    }
}

/// Chronological expense buckets with derived moving average and trend.
/// Months without any expense rows are simply absent.
pub fn aggregate_monthly(records: &[TransactionRecord]) -> Vec<MonthlyBucket> {
    let mut by_month: BTreeMap<(i32, u32), (f64, usize)> = BTreeMap::new();
    for record in records {
        if record.transaction_type != TransactionType::Expense {
            continue;
        }
        let key = (record.date.year(), record.date.month());
        let entry = by_month.entry(key).or_insert((0.0, 0));
        entry.0 += record.amount;
        entry.1 += 1;
    }

    let mut buckets: Vec<MonthlyBucket> = by_month
        .into_iter()
        .map(|((year, month), (total, count))| MonthlyBucket {
            year,
            month,
            total,
            count,
            moving_average: total,
            trend_pct: 0.0,
        })
        .collect();

    for i in 0..buckets.len() {
        let window_start = i.saturating_sub(2);
        let window_len = i - window_start + 1;
        let window_sum: f64 = buckets[window_start..=i].iter().map(|b| b.total).sum();
        buckets[i].moving_average = window_sum / window_len as f64;
        if i > 0 && buckets[i - 1].total > 0.0 {
            buckets[i].trend_pct =
                (buckets[i].total - buckets[i - 1].total) / buckets[i - 1].total * 100.0;
        }
    }
    buckets
}

#[derive(Serialize, Deserialize)]
struct SpendingArtifact {
    forest: RandomForestRegressor,
}

pub struct SpendingPredictor {
    config: SpendingConfig,
    forest: Option<RandomForestRegressor>,
    is_trained: bool,
}

impl Default for SpendingPredictor {
    fn default() -> Self {
        Self::new(SpendingConfig::default())
    }
}

impl SpendingPredictor {
    pub fn new(config: SpendingConfig) -> Self {
        Self {
            config,
            forest: None,
            is_trained: false,
        }
    }

    /// Forecast next month's total expenses.
    ///
    /// Errors if the model is untrained; the caller decides how to surface
    /// that (the HTTP layer answers with a training hint).
    pub fn predict_next_month(&self, records: &[TransactionRecord]) -> Result<SpendingForecast> {
        let forest = self
            .forest
            .as_ref()
            .filter(|_| self.is_trained)
            .ok_or_else(|| Error::NotTrained("spending_predictor".to_string()))?;

        let buckets = aggregate_monthly(records);
        let last = buckets.last().ok_or_else(|| {
            Error::InsufficientData("no expense history to forecast from".to_string())
        })?;

        let predicted = forest.predict(&last.features()).max(0.0);
        let next_month = (Utc::now().date_naive() + Duration::days(30))
            .format("%Y-%m")
            .to_string();
        Ok(SpendingForecast {
            predicted_amount: predicted,
            confidence: self.config.forecast_confidence,
            currency: self.config.currency.to_string(),
            next_month,
        })
    }
}

impl Model for SpendingPredictor {
    fn name(&self) -> &'static str {
        "spending_predictor"
    }

    fn is_trained(&self) -> bool {
        self.is_trained
    }

    fn train(&mut self, records: &[TransactionRecord]) -> Result<f64> {
        let buckets = aggregate_monthly(records);
        if buckets.len() < self.config.min_months {
            warn!(
                "Not enough monthly history to train forecaster: {} < {}",
                buckets.len(),
                self.config.min_months
            );
            return Ok(0.0);
        }

        // Each month's features predict the next month's total
        let x: Vec<Vec<f64>> = buckets[..buckets.len() - 1]
            .iter()
            .map(MonthlyBucket::features)
            .collect();
        let y: Vec<f64> = buckets[1..].iter().map(|b| b.total).collect();
        if x.len() < 2 {
            warn!("Not enough month-to-month pairs to train forecaster");
            return Ok(0.0);
        }

        let mut forest =
            RandomForestRegressor::new(self.config.n_trees, self.config.max_depth, self.config.seed);
        forest.fit(&x, &y);

        // In-sample fit quality as 1 - MAE relative to the mean target
        let mae = x
            .iter()
            .zip(y.iter())
            .map(|(row, target)| (forest.predict(row) - target).abs())
            .sum::<f64>()
            / y.len() as f64;
        let mean = y.iter().sum::<f64>() / y.len() as f64;
        let score = if mean > 0.0 {
            (1.0 - mae / mean).max(0.0)
        } else {
            0.0
        };

        self.forest = Some(forest);
        self.is_trained = true;
        info!(
            "Forecaster trained on {} monthly pairs, fit score {:.4}",
            x.len(),
            score
        );
        Ok(score)
    }

    fn save(&self, dir: &Path) -> Result<()> {
        if let Some(forest) = &self.forest {
            let artifact = SpendingArtifact {
                forest: forest.clone(),
            };
            write_artifact(&dir.join("spending_predictor_model.json"), &artifact)?;
            info!("Model saved to {}", dir.display());
        }
        Ok(())
    }

    fn load(&mut self, dir: &Path) -> Result<bool> {
        let path = dir.join("spending_predictor_model.json");
        if !path.exists() {
            return Ok(false);
        }
        let artifact: SpendingArtifact = match read_artifact(&path) {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!("Unreadable forecaster artifact: {}", e);
                return Ok(false);
            }
        };
        self.forest = Some(artifact.forest);
        self.is_trained = true;
        info!("Model loaded from {}", dir.display());
        Ok(true)
    }

    /// Relative-error score plus an MAE report over month-to-month pairs
    fn evaluate(&self, records: &[TransactionRecord]) -> Result<(f64, String)> {
        let forest = self
            .forest
            .as_ref()
            .filter(|_| self.is_trained)
            .ok_or_else(|| Error::NotTrained("spending_predictor".to_string()))?;

        let buckets = aggregate_monthly(records);
        if buckets.len() < 2 {
            return Ok((0.0, "Fewer than 2 monthly buckets to evaluate on".to_string()));
        }

        let mae = buckets[..buckets.len() - 1]
            .iter()
            .zip(buckets[1..].iter())
            .map(|(bucket, next)| (forest.predict(&bucket.features()) - next.total).abs())
            .sum::<f64>()
            / (buckets.len() - 1) as f64;
        let mean = buckets[1..].iter().map(|b| b.total).sum::<f64>() / (buckets.len() - 1) as f64;
        let score = if mean > 0.0 {
            (1.0 - mae / mean).max(0.0)
        } else {
            0.0
        };
        let report = format!(
            "{} pairs, MAE {:.0} against mean target {:.0}",
            buckets.len() - 1,
            mae,
            mean
        );
        Ok((score, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn expense(year: i32, month: u32, day: u32, amount: f64) -> TransactionRecord {
        TransactionRecord {
            id: 0,
            date: NaiveDate::from_ymd_opt(year, month, day).unwrap(),
            amount,
            description: "pengeluaran bulanan".to_string(),
            transaction_type: TransactionType::Expense,
            category: Some("Lainnya".to_string()),
        }
    }

    fn income(year: i32, month: u32, day: u32, amount: f64) -> TransactionRecord {
        TransactionRecord {
            transaction_type: TransactionType::Income,
            ..expense(year, month, day, amount)
        }
    }

    fn six_months_history() -> Vec<TransactionRecord> {
        let mut records = Vec::new();
        for (i, total) in [1_000_000.0, 1_100_000.0, 1_050_000.0, 1_200_000.0, 1_150_000.0, 1_250_000.0]
            .iter()
            .enumerate()
        {
            let month = i as u32 + 1;
            records.push(expense(2024, month, 5, total / 2.0));
            records.push(expense(2024, month, 20, total / 2.0));
        }
        records
    }

    #[test]
    fn test_aggregate_monthly_sums_and_derives() {
        let records = vec![
            expense(2024, 1, 5, 100.0),
            expense(2024, 1, 15, 200.0),
            expense(2024, 2, 3, 600.0),
            income(2024, 2, 4, 5_000.0),
        ];
        let buckets = aggregate_monthly(&records);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].total, 300.0);
        assert_eq!(buckets[0].count, 2);
        assert_eq!(buckets[0].trend_pct, 0.0);
        assert_eq!(buckets[1].total, 600.0);
        assert_eq!(buckets[1].moving_average, 450.0);
        assert_eq!(buckets[1].trend_pct, 100.0);
    }

    #[test]
    fn test_train_needs_three_months() {
        let mut predictor = SpendingPredictor::default();
        let records = vec![expense(2024, 1, 5, 100.0), expense(2024, 2, 5, 200.0)];
        assert_eq!(predictor.train(&records).unwrap(), 0.0);
        assert!(!predictor.is_trained());
    }

    #[test]
    fn test_untrained_predict_errors() {
        let predictor = SpendingPredictor::default();
        let err = predictor.predict_next_month(&six_months_history()).unwrap_err();
        assert!(matches!(err, Error::NotTrained(_)));
    }

    #[test]
    fn test_trained_forecast_is_plausible() {
        let mut predictor = SpendingPredictor::default();
        let history = six_months_history();
        let score = predictor.train(&history).unwrap();
        assert!(predictor.is_trained());
        assert!(score > 0.0);

        let forecast = predictor.predict_next_month(&history).unwrap();
        assert!(forecast.predicted_amount > 0.0);
        assert!(forecast.predicted_amount < 5_000_000.0);
        assert_eq!(forecast.confidence, 0.7);
        assert_eq!(forecast.currency, "IDR");
        assert_eq!(forecast.next_month.len(), 7);
    }

    #[test]
    fn test_four_increasing_months_forecast_positive() {
        let mut records = Vec::new();
        for (i, total) in [800_000.0, 900_000.0, 1_000_000.0, 1_100_000.0].iter().enumerate() {
            records.push(expense(2024, i as u32 + 1, 15, *total));
        }
        let mut predictor = SpendingPredictor::default();
        predictor.train(&records).unwrap();
        assert!(predictor.is_trained());

        let forecast = predictor.predict_next_month(&records).unwrap();
        assert!(forecast.predicted_amount > 0.0);
        assert_eq!(forecast.confidence, 0.7);
    }

    #[test]
    fn test_evaluate_reports_mae() {
        let history = six_months_history();
        let mut predictor = SpendingPredictor::default();
        predictor.train(&history).unwrap();

        let (score, report) = predictor.evaluate(&history).unwrap();
        assert!(score > 0.0);
        assert!(report.contains("MAE"));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let history = six_months_history();
        let mut predictor = SpendingPredictor::default();
        predictor.train(&history).unwrap();
        predictor.save(dir.path()).unwrap();

        let mut restored = SpendingPredictor::default();
        assert!(restored.load(dir.path()).unwrap());
        let a = predictor.predict_next_month(&history).unwrap();
        let b = restored.predict_next_month(&history).unwrap();
        assert_eq!(a.predicted_amount, b.predicted_amount);
    }
}
