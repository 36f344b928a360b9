//! Unsupervised detection of unusual expense transactions
//!
//! Each expense row becomes a small feature vector (amount, description
//! length, category code, amount relative to the overall mean) scored by
//! an isolation forest. Scores are in (0, 1] with higher meaning more
//! anomalous; flagged rows carry a human-readable reason.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::isolation::IsolationForest;
use super::{read_artifact, write_artifact, Model};
use crate::error::{Error, Result};
use crate::models::{AnomalyFinding, AnomalyReport, TransactionRecord, TransactionType};
use crate::rules;

#[derive(Debug, Clone)]
pub struct AnomalyConfig {
    pub n_trees: usize,
    pub contamination: f64,
    pub min_training_samples: usize,
    pub min_detection_samples: usize,
    pub category_average_multiplier: f64,
    pub percentile_cutoff: f64,
    pub seed: u64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            contamination: 0.1,
            min_training_samples: 10,
            min_detection_samples: 5,
            category_average_multiplier: 2.0,
            percentile_cutoff: 0.9,
            seed: 42,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct AnomalyArtifact {
    forest: IsolationForest,
}

pub struct AnomalyDetector {
    config: AnomalyConfig,
    forest: Option<IsolationForest>,
    is_trained: bool,
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(AnomalyConfig::default())
    }
}

fn expense_rows(records: &[TransactionRecord]) -> Vec<&TransactionRecord> {
    records
        .iter()
        .filter(|r| r.transaction_type == TransactionType::Expense)
        .collect()
}

fn feature_matrix(expenses: &[&TransactionRecord]) -> Vec<Vec<f64>> {
    let mean = if expenses.is_empty() {
        0.0
    } else {
        expenses.iter().map(|r| r.amount).sum::<f64>() / expenses.len() as f64
    };
    expenses
        .iter()
        .map(|r| {
            let relative = if mean > 0.0 { r.amount / mean } else { 0.0 };
            vec![
                r.amount,
                r.description.chars().count() as f64,
                rules::category_code(r.category.as_deref()) as f64,
                relative,
            ]
        })
        .collect()
}

/// Linear-interpolation percentile of sorted-on-demand data
fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = q * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let weight = rank - lower as f64;
        sorted[lower] * (1.0 - weight) + sorted[upper] * weight
    }
}

impl AnomalyDetector {
    pub fn new(config: AnomalyConfig) -> Self {
        Self {
            config,
            forest: None,
            is_trained: false,
        }
    }

    /// Score expenses and return the `top_n` most anomalous, each with a
    /// reason. Errors if untrained; answers with an empty report and an
    /// explanatory message when there are too few expenses to analyze.
    pub fn detect_anomalies(
        &self,
        records: &[TransactionRecord],
        top_n: usize,
    ) -> Result<AnomalyReport> {
        let forest = self
            .forest
            .as_ref()
            .filter(|_| self.is_trained)
            .ok_or_else(|| Error::NotTrained("anomaly_detector".to_string()))?;

        let expenses = expense_rows(records);
        if expenses.len() < self.config.min_detection_samples {
            return Ok(AnomalyReport {
                anomalies: Vec::new(),
                total_analyzed: expenses.len(),
                anomaly_count: 0,
                message: Some("Insufficient expense data for anomaly detection".to_string()),
            });
        }

        let matrix = feature_matrix(&expenses);
        let amounts: Vec<f64> = expenses.iter().map(|r| r.amount).collect();
        let high_amount = percentile(&amounts, self.config.percentile_cutoff);

        // Per-category mean amounts for reason attribution
        let mut by_category: HashMap<&str, (f64, usize)> = HashMap::new();
        for expense in &expenses {
            let key = expense.category.as_deref().unwrap_or(rules::CATEGORY_OTHER);
            let entry = by_category.entry(key).or_insert((0.0, 0));
            entry.0 += expense.amount;
            entry.1 += 1;
        }

        let mut flagged: Vec<AnomalyFinding> = expenses
            .iter()
            .zip(matrix.iter())
            .filter(|(_, row)| forest.is_anomaly(row))
            .map(|(expense, row)| {
                let category = expense
                    .category
                    .clone()
                    .unwrap_or_else(|| rules::CATEGORY_OTHER.to_string());
                let (sum, count) = by_category[category.as_str()];
                let category_avg = sum / count as f64;
                let reason =
                    if expense.amount > self.config.category_average_multiplier * category_avg {
                        format!(
                            "Amount significantly higher than {} average (Rp {:.0})",
                            category, category_avg
                        )
                    } else if expense.amount > high_amount {
                        "Amount in the top 10% of all expenses".to_string()
                    } else {
                        "Unusual spending pattern detected".to_string()
                    };
                AnomalyFinding {
                    date: expense.date,
                    amount: expense.amount,
                    category,
                    description: expense.description.clone(),
                    anomaly_score: forest.score(row),
                    reason,
                }
            })
            .collect();

        flagged.sort_by(|a, b| {
            b.anomaly_score
                .partial_cmp(&a.anomaly_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        flagged.truncate(top_n);

        Ok(AnomalyReport {
            anomaly_count: flagged.len(),
            anomalies: flagged,
            total_analyzed: expenses.len(),
            message: None,
        })
    }
}

impl Model for AnomalyDetector {
    fn name(&self) -> &'static str {
        "anomaly_detector"
    }

    fn is_trained(&self) -> bool {
        self.is_trained
    }

    fn train(&mut self, records: &[TransactionRecord]) -> Result<f64> {
        let expenses = expense_rows(records);
        if expenses.len() < self.config.min_training_samples {
            warn!(
                "Not enough expense rows to train detector: {} < {}",
                expenses.len(),
                self.config.min_training_samples
            );
            return Ok(0.0);
        }

        let matrix = feature_matrix(&expenses);
        // Subsample size is fixed at fit time, so always start from a
        // fresh forest instead of refitting the old one.
        let mut forest =
            IsolationForest::new(self.config.n_trees, self.config.contamination, self.config.seed);
        forest.fit(&matrix);
        let score = forest.normal_fraction(&matrix);

        self.forest = Some(forest);
        self.is_trained = true;
        info!(
            "Detector trained on {} expense rows, normal fraction {:.4}",
            expenses.len(),
            score
        );
        Ok(score)
    }

    fn save(&self, dir: &Path) -> Result<()> {
        if let Some(forest) = &self.forest {
            let artifact = AnomalyArtifact {
                forest: forest.clone(),
            };
            write_artifact(&dir.join("anomaly_detector_model.json"), &artifact)?;
            info!("Model saved to {}", dir.display());
        }
        Ok(())
    }

    fn load(&mut self, dir: &Path) -> Result<bool> {
        let path = dir.join("anomaly_detector_model.json");
        if !path.exists() {
            return Ok(false);
        }
        let artifact: AnomalyArtifact = match read_artifact(&path) {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!("Unreadable detector artifact: {}", e);
                return Ok(false);
            }
        };
        self.forest = Some(artifact.forest);
        self.is_trained = true;
        info!("Model loaded from {}", dir.display());
        Ok(true)
    }

    /// Fraction of rows scored normal plus a flag-count report
    fn evaluate(&self, records: &[TransactionRecord]) -> Result<(f64, String)> {
        let forest = self
            .forest
            .as_ref()
            .filter(|_| self.is_trained)
            .ok_or_else(|| Error::NotTrained("anomaly_detector".to_string()))?;

        let expenses = expense_rows(records);
        if expenses.is_empty() {
            return Ok((0.0, "No expense rows to evaluate on".to_string()));
        }

        let matrix = feature_matrix(&expenses);
        let flagged = matrix.iter().filter(|row| forest.is_anomaly(row)).count();
        let normal_fraction = forest.normal_fraction(&matrix);
        let report = format!("{} of {} rows flagged anomalous", flagged, expenses.len());
        Ok((normal_fraction, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn expense(day: u32, amount: f64, description: &str, category: &str) -> TransactionRecord {
        TransactionRecord {
            id: day as i64,
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            amount,
            description: description.to_string(),
            transaction_type: TransactionType::Expense,
            category: Some(category.to_string()),
        }
    }

    fn routine_with_spike() -> Vec<TransactionRecord> {
        let mut records: Vec<TransactionRecord> = (1..=19)
            .map(|day| {
                expense(
                    day,
                    20_000.0 + (day as f64) * 500.0,
                    "makan siang warung",
                    "Makanan",
                )
            })
            .collect();
        records.push(expense(20, 9_500_000.0, "beli laptop gaming", "Belanja"));
        records
    }

    #[test]
    fn test_untrained_detection_errors() {
        let detector = AnomalyDetector::default();
        let err = detector.detect_anomalies(&routine_with_spike(), 10).unwrap_err();
        assert!(matches!(err, Error::NotTrained(_)));
    }

    #[test]
    fn test_train_needs_ten_expenses() {
        let mut detector = AnomalyDetector::default();
        let records: Vec<TransactionRecord> = (1..=4)
            .map(|day| expense(day, 20_000.0, "makan siang", "Makanan"))
            .collect();
        assert_eq!(detector.train(&records).unwrap(), 0.0);
        assert!(!detector.is_trained());
    }

    #[test]
    fn test_spike_ranks_first_with_reason() {
        let records = routine_with_spike();
        let mut detector = AnomalyDetector::default();
        let score = detector.train(&records).unwrap();
        assert!(score > 0.0);

        let report = detector.detect_anomalies(&records, 10).unwrap();
        assert_eq!(report.total_analyzed, 20);
        assert!(report.anomaly_count >= 1);
        assert_eq!(report.anomalies[0].amount, 9_500_000.0);
        assert!(!report.anomalies[0].reason.is_empty());
        for pair in report.anomalies.windows(2) {
            assert!(pair[0].anomaly_score >= pair[1].anomaly_score);
        }
    }

    #[test]
    fn test_reason_cites_category_average_for_same_category_spike() {
        // Spike shares its category with the routine rows, so the
        // category-average comparison applies.
        let mut records: Vec<TransactionRecord> = (1..=19)
            .map(|day| expense(day, 25_000.0, "makan siang warung", "Makanan"))
            .collect();
        records.push(expense(20, 9_500_000.0, "makan besar ulang tahun", "Makanan"));

        let mut detector = AnomalyDetector::default();
        detector.train(&records).unwrap();

        let report = detector.detect_anomalies(&records, 10).unwrap();
        assert!(report.anomaly_count >= 1);
        assert_eq!(report.anomalies[0].amount, 9_500_000.0);
        assert!(report.anomalies[0].reason.contains("Makanan average"));
    }

    #[test]
    fn test_too_few_expenses_is_empty_report_with_message() {
        let mut detector = AnomalyDetector::default();
        detector.train(&routine_with_spike()).unwrap();

        let few: Vec<TransactionRecord> = (1..=3)
            .map(|day| expense(day, 20_000.0, "makan siang", "Makanan"))
            .collect();
        let report = detector.detect_anomalies(&few, 10).unwrap();
        assert!(report.anomalies.is_empty());
        assert_eq!(report.anomaly_count, 0);
        assert_eq!(report.total_analyzed, 3);
        assert!(report.message.is_some());
    }

    #[test]
    fn test_top_n_truncates() {
        let records = routine_with_spike();
        let mut detector = AnomalyDetector::default();
        detector.train(&records).unwrap();
        let report = detector.detect_anomalies(&records, 1).unwrap();
        assert!(report.anomalies.len() <= 1);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let records = routine_with_spike();
        let mut detector = AnomalyDetector::default();
        detector.train(&records).unwrap();
        detector.save(dir.path()).unwrap();

        let mut restored = AnomalyDetector::default();
        assert!(restored.load(dir.path()).unwrap());
        let a = detector.detect_anomalies(&records, 10).unwrap();
        let b = restored.detect_anomalies(&records, 10).unwrap();
        assert_eq!(a.anomaly_count, b.anomaly_count);
    }

    #[test]
    fn test_evaluate_normal_fraction() {
        let records = routine_with_spike();
        let mut detector = AnomalyDetector::default();
        detector.train(&records).unwrap();

        let (score, report) = detector.evaluate(&records).unwrap();
        assert!(score > 0.5);
        assert!(report.contains("flagged"));
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = vec![10.0, 20.0, 30.0, 40.0, 50.0];
        assert_eq!(percentile(&values, 0.5), 30.0);
        assert_eq!(percentile(&values, 0.9), 46.0);
        assert_eq!(percentile(&[], 0.9), 0.0);
    }
}
