//! Domain models for Arta

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Direction of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A transaction row as stored in the record store.
///
/// Immutable once created; `category` stays `None` until classified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: i64,
    pub date: NaiveDate,
    /// Positive amount in currency-agnostic units (IDR in practice)
    pub amount: f64,
    pub description: String,
    pub transaction_type: TransactionType,
    pub category: Option<String>,
}

/// Fields for inserting a new transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub amount: f64,
    pub description: String,
    pub transaction_type: TransactionType,
    pub category: Option<String>,
}

/// One alternative category with its predicted probability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryAlternative {
    pub category: String,
    pub confidence: f64,
}

/// Result of categorizing a single description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Categorization {
    pub description: String,
    pub predicted_category: String,
    pub confidence: f64,
    /// "ml_model" when the trained classifier answered, "rule_based" otherwise
    pub model_version: String,
    /// Up to 3 alternatives, sorted by descending confidence
    pub alternative_categories: Vec<CategoryAlternative>,
}

/// Outcome of an explicit classifier training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub training_samples: usize,
    pub accuracy: f64,
    pub categories: Vec<String>,
    pub model_saved: bool,
}

/// Classifier status for the UI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStatus {
    pub is_trained: bool,
    pub categories: Vec<String>,
    pub training_ready: bool,
}

/// Next-period spending forecast
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendingForecast {
    pub predicted_amount: f64,
    pub confidence: f64,
    pub currency: String,
    /// "YYYY-MM" label for 30 days from now
    pub next_month: String,
}

/// One flagged anomalous expense
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyFinding {
    pub date: NaiveDate,
    pub amount: f64,
    pub category: String,
    pub description: String,
    /// In (0, 1]; higher values mean more anomalous
    pub anomaly_score: f64,
    pub reason: String,
}

/// Anomaly detection result set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub anomalies: Vec<AnomalyFinding>,
    pub total_analyzed: usize,
    pub anomaly_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Savings-rate based health summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialHealth {
    /// Fraction of income saved, e.g. 0.2 for 20%
    pub savings_rate: f64,
    /// Savings rate scaled to 0-100 and clamped
    pub health_score: f64,
    pub recommendation: String,
}

/// Aggregate spending breakdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendingInsights {
    pub top_spending_category: String,
    pub total_income: f64,
    pub total_expense: f64,
    pub net_savings: f64,
}

/// Month-over-month direction of expense totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyTrend {
    pub trend: String,
    pub last_month_spending: f64,
}

/// Combined dashboard insights payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialInsights {
    pub financial_health: FinancialHealth,
    pub spending_insights: SpendingInsights,
    pub monthly_trend: MonthlyTrend,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_roundtrip() {
        assert_eq!(
            "expense".parse::<TransactionType>().unwrap(),
            TransactionType::Expense
        );
        assert_eq!(
            "INCOME".parse::<TransactionType>().unwrap(),
            TransactionType::Income
        );
        assert!("transfer".parse::<TransactionType>().is_err());
        assert_eq!(TransactionType::Expense.to_string(), "expense");
    }

    #[test]
    fn test_anomaly_report_message_omitted_when_none() {
        let report = AnomalyReport {
            anomalies: vec![],
            total_analyzed: 3,
            anomaly_count: 0,
            message: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("message").is_none());
    }
}
