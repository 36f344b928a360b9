//! Supervised text classifier mapping descriptions to spending categories
//!
//! TF-IDF features over normalized descriptions, a class-balanced random
//! forest, and a stratified 20% hold-out for the reported accuracy. The
//! amount-based override on top of predictions lives in `rules` as a named
//! policy function.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::forest::RandomForestClassifier;
use super::text::{normalize_description, TfidfVectorizer};
use super::{read_artifact, write_artifact, Model};
use crate::error::{Error, Result};
use crate::models::{CategoryAlternative, TransactionRecord};
use crate::rules;

/// Tunables for the category predictor. The thresholds have no derivation
/// beyond the original system's choices; treat them as knobs.
#[derive(Debug, Clone)]
pub struct CategoryConfig {
    pub max_features: usize,
    pub n_trees: usize,
    pub max_depth: usize,
    pub holdout_fraction: f64,
    pub min_training_samples: usize,
    pub large_amount_threshold: f64,
    pub override_confidence_floor: f64,
    pub alternative_probability_cutoff: f64,
    pub max_alternatives: usize,
    pub seed: u64,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            max_features: 1000,
            n_trees: 100,
            max_depth: 10,
            holdout_fraction: 0.2,
            min_training_samples: 10,
            large_amount_threshold: rules::LARGE_AMOUNT_THRESHOLD,
            override_confidence_floor: 0.7,
            alternative_probability_cutoff: 0.1,
            max_alternatives: 3,
            seed: 42,
        }
    }
}

/// On-disk parameters blob
#[derive(Serialize, Deserialize)]
struct CategoryArtifact {
    categories: Vec<String>,
    forest: RandomForestClassifier,
}

pub struct CategoryPredictor {
    config: CategoryConfig,
    vectorizer: TfidfVectorizer,
    forest: Option<RandomForestClassifier>,
    /// Sorted distinct labels observed at the most recent training
    categories: Vec<String>,
    is_trained: bool,
}

impl Default for CategoryPredictor {
    fn default() -> Self {
        Self::new(CategoryConfig::default())
    }
}

impl CategoryPredictor {
    pub fn new(config: CategoryConfig) -> Self {
        let max_features = config.max_features;
        Self {
            config,
            vectorizer: TfidfVectorizer::new(max_features),
            forest: None,
            categories: Vec::new(),
            is_trained: false,
        }
    }

    /// Sorted category vocabulary from the most recent training
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Predict one description with confidence.
    ///
    /// Never fails: untrained models answer with the catch-all category at
    /// confidence 0.0. The large-amount override is applied on top of the
    /// model output.
    pub fn predict_single(&self, description: &str, amount: f64) -> (String, f64) {
        match self.predict_category(description) {
            Ok((category, confidence)) => rules::override_large_uncategorized(
                category,
                confidence,
                amount,
                self.config.large_amount_threshold,
                self.config.override_confidence_floor,
            ),
            Err(_) => (rules::CATEGORY_OTHER.to_string(), 0.0),
        }
    }

    /// Raw model prediction without amount heuristics
    fn predict_category(&self, description: &str) -> Result<(String, f64)> {
        let proba = self.predict_proba(description)?;
        let (best, confidence) = proba
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .ok_or_else(|| Error::NotTrained("category_predictor".to_string()))?;
        let category = self
            .categories
            .get(best)
            .cloned()
            .unwrap_or_else(|| rules::CATEGORY_OTHER.to_string());
        Ok((category, *confidence))
    }

    fn predict_proba(&self, description: &str) -> Result<Vec<f64>> {
        let forest = self
            .forest
            .as_ref()
            .ok_or_else(|| Error::NotTrained("category_predictor".to_string()))?;
        let vector = self.vectorizer.transform(&normalize_description(description))?;
        Ok(forest.predict_proba(&vector))
    }

    /// Up to `max_alternatives` categories above the probability cutoff,
    /// sorted by descending confidence. Untrained models (or predictions
    /// with no qualifying class) get a fixed default distribution.
    pub fn get_alternatives(&self, description: &str) -> Vec<CategoryAlternative> {
        let proba = match self.predict_proba(description) {
            Ok(proba) => proba,
            Err(_) => return Self::default_alternatives(),
        };

        let mut alternatives: Vec<CategoryAlternative> = proba
            .iter()
            .enumerate()
            .filter(|(_, p)| **p > self.config.alternative_probability_cutoff)
            .filter_map(|(i, p)| {
                self.categories.get(i).map(|category| CategoryAlternative {
                    category: category.clone(),
                    confidence: *p,
                })
            })
            .collect();

        alternatives.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        alternatives.truncate(self.config.max_alternatives);

        if alternatives.is_empty() {
            Self::default_alternatives()
        } else {
            alternatives
        }
    }

    fn default_alternatives() -> Vec<CategoryAlternative> {
        vec![
            CategoryAlternative {
                category: rules::CATEGORY_FOOD.to_string(),
                confidence: 0.3,
            },
            CategoryAlternative {
                category: rules::CATEGORY_TRANSPORT.to_string(),
                confidence: 0.3,
            },
            CategoryAlternative {
                category: rules::CATEGORY_OTHER.to_string(),
                confidence: 0.4,
            },
        ]
    }

}

impl Model for CategoryPredictor {
    fn name(&self) -> &'static str {
        "category_predictor"
    }

    fn is_trained(&self) -> bool {
        self.is_trained
    }

    fn train(&mut self, records: &[TransactionRecord]) -> Result<f64> {
        // Training corpus: labeled rows with a usable description
        let labeled: Vec<(String, String)> = records
            .iter()
            .filter_map(|r| {
                let category = r.category.clone()?;
                if r.description.chars().count() <= 3 {
                    return None;
                }
                Some((normalize_description(&r.description), category))
            })
            .collect();

        if labeled.len() < self.config.min_training_samples {
            warn!(
                "Not enough labeled rows to train classifier: {} < {}",
                labeled.len(),
                self.config.min_training_samples
            );
            return Ok(0.0);
        }

        let categories: Vec<String> = labeled
            .iter()
            .map(|(_, c)| c.clone())
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect();
        let class_index: HashMap<&str, usize> = categories
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();
        debug!("Training classifier for categories: {:?}", categories);

        let documents: Vec<String> = labeled.iter().map(|(d, _)| d.clone()).collect();
        let y: Vec<usize> = labeled.iter().map(|(_, c)| class_index[c.as_str()]).collect();

        let mut vectorizer = TfidfVectorizer::new(self.config.max_features);
        let matrix = vectorizer.fit_transform(&documents);

        // Stratified hold-out: every category keeps at least one training row
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut train_idx: Vec<usize> = Vec::new();
        let mut test_idx: Vec<usize> = Vec::new();
        for class in 0..categories.len() {
            let mut members: Vec<usize> = (0..y.len()).filter(|&i| y[i] == class).collect();
            members.shuffle(&mut rng);
            let n_test = if members.len() >= 2 {
                (((members.len() as f64) * self.config.holdout_fraction).round() as usize)
                    .max(1)
                    .min(members.len() - 1)
            } else {
                0
            };
            test_idx.extend_from_slice(&members[..n_test]);
            train_idx.extend_from_slice(&members[n_test..]);
        }

        // Balanced class weights computed on the training portion
        let n_classes = categories.len();
        let mut counts = vec![0usize; n_classes];
        for &i in &train_idx {
            counts[y[i]] += 1;
        }
        let class_weights: Vec<f64> = counts
            .iter()
            .map(|&c| {
                if c == 0 {
                    0.0
                } else {
                    train_idx.len() as f64 / (n_classes as f64 * c as f64)
                }
            })
            .collect();

        let x_train: Vec<Vec<f64>> = train_idx.iter().map(|&i| matrix[i].clone()).collect();
        let y_train: Vec<usize> = train_idx.iter().map(|&i| y[i]).collect();

        let mut forest =
            RandomForestClassifier::new(self.config.n_trees, self.config.max_depth, self.config.seed);
        forest.fit(&x_train, &y_train, n_classes, &class_weights);

        let eval_idx: &[usize] = if test_idx.is_empty() { &train_idx } else { &test_idx };
        let correct = eval_idx
            .iter()
            .filter(|&&i| forest.predict(&matrix[i]) == y[i])
            .count();
        let accuracy = correct as f64 / eval_idx.len() as f64;

        self.vectorizer = vectorizer;
        self.forest = Some(forest);
        self.categories = categories;
        self.is_trained = true;

        info!(
            "Classifier trained on {} rows ({} categories), held-out accuracy {:.4}",
            labeled.len(),
            n_classes,
            accuracy
        );
        Ok(accuracy)
    }

    fn save(&self, dir: &Path) -> Result<()> {
        if let Some(forest) = &self.forest {
            let artifact = CategoryArtifact {
                categories: self.categories.clone(),
                forest: forest.clone(),
            };
            write_artifact(&dir.join("category_predictor_model.json"), &artifact)?;
        }
        if self.vectorizer.is_fitted() {
            write_artifact(&dir.join("category_predictor_vectorizer.json"), &self.vectorizer)?;
        }
        info!("Model saved to {}", dir.display());
        Ok(())
    }

    fn load(&mut self, dir: &Path) -> Result<bool> {
        let model_path = dir.join("category_predictor_model.json");
        let vectorizer_path = dir.join("category_predictor_vectorizer.json");
        if !model_path.exists() || !vectorizer_path.exists() {
            return Ok(false);
        }

        let artifact: CategoryArtifact = match read_artifact(&model_path) {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!("Unreadable classifier artifact: {}", e);
                return Ok(false);
            }
        };
        let vectorizer: TfidfVectorizer = match read_artifact(&vectorizer_path) {
            Ok(vectorizer) => vectorizer,
            Err(e) => {
                warn!("Unreadable vectorizer artifact: {}", e);
                return Ok(false);
            }
        };

        self.categories = artifact.categories;
        self.forest = Some(artifact.forest);
        self.vectorizer = vectorizer;
        self.is_trained = true;
        info!("Model loaded from {}", dir.display());
        Ok(true)
    }

    /// Accuracy plus a per-category hit breakdown on labeled rows
    fn evaluate(&self, records: &[TransactionRecord]) -> Result<(f64, String)> {
        if !self.is_trained {
            return Err(Error::NotTrained("category_predictor".to_string()));
        }

        let mut correct_by_label: HashMap<&str, (usize, usize)> = HashMap::new();
        let mut correct = 0usize;
        let mut total = 0usize;
        for record in records {
            let Some(label) = record.category.as_deref() else {
                continue;
            };
            let (predicted, _) = self.predict_category(&record.description)?;
            let entry = correct_by_label.entry(label).or_insert((0, 0));
            entry.1 += 1;
            total += 1;
            if predicted == label {
                entry.0 += 1;
                correct += 1;
            }
        }

        let accuracy = if total == 0 {
            0.0
        } else {
            correct as f64 / total as f64
        };

        let mut lines: Vec<String> = correct_by_label
            .iter()
            .map(|(label, (hit, n))| format!("{}: {}/{}", label, hit, n))
            .collect();
        lines.sort();
        Ok((accuracy, lines.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionType;
    use chrono::NaiveDate;

    fn record(id: i64, description: &str, category: Option<&str>, amount: f64) -> TransactionRecord {
        TransactionRecord {
            id,
            date: NaiveDate::from_ymd_opt(2024, 1, (id % 28 + 1) as u32).unwrap(),
            amount,
            description: description.to_string(),
            transaction_type: TransactionType::Expense,
            category: category.map(|c| c.to_string()),
        }
    }

    fn food_and_transport_corpus() -> Vec<TransactionRecord> {
        let food = [
            "makan siang warung padang",
            "makan malam restoran sederhana",
            "beli makan nasi goreng",
            "makan bakso kuah",
            "makan sate ayam madura",
            "sarapan makan roti bakar",
        ];
        let transport = [
            "isi bensin motor honda",
            "beli bensin mobil avanza",
            "bensin pertamina full tank",
            "isi bensin vespa tua",
            "bensin eceran pinggir jalan",
            "isi bensin sebelum mudik",
        ];
        let mut records = Vec::new();
        for (i, d) in food.iter().enumerate() {
            records.push(record(i as i64 + 1, d, Some("Makanan"), 25_000.0));
        }
        for (i, d) in transport.iter().enumerate() {
            records.push(record(i as i64 + 7, d, Some("Transportasi"), 20_000.0));
        }
        records
    }

    #[test]
    fn test_untrained_predict_single_is_catch_all() {
        let predictor = CategoryPredictor::default();
        let (category, confidence) = predictor.predict_single("Isi bensin motor", 20_000.0);
        assert_eq!(category, "Lainnya");
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn test_train_with_too_few_rows_is_soft_failure() {
        let mut predictor = CategoryPredictor::default();
        let records: Vec<TransactionRecord> = (0..5)
            .map(|i| record(i, "makan siang warung", Some("Makanan"), 25_000.0))
            .collect();
        let score = predictor.train(&records).unwrap();
        assert_eq!(score, 0.0);
        assert!(!predictor.is_trained());
    }

    #[test]
    fn test_train_two_separable_categories() {
        let mut predictor = CategoryPredictor::default();
        let score = predictor.train(&food_and_transport_corpus()).unwrap();

        assert!(predictor.is_trained());
        assert!(score >= 0.8, "held-out accuracy {} below 0.8", score);
        assert_eq!(predictor.categories(), &["Makanan", "Transportasi"]);

        let (category, confidence) = predictor.predict_single("beli makan nasi campur", 15_000.0);
        assert_eq!(category, "Makanan");
        assert!(confidence > 0.5);

        let (category, _) = predictor.predict_single("isi bensin motor", 20_000.0);
        assert_eq!(category, "Transportasi");
    }

    #[test]
    fn test_alternatives_bounded_and_sorted() {
        let mut predictor = CategoryPredictor::default();
        predictor.train(&food_and_transport_corpus()).unwrap();

        let alternatives = predictor.get_alternatives("makan siang warung");
        assert!(!alternatives.is_empty());
        assert!(alternatives.len() <= 3);
        for pair in alternatives.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
        for alt in &alternatives {
            assert!(alt.confidence > 0.1);
        }
    }

    #[test]
    fn test_untrained_alternatives_are_defaults() {
        let predictor = CategoryPredictor::default();
        let alternatives = predictor.get_alternatives("makan siang");
        assert_eq!(alternatives.len(), 3);
        assert_eq!(alternatives[0].category, "Makanan");
        assert_eq!(alternatives[2].category, "Lainnya");
    }

    #[test]
    fn test_save_load_roundtrip_reproduces_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let mut predictor = CategoryPredictor::default();
        predictor.train(&food_and_transport_corpus()).unwrap();
        predictor.save(dir.path()).unwrap();

        let mut restored = CategoryPredictor::default();
        assert!(restored.load(dir.path()).unwrap());
        assert!(restored.is_trained());
        assert_eq!(restored.categories(), predictor.categories());

        for input in ["makan siang warung", "isi bensin motor", "nonton film"] {
            assert_eq!(
                predictor.predict_single(input, 10_000.0),
                restored.predict_single(input, 10_000.0)
            );
        }
    }

    #[test]
    fn test_load_missing_artifact_is_false() {
        let dir = tempfile::tempdir().unwrap();
        let mut predictor = CategoryPredictor::default();
        assert!(!predictor.load(dir.path()).unwrap());
        assert!(!predictor.is_trained());
    }

    #[test]
    fn test_evaluate_requires_training() {
        let predictor = CategoryPredictor::default();
        let err = predictor.evaluate(&food_and_transport_corpus()).unwrap_err();
        assert!(matches!(err, Error::NotTrained(_)));
    }

    #[test]
    fn test_evaluate_reports_per_category() {
        let mut predictor = CategoryPredictor::default();
        let corpus = food_and_transport_corpus();
        predictor.train(&corpus).unwrap();

        let (accuracy, report) = predictor.evaluate(&corpus).unwrap();
        assert!(accuracy >= 0.8);
        assert!(report.contains("Makanan"));
        assert!(report.contains("Transportasi"));
    }
}
