//! Machine-learning subsystem
//!
//! Three predictors share one lifecycle contract (`Model`): train on bulk
//! transaction rows, predict, persist to a per-model artifact directory,
//! rehydrate at startup. A missing artifact is not an error; the predictor
//! simply starts untrained.
//!
//! The `ModelRegistry` owns one instance of each predictor behind a
//! read-write lock: predictions take the read lock, (re)training takes the
//! write lock, so training is serialized against prediction and never
//! re-entered for the same model.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::TransactionRecord;

pub mod anomaly;
pub mod category;
pub mod forest;
pub mod isolation;
pub mod spending;
pub mod text;

pub use anomaly::{AnomalyConfig, AnomalyDetector};
pub use category::{CategoryConfig, CategoryPredictor};
pub use spending::{SpendingConfig, SpendingPredictor};

/// Lifecycle contract shared by all predictors
pub trait Model {
    /// Fixed model name; keys the artifact directory
    fn name(&self) -> &'static str;

    fn is_trained(&self) -> bool;

    /// Fit on a bulk read of transaction rows and return a quality score.
    ///
    /// Insufficient data is a soft failure: returns `Ok(0.0)` and leaves the
    /// trained flag unchanged.
    fn train(&mut self, records: &[TransactionRecord]) -> Result<f64>;

    /// Serialize fitted parameters (and any fitted vectorizer) into `dir`.
    fn save(&self, dir: &Path) -> Result<()>;

    /// Restore fitted parameters from `dir`.
    ///
    /// Returns `Ok(false)` and leaves the model untrained when artifacts are
    /// missing or unreadable; never a hard error for "file not found".
    fn load(&mut self, dir: &Path) -> Result<bool>;

    /// Score the fitted model against the given rows and produce a
    /// human-readable report. Errors with `NotTrained` on an unfitted model.
    fn evaluate(&self, records: &[TransactionRecord]) -> Result<(f64, String)>;
}

/// Write a JSON artifact blob, creating parent directories as needed
pub(crate) fn write_artifact<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    serde_json::to_writer(std::io::BufWriter::new(file), value)?;
    Ok(())
}

/// Read a JSON artifact blob
pub(crate) fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = std::fs::File::open(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

/// One owned instance per predictor, each behind its own RwLock.
///
/// Constructed once at process start, optionally `load_all`ed, then injected
/// into the orchestration layer.
pub struct ModelRegistry {
    model_dir: PathBuf,
    pub category: RwLock<CategoryPredictor>,
    pub spending: RwLock<SpendingPredictor>,
    pub anomaly: RwLock<AnomalyDetector>,
}

impl ModelRegistry {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            category: RwLock::new(CategoryPredictor::default()),
            spending: RwLock::new(SpendingPredictor::default()),
            anomaly: RwLock::new(AnomalyDetector::default()),
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    fn artifact_dir(&self, name: &str) -> PathBuf {
        self.model_dir.join(name)
    }

    /// Attempt to rehydrate every predictor from disk. Absent artifacts are
    /// logged and skipped.
    pub fn load_all(&self) {
        self.load_one(&self.category);
        self.load_one(&self.spending);
        self.load_one(&self.anomaly);
    }

    fn load_one<M: Model>(&self, lock: &RwLock<M>) {
        let mut model = lock.write();
        let dir = self.artifact_dir(model.name());
        match model.load(&dir) {
            Ok(true) => info!("Loaded {} from {}", model.name(), dir.display()),
            Ok(false) => info!("{} starts untrained (no saved artifact)", model.name()),
            Err(e) => warn!("Failed to load {}: {}", model.name(), e),
        }
    }

    /// Persist a trained model into its artifact directory
    pub fn persist<M: Model>(&self, model: &M) -> Result<()> {
        model.save(&self.artifact_dir(model.name()))
    }
}
