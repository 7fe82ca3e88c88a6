//! The inference pipeline: load once, then validate and predict per request.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::artifact;
use crate::error::{ArtifactKind, PipelineError, PredictionError};
use crate::features::{validate, FeatureVector};
use crate::model::{Classifier, StandardScaler};

/// Default classifier artifact path, relative to the working directory.
pub const DEFAULT_MODEL_PATH: &str = "anemia_model.json";
/// Default scaler artifact path, relative to the working directory.
pub const DEFAULT_SCALER_PATH: &str = "scaler.json";

/// Where the artifacts live and how to read them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Classifier artifact.
    pub model_path: PathBuf,
    /// Scaler artifact.
    pub scaler_path: PathBuf,
    /// Memory-map artifact files instead of reading them into a buffer.
    pub use_mmap: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            scaler_path: PathBuf::from(DEFAULT_SCALER_PATH),
            use_mmap: true,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default file names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            model_path: dir.join(DEFAULT_MODEL_PATH),
            scaler_path: dir.join(DEFAULT_SCALER_PATH),
            ..Self::default()
        }
    }
}

/// Outcome of one prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    NoAnemia,
    HasAnemia,
}

impl Verdict {
    /// Map a classifier label. Only `0` and `1` are valid.
    pub fn from_label(label: i64) -> Result<Self, PredictionError> {
        match label {
            0 => Ok(Verdict::NoAnemia),
            1 => Ok(Verdict::HasAnemia),
            other => Err(PredictionError::InvalidLabel(other)),
        }
    }

    pub fn label(self) -> i64 {
        match self {
            Verdict::NoAnemia => 0,
            Verdict::HasAnemia => 1,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::NoAnemia => write!(f, "no anemia"),
            Verdict::HasAnemia => write!(f, "anemia"),
        }
    }
}

/// Scale `features` with a pre-fit scaler and classify the result.
pub fn predict(
    features: &FeatureVector,
    scaler: &StandardScaler,
    classifier: &Classifier,
) -> Result<Verdict, PipelineError> {
    let scaled = scaler.transform(features.to_array().view())?;
    let label = classifier.predict(scaled.view())?;
    let verdict = Verdict::from_label(label)?;
    log::debug!("predicted {} (label {}) for {:?}", verdict, label, features.values());
    Ok(verdict)
}

/// A loaded scaler and classifier, read-only for the life of the process.
///
/// Build one at startup and share it by reference with every request
/// handler.
#[derive(Debug, Clone)]
pub struct Pipeline {
    scaler: StandardScaler,
    classifier: Classifier,
}

impl Pipeline {
    /// Assemble a pipeline from artifacts already in memory.
    ///
    /// The scaler must have been fit on a reference dataset; a scaler fit on
    /// a single sample is refused. Both artifacts go through the same
    /// consistency checks a file load applies.
    pub fn new(scaler: StandardScaler, classifier: Classifier) -> Result<Self, PipelineError> {
        if scaler.is_degenerate() {
            return Err(PipelineError::DegenerateScaler {
                n_samples_seen: scaler.n_samples_seen(),
            });
        }
        scaler
            .check()
            .map_err(|reason| PipelineError::InconsistentArtifact {
                artifact: ArtifactKind::Scaler,
                reason,
            })?;
        classifier
            .check()
            .map_err(|reason| PipelineError::InconsistentArtifact {
                artifact: ArtifactKind::Classifier,
                reason,
            })?;
        Ok(Self { scaler, classifier })
    }

    /// Load both artifacts. Any failure aborts the whole load.
    pub fn load(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let classifier = artifact::load::<Classifier>(&config.model_path, config.use_mmap)?;
        let scaler = artifact::load::<StandardScaler>(&config.scaler_path, config.use_mmap)?;
        let pipeline = Self::new(scaler.artifact, classifier.artifact)?;
        log::info!(
            "pipeline ready: scaler fit on {} samples, classifier expects {} features",
            pipeline.scaler.n_samples_seen(),
            pipeline.classifier.n_features_in()
        );
        Ok(pipeline)
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<Verdict, PipelineError> {
        predict(features, &self.scaler, &self.classifier)
    }

    /// Validate raw inputs and predict.
    pub fn evaluate(&self, raw: &[f64]) -> Result<Verdict, PipelineError> {
        let features = validate(raw)?;
        self.predict(&features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn pipeline_is_shareable() {
        assert_send_sync::<Pipeline>();
    }

    #[test]
    fn only_binary_labels_map_to_verdicts() {
        assert_eq!(Verdict::from_label(0), Ok(Verdict::NoAnemia));
        assert_eq!(Verdict::from_label(1), Ok(Verdict::HasAnemia));
        assert_eq!(Verdict::from_label(2), Err(PredictionError::InvalidLabel(2)));
        assert_eq!(Verdict::from_label(-1), Err(PredictionError::InvalidLabel(-1)));
    }

    #[test]
    fn config_in_dir_uses_default_names() {
        let config = PipelineConfig::in_dir("/srv/models");
        assert_eq!(config.model_path, Path::new("/srv/models/anemia_model.json"));
        assert_eq!(config.scaler_path, Path::new("/srv/models/scaler.json"));
        assert!(config.use_mmap);
    }
}
