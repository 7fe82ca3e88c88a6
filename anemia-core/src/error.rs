//! Error taxonomy for the inference pipeline.
//!
//! Errors are split by stage so that a presentation layer can tell a
//! startup failure (missing or broken artifact) from a per-request problem
//! (bad input) or an inference fault (artifact and pipeline disagree).

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::features::Feature;

/// Which of the two artifacts an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Scaler,
    Classifier,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Scaler => write!(f, "scaler"),
            ArtifactKind::Classifier => write!(f, "classifier"),
        }
    }
}

/// Input rejected before it reaches the pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// The request did not carry exactly one value per feature.
    #[error("expected {expected} values (HB, RBC, PCV, MCH, MCHC), got {actual}")]
    WrongArity { expected: usize, actual: usize },

    /// One or more fields were left empty.
    #[error("please fill in all values before predicting (missing: {})", join_features(.missing))]
    Incomplete { missing: Vec<Feature> },

    /// A value is negative or not finite.
    #[error("{field} must be a finite value >= 0, got {value}")]
    OutOfDomain { field: Feature, value: f64 },
}

fn join_features(features: &[Feature]) -> String {
    features
        .iter()
        .map(|f| f.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failure while applying the scaler's affine transform.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScalingError {
    #[error("scaler expects {expected} features but the pipeline supplies {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    #[error("scaler was fit on {n_samples_seen} sample(s); a reference fit needs at least 2")]
    DegenerateFit { n_samples_seen: u64 },

    #[error("cannot fit a scaler on an empty dataset")]
    EmptyDataset,

    #[error("reference sample {row} has a non-finite value in column {column}")]
    NonFiniteSample { row: usize, column: usize },
}

/// Failure inside the classifier's decision function.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictionError {
    #[error("classifier expects {expected} features but received {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    /// The classifier produced a label outside `{0, 1}`.
    #[error("classifier returned label {0}, expected 0 or 1")]
    InvalidLabel(i64),

    #[error("classifier has no class at index {index}")]
    MissingClass { index: usize },

    #[error("malformed tree at node {node}: {reason}")]
    MalformedTree { node: usize, reason: String },

    #[error("decision value {0} is not finite")]
    NonFiniteDecision(f64),
}

/// Top-level error returned by every pipeline operation.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{artifact} artifact not found at {}", .path.display())]
    ArtifactNotFound { artifact: ArtifactKind, path: PathBuf },

    #[error("{artifact} artifact at {} could not be read: {source}", .path.display())]
    ArtifactUnreadable {
        artifact: ArtifactKind,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{artifact} artifact at {} is corrupt: {reason}", .path.display())]
    ArtifactCorrupt {
        artifact: ArtifactKind,
        path: PathBuf,
        reason: String,
    },

    #[error("refusing to build pipeline: scaler was fit on {n_samples_seen} sample(s), not a reference dataset")]
    DegenerateScaler { n_samples_seen: u64 },

    /// An in-memory scaler or classifier that fails its consistency check.
    #[error("refusing to build pipeline: {artifact} is inconsistent: {reason}")]
    InconsistentArtifact { artifact: ArtifactKind, reason: String },

    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("input scaling error: {0}")]
    Scaling(#[from] ScalingError),

    #[error("prediction error: {0}")]
    Prediction(#[from] PredictionError),
}

impl PipelineError {
    /// Errors that must stop the request-handling surface entirely.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::ArtifactNotFound { .. }
                | PipelineError::ArtifactUnreadable { .. }
                | PipelineError::ArtifactCorrupt { .. }
                | PipelineError::DegenerateScaler { .. }
                | PipelineError::InconsistentArtifact { .. }
        )
    }

    /// The artifact involved, if any.
    pub fn artifact(&self) -> Option<ArtifactKind> {
        match self {
            PipelineError::ArtifactNotFound { artifact, .. }
            | PipelineError::ArtifactUnreadable { artifact, .. }
            | PipelineError::ArtifactCorrupt { artifact, .. }
            | PipelineError::InconsistentArtifact { artifact, .. } => Some(*artifact),
            PipelineError::DegenerateScaler { .. } => Some(ArtifactKind::Scaler),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_artifact_and_stage() {
        let err = PipelineError::ArtifactNotFound {
            artifact: ArtifactKind::Classifier,
            path: PathBuf::from("anemia_model.json"),
        };
        assert_eq!(
            err.to_string(),
            "classifier artifact not found at anemia_model.json"
        );
        assert!(err.is_startup_fatal());

        let err = PipelineError::from(ValidationError::Incomplete {
            missing: vec![Feature::Hb, Feature::Mchc],
        });
        assert!(err.to_string().contains("missing: HB, MCHC"));
        assert!(!err.is_startup_fatal());
        assert_eq!(err.artifact(), None);
    }
}
