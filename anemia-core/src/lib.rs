//! Anemia screening pipeline.
//!
//! A pre-fitted scaler and a pre-trained classifier are loaded once from
//! their artifact files. Each request then runs validation, scaling and a
//! single classifier call, producing a [`Verdict`]. Presentation layers
//! (the CLI, the C ABI in `anemia-mobile`) only call into this crate.

pub mod artifact;
pub mod demo;
pub mod error;
pub mod features;
pub mod model;
pub mod pipeline;

pub use error::{ArtifactKind, PipelineError, PredictionError, ScalingError, ValidationError};
pub use features::{validate, Feature, FeatureVector, N_FEATURES};
pub use model::{Classifier, DecisionTree, LogisticRegression, RandomForest, StandardScaler};
pub use pipeline::{predict, Pipeline, PipelineConfig, Verdict};
