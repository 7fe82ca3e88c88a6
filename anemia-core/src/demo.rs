//! Small self-contained artifacts for trying the pipeline end to end.
//!
//! The scaler is fit on an embedded reference table. The classifier is a
//! fixed two-split decision tree (HB, then MCH) written by hand; it is not a
//! trained clinical model.

use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use ndarray::Array2;

use crate::artifact;
use crate::features::{Feature, N_FEATURES};
use crate::model::{Classifier, DecisionTree, StandardScaler, TREE_LEAF};
use crate::pipeline::{Pipeline, PipelineConfig};

/// Reference rows `HB, RBC, PCV, MCH, MCHC`.
pub const REFERENCE_SAMPLES: [[f64; N_FEATURES]; 12] = [
    [14.9, 5.1, 44.0, 29.2, 33.9],
    [13.6, 4.7, 41.2, 28.9, 33.0],
    [15.8, 5.4, 47.1, 29.3, 33.5],
    [12.9, 4.4, 39.0, 29.3, 33.1],
    [16.4, 5.6, 48.9, 29.3, 33.5],
    [14.2, 4.9, 42.5, 29.0, 33.4],
    [9.1, 3.9, 29.8, 23.3, 30.5],
    [10.4, 4.2, 32.6, 24.8, 31.9],
    [8.2, 3.6, 27.1, 22.8, 30.3],
    [11.3, 4.3, 34.8, 26.3, 32.5],
    [10.9, 4.8, 33.7, 22.7, 32.3],
    [7.6, 3.1, 25.0, 24.5, 30.4],
];

/// HB at or below this value (g/dL) is flagged.
pub const HB_SPLIT: f64 = 12.0;
/// MCH at or below this value (pg) is flagged when HB is above `HB_SPLIT`.
pub const MCH_SPLIT: f64 = 22.0;

/// Fit the scaler on [`REFERENCE_SAMPLES`].
pub fn demo_scaler() -> StandardScaler {
    let flat: Vec<f64> = REFERENCE_SAMPLES.iter().flatten().copied().collect();
    let samples = Array2::from_shape_vec((REFERENCE_SAMPLES.len(), N_FEATURES), flat)
        .expect("reference table is rectangular");
    StandardScaler::fit(samples.view())
        .expect("reference table is non-empty")
        .with_feature_names(Feature::ALL.iter().map(|f| f.name().to_string()).collect())
}

fn scaled_threshold(scaler: &StandardScaler, feature: Feature, raw: f64) -> f64 {
    let i = feature.index();
    (raw - scaler.mean()[i]) / scaler.scale()[i]
}

/// The fixed tree, with raw-unit splits moved into `scaler`'s space.
pub fn demo_classifier(scaler: &StandardScaler) -> Classifier {
    Classifier::DecisionTree(DecisionTree {
        n_features_in: N_FEATURES,
        classes: vec![0, 1],
        children_left: vec![1, TREE_LEAF, 3, TREE_LEAF, TREE_LEAF],
        children_right: vec![2, TREE_LEAF, 4, TREE_LEAF, TREE_LEAF],
        feature: vec![
            Feature::Hb.index() as i64,
            -2,
            Feature::Mch.index() as i64,
            -2,
            -2,
        ],
        threshold: vec![
            scaled_threshold(scaler, Feature::Hb, HB_SPLIT),
            -2.0,
            scaled_threshold(scaler, Feature::Mch, MCH_SPLIT),
            -2.0,
            -2.0,
        ],
        value: vec![
            vec![6.0, 6.0],
            vec![0.0, 5.0],
            vec![6.0, 1.0],
            vec![0.0, 1.0],
            vec![6.0, 0.0],
        ],
    })
}

/// Build the demo pipeline in memory.
pub fn demo_pipeline() -> Pipeline {
    let scaler = demo_scaler();
    let classifier = demo_classifier(&scaler);
    Pipeline::new(scaler, classifier).expect("demo scaler is fit on the reference table")
}

/// Write both demo artifacts into `dir` under their default names.
pub fn write_demo_artifacts(dir: &Path) -> io::Result<(PathBuf, PathBuf)> {
    let config = PipelineConfig::in_dir(dir);
    let scaler = demo_scaler();
    let classifier = demo_classifier(&scaler);
    let fitted_at = Some(Utc::now());
    artifact::save(&scaler, fitted_at, &config.scaler_path)?;
    artifact::save(&classifier, fitted_at, &config.model_path)?;
    Ok((config.model_path, config.scaler_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Verdict;

    #[test]
    fn demo_tree_follows_raw_thresholds() {
        let pipeline = demo_pipeline();
        assert_eq!(
            pipeline.evaluate(&[13.0, 4.5, 40.0, 28.0, 33.0]).unwrap(),
            Verdict::NoAnemia
        );
        assert_eq!(
            pipeline.evaluate(&[9.5, 3.8, 30.0, 24.0, 31.0]).unwrap(),
            Verdict::HasAnemia
        );
        assert_eq!(
            pipeline.evaluate(&[13.5, 5.9, 40.0, 20.0, 30.0]).unwrap(),
            Verdict::HasAnemia
        );
    }

    #[test]
    fn demo_scaler_saw_every_reference_row() {
        let scaler = demo_scaler();
        assert_eq!(scaler.n_samples_seen(), REFERENCE_SAMPLES.len() as u64);
        assert!(!scaler.is_degenerate());
    }
}
