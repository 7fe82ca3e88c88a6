//! Scaler and classifier models restored from artifacts.
//!
//! Tree-based classifiers keep scikit-learn's flat node layout so exported
//! models map onto them field for field.

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{PredictionError, ScalingError};

/// Marker in `children_left` / `children_right` for a leaf node.
pub const TREE_LEAF: i64 = -1;

/// Pre-fitted per-feature standardization `(x - mean) / scale`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StandardScaler {
    n_features_in: usize,
    n_samples_seen: u64,
    mean: Vec<f64>,
    scale: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    feature_names_in: Option<Vec<String>>,
}

impl StandardScaler {
    /// Fit mean and population standard deviation over a reference dataset,
    /// one sample per row. Constant columns get a scale of 1.0.
    pub fn fit(samples: ArrayView2<f64>) -> Result<Self, ScalingError> {
        if samples.nrows() == 0 || samples.ncols() == 0 {
            return Err(ScalingError::EmptyDataset);
        }
        if let Some(((row, column), _)) = samples.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(ScalingError::NonFiniteSample { row, column });
        }
        let mean = samples
            .mean_axis(Axis(0))
            .ok_or(ScalingError::EmptyDataset)?;
        let scale = samples.var_axis(Axis(0), 0.0).mapv(|v| {
            let s = v.sqrt();
            if s < 10.0 * f64::EPSILON {
                1.0
            } else {
                s
            }
        });
        Ok(Self {
            n_features_in: samples.ncols(),
            n_samples_seen: samples.nrows() as u64,
            mean: mean.to_vec(),
            scale: scale.to_vec(),
            feature_names_in: None,
        })
    }

    /// Attach the column names the scaler was fit with.
    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names_in = Some(names);
        self
    }

    pub fn n_features_in(&self) -> usize {
        self.n_features_in
    }

    pub fn n_samples_seen(&self) -> u64 {
        self.n_samples_seen
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    pub fn feature_names_in(&self) -> Option<&[String]> {
        self.feature_names_in.as_deref()
    }

    /// A scaler fit on one sample maps every input to zero.
    pub fn is_degenerate(&self) -> bool {
        self.n_samples_seen < 2
    }

    /// Stateless transform of a single sample.
    pub fn transform(&self, x: ArrayView1<f64>) -> Result<Array1<f64>, ScalingError> {
        if self.is_degenerate() {
            return Err(ScalingError::DegenerateFit {
                n_samples_seen: self.n_samples_seen,
            });
        }
        if self.n_features_in != x.len() {
            return Err(ScalingError::FeatureCountMismatch {
                expected: self.n_features_in,
                actual: x.len(),
            });
        }
        let mean = ArrayView1::from(&self.mean[..]);
        let scale = ArrayView1::from(&self.scale[..]);
        Ok((&x - &mean) / &scale)
    }

    pub(crate) fn check(&self) -> Result<(), String> {
        if self.mean.len() != self.n_features_in || self.scale.len() != self.n_features_in {
            return Err(format!(
                "n_features_in is {} but mean has {} and scale has {} entries",
                self.n_features_in,
                self.mean.len(),
                self.scale.len()
            ));
        }
        if let Some(names) = &self.feature_names_in {
            if names.len() != self.n_features_in {
                return Err(format!(
                    "feature_names_in has {} entries, expected {}",
                    names.len(),
                    self.n_features_in
                ));
            }
        }
        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err("mean contains a non-finite value".to_string());
        }
        if self.scale.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return Err("scale must be finite and strictly positive".to_string());
        }
        Ok(())
    }
}

/// Binary logistic regression; a positive decision value selects `classes[1]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogisticRegression {
    pub n_features_in: usize,
    pub coef: Vec<f64>,
    pub intercept: f64,
    pub classes: Vec<i64>,
}

impl LogisticRegression {
    pub fn decision_function(&self, x: ArrayView1<f64>) -> Result<f64, PredictionError> {
        if x.len() != self.coef.len() {
            return Err(PredictionError::FeatureCountMismatch {
                expected: self.coef.len(),
                actual: x.len(),
            });
        }
        let decision = ArrayView1::from(&self.coef[..]).dot(&x) + self.intercept;
        if !decision.is_finite() {
            return Err(PredictionError::NonFiniteDecision(decision));
        }
        Ok(decision)
    }

    pub fn predict(&self, x: ArrayView1<f64>) -> Result<i64, PredictionError> {
        let idx = if self.decision_function(x)? > 0.0 { 1 } else { 0 };
        class_at(&self.classes, idx)
    }

    fn check(&self) -> Result<(), String> {
        if self.coef.len() != self.n_features_in {
            return Err(format!(
                "coef has {} weights, expected {}",
                self.coef.len(),
                self.n_features_in
            ));
        }
        if self.classes.len() != 2 {
            return Err(format!("expected 2 classes, found {}", self.classes.len()));
        }
        if !self.intercept.is_finite() || self.coef.iter().any(|c| !c.is_finite()) {
            return Err("weights must be finite".to_string());
        }
        Ok(())
    }
}

/// Binary decision tree stored as flat node arrays.
///
/// Node `i` is a leaf when `children_left[i] == TREE_LEAF`. Otherwise a
/// sample goes left when `x[feature[i]] <= threshold[i]`. `value[i]` holds the
/// class weights seen at node `i` during training.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecisionTree {
    pub n_features_in: usize,
    pub classes: Vec<i64>,
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<Vec<f64>>,
}

impl DecisionTree {
    pub fn node_count(&self) -> usize {
        self.children_left.len()
    }

    fn leaf_for(&self, x: ArrayView1<f64>) -> Result<usize, PredictionError> {
        if x.len() != self.n_features_in {
            return Err(PredictionError::FeatureCountMismatch {
                expected: self.n_features_in,
                actual: x.len(),
            });
        }
        let mut node = 0usize;
        // A well-formed tree reaches a leaf in fewer steps than it has nodes.
        for _ in 0..self.node_count() {
            let left = *self
                .children_left
                .get(node)
                .ok_or_else(|| malformed(node, "node index out of range"))?;
            if left == TREE_LEAF {
                return Ok(node);
            }
            let (f, t, right) = match (
                self.feature.get(node),
                self.threshold.get(node),
                self.children_right.get(node),
            ) {
                (Some(&f), Some(&t), Some(&r)) => (f, t, r),
                _ => return Err(malformed(node, "node arrays are truncated")),
            };
            let v = usize::try_from(f)
                .ok()
                .and_then(|f| x.get(f))
                .ok_or_else(|| malformed(node, &format!("split on unknown feature {}", f)))?;
            let next = if *v <= t { left } else { right };
            node = usize::try_from(next).map_err(|_| malformed(node, "missing child"))?;
        }
        Err(malformed(node, "traversal did not reach a leaf"))
    }

    /// Normalized class distribution of the leaf `x` lands in.
    pub fn predict_proba(&self, x: ArrayView1<f64>) -> Result<Array1<f64>, PredictionError> {
        let leaf = self.leaf_for(x)?;
        let weights = self
            .value
            .get(leaf)
            .map(|w| Array1::from(w.clone()))
            .ok_or_else(|| malformed(leaf, "leaf has no value"))?;
        let total = weights.sum();
        if !total.is_finite() || total <= 0.0 {
            return Err(malformed(leaf, "leaf has no class weight"));
        }
        Ok(weights / total)
    }

    pub fn predict(&self, x: ArrayView1<f64>) -> Result<i64, PredictionError> {
        let proba = self.predict_proba(x)?;
        class_at(&self.classes, argmax(&proba))
    }

    fn check(&self) -> Result<(), String> {
        let n = self.node_count();
        if n == 0 {
            return Err("tree has no nodes".to_string());
        }
        if self.classes.is_empty() {
            return Err("tree has no classes".to_string());
        }
        if self.children_right.len() != n
            || self.feature.len() != n
            || self.threshold.len() != n
            || self.value.len() != n
        {
            return Err(format!("node arrays disagree on length (expected {})", n));
        }
        let in_range = |c: i64| c == TREE_LEAF || (c > 0 && (c as usize) < n);
        for i in 0..n {
            let (l, r) = (self.children_left[i], self.children_right[i]);
            if !in_range(l) || !in_range(r) || ((l == TREE_LEAF) != (r == TREE_LEAF)) {
                return Err(format!("node {} has invalid children ({}, {})", i, l, r));
            }
            if l != TREE_LEAF {
                let f = self.feature[i];
                if f < 0 || f as usize >= self.n_features_in {
                    return Err(format!("node {} splits on feature {} of {}", i, f, self.n_features_in));
                }
                if self.threshold[i].is_nan() {
                    return Err(format!("node {} has a NaN threshold", i));
                }
            }
            let weights = &self.value[i];
            if weights.len() != self.classes.len() {
                return Err(format!(
                    "node {} has {} class weights, expected {}",
                    i,
                    weights.len(),
                    self.classes.len()
                ));
            }
            if weights.iter().any(|w| !(w.is_finite() && *w >= 0.0)) {
                return Err(format!("node {} has a negative or non-finite class weight", i));
            }
            let total: f64 = weights.iter().sum();
            if !total.is_finite() || (l == TREE_LEAF && total <= 0.0) {
                return Err(format!("node {} has unusable class weights (total {})", i, total));
            }
        }
        self.check_reachability()
    }

    /// Every node must be reached from the root along exactly one path.
    fn check_reachability(&self) -> Result<(), String> {
        let n = self.node_count();
        let mut seen = vec![false; n];
        let mut stack = vec![0usize];
        while let Some(i) = stack.pop() {
            if seen[i] {
                return Err(format!("node {} is reachable along more than one path", i));
            }
            seen[i] = true;
            let (l, r) = (self.children_left[i], self.children_right[i]);
            if l != TREE_LEAF {
                stack.push(l as usize);
                stack.push(r as usize);
            }
        }
        match seen.iter().position(|s| !s) {
            Some(i) => Err(format!("node {} is unreachable from the root", i)),
            None => Ok(()),
        }
    }
}

/// Ensemble of decision trees voting by mean leaf probability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RandomForest {
    pub n_features_in: usize,
    pub classes: Vec<i64>,
    pub estimators: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn predict_proba(&self, x: ArrayView1<f64>) -> Result<Array1<f64>, PredictionError> {
        if self.estimators.is_empty() {
            return Err(malformed(0, "forest has no estimators"));
        }
        let mut acc = Array1::<f64>::zeros(self.classes.len());
        for tree in &self.estimators {
            let proba = tree.predict_proba(x)?;
            if proba.len() != acc.len() {
                return Err(malformed(0, "estimator disagrees on class count"));
            }
            acc += &proba;
        }
        Ok(acc / self.estimators.len() as f64)
    }

    pub fn predict(&self, x: ArrayView1<f64>) -> Result<i64, PredictionError> {
        let proba = self.predict_proba(x)?;
        class_at(&self.classes, argmax(&proba))
    }

    fn check(&self) -> Result<(), String> {
        if self.estimators.is_empty() {
            return Err("forest has no estimators".to_string());
        }
        for (i, tree) in self.estimators.iter().enumerate() {
            tree.check().map_err(|e| format!("estimator {}: {}", i, e))?;
            if tree.n_features_in != self.n_features_in || tree.classes != self.classes {
                return Err(format!("estimator {} disagrees with the forest's schema", i));
            }
        }
        Ok(())
    }
}

/// A pre-trained classifier of one of the supported families.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params", rename_all = "snake_case", deny_unknown_fields)]
pub enum Classifier {
    LogisticRegression(LogisticRegression),
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
}

impl Classifier {
    pub fn n_features_in(&self) -> usize {
        match self {
            Classifier::LogisticRegression(m) => m.n_features_in,
            Classifier::DecisionTree(m) => m.n_features_in,
            Classifier::RandomForest(m) => m.n_features_in,
        }
    }

    pub fn classes(&self) -> &[i64] {
        match self {
            Classifier::LogisticRegression(m) => &m.classes,
            Classifier::DecisionTree(m) => &m.classes,
            Classifier::RandomForest(m) => &m.classes,
        }
    }

    /// Run the decision function on one scaled sample and return its label.
    pub fn predict(&self, x: ArrayView1<f64>) -> Result<i64, PredictionError> {
        match self {
            Classifier::LogisticRegression(m) => m.predict(x),
            Classifier::DecisionTree(m) => m.predict(x),
            Classifier::RandomForest(m) => m.predict(x),
        }
    }

    pub(crate) fn check(&self) -> Result<(), String> {
        match self {
            Classifier::LogisticRegression(m) => m.check(),
            Classifier::DecisionTree(m) => m.check(),
            Classifier::RandomForest(m) => m.check(),
        }
    }
}

fn malformed(node: usize, reason: &str) -> PredictionError {
    PredictionError::MalformedTree {
        node,
        reason: reason.to_string(),
    }
}

fn class_at(classes: &[i64], index: usize) -> Result<i64, PredictionError> {
    classes
        .get(index)
        .copied()
        .ok_or(PredictionError::MissingClass { index })
}

/// Index of the largest entry; the first one wins ties.
fn argmax(v: &Array1<f64>) -> usize {
    let mut best = 0;
    for (i, &p) in v.iter().enumerate() {
        if p > v[best] {
            best = i;
        }
    }
    best
}
