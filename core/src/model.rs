//! Churn classifier: the trait seam plus the gradient-boosted tree ensemble
//! the training pipeline produces.
//!
//! The scorer only ever sees `dyn ChurnClassifier`; how the probability is
//! produced is opaque to it.

use crate::{
    error::{ScoreError, ScoreResult},
    features::FeatureVector,
    types::Probability,
};
use serde::{Deserialize, Serialize};

/// Bumped whenever the serialized layout of `BoostedTrees` changes.
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// The contract every churn classifier must fulfill.
pub trait ChurnClassifier: Send + Sync {
    /// Stable family name, logged as the `model` run param.
    fn name(&self) -> &str;

    /// Probability of the positive ("churn") class for one row.
    fn predict_probability(&self, row: &FeatureVector) -> Probability;
}

// ── Trees ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    /// Rows with `x[feature] < threshold` go left.
    Split {
        feature:   usize,
        threshold: f64,
        left:      usize,
        right:     usize,
    },
    Leaf {
        value: f64,
    },
}

/// A regression tree stored as a flat node list, root at index 0.
/// Children always sit at a higher index than their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split { feature, threshold, left, right } => {
                    idx = if row[*feature] < *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match &nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }
        if self.nodes.is_empty() { 0 } else { walk(&self.nodes, 0) }
    }

    /// Structural check run on every deserialized tree, so `predict`
    /// can index without bounds surprises or cycles.
    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Leaf { value } if !value.is_finite() => {
                    return Err(format!("node {idx}: leaf value is not finite"));
                }
                TreeNode::Leaf { .. } => {}
                TreeNode::Split { feature, threshold, left, right } => {
                    if *feature >= n_features {
                        return Err(format!("node {idx}: feature index {feature} out of range"));
                    }
                    if threshold.is_nan() {
                        return Err(format!("node {idx}: threshold is NaN"));
                    }
                    for child in [*left, *right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(format!("node {idx}: bad child index {child}"));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

// ── Ensemble ─────────────────────────────────────────────────────────────────

/// Hyperparameters of the boosted ensemble, persisted with the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoosterParams {
    pub n_estimators:     usize,
    pub max_depth:        usize,
    pub learning_rate:    f64,
    pub subsample:        f64,
    pub colsample_bytree: f64,
    /// L2 penalty on leaf weights.
    pub lambda:           f64,
    /// Minimum hessian mass on each side of a split.
    pub min_child_weight: f64,
    pub seed:             u64,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            n_estimators:     250,
            max_depth:        4,
            learning_rate:    0.05,
            subsample:        0.8,
            colsample_bytree: 0.8,
            lambda:           1.0,
            min_child_weight: 1.0,
            seed:             42,
        }
    }
}

/// Gradient-boosted trees with a binary logistic objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedTrees {
    pub format_version: u32,
    /// Column order the trees index into.
    pub feature_names:  Vec<String>,
    /// Log-odds of the training prior.
    pub base_score:     f64,
    pub params:         BoosterParams,
    pub trees:          Vec<RegressionTree>,
}

impl BoostedTrees {
    pub fn margin(&self, row: &[f64]) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }

    pub fn from_json(json: &str) -> ScoreResult<Self> {
        let model: Self = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    pub fn to_json(&self) -> ScoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> ScoreResult<()> {
        let invalid = |reason: String| ScoreError::artifact("churn model", reason);
        if self.format_version != MODEL_FORMAT_VERSION {
            return Err(invalid(format!(
                "format version {} is not supported (expected {MODEL_FORMAT_VERSION})",
                self.format_version
            )));
        }
        if !self.base_score.is_finite() {
            return Err(invalid("base score is not finite".into()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.feature_names.len())
                .map_err(|e| invalid(format!("tree {i}: {e}")))?;
        }
        Ok(())
    }
}

impl ChurnClassifier for BoostedTrees {
    fn name(&self) -> &str {
        "BoostedTrees"
    }

    fn predict_probability(&self, row: &FeatureVector) -> Probability {
        sigmoid(self.margin(row.as_slice()))
    }
}

pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

pub fn logit(p: f64) -> f64 {
    let p = p.clamp(1e-6, 1.0 - 1e-6);
    (p / (1.0 - p)).ln()
}
