//! Gradient boosting fit for the binary logistic objective.
//!
//! Each round:
//!   1. Compute gradient g = p − y and hessian h = p(1 − p) at the current margin.
//!   2. Draw a row subsample and a column subsample from the seeded streams.
//!   3. Grow one tree greedily on (g, h) up to max_depth.
//!   4. Add the shrunken tree to the ensemble and update margins for all rows.

use crate::{
    error::{ScoreError, ScoreResult},
    model::{logit, sigmoid, BoostedTrees, BoosterParams, RegressionTree, TreeNode, MODEL_FORMAT_VERSION},
    rng::{RngBank, StageRng, StageSlot},
    types::Label,
};

/// Fit a boosted ensemble on row-major `rows` with binary `labels`.
pub fn fit(
    rows: &[Vec<f64>],
    labels: &[Label],
    feature_names: &[String],
    params: &BoosterParams,
) -> ScoreResult<BoostedTrees> {
    validate_inputs(rows, labels, feature_names, params)?;

    let n_rows = rows.len();
    let n_features = feature_names.len();

    let positives = labels.iter().filter(|&&y| y == 1).count();
    let base_score = logit(positives as f64 / n_rows as f64);

    let bank = RngBank::new(params.seed);
    let mut row_rng = bank.for_stage(StageSlot::RowSample);
    let mut col_rng = bank.for_stage(StageSlot::ColumnSample);

    let rows_per_tree = fraction_of(n_rows, params.subsample);
    let cols_per_tree = fraction_of(n_features, params.colsample_bytree);

    let mut margins = vec![base_score; n_rows];
    let mut grad = vec![0.0; n_rows];
    let mut hess = vec![0.0; n_rows];
    let mut trees = Vec::with_capacity(params.n_estimators);

    for round in 0..params.n_estimators {
        for i in 0..n_rows {
            let p = sigmoid(margins[i]);
            grad[i] = p - f64::from(labels[i]);
            hess[i] = p * (1.0 - p);
        }

        let sample = sample_rows(&mut row_rng, n_rows, rows_per_tree);
        let columns = col_rng.sample_indices(n_features, cols_per_tree);

        let builder = TreeBuilder { rows, grad: &grad, hess: &hess, columns: &columns, params };
        let tree = builder.build(sample);

        for (i, row) in rows.iter().enumerate() {
            margins[i] += tree.predict(row);
        }
        trees.push(tree);

        if (round + 1) % 50 == 0 {
            log::debug!("booster: {} / {} trees grown", round + 1, params.n_estimators);
        }
    }

    Ok(BoostedTrees {
        format_version: MODEL_FORMAT_VERSION,
        feature_names:  feature_names.to_vec(),
        base_score,
        params:         params.clone(),
        trees,
    })
}

fn validate_inputs(
    rows: &[Vec<f64>],
    labels: &[Label],
    feature_names: &[String],
    params: &BoosterParams,
) -> ScoreResult<()> {
    if rows.is_empty() {
        return Err(ScoreError::Training("no training rows".into()));
    }
    if rows.len() != labels.len() {
        return Err(ScoreError::Training(format!(
            "{} rows but {} labels", rows.len(), labels.len()
        )));
    }
    if feature_names.is_empty() {
        return Err(ScoreError::Training("no features".into()));
    }
    if let Some(i) = rows.iter().position(|r| r.len() != feature_names.len()) {
        return Err(ScoreError::Training(format!(
            "row {i} has {} columns, expected {}", rows[i].len(), feature_names.len()
        )));
    }
    if rows.iter().flatten().any(|v| !v.is_finite()) {
        return Err(ScoreError::Training("feature values must be finite".into()));
    }
    if labels.iter().any(|&y| y > 1) {
        return Err(ScoreError::Training("labels must be 0 or 1".into()));
    }
    if !(params.learning_rate > 0.0) {
        return Err(ScoreError::Training("learning_rate must be positive".into()));
    }
    for (name, frac) in [("subsample", params.subsample), ("colsample_bytree", params.colsample_bytree)] {
        if !(frac > 0.0 && frac <= 1.0) {
            return Err(ScoreError::Training(format!("{name} must be in (0, 1]")));
        }
    }
    if params.lambda < 0.0 || params.min_child_weight < 0.0 {
        return Err(ScoreError::Training("regularization terms must be non-negative".into()));
    }
    Ok(())
}

/// At least one element, at most `n`.
fn fraction_of(n: usize, fraction: f64) -> usize {
    ((n as f64 * fraction).round() as usize).clamp(1, n)
}

fn sample_rows(rng: &mut StageRng, n: usize, k: usize) -> Vec<usize> {
    if k >= n {
        (0..n).collect()
    } else {
        rng.sample_indices(n, k)
    }
}

// ── Tree growth ──────────────────────────────────────────────────────────────

struct TreeBuilder<'a> {
    rows:    &'a [Vec<f64>],
    grad:    &'a [f64],
    hess:    &'a [f64],
    columns: &'a [usize],
    params:  &'a BoosterParams,
}

struct SplitCandidate {
    feature:   usize,
    threshold: f64,
    gain:      f64,
}

impl TreeBuilder<'_> {
    fn build(&self, sample: Vec<usize>) -> RegressionTree {
        let mut nodes = Vec::new();
        self.grow(&mut nodes, sample, 0);
        RegressionTree { nodes }
    }

    /// Appends the subtree for `idx` in pre-order and returns its root index.
    fn grow(&self, nodes: &mut Vec<TreeNode>, idx: Vec<usize>, depth: usize) -> usize {
        let (g, h) = self.sums(&idx);
        let here = nodes.len();
        nodes.push(TreeNode::Leaf { value: self.leaf_value(g, h) });

        if depth >= self.params.max_depth || idx.len() < 2 {
            return here;
        }
        let Some(split) = self.best_split(&idx, g, h) else {
            return here;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = idx
            .into_iter()
            .partition(|&i| self.rows[i][split.feature] < split.threshold);

        let left = self.grow(nodes, left_idx, depth + 1);
        let right = self.grow(nodes, right_idx, depth + 1);
        nodes[here] = TreeNode::Split {
            feature:   split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        here
    }

    fn sums(&self, idx: &[usize]) -> (f64, f64) {
        idx.iter().fold((0.0, 0.0), |(g, h), &i| (g + self.grad[i], h + self.hess[i]))
    }

    fn leaf_value(&self, g: f64, h: f64) -> f64 {
        -g / (h + self.params.lambda) * self.params.learning_rate
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.params.lambda)
    }

    fn best_split(&self, idx: &[usize], g_total: f64, h_total: f64) -> Option<SplitCandidate> {
        let parent = self.score(g_total, h_total);
        let mut best: Option<SplitCandidate> = None;

        for &feature in self.columns {
            let mut order = idx.to_vec();
            order.sort_by(|&a, &b| self.rows[a][feature].total_cmp(&self.rows[b][feature]));

            let (mut g_left, mut h_left) = (0.0, 0.0);
            for pos in 0..order.len() - 1 {
                let i = order[pos];
                g_left += self.grad[i];
                h_left += self.hess[i];

                let here = self.rows[i][feature];
                let next = self.rows[order[pos + 1]][feature];
                if here == next {
                    continue;
                }

                let (g_right, h_right) = (g_total - g_left, h_total - h_left);
                if h_left < self.params.min_child_weight || h_right < self.params.min_child_weight {
                    continue;
                }

                let gain = self.score(g_left, h_left) + self.score(g_right, h_right) - parent;
                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: here + (next - here) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }
}
