//! Classification metrics for held-out evaluation.

use crate::types::{Label, Probability};
use serde::{Deserialize, Serialize};

/// Apply the decision rule: churn iff probability >= threshold.
pub fn classify(probability: Probability, threshold: f64) -> Label {
    u8::from(probability >= threshold)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positive:  usize,
    pub false_positive: usize,
    pub true_negative:  usize,
    pub false_negative: usize,
}

impl ConfusionMatrix {
    pub fn at_threshold(labels: &[Label], probabilities: &[Probability], threshold: f64) -> Self {
        let mut m = Self::default();
        for (&y, &p) in labels.iter().zip(probabilities) {
            match (y, classify(p, threshold)) {
                (1, 1) => m.true_positive += 1,
                (0, 1) => m.false_positive += 1,
                (1, _) => m.false_negative += 1,
                _      => m.true_negative += 1,
            }
        }
        m
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positive + self.true_negative, self.total())
    }

    /// 0 when there are no actual positives.
    pub fn recall(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    /// 0 when nothing was predicted positive.
    pub fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

/// Metrics at one decision threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdMetrics {
    pub threshold: f64,
    pub accuracy:  f64,
    pub recall:    f64,
    pub precision: f64,
}

impl ThresholdMetrics {
    pub fn evaluate(labels: &[Label], probabilities: &[Probability], threshold: f64) -> Self {
        let m = ConfusionMatrix::at_threshold(labels, probabilities, threshold);
        Self {
            threshold,
            accuracy:  m.accuracy(),
            recall:    m.recall(),
            precision: m.precision(),
        }
    }
}

/// Area under the ROC curve via the rank-sum (Mann–Whitney) formulation,
/// averaging ranks over tied scores. `None` when only one class is present.
pub fn roc_auc(labels: &[Label], probabilities: &[Probability]) -> Option<f64> {
    let n = labels.len().min(probabilities.len());
    let n_pos = labels[..n].iter().filter(|&&y| y == 1).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| probabilities[a].total_cmp(&probabilities[b]));

    let mut rank_sum_pos = 0.0;
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && probabilities[order[end]] == probabilities[order[start]] {
            end += 1;
        }
        // Ranks are 1-based; tied block [start, end) shares the mean rank.
        let mean_rank = (start + 1 + end) as f64 / 2.0;
        let pos_in_block = order[start..end].iter().filter(|&&i| labels[i] == 1).count();
        rank_sum_pos += mean_rank * pos_in_block as f64;
        start = end;
    }

    let u = rank_sum_pos - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Some(u / (n_pos * n_neg) as f64)
}
