//! Training pipeline: fits the churn classifier and persists the bundle.
//!
//! Steps:
//!   1. Assert the configured feature list against the known schema.
//!   2. Stratified train/test split from the seeded Split stream.
//!   3. Fit boosted trees on the train split.
//!   4. Evaluate on the test split at 0.50 and at the tuned threshold.
//!   5. Log params and metrics to the experiment store.
//!   6. Save the artifact bundle and record its paths on the run.
//!
//! A failure after the run has started marks the run `failed`.

use crate::{
    artifacts::{save_bundle, BundleManifest, Threshold},
    booster,
    config::PipelineConfig,
    dataset::TrainingSet,
    error::{ScoreError, ScoreResult},
    features::{FeatureSchema, FeatureVector},
    metrics::{roc_auc, ThresholdMetrics},
    model::{BoostedTrees, ChurnClassifier},
    rng::{RngBank, StageSlot},
    store::{ExperimentStore, RunStatus},
    types::{Label, RunId},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The naive midpoint the tuned threshold is compared against.
pub const NAIVE_THRESHOLD: f64 = 0.50;

// ── Split ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test:  Vec<usize>,
}

/// Stratified split: each class contributes round(n_class × test_size)
/// rows to the test side, so both sides keep the overall churn rate.
pub fn stratified_split(labels: &[Label], test_size: f64, seed: u64) -> ScoreResult<SplitIndices> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ScoreError::Training(format!("test_size {test_size} must be in (0, 1)")));
    }

    let mut rng = RngBank::new(seed).for_stage(StageSlot::Split);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for class in [0u8, 1u8] {
        let mut members: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        if members.is_empty() {
            continue;
        }
        if members.len() < 2 {
            return Err(ScoreError::Training(format!(
                "class {class} has a single member; stratified split needs at least 2"
            )));
        }
        rng.shuffle(&mut members);
        let n_test = ((members.len() as f64 * test_size).round() as usize).clamp(1, members.len() - 1);
        test.extend_from_slice(&members[..n_test]);
        train.extend_from_slice(&members[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(SplitIndices { train, test })
}

// ── Report ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub roc_auc: Option<f64>,
    pub naive:   ThresholdMetrics,
    pub tuned:   ThresholdMetrics,
}

impl EvaluationReport {
    pub fn evaluate(labels: &[Label], probabilities: &[f64], tuned_threshold: f64) -> Self {
        Self {
            roc_auc: roc_auc(labels, probabilities),
            naive:   ThresholdMetrics::evaluate(labels, probabilities, NAIVE_THRESHOLD),
            tuned:   ThresholdMetrics::evaluate(labels, probabilities, tuned_threshold),
        }
    }

    /// Metric names as they are logged to the store.
    pub fn as_metrics(&self) -> Vec<(&'static str, f64)> {
        let mut out = Vec::with_capacity(7);
        if let Some(auc) = self.roc_auc {
            out.push(("roc_auc", auc));
        }
        out.extend([
            ("accuracy_0_50",   self.naive.accuracy),
            ("recall_0_50",     self.naive.recall),
            ("precision_0_50",  self.naive.precision),
            ("accuracy_tuned",  self.tuned.accuracy),
            ("recall_tuned",    self.tuned.recall),
            ("precision_tuned", self.tuned.precision),
        ]);
        out
    }
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub run_id:     RunId,
    pub model:      BoostedTrees,
    pub report:     EvaluationReport,
    pub train_rows: usize,
    pub test_rows:  usize,
    pub artifacts:  Vec<PathBuf>,
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

pub struct TrainingPipeline<'a> {
    config: &'a PipelineConfig,
    store:  &'a ExperimentStore,
}

impl<'a> TrainingPipeline<'a> {
    pub fn new(config: &'a PipelineConfig, store: &'a ExperimentStore) -> Self {
        Self { config, store }
    }

    /// Train from the model-input CSV named in the config.
    pub fn run_from_disk(&self) -> ScoreResult<TrainingOutcome> {
        let data = TrainingSet::load(&self.config.paths.model_input_csv, &self.config.model)?;
        self.run(&data)
    }

    pub fn run(&self, data: &TrainingSet) -> ScoreResult<TrainingOutcome> {
        let schema = FeatureSchema::from_names(&self.config.model.features)?;
        let threshold = Threshold::new(self.config.model.threshold).ok_or_else(|| {
            ScoreError::Training(format!(
                "threshold {} is outside [0, 1]", self.config.model.threshold
            ))
        })?;
        if data.feature_names != schema.names() {
            return Err(ScoreError::SchemaMismatch {
                expected: schema.names(),
                actual:   data.feature_names.clone(),
            });
        }

        let training = &self.config.training;
        let run_id = self.store.start_run(&training.experiment, &training.run_name)?;

        match self.fit_and_persist(&run_id, data, threshold) {
            Ok(outcome) => {
                self.store.finish_run(&run_id, RunStatus::Finished)?;
                log::info!(
                    "train: run {run_id} finished: auc={} recall_tuned={:.3} precision_tuned={:.3}",
                    outcome.report.roc_auc.map_or("n/a".to_string(), |a| format!("{a:.3}")),
                    outcome.report.tuned.recall,
                    outcome.report.tuned.precision,
                );
                Ok(outcome)
            }
            Err(e) => {
                log::warn!("train: run {run_id} failed: {e}");
                self.store.finish_run(&run_id, RunStatus::Failed)?;
                Err(e)
            }
        }
    }

    fn fit_and_persist(
        &self,
        run_id: &str,
        data: &TrainingSet,
        threshold: Threshold,
    ) -> ScoreResult<TrainingOutcome> {
        let training = &self.config.training;
        let params = &training.booster;

        let split = stratified_split(&data.labels, training.test_size, params.seed)?;
        let (train_rows, train_labels) = gather(data, &split.train);
        let (test_rows, test_labels) = gather(data, &split.test);
        log::info!(
            "train: {} rows ({} churners) → train={} test={}",
            data.len(), data.positives(), train_rows.len(), test_rows.len()
        );

        let model = booster::fit(&train_rows, &train_labels, &data.feature_names, params)?;

        let probabilities: Vec<f64> = test_rows
            .iter()
            .map(|row| model.predict_probability(&FeatureVector(row.clone())))
            .collect();
        let report = EvaluationReport::evaluate(&test_labels, &probabilities, threshold.value());

        self.store.log_param(run_id, "model", model.name())?;
        self.store.log_param(run_id, "features", &data.feature_names.join(","))?;
        self.store.log_param(run_id, "threshold_tuned", &threshold.value().to_string())?;
        self.store.log_param(run_id, "n_estimators", &params.n_estimators.to_string())?;
        self.store.log_param(run_id, "max_depth", &params.max_depth.to_string())?;
        self.store.log_param(run_id, "learning_rate", &params.learning_rate.to_string())?;
        self.store.log_param(run_id, "subsample", &params.subsample.to_string())?;
        self.store.log_param(run_id, "colsample_bytree", &params.colsample_bytree.to_string())?;
        self.store.log_param(run_id, "seed", &params.seed.to_string())?;
        self.store.log_param(run_id, "test_size", &training.test_size.to_string())?;

        for (key, value) in report.as_metrics() {
            self.store.log_metric(run_id, key, value)?;
        }
        if report.roc_auc.is_none() {
            log::warn!("train: test split has a single class; roc_auc not logged");
        }

        let manifest = BundleManifest {
            run_id:     run_id.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            model:      model.name().to_string(),
        };
        let artifacts = save_bundle(&self.config.paths.model_dir, &model, threshold, Some(&manifest))?;
        for path in &artifacts {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.store.log_artifact(run_id, &name, &path.display().to_string())?;
        }

        Ok(TrainingOutcome {
            run_id: run_id.to_string(),
            model,
            report,
            train_rows: split.train.len(),
            test_rows:  split.test.len(),
            artifacts,
        })
    }
}

fn gather(data: &TrainingSet, idx: &[usize]) -> (Vec<Vec<f64>>, Vec<Label>) {
    idx.iter().map(|&i| (data.rows[i].clone(), data.labels[i])).unzip()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_preserves_class_balance() {
        let labels: Vec<Label> = (0..100).map(|i| u8::from(i % 4 == 0)).collect();
        let split = stratified_split(&labels, 0.2, 42).unwrap();

        assert_eq!(split.train.len() + split.test.len(), 100);
        assert_eq!(split.test.len(), 20);
        let test_pos = split.test.iter().filter(|&&i| labels[i] == 1).count();
        assert_eq!(test_pos, 5);

        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn split_is_seeded() {
        let labels: Vec<Label> = (0..40).map(|i| u8::from(i % 3 == 0)).collect();
        assert_eq!(stratified_split(&labels, 0.25, 7).unwrap(), stratified_split(&labels, 0.25, 7).unwrap());
        assert_ne!(stratified_split(&labels, 0.25, 7).unwrap(), stratified_split(&labels, 0.25, 8).unwrap());
    }

    #[test]
    fn split_rejects_bad_inputs() {
        assert!(stratified_split(&[0, 0, 1, 1], 0.0, 1).is_err());
        assert!(stratified_split(&[0, 0, 0, 1], 0.5, 1).is_err());
    }
}
