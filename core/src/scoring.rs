//! Churn scoring and the per-process scoring context.
//!
//! RULE: ScoringContext is built once at startup from a fully loaded
//! artifact bundle and handed to every request handler. It is never
//! mutated afterwards, so concurrent scoring needs no locks.
//!
//! Pipeline per request:
//!   record → FeatureVector → probability → ChurnScore → ClvResult → ValueSegment

use crate::{
    artifacts::{ModelArtifacts, Threshold},
    clv::{self, ClvResult},
    error::{ScoreError, ScoreResult},
    features::{build_feature_vector, CustomerFeatures, FeatureVector},
    metrics::classify,
    segment::ValueSegment,
    types::{Label, Probability},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{path::Path, sync::Arc};

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChurnScore {
    pub probability: Probability,
    pub prediction:  Label,
    /// Echoed for auditability.
    pub threshold:   f64,
}

/// Full scoring outcome for one customer and a raw CLV estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CustomerValuation {
    pub churn:   ChurnScore,
    pub clv:     ClvResult,
    pub segment: ValueSegment,
}

/// Apply the threshold to a classifier output. Probabilities are clamped
/// into [0, 1]; a non-finite output is a fault in the model, not the caller.
pub fn score_probability(raw: Probability, threshold: Threshold) -> ScoreResult<ChurnScore> {
    if !raw.is_finite() {
        return Err(ScoreError::Other(anyhow::anyhow!(
            "classifier returned non-finite probability {raw}"
        )));
    }
    let probability = raw.clamp(0.0, 1.0);
    Ok(ChurnScore {
        probability,
        prediction: classify(probability, threshold.value()),
        threshold:  threshold.value(),
    })
}

// ── Context ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ScoringContext {
    artifacts: Arc<ModelArtifacts>,
}

impl ScoringContext {
    pub fn new(artifacts: ModelArtifacts) -> Self {
        Self { artifacts: Arc::new(artifacts) }
    }

    /// Load the artifact bundle from `dir`. Any failure here must stop the
    /// process from serving.
    pub fn load(dir: impl AsRef<Path>) -> ScoreResult<Self> {
        Ok(Self::new(ModelArtifacts::load(dir)?))
    }

    pub fn artifacts(&self) -> &ModelArtifacts {
        &self.artifacts
    }

    pub fn threshold(&self) -> Threshold {
        self.artifacts.threshold()
    }

    pub fn score_vector(&self, vector: &FeatureVector) -> ScoreResult<ChurnScore> {
        let raw = self.artifacts.classifier().predict_probability(vector);
        score_probability(raw, self.artifacts.threshold())
    }

    pub fn score_customer(&self, customer: &CustomerFeatures) -> ScoreResult<ChurnScore> {
        self.score_vector(&customer.to_vector(self.artifacts.schema()))
    }

    /// Validate a raw JSON record and score it.
    pub fn predict_churn(&self, record: &Value) -> ScoreResult<ChurnScore> {
        let vector = build_feature_vector(record, self.artifacts.schema())?;
        self.score_vector(&vector)
    }

    /// Validate inputs, score churn, and risk-adjust the caller's raw CLV.
    /// Nothing is computed unless both the record and raw CLV are valid.
    pub fn predict_clv(&self, record: &Value, raw_clv: f64) -> ScoreResult<ClvResult> {
        clv::validate_raw_clv(raw_clv)?;
        let score = self.predict_churn(record)?;
        clv::adjust(raw_clv, &score)
    }

    pub fn value_customer(&self, record: &Value, raw_clv: f64) -> ScoreResult<CustomerValuation> {
        clv::validate_raw_clv(raw_clv)?;
        let churn = self.predict_churn(record)?;
        let clv = clv::adjust(raw_clv, &churn)?;
        Ok(CustomerValuation { churn, clv, segment: clv.segment() })
    }
}
