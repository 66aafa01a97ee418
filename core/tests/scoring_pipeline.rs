use churn_clv_core::{
    artifacts::{ModelArtifacts, Threshold},
    error::ScoreError,
    features::{FeatureSchema, FeatureVector},
    model::ChurnClassifier,
    scoring::ScoringContext,
    segment::ValueSegment,
};
use serde_json::{json, Value};
use std::sync::Arc;

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Returns the same probability for every row.
struct FixedClassifier(f64);

impl ChurnClassifier for FixedClassifier {
    fn name(&self) -> &str {
        "Fixed"
    }

    fn predict_probability(&self, _row: &FeatureVector) -> f64 {
        self.0
    }
}

fn context_with(probability: f64, threshold: f64) -> ScoringContext {
    ScoringContext::new(ModelArtifacts::new(
        Arc::new(FixedClassifier(probability)),
        FeatureSchema::canonical(),
        Threshold::new(threshold).unwrap(),
    ))
}

fn reference_customer() -> Value {
    json!({
        "avg_order_value": 350.0,
        "invoice_count": 6,
        "total_quantity": 40,
        "tenure_days": 180
    })
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// p=0.42 at threshold 0.30 on raw CLV 500: churn predicted, 290 retained, Mid.
#[test]
fn reference_customer_is_scored_end_to_end() {
    let ctx = context_with(0.42, 0.30);

    let valuation = ctx.value_customer(&reference_customer(), 500.0).unwrap();

    assert_eq!(valuation.churn.prediction, 1);
    assert_eq!(valuation.churn.threshold, 0.30);
    assert!((valuation.churn.probability - 0.42).abs() < 1e-12);
    assert!((valuation.clv.final_clv - 290.0).abs() < 1e-9, "final_clv={}", valuation.clv.final_clv);
    assert_eq!(valuation.segment, ValueSegment::Mid);
}

/// The decision is inclusive: probability equal to the threshold is churn.
#[test]
fn probability_at_threshold_is_churn() {
    assert_eq!(context_with(0.30, 0.30).predict_churn(&reference_customer()).unwrap().prediction, 1);
    assert_eq!(context_with(0.2999, 0.30).predict_churn(&reference_customer()).unwrap().prediction, 0);
}

/// Threshold 0 flags everyone, threshold 1 flags only certainty.
#[test]
fn extreme_thresholds() {
    assert_eq!(context_with(0.0, 0.0).predict_churn(&reference_customer()).unwrap().prediction, 1);
    assert_eq!(context_with(0.99, 1.0).predict_churn(&reference_customer()).unwrap().prediction, 0);
    assert_eq!(context_with(1.0, 1.0).predict_churn(&reference_customer()).unwrap().prediction, 1);
}

/// Scoring the same record twice against the same context gives identical output.
#[test]
fn scoring_is_idempotent() {
    let ctx = context_with(0.17, 0.30);
    let a = ctx.value_customer(&reference_customer(), 1234.5).unwrap();
    let b = ctx.value_customer(&reference_customer(), 1234.5).unwrap();
    assert_eq!(a, b);
}

/// A record without tenure_days is rejected and names the field.
#[test]
fn missing_feature_is_a_validation_error() {
    let ctx = context_with(0.42, 0.30);
    let mut record = reference_customer();
    record.as_object_mut().unwrap().remove("tenure_days");

    match ctx.predict_churn(&record) {
        Err(ScoreError::Validation { field, .. }) => assert_eq!(field, "tenure_days"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

/// Negative raw CLV is rejected before any scoring happens.
#[test]
fn negative_raw_clv_is_rejected() {
    let ctx = context_with(0.42, 0.30);
    let err = ctx.predict_clv(&reference_customer(), -10.0).unwrap_err();
    assert!(err.is_validation());
}

/// Zero raw CLV is valid and always lands in Low.
#[test]
fn zero_raw_clv_is_low_value() {
    let ctx = context_with(0.05, 0.30);
    let clv = ctx.predict_clv(&reference_customer(), 0.0).unwrap();
    assert_eq!(clv.final_clv, 0.0);
    assert_eq!(clv.segment(), ValueSegment::Low);
}

/// Certain churn wipes out all value; zero churn keeps all of it.
#[test]
fn probability_extremes_bound_final_clv() {
    let lost = context_with(1.0, 0.30).predict_clv(&reference_customer(), 5000.0).unwrap();
    assert_eq!(lost.final_clv, 0.0);
    let kept = context_with(0.0, 0.30).predict_clv(&reference_customer(), 5000.0).unwrap();
    assert_eq!(kept.final_clv, 5000.0);
    assert_eq!(kept.segment(), ValueSegment::High);
}

/// A classifier that strays outside [0, 1] is clamped rather than leaking.
#[test]
fn out_of_range_classifier_output_is_clamped() {
    let ctx = context_with(1.3, 0.30);
    let clv = ctx.predict_clv(&reference_customer(), 100.0).unwrap();
    assert_eq!(clv.churn_probability, 1.0);
    assert_eq!(clv.final_clv, 0.0);
}

/// Extra keys on the record do not affect the result.
#[test]
fn unknown_keys_are_ignored() {
    let ctx = context_with(0.42, 0.30);
    let mut record = reference_customer();
    record["country"] = json!("United Kingdom");
    record["total_revenue"] = json!(9999.0);
    assert_eq!(
        ctx.predict_churn(&record).unwrap(),
        ctx.predict_churn(&reference_customer()).unwrap()
    );
}

/// A context can be cloned across threads and shares the same bundle.
#[test]
fn context_is_shared_across_threads() {
    let ctx = context_with(0.42, 0.30);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ctx = ctx.clone();
            std::thread::spawn(move || ctx.predict_clv(&reference_customer(), 500.0).unwrap())
        })
        .collect();
    for h in handles {
        assert!((h.join().unwrap().final_clv - 290.0).abs() < 1e-9);
    }
}
