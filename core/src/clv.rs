//! Risk adjustment of customer lifetime value.

use crate::{
    error::{ScoreError, ScoreResult},
    scoring::ChurnScore,
    segment::{segment_for, ValueSegment},
    types::Probability,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClvResult {
    pub raw_clv:           f64,
    pub churn_probability: Probability,
    pub final_clv:         f64,
}

impl ClvResult {
    pub fn segment(&self) -> ValueSegment {
        segment_for(self.final_clv)
    }
}

/// Reject anything that is not a finite, non-negative amount.
pub fn validate_raw_clv(raw_clv: f64) -> ScoreResult<f64> {
    if !raw_clv.is_finite() {
        return Err(ScoreError::validation("raw_clv", "value must be finite"));
    }
    if raw_clv < 0.0 {
        return Err(ScoreError::validation("raw_clv", format!("{raw_clv} is negative")));
    }
    Ok(raw_clv)
}

/// Expected value discounted by churn risk. With probability in [0, 1]
/// the result always lies in [0, raw_clv].
pub fn risk_adjusted(raw_clv: f64, probability: Probability) -> f64 {
    raw_clv * (1.0 - probability)
}

pub fn adjust(raw_clv: f64, score: &ChurnScore) -> ScoreResult<ClvResult> {
    let raw_clv = validate_raw_clv(raw_clv)?;
    Ok(ClvResult {
        raw_clv,
        churn_probability: score.probability,
        final_clv:         risk_adjusted(raw_clv, score.probability),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_probabilities() {
        assert_eq!(risk_adjusted(500.0, 0.0), 500.0);
        assert_eq!(risk_adjusted(500.0, 1.0), 0.0);
        assert_eq!(risk_adjusted(0.0, 0.73), 0.0);
    }

    #[test]
    fn rejects_negative_and_non_finite_raw_clv() {
        assert!(validate_raw_clv(-1.0).unwrap_err().is_validation());
        assert!(validate_raw_clv(f64::NAN).unwrap_err().is_validation());
        assert!(validate_raw_clv(f64::INFINITY).unwrap_err().is_validation());
        assert_eq!(validate_raw_clv(0.0).unwrap(), 0.0);
    }
}
