//! Value segmentation of risk-adjusted CLV.
//!
//! RULE: The breakpoints below are the only copy in the workspace.
//! Batch labeling and interactive scoring both go through `segment_for`,
//! so offline reports and online responses can never disagree.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound (inclusive) of the Low band.
pub const LOW_VALUE_CEILING: f64 = 100.0;

/// Upper bound (inclusive) of the Mid band. Anything above is High.
pub const MID_VALUE_CEILING: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ValueSegment {
    #[serde(rename = "Low Value")]
    Low,
    #[serde(rename = "Mid Value")]
    Mid,
    #[serde(rename = "High Value")]
    High,
}

impl ValueSegment {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low  => "Low Value",
            Self::Mid  => "Mid Value",
            Self::High => "High Value",
        }
    }
}

impl fmt::Display for ValueSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// Bucket a risk-adjusted CLV. Total over every f64: NaN carries no value
/// and lands in Low.
pub fn segment_for(final_clv: f64) -> ValueSegment {
    if final_clv.is_nan() || final_clv <= LOW_VALUE_CEILING {
        ValueSegment::Low
    } else if final_clv <= MID_VALUE_CEILING {
        ValueSegment::Mid
    } else {
        ValueSegment::High
    }
}
