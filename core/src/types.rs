//! Shared primitive types used across the scoring pipeline.

/// Identifier of a tracked training run (uuid v4, hyphenated).
pub type RunId = String;

/// Customer identifier as it appears in the source CSV.
pub type CustomerId = String;

/// Binary class label. 1 = churned, 0 = retained.
pub type Label = u8;

/// A churn probability. Always in [0.0, 1.0] once it leaves the scorer.
pub type Probability = f64;
