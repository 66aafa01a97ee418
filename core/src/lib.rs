//! Churn scoring and risk-adjusted customer lifetime value.
//!
//! Serving path:
//!   artifacts::ModelArtifacts → scoring::ScoringContext
//!     → features (validate + order) → churn probability + decision
//!     → clv (risk adjustment) → segment (Low / Mid / High)
//!
//! Offline path:
//!   dataset (prepare) → training (fit, evaluate, track) → artifacts (save)
//!   labeling (batch CLV over the customer table)

pub mod artifacts;
pub mod booster;
pub mod clv;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod labeling;
pub mod metrics;
pub mod model;
pub mod presets;
pub mod rng;
pub mod scoring;
pub mod segment;
pub mod service;
pub mod store;
pub mod training;
pub mod types;
