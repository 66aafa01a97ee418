//! Feature vector builder.
//!
//! Turns a raw customer record (a JSON object or a CSV row) into the
//! fixed, ordered numeric row the classifier expects.
//!
//! Two coercion modes:
//!   - Strict (serving): a missing or non-numeric field is a validation error.
//!   - Lenient (batch): a missing or non-numeric cell becomes 0.

use crate::error::{ScoreError, ScoreResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ── Feature names ────────────────────────────────────────────────────────────

/// The closed set of features the scoring pipeline knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureName {
    AvgOrderValue,
    InvoiceCount,
    TotalQuantity,
    TenureDays,
}

impl FeatureName {
    /// Canonical training order.
    pub const ALL: [FeatureName; 4] = [
        FeatureName::AvgOrderValue,
        FeatureName::InvoiceCount,
        FeatureName::TotalQuantity,
        FeatureName::TenureDays,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AvgOrderValue => "avg_order_value",
            Self::InvoiceCount  => "invoice_count",
            Self::TotalQuantity => "total_quantity",
            Self::TenureDays    => "tenure_days",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }

    /// Integer-valued features reject fractional inputs in strict mode.
    pub fn is_integral(&self) -> bool {
        !matches!(self, Self::AvgOrderValue)
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Schema ───────────────────────────────────────────────────────────────────

/// An ordered feature list that has passed the schema assertion:
/// every name is known, none repeats, and all known features are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    columns: Vec<FeatureName>,
}

impl FeatureSchema {
    pub fn canonical() -> Self {
        Self { columns: FeatureName::ALL.to_vec() }
    }

    /// Validate a persisted feature list. Any deviation from the known
    /// field set is a schema mismatch, never silently tolerated.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> ScoreResult<Self> {
        let actual: Vec<String> = names.iter().map(|n| n.as_ref().to_string()).collect();
        let mismatch = || ScoreError::SchemaMismatch {
            expected: FeatureName::ALL.iter().map(|f| f.as_str().to_string()).collect(),
            actual:   actual.clone(),
        };

        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let feature = FeatureName::parse(name.as_ref()).ok_or_else(mismatch)?;
            if columns.contains(&feature) {
                return Err(mismatch());
            }
            columns.push(feature);
        }
        if columns.len() != FeatureName::ALL.len() {
            return Err(mismatch());
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[FeatureName] {
        &self.columns
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|f| f.as_str().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

// ── Customer record ──────────────────────────────────────────────────────────

/// A validated customer record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CustomerFeatures {
    pub avg_order_value: f64,
    pub invoice_count:   u64,
    pub total_quantity:  u64,
    pub tenure_days:     u64,
}

impl CustomerFeatures {
    /// Strictly validate a JSON record. Unknown keys are ignored.
    pub fn from_json(record: &Value) -> ScoreResult<Self> {
        let map = record
            .as_object()
            .ok_or_else(|| ScoreError::validation("record", "expected a JSON object"))?;
        Self::from_map(map)
    }

    pub fn from_map(map: &Map<String, Value>) -> ScoreResult<Self> {
        Ok(Self {
            avg_order_value: strict_value(map, FeatureName::AvgOrderValue)?,
            invoice_count:   strict_value(map, FeatureName::InvoiceCount)? as u64,
            total_quantity:  strict_value(map, FeatureName::TotalQuantity)? as u64,
            tenure_days:     strict_value(map, FeatureName::TenureDays)? as u64,
        })
    }

    pub fn get(&self, feature: FeatureName) -> f64 {
        match feature {
            FeatureName::AvgOrderValue => self.avg_order_value,
            FeatureName::InvoiceCount  => self.invoice_count as f64,
            FeatureName::TotalQuantity => self.total_quantity as f64,
            FeatureName::TenureDays    => self.tenure_days as f64,
        }
    }

    pub fn to_vector(&self, schema: &FeatureSchema) -> FeatureVector {
        FeatureVector(schema.columns().iter().map(|&f| self.get(f)).collect())
    }
}

/// 2^53. Above it f64 no longer holds every integer.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

fn strict_value(map: &Map<String, Value>, feature: FeatureName) -> ScoreResult<f64> {
    let field = feature.as_str();
    let raw = match map.get(field) {
        None | Some(Value::Null) => {
            return Err(ScoreError::validation(field, "required field is missing"));
        }
        Some(v) => v,
    };

    let value = match raw {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ScoreError::validation(field, format!("{n} is not representable")))?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ScoreError::validation(field, format!("'{s}' is not numeric")))?,
        other => {
            return Err(ScoreError::validation(field, format!("{other} is not numeric")));
        }
    };

    if !value.is_finite() {
        return Err(ScoreError::validation(field, "value must be finite"));
    }
    if value < 0.0 {
        return Err(ScoreError::validation(field, format!("{value} is negative")));
    }
    if feature.is_integral() && value.fract() != 0.0 {
        return Err(ScoreError::validation(field, format!("{value} is not an integer")));
    }
    if feature.is_integral() && value > MAX_EXACT_INTEGER {
        return Err(ScoreError::validation(field, format!("{value} exceeds {MAX_EXACT_INTEGER}")));
    }
    Ok(value)
}

/// Batch-mode coercion of a single CSV cell: anything unparsable or
/// non-finite becomes 0.
pub fn coerce_lenient(cell: Option<&str>) -> f64 {
    cell.and_then(|c| c.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

// ── Feature vector ───────────────────────────────────────────────────────────

/// A single model input row, columns in schema order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub Vec<f64>);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Validate a raw JSON record and lay it out in schema order.
pub fn build_feature_vector(record: &Value, schema: &FeatureSchema) -> ScoreResult<FeatureVector> {
    let customer = CustomerFeatures::from_json(record)?;
    Ok(customer.to_vector(schema))
}
