//! Batch CLV labeling over the churn-ready customer table.
//!
//! Raw CLV here is the customer's historical revenue column, not a caller
//! estimate as in interactive scoring. The two are not guaranteed to agree.

use crate::{
    clv::risk_adjusted,
    dataset::Table,
    error::ScoreResult,
    features::FeatureVector,
    scoring::ScoringContext,
    segment::{segment_for, ValueSegment},
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};

pub const APPENDED_COLUMNS: [&str; 4] = ["churn_probability", "raw_clv", "final_clv", "clv_segment"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledRow {
    pub churn_probability: f64,
    pub raw_clv:           f64,
    pub final_clv:         f64,
    pub clv_segment:       ValueSegment,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelingSummary {
    pub rows:            usize,
    pub segment_counts:  BTreeMap<ValueSegment, usize>,
    pub total_raw_clv:   f64,
    pub total_final_clv: f64,
}

impl LabelingSummary {
    fn record(&mut self, row: &LabeledRow) {
        self.rows += 1;
        *self.segment_counts.entry(row.clv_segment).or_insert(0) += 1;
        self.total_raw_clv += row.raw_clv;
        self.total_final_clv += row.final_clv;
    }
}

/// Score every row of `table`. Features and revenue are coerced leniently.
pub fn label_table(
    table: &Table,
    context: &ScoringContext,
    revenue_column: &str,
) -> ScoreResult<Vec<LabeledRow>> {
    let schema = context.artifacts().schema();
    let mut required: Vec<&str> = schema.columns().iter().map(|f| f.as_str()).collect();
    required.push(revenue_column);
    let columns = table.require_columns(&required)?;
    let (feature_cols, revenue_col) = columns.split_at(schema.len());
    let revenue_col = revenue_col[0];

    let mut out = Vec::with_capacity(table.len());
    for record in &table.records {
        let vector = FeatureVector(feature_cols.iter().map(|&c| table.numeric(record, c)).collect());
        let score = context.score_vector(&vector)?;
        // Negative revenue (refund-heavy customers) carries no positive value.
        let raw_clv = table.numeric(record, revenue_col).max(0.0);
        let final_clv = risk_adjusted(raw_clv, score.probability);
        out.push(LabeledRow {
            churn_probability: score.probability,
            raw_clv,
            final_clv,
            clv_segment: segment_for(final_clv),
        });
    }
    Ok(out)
}

/// Read `input`, label it, and write `output` with the original columns
/// followed by the appended CLV columns.
pub fn label_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    context: &ScoringContext,
    revenue_column: &str,
) -> ScoreResult<LabelingSummary> {
    let table = Table::read(input)?;
    let labeled = label_table(&table, context, revenue_column)?;

    let output = output.as_ref();
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::WriterBuilder::new().flexible(true).from_path(output)?;

    let mut header = table.headers.clone();
    header.extend(APPENDED_COLUMNS.iter().map(|c| c.to_string()));
    writer.write_record(&header)?;

    let mut summary = LabelingSummary::default();
    for (record, row) in table.records.iter().zip(&labeled) {
        let mut fields: Vec<String> = record.iter().map(str::to_string).collect();
        fields.push(row.churn_probability.to_string());
        fields.push(row.raw_clv.to_string());
        fields.push(row.final_clv.to_string());
        fields.push(row.clv_segment.label().to_string());
        writer.write_record(&fields)?;
        summary.record(row);
    }
    writer.flush()?;

    log::info!(
        "label: wrote {} rows to {} (low={} mid={} high={})",
        summary.rows,
        output.display(),
        summary.segment_counts.get(&ValueSegment::Low).copied().unwrap_or(0),
        summary.segment_counts.get(&ValueSegment::Mid).copied().unwrap_or(0),
        summary.segment_counts.get(&ValueSegment::High).copied().unwrap_or(0),
    );
    Ok(summary)
}
