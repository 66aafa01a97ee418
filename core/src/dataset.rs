//! CSV datasets for training preparation and batch labeling.
//!
//! All batch paths use lenient coercion: a cell that does not parse as a
//! number becomes 0 rather than failing the whole file.

use crate::{
    config::ModelConfig,
    error::{ScoreError, ScoreResult},
    features::coerce_lenient,
    types::{CustomerId, Label},
};
use std::path::Path;

/// A CSV file held in memory with its header row.
#[derive(Debug, Clone)]
pub struct Table {
    pub headers: Vec<String>,
    pub records: Vec<csv::StringRecord>,
}

impl Table {
    pub fn read(path: impl AsRef<Path>) -> ScoreResult<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut records = reader.records().collect::<Result<Vec<_>, _>>()?;

        // Every record has exactly one cell per header: short rows are
        // padded with empty cells, long rows are rejected.
        for (i, record) in records.iter_mut().enumerate() {
            if record.len() > headers.len() {
                return Err(ScoreError::Other(anyhow::anyhow!(
                    "{}: data row {} has {} fields but the header has {}",
                    path.display(), i + 1, record.len(), headers.len()
                )));
            }
            while record.len() < headers.len() {
                record.push_field("");
            }
        }
        log::debug!("dataset: read {} rows from {}", records.len(), path.display());
        Ok(Self { headers, records })
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Resolve every name to a column index, reporting all missing names at once.
    pub fn require_columns<S: AsRef<str>>(&self, names: &[S]) -> ScoreResult<Vec<usize>> {
        let missing: Vec<String> = names
            .iter()
            .map(|n| n.as_ref())
            .filter(|n| self.column(n).is_none())
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(ScoreError::MissingColumns { missing });
        }
        Ok(names.iter().filter_map(|n| self.column(n.as_ref())).collect())
    }

    pub fn numeric(&self, record: &csv::StringRecord, column: usize) -> f64 {
        coerce_lenient(record.get(column))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Feature rows plus binary labels, ready for fitting.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    pub customer_ids:  Vec<CustomerId>,
    pub feature_names: Vec<String>,
    pub rows:          Vec<Vec<f64>>,
    pub labels:        Vec<Label>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&y| y == 1).count()
    }

    /// Extract id, features and target from a table. Missing columns are an
    /// error; bad cells are coerced to 0.
    pub fn from_table(table: &Table, model: &ModelConfig) -> ScoreResult<Self> {
        let mut required: Vec<&str> = vec![model.id_column.as_str(), model.target.as_str()];
        required.extend(model.features.iter().map(String::as_str));
        let columns = table.require_columns(&required)?;
        let (id_col, target_col, feature_cols) = (columns[0], columns[1], &columns[2..]);

        let mut set = Self {
            customer_ids:  Vec::with_capacity(table.len()),
            feature_names: model.features.clone(),
            rows:          Vec::with_capacity(table.len()),
            labels:        Vec::with_capacity(table.len()),
        };
        for record in &table.records {
            set.customer_ids.push(record.get(id_col).unwrap_or_default().to_string());
            set.rows.push(feature_cols.iter().map(|&c| table.numeric(record, c)).collect());
            set.labels.push(coerce_label(table.numeric(record, target_col)));
        }
        Ok(set)
    }

    pub fn load(path: impl AsRef<Path>, model: &ModelConfig) -> ScoreResult<Self> {
        Self::from_table(&Table::read(path)?, model)
    }

    /// Write the cleaned model input: id, target, then features in order.
    pub fn write_csv(&self, path: impl AsRef<Path>, model: &ModelConfig) -> ScoreResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;

        let mut header = vec![model.id_column.clone(), model.target.clone()];
        header.extend(self.feature_names.iter().cloned());
        writer.write_record(&header)?;

        for ((id, row), label) in self.customer_ids.iter().zip(&self.rows).zip(&self.labels) {
            let mut record = vec![id.clone(), label.to_string()];
            record.extend(row.iter().map(|v| v.to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        log::info!("dataset: wrote {} rows to {}", self.len(), path.display());
        Ok(())
    }
}

/// Integer-truncate the target, then treat any non-zero value as churn.
fn coerce_label(value: f64) -> Label {
    u8::from(value.trunc() != 0.0)
}

/// Prepare step: read the churn-ready table, clean it, write the model
/// input CSV and the feature list next to the model artifacts.
pub fn prepare_model_input(
    churn_ready_csv: impl AsRef<Path>,
    model_input_csv: impl AsRef<Path>,
    model_dir: impl AsRef<Path>,
    model: &ModelConfig,
) -> ScoreResult<TrainingSet> {
    let set = TrainingSet::load(churn_ready_csv, model)?;
    set.write_csv(model_input_csv, model)?;

    let model_dir = model_dir.as_ref();
    std::fs::create_dir_all(model_dir)?;
    let features_path = model_dir.join(crate::artifacts::FEATURES_FILE);
    std::fs::write(&features_path, serde_json::to_string(&model.features)?)?;
    log::info!("dataset: wrote feature list to {}", features_path.display());

    Ok(set)
}
