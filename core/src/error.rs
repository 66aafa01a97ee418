use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("Validation failed for '{field}': {reason}")]
    Validation { field: String, reason: String },

    #[error("Cannot load artifact {path}: {reason}")]
    ArtifactLoad { path: String, reason: String },

    #[error("Feature schema mismatch: expected {expected:?}, got {actual:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        actual:   Vec<String>,
    },

    #[error("Training failed: {0}")]
    Training(String),

    #[error("Dataset is missing required columns: {missing:?}")]
    MissingColumns { missing: Vec<String> },

    #[error("Run '{run_id}' not found")]
    RunNotFound { run_id: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScoreError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), reason: reason.into() }
    }

    pub fn artifact(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ArtifactLoad { path: path.into(), reason: reason.into() }
    }

    /// True for errors caused by the caller's input rather than the process.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

pub type ScoreResult<T> = Result<T, ScoreError>;
