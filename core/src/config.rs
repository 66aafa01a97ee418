use crate::{features::FeatureName, model::BoosterParams};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ── Paths ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Cleaned customer table with features, target and revenue columns.
    pub churn_ready_csv:  PathBuf,
    /// Training input written by the prepare step.
    pub model_input_csv:  PathBuf,
    /// Batch labeling output.
    pub final_output_csv: PathBuf,
    /// Artifact bundle directory.
    pub model_dir:        PathBuf,
    /// SQLite experiment-tracking database.
    pub experiment_db:    PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            churn_ready_csv:  "data/processed/customer_churn_ready.csv".into(),
            model_input_csv:  "data/processed/model_input.csv".into(),
            final_output_csv: "data/processed/final_output.csv".into(),
            model_dir:        "models".into(),
            experiment_db:    "mlruns.db".into(),
        }
    }
}

// ── Model ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub features:       Vec<String>,
    pub target:         String,
    /// Business policy cut for the churn decision. Persisted into the
    /// artifact bundle at training time; serving reads it from there.
    pub threshold:      f64,
    pub id_column:      String,
    /// Historical revenue used as the batch raw-CLV proxy.
    pub revenue_column: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            features:       FeatureName::ALL.iter().map(|f| f.as_str().to_string()).collect(),
            target:         "churn_flag".into(),
            threshold:      0.30,
            id_column:      "CustomerID".into(),
            revenue_column: "total_revenue".into(),
        }
    }
}

// ── Training ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub experiment: String,
    pub run_name:   String,
    pub test_size:  f64,
    pub booster:    BoosterParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            experiment: "Churn_Prediction_CLV".into(),
            run_name:   "boosted_trees_churn_tuned".into(),
            test_size:  0.2,
            booster:    BoosterParams::default(),
        }
    }
}

// ── Pipeline ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub paths:    PathsConfig,
    #[serde(default)]
    pub model:    ModelConfig,
    #[serde(default)]
    pub training: TrainingConfig,
}

impl PipelineConfig {
    /// Load from a JSON config file. Missing sections fall back to defaults.
    /// In tests, use PipelineConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.model.threshold) {
            anyhow::bail!("model.threshold {} must be in [0, 1]", self.model.threshold);
        }
        if !(self.training.test_size > 0.0 && self.training.test_size < 1.0) {
            anyhow::bail!("training.test_size {} must be in (0, 1)", self.training.test_size);
        }
        if self.model.features.is_empty() {
            anyhow::bail!("model.features must not be empty");
        }
        Ok(())
    }

    /// Small, fast configuration for tests: few shallow trees, paths
    /// relative to the working directory. See `rooted_at`.
    pub fn default_test() -> Self {
        Self::rooted_at(Path::new("."))
    }

    /// Test configuration with every path rooted under `dir`.
    pub fn rooted_at(dir: &Path) -> Self {
        Self {
            paths: PathsConfig {
                churn_ready_csv:  dir.join("customer_churn_ready.csv"),
                model_input_csv:  dir.join("model_input.csv"),
                final_output_csv: dir.join("final_output.csv"),
                model_dir:        dir.join("models"),
                experiment_db:    dir.join("runs.db"),
            },
            model: ModelConfig::default(),
            training: TrainingConfig {
                experiment: "test".into(),
                run_name:   "test-run".into(),
                test_size:  0.2,
                booster: BoosterParams {
                    n_estimators:  30,
                    max_depth:     3,
                    learning_rate: 0.2,
                    ..BoosterParams::default()
                },
            },
        }
    }
}
