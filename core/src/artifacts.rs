//! The model artifact bundle: classifier, ordered feature list, threshold.
//!
//! RULE: The bundle is loaded once, completely, or not at all.
//! A missing file, a malformed file, a threshold outside [0, 1], or a
//! feature list that disagrees with the one recorded inside the model
//! aborts loading. There is no partially loaded bundle.
//!
//! On-disk layout (one directory):
//!   churn_model.json   serialized BoostedTrees (records its own feature list)
//!   features.json      ["avg_order_value", "invoice_count", ...]
//!   threshold.json     {"threshold": 0.3}
//!   manifest.json      optional; training run id and creation time

use crate::{
    error::{ScoreError, ScoreResult},
    features::FeatureSchema,
    model::{BoostedTrees, ChurnClassifier},
    types::RunId,
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

pub const MODEL_FILE: &str = "churn_model.json";
pub const FEATURES_FILE: &str = "features.json";
pub const THRESHOLD_FILE: &str = "threshold.json";
pub const MANIFEST_FILE: &str = "manifest.json";

// ── Threshold ────────────────────────────────────────────────────────────────

/// A decision threshold, guaranteed finite and within [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Threshold(f64);

impl Threshold {
    pub fn new(value: f64) -> Option<Self> {
        (value.is_finite() && (0.0..=1.0).contains(&value)).then_some(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ThresholdFile {
    threshold: f64,
}

/// Provenance written next to the bundle by the training pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub run_id:     RunId,
    pub created_at: String,
    pub model:      String,
}

// ── Bundle ───────────────────────────────────────────────────────────────────

pub struct ModelArtifacts {
    classifier: Arc<dyn ChurnClassifier>,
    schema:     FeatureSchema,
    threshold:  Threshold,
    manifest:   Option<BundleManifest>,
}

impl std::fmt::Debug for ModelArtifacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelArtifacts")
            .field("classifier", &self.classifier.name())
            .field("schema", &self.schema)
            .field("threshold", &self.threshold)
            .field("manifest", &self.manifest)
            .finish()
    }
}

impl ModelArtifacts {
    /// Assemble a bundle from parts already in memory (tests, embedding).
    pub fn new(
        classifier: Arc<dyn ChurnClassifier>,
        schema: FeatureSchema,
        threshold: Threshold,
    ) -> Self {
        Self { classifier, schema, threshold, manifest: None }
    }

    /// Load and cross-check the bundle in `dir`.
    pub fn load(dir: impl AsRef<Path>) -> ScoreResult<Self> {
        let dir = dir.as_ref();

        let model_path = dir.join(MODEL_FILE);
        let model = BoostedTrees::from_json(&read_artifact(&model_path)?).map_err(|e| match e {
            ScoreError::ArtifactLoad { reason, .. } => ScoreError::artifact(display(&model_path), reason),
            other => ScoreError::artifact(display(&model_path), other.to_string()),
        })?;

        let features_path = dir.join(FEATURES_FILE);
        let features: Vec<String> = parse_artifact(&features_path)?;

        let threshold_path = dir.join(THRESHOLD_FILE);
        let threshold_file: ThresholdFile = parse_artifact(&threshold_path)?;
        let threshold = Threshold::new(threshold_file.threshold).ok_or_else(|| {
            ScoreError::artifact(
                display(&threshold_path),
                format!("threshold {} is outside [0, 1]", threshold_file.threshold),
            )
        })?;

        let schema = FeatureSchema::from_names(&features)?;
        if model.feature_names != features {
            return Err(ScoreError::SchemaMismatch {
                expected: model.feature_names.clone(),
                actual:   features,
            });
        }

        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest = if manifest_path.exists() {
            Some(parse_artifact::<BundleManifest>(&manifest_path)?)
        } else {
            None
        };

        log::info!(
            "artifacts: loaded {} ({} trees) from {}, threshold={:.2}, features={:?}",
            model_path.display(),
            model.trees.len(),
            dir.display(),
            threshold.value(),
            features,
        );

        Ok(Self {
            classifier: Arc::new(model),
            schema,
            threshold,
            manifest,
        })
    }

    pub fn classifier(&self) -> &dyn ChurnClassifier {
        self.classifier.as_ref()
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    pub fn manifest(&self) -> Option<&BundleManifest> {
        self.manifest.as_ref()
    }
}

/// Write a bundle into `dir`. Each file is staged under a temporary name
/// and renamed into place, the model last, so a reader never sees a
/// half-written file.
pub fn save_bundle(
    dir: impl AsRef<Path>,
    model: &BoostedTrees,
    threshold: Threshold,
    manifest: Option<&BundleManifest>,
) -> ScoreResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let mut staged: Vec<(PathBuf, String)> = vec![
        (dir.join(FEATURES_FILE), serde_json::to_string(&model.feature_names)?),
        (
            dir.join(THRESHOLD_FILE),
            serde_json::to_string(&ThresholdFile { threshold: threshold.value() })?,
        ),
    ];
    if let Some(m) = manifest {
        staged.push((dir.join(MANIFEST_FILE), serde_json::to_string_pretty(m)?));
    }
    staged.push((dir.join(MODEL_FILE), model.to_json()?));

    let mut written = Vec::with_capacity(staged.len());
    for (path, content) in staged {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;
        log::debug!("artifacts: wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

fn read_artifact(path: &Path) -> ScoreResult<String> {
    fs::read_to_string(path).map_err(|e| ScoreError::artifact(display(path), e.to_string()))
}

fn parse_artifact<T: serde::de::DeserializeOwned>(path: &Path) -> ScoreResult<T> {
    let content = read_artifact(path)?;
    serde_json::from_str(&content).map_err(|e| ScoreError::artifact(display(path), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_bounds() {
        assert!(Threshold::new(0.0).is_some());
        assert!(Threshold::new(1.0).is_some());
        assert_eq!(Threshold::new(0.3).map(|t| t.value()), Some(0.3));
        assert!(Threshold::new(-0.01).is_none());
        assert!(Threshold::new(1.5).is_none());
        assert!(Threshold::new(f64::NAN).is_none());
    }
}
