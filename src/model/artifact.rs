use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::info;
use uuid::Uuid;

use crate::config::{ARTIFACT_FORMAT_VERSION, ARTIFACT_POINTER_FILE};
use crate::error::{AppError, Result};
use crate::features::{FeatureKind, FeatureSchema};
use crate::labeling::LabelingSummary;
use crate::model::logistic::LogisticRegression;
use crate::model::metrics::ClassificationReport;
use crate::model::preprocess::{ColumnTransform, Preprocessor};

const HEADER_PREFIX: &str = "credit-risk-artifact";

/// Everything needed to score: schema, frozen preprocessing, classifier
/// parameters and provenance. Written once per training run, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModelArtifact {
    pub format_version: u32,
    pub model_version: String,
    pub run_id: Uuid,
    pub trained_at: DateTime<Utc>,
    /// Recency reference used when the training features were built.
    pub as_of: DateTime<Utc>,
    pub schema: FeatureSchema,
    pub preprocessor: Preprocessor,
    pub classifier: LogisticRegression,
    /// Mean transformed training row; reference point for attributions.
    pub baseline: Vec<f64>,
    pub decision_threshold: f64,
    pub metrics: ClassificationReport,
    pub labeling: LabelingSummary,
    pub n_customers: usize,
}

#[derive(Debug, Clone)]
pub struct SavedArtifact {
    pub path: PathBuf,
    pub checksum: String,
}

impl TrainedModelArtifact {
    /// Structural consistency between schema, transforms and parameters.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(AppError::ArtifactLoad(msg));
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return bad(format!(
                "unsupported format version {} (expected {ARTIFACT_FORMAT_VERSION})",
                self.format_version
            ));
        }
        let d = self.schema.len();
        if d == 0 {
            return bad("empty feature schema".to_string());
        }
        if self.preprocessor.columns.len() != d
            || self.classifier.weights.len() != d
            || self.baseline.len() != d
        {
            return bad(format!(
                "inconsistent dimensions: schema={d} transforms={} weights={} baseline={}",
                self.preprocessor.columns.len(),
                self.classifier.weights.len(),
                self.baseline.len()
            ));
        }
        for (spec, column) in self.schema.features.iter().zip(&self.preprocessor.columns) {
            let ok = match (spec.kind, column) {
                (FeatureKind::Numeric, ColumnTransform::Standardize { scale, mean }) => {
                    scale.is_finite() && *scale > 0.0 && mean.is_finite()
                }
                (FeatureKind::Categorical, ColumnTransform::WeightOfEvidence(_)) => true,
                _ => false,
            };
            if !ok {
                return bad(format!("transform for {:?} does not fit a {} feature", spec.name, spec.kind));
            }
        }
        let finite = self.classifier.intercept.is_finite()
            && self.classifier.weights.iter().all(|w| w.is_finite())
            && self.baseline.iter().all(|b| b.is_finite());
        if !finite {
            return bad("non-finite model parameters".to_string());
        }
        if !(self.decision_threshold > 0.0 && self.decision_threshold < 1.0) {
            return bad(format!("decision threshold {} out of range", self.decision_threshold));
        }
        Ok(())
    }

    /// Atomically write `model-<version>.json` into `dir`, then atomically
    /// repoint `LATEST` at it. Each file is staged in a temp file in the same
    /// directory and renamed into place, so readers see either the old or the
    /// complete new state.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<SavedArtifact> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let body = serde_json::to_string_pretty(self)?;
        let checksum = hex::encode(Sha256::digest(body.as_bytes()));
        let file_name = format!("model-{}.json", self.model_version);
        let path = dir.join(&file_name);

        let contents = format!("{HEADER_PREFIX} v{} sha256={checksum}\n{body}", self.format_version);
        write_atomic(dir, &path, contents.as_bytes())?;
        write_atomic(dir, &dir.join(ARTIFACT_POINTER_FILE), file_name.as_bytes())?;

        info!(
            path = %path.display(),
            model_version = %self.model_version,
            checksum = %checksum,
            "[ARTIFACT] saved"
        );
        Ok(SavedArtifact { path, checksum })
    }

    /// Load from an artifact file, or from a directory via its `LATEST` pointer.
    /// Any failure is an `ArtifactLoad` error; callers must not serve without it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = resolve(path.as_ref())?;
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| AppError::ArtifactLoad(format!("{}: {e}", path.display())))?;

        let (header, body) = raw
            .split_once('\n')
            .ok_or_else(|| AppError::ArtifactLoad(format!("{}: missing header", path.display())))?;
        let expected = header
            .strip_prefix(HEADER_PREFIX)
            .and_then(|rest| rest.split_once("sha256="))
            .map(|(_, sum)| sum.trim())
            .ok_or_else(|| AppError::ArtifactLoad(format!("{}: malformed header", path.display())))?;

        let actual = hex::encode(Sha256::digest(body.as_bytes()));
        if actual != expected {
            return Err(AppError::ArtifactLoad(format!(
                "{}: checksum mismatch (header {expected}, content {actual})",
                path.display()
            )));
        }

        let artifact: Self = serde_json::from_str(body)
            .map_err(|e| AppError::ArtifactLoad(format!("{}: {e}", path.display())))?;
        artifact.validate()?;

        info!(
            path = %path.display(),
            model_version = %artifact.model_version,
            features = artifact.schema.len(),
            "[ARTIFACT] loaded"
        );
        Ok(artifact)
    }

    pub fn checksum_of(path: impl AsRef<Path>) -> Result<String> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let body = raw.split_once('\n').map(|(_, b)| b).unwrap_or("");
        Ok(hex::encode(Sha256::digest(body.as_bytes())))
    }
}

fn resolve(path: &Path) -> Result<PathBuf> {
    if !path.is_dir() {
        return Ok(path.to_path_buf());
    }
    let pointer = path.join(ARTIFACT_POINTER_FILE);
    let name = std::fs::read_to_string(&pointer)
        .map_err(|e| AppError::ArtifactLoad(format!("{}: {e}", pointer.display())))?;
    let name = name.trim();
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(AppError::ArtifactLoad(format!(
            "{}: invalid pointer {name:?}",
            pointer.display()
        )));
    }
    Ok(path.join(name))
}

fn write_atomic(dir: &Path, target: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| AppError::Io(e.error))?;
    Ok(())
}
