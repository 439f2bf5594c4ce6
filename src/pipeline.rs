//! Batch stages glued together: features -> proxy labels -> trained artifact,
//! and features -> predictions. Shared by the `train` and `score` binaries.

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::features::FeatureBuilder;
use crate::labeling::ProxyLabeler;
use crate::model::{ModelTrainer, SavedArtifact, TrainedModelArtifact, TrainerConfig};
use crate::scorer::CreditScorer;
use crate::types::{PredictionResult, TransactionRecord};

#[derive(Debug)]
pub struct TrainingOutcome {
    pub artifact: TrainedModelArtifact,
    pub saved: SavedArtifact,
}

/// Build features, label them, fit the classifier and persist the artifact
/// under `cfg.artifact_dir`. Nothing is written unless every stage succeeds.
pub fn train_and_save(records: &[TransactionRecord], cfg: &Config) -> Result<TrainingOutcome> {
    let build = FeatureBuilder::new(cfg.as_of).build(records);
    let Some(as_of) = build.as_of.filter(|_| !build.vectors.is_empty()) else {
        return Err(AppError::Training("no customer has a valid transaction".to_string()));
    };

    let labeling = ProxyLabeler::from_config(cfg).label(&build.vectors)?;
    let labeled = labeling.attach(&build.vectors);

    let artifact = ModelTrainer::new(TrainerConfig::from_config(cfg)).train(&labeled, labeling.summary, as_of)?;
    let saved = artifact.save(&cfg.artifact_dir)?;

    info!(
        model_version = %artifact.model_version,
        customers = artifact.n_customers,
        roc_auc = ?artifact.metrics.roc_auc,
        "[TRAIN] pipeline complete"
    );
    Ok(TrainingOutcome { artifact, saved })
}

/// Score every customer present in `records`. Recency is measured from
/// `AS_OF_DATE` when set, otherwise from the artifact's training reference,
/// never from the batch itself. A customer that fails to score is logged and
/// left out; no substitute prediction is produced.
pub fn score_transactions(
    scorer: &CreditScorer,
    records: &[TransactionRecord],
    cfg: &Config,
) -> Vec<PredictionResult> {
    let trained_as_of = scorer.artifact().as_of;
    let as_of = match cfg.as_of {
        Some(explicit) => {
            if explicit != trained_as_of {
                warn!(
                    as_of = %explicit,
                    trained_as_of = %trained_as_of,
                    "[SCORE] AS_OF_DATE differs from the training reference"
                );
            }
            explicit
        }
        None => trained_as_of,
    };
    let build = FeatureBuilder::new(Some(as_of)).build(records);
    build
        .vectors
        .iter()
        .filter_map(|customer| match scorer.score_customer(customer) {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(customer_id = %customer.customer_id, "[SCORE] skipped: {e}");
                None
            }
        })
        .collect()
}
