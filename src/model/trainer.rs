use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;
use uuid::Uuid;

use crate::config::{Config, ARTIFACT_FORMAT_VERSION, RANDOM_SEED, RISK_THRESHOLD, TEST_SIZE};
use crate::error::{AppError, Result};
use crate::features::FeatureSchema;
use crate::labeling::LabelingSummary;
use crate::model::artifact::TrainedModelArtifact;
use crate::model::logistic::{LogisticConfig, LogisticRegression};
use crate::model::metrics::ClassificationReport;
use crate::model::preprocess::Preprocessor;
use crate::model::woe::iv_strength;
use crate::types::{FeatureRecord, LabeledCustomer};

#[derive(Debug, Clone)]
pub struct TrainerConfig {
    pub test_size: f64,
    pub seed: u64,
    pub decision_threshold: f64,
    pub logistic: LogisticConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            test_size: TEST_SIZE,
            seed: RANDOM_SEED,
            decision_threshold: RISK_THRESHOLD,
            logistic: LogisticConfig::default(),
        }
    }
}

impl TrainerConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            test_size: cfg.test_size,
            seed: cfg.random_seed,
            decision_threshold: cfg.risk_threshold,
            logistic: LogisticConfig::default(),
        }
    }
}

pub struct ModelTrainer {
    cfg: TrainerConfig,
}

impl ModelTrainer {
    pub fn new(cfg: TrainerConfig) -> Self {
        Self { cfg }
    }

    /// Fit preprocessing and classifier on a seeded train split, evaluate on
    /// the hold-out, and assemble the artifact. `as_of` is the recency reference
    /// the features were built against; scoring reuses it. Nothing is written
    /// to disk here.
    pub fn train(
        &self,
        labeled: &[LabeledCustomer],
        labeling: LabelingSummary,
        as_of: DateTime<Utc>,
    ) -> Result<TrainedModelArtifact> {
        let n = labeled.len();
        if n < 2 {
            return Err(AppError::Training(format!("need at least 2 labeled customers, got {n}")));
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut StdRng::seed_from_u64(self.cfg.seed));
        let n_test = ((n as f64 * self.cfg.test_size).round() as usize).clamp(1, n - 1);
        let (test_idx, train_idx) = order.split_at(n_test);

        let schema = FeatureSchema::credit_risk();
        let records: Vec<FeatureRecord> = labeled.iter().map(|l| l.features.to_record()).collect();
        let targets: Vec<bool> = labeled.iter().map(|l| l.label.class.is_high_risk()).collect();

        let train_rows: Vec<FeatureRecord> = train_idx.iter().map(|&i| records[i].clone()).collect();
        let train_y: Vec<bool> = train_idx.iter().map(|&i| targets[i]).collect();
        let positives = train_y.iter().filter(|&&y| y).count();
        if positives == 0 || positives == train_y.len() {
            return Err(AppError::Training(format!(
                "training split holds a single class ({positives} high-risk of {})",
                train_y.len()
            )));
        }

        info!(
            train = train_idx.len(),
            test = test_idx.len(),
            train_high_risk = positives,
            "[TRAIN] split {} / {} (seed {})",
            train_idx.len(),
            test_idx.len(),
            self.cfg.seed,
        );

        let preprocessor = Preprocessor::fit(&schema, &train_rows, &train_y)?;
        for (feature, iv) in preprocessor.information_values(&schema) {
            info!(feature, iv, "[TRAIN] IV {feature}: {iv:.4} ({})", iv_strength(iv));
        }

        let x_train = design_matrix(&preprocessor, &schema, &train_rows)?;
        let y_train: Array1<f64> = train_y.iter().map(|&y| if y { 1.0 } else { 0.0 }).collect();
        let classifier = LogisticRegression::fit(x_train.view(), y_train.view(), &self.cfg.logistic)?;

        let baseline = x_train
            .mean_axis(Axis(0))
            .ok_or_else(|| AppError::Training("empty training matrix".to_string()))?
            .to_vec();

        let mut test_scores = Vec::with_capacity(test_idx.len());
        let mut test_y = Vec::with_capacity(test_idx.len());
        for &i in test_idx {
            let z = preprocessor.transform(&schema, &records[i])?;
            test_scores.push(classifier.predict_proba(&z));
            test_y.push(targets[i]);
        }
        let metrics = ClassificationReport::evaluate(&test_y, &test_scores, self.cfg.decision_threshold);

        info!(
            accuracy = metrics.accuracy,
            precision = metrics.precision,
            recall = metrics.recall,
            f1 = metrics.f1,
            roc_auc = ?metrics.roc_auc,
            "[TRAIN] hold-out evaluation on {} customers",
            metrics.n_samples,
        );

        let trained_at = Utc::now();
        let run_id = Uuid::new_v4();
        let model_version = format!(
            "v{}-{}",
            trained_at.format("%Y%m%d%H%M%S"),
            &run_id.simple().to_string()[..8]
        );

        Ok(TrainedModelArtifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            model_version,
            run_id,
            trained_at,
            as_of,
            schema,
            preprocessor,
            classifier,
            baseline,
            decision_threshold: self.cfg.decision_threshold,
            metrics,
            labeling,
            n_customers: n,
        })
    }
}

fn design_matrix(
    preprocessor: &Preprocessor,
    schema: &FeatureSchema,
    rows: &[FeatureRecord],
) -> Result<Array2<f64>> {
    let mut flat = Vec::with_capacity(rows.len() * schema.len());
    for row in rows {
        flat.extend(preprocessor.transform(schema, row)?);
    }
    Array2::from_shape_vec((rows.len(), schema.len()), flat)
        .map_err(|e| AppError::Training(format!("design matrix: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labeling::ProxyLabeler;
    use crate::test_support::{as_of, synthetic_customers};
    use crate::types::{LabelSource, RiskClass, RiskLabel};

    fn trained() -> TrainedModelArtifact {
        let customers = synthetic_customers();
        let labeling = ProxyLabeler::new(3, 42).label(&customers).unwrap();
        let labeled = labeling.attach(&customers);
        ModelTrainer::new(TrainerConfig::default()).train(&labeled, labeling.summary, as_of()).unwrap()
    }

    #[test]
    fn artifact_is_internally_consistent() {
        let artifact = trained();
        assert_eq!(artifact.schema, FeatureSchema::credit_risk());
        assert_eq!(artifact.preprocessor.columns.len(), artifact.schema.len());
        assert_eq!(artifact.classifier.weights.len(), artifact.schema.len());
        assert_eq!(artifact.baseline.len(), artifact.schema.len());
        assert_eq!(artifact.n_customers, 100);
        assert_eq!(artifact.metrics.n_samples, 20);
        assert!(artifact.validate().is_ok());
    }

    #[test]
    fn separable_proxy_is_learned() {
        let artifact = trained();
        assert!(artifact.metrics.accuracy >= 0.9, "{:?}", artifact.metrics);
        // Dormancy pushes towards default.
        assert!(artifact.classifier.weights[0] > 0.0);
    }

    #[test]
    fn single_class_training_is_rejected() {
        let customers = synthetic_customers();
        let labeling = ProxyLabeler::new(3, 42).label(&customers).unwrap();
        let labeled: Vec<LabeledCustomer> = customers
            .iter()
            .map(|c| LabeledCustomer {
                features: c.clone(),
                label: RiskLabel { class: RiskClass::LowRisk, source: LabelSource::RfmProxy { cluster: 0 } },
            })
            .collect();
        let err = ModelTrainer::new(TrainerConfig::default())
            .train(&labeled, labeling.summary, as_of())
            .unwrap_err();
        assert!(matches!(err, AppError::Training(_)));
    }
}
