use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::model::logistic::sigmoid;
use crate::model::TrainedModelArtifact;
use crate::scorer::explain::linear_attributions;
use crate::types::{CustomerFeatureVector, FeatureRecord, PredictionResult, RiskClass};

/// Stateless scorer over a shared, read-only artifact. Cheap to clone and safe
/// to call from any number of requests at once.
#[derive(Clone)]
pub struct CreditScorer {
    artifact: Arc<TrainedModelArtifact>,
}

impl CreditScorer {
    pub fn new(artifact: Arc<TrainedModelArtifact>) -> Self {
        Self { artifact }
    }

    pub fn artifact(&self) -> &TrainedModelArtifact {
        &self.artifact
    }

    pub fn model_version(&self) -> &str {
        &self.artifact.model_version
    }

    /// Probability of default plus additive attributions for one record.
    /// The record must match the artifact schema exactly; any mismatch is a
    /// `SchemaMismatch` and no prediction is produced.
    pub fn score(&self, record: &FeatureRecord) -> Result<PredictionResult> {
        let artifact = &*self.artifact;
        let z = artifact.preprocessor.transform(&artifact.schema, record)?;

        let (base_value, attributions) = linear_attributions(artifact, &z);
        let logit = artifact.classifier.decision(&z);
        let probability_of_default = sigmoid(logit);
        let risk_label = if probability_of_default >= artifact.decision_threshold {
            RiskClass::HighRisk
        } else {
            RiskClass::LowRisk
        };

        debug!(
            customer_id = %record.customer_id,
            probability_of_default,
            risk_label = %risk_label,
            "[SCORE] scored"
        );

        Ok(PredictionResult {
            customer_id: record.customer_id.clone(),
            probability_of_default,
            risk_label,
            base_value,
            attributions,
            model_version: artifact.model_version.clone(),
        })
    }

    pub fn score_customer(&self, customer: &CustomerFeatureVector) -> Result<PredictionResult> {
        self.score(&customer.to_record())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::labeling::ProxyLabeler;
    use crate::model::{ModelTrainer, TrainerConfig};
    use crate::scorer::explain::top_drivers;
    use crate::test_support::{as_of, synthetic_customers};

    fn scorer() -> CreditScorer {
        let customers = synthetic_customers();
        let labeling = ProxyLabeler::new(3, 42).label(&customers).unwrap();
        let artifact = ModelTrainer::new(TrainerConfig::default())
            .train(&labeling.attach(&customers), labeling.summary, as_of())
            .unwrap();
        CreditScorer::new(Arc::new(artifact))
    }

    #[test]
    fn scoring_is_deterministic() {
        let scorer = scorer();
        let customer = &synthetic_customers()[3];
        let a = scorer.score_customer(customer).unwrap();
        let b = scorer.score_customer(customer).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn attributions_sum_to_log_odds() {
        let scorer = scorer();
        for customer in synthetic_customers().iter().step_by(7) {
            let result = scorer.score_customer(customer).unwrap();
            let total: f64 =
                result.base_value + result.attributions.iter().map(|a| a.contribution).sum::<f64>();
            let p = sigmoid(total);
            assert!((p - result.probability_of_default).abs() < 1e-12, "{p} vs {}", result.probability_of_default);
            assert_eq!(result.attributions.len(), 8);
        }
    }

    #[test]
    fn dormant_scores_riskier_than_loyal() {
        let scorer = scorer();
        let customers = synthetic_customers();
        let dormant = scorer.score_customer(&customers[0]).unwrap();
        let loyal = scorer.score_customer(customers.last().unwrap()).unwrap();
        assert!(dormant.probability_of_default > loyal.probability_of_default);
        assert_eq!(dormant.risk_label, RiskClass::HighRisk);
        assert_eq!(loyal.risk_label, RiskClass::LowRisk);
    }

    #[test]
    fn probability_equal_to_threshold_is_high_risk() {
        let scorer = scorer();
        let customer = &synthetic_customers()[20];
        let p = scorer.score_customer(customer).unwrap().probability_of_default;
        assert!(p > 0.0 && p < 1.0, "{p}");

        let mut artifact = scorer.artifact().clone();
        artifact.decision_threshold = p;
        let at_threshold = CreditScorer::new(Arc::new(artifact)).score_customer(customer).unwrap();
        assert_eq!(at_threshold.risk_label, RiskClass::HighRisk);
    }

    #[test]
    fn missing_feature_fails_with_schema_mismatch() {
        let scorer = scorer();
        let mut record = synthetic_customers()[0].to_record();
        record.features.retain(|f| f.name != "frequency");
        let err = scorer.score(&record).unwrap_err();
        assert!(matches!(err, AppError::SchemaMismatch(_)), "{err}");
    }

    #[test]
    fn top_drivers_are_sorted_by_magnitude() {
        let scorer = scorer();
        let result = scorer.score_customer(&synthetic_customers()[0]).unwrap();
        let top = top_drivers(&result.attributions, 3);
        assert_eq!(top.len(), 3);
        assert!(top[0].contribution.abs() >= top[1].contribution.abs());
        assert!(top[1].contribution.abs() >= top[2].contribution.abs());
    }

    #[test]
    fn scorer_is_shareable_across_threads() {
        let scorer = scorer();
        let customer = synthetic_customers()[10].clone();
        let expected = scorer.score_customer(&customer).unwrap();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let s = scorer.clone();
                let c = customer.clone();
                std::thread::spawn(move || s.score_customer(&c).unwrap())
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), expected);
        }
    }
}
