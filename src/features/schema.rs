use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::types::{FeatureRecord, FeatureValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Numeric,
    Categorical,
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureKind::Numeric => write!(f, "numeric"),
            FeatureKind::Categorical => write!(f, "categorical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub kind: FeatureKind,
}

/// Ordered feature list a model was trained on. Stored inside the artifact and
/// enforced on every scoring call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub features: Vec<FeatureSpec>,
}

impl FeatureSchema {
    /// The schema produced by `CustomerFeatureVector::to_record`.
    pub fn credit_risk() -> Self {
        let spec = |name: &str, kind| FeatureSpec { name: name.to_string(), kind };
        Self {
            features: vec![
                spec("recency", FeatureKind::Numeric),
                spec("frequency", FeatureKind::Numeric),
                spec("monetary", FeatureKind::Numeric),
                spec("avg_transaction_value", FeatureKind::Numeric),
                spec("transaction_variability", FeatureKind::Numeric),
                spec("product_category", FeatureKind::Categorical),
                spec("channel_id", FeatureKind::Categorical),
                spec("pricing_strategy", FeatureKind::Categorical),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    /// Exact positional match: same length, same names, same order, same kinds.
    /// The first offending position is reported; nothing is reordered or filled.
    pub fn check(&self, record: &FeatureRecord) -> Result<()> {
        for (pos, spec) in self.features.iter().enumerate() {
            let Some(given) = record.features.get(pos) else {
                return Err(AppError::SchemaMismatch(format!(
                    "missing feature {:?} at position {pos} (expected {:?}, got {:?})",
                    spec.name,
                    self.names(),
                    record.names(),
                )));
            };
            if given.name != spec.name {
                let detail = if record.features.iter().any(|f| f.name == spec.name) {
                    "out of order"
                } else {
                    "missing"
                };
                return Err(AppError::SchemaMismatch(format!(
                    "feature {:?} {detail}: position {pos} holds {:?} (expected {:?})",
                    spec.name,
                    given.name,
                    self.names(),
                )));
            }
            let kind = match given.value {
                FeatureValue::Numeric(_) => FeatureKind::Numeric,
                FeatureValue::Categorical(_) => FeatureKind::Categorical,
            };
            if kind != spec.kind {
                return Err(AppError::SchemaMismatch(format!(
                    "feature {:?} must be {}, got {kind}",
                    spec.name, spec.kind,
                )));
            }
        }
        if record.features.len() > self.features.len() {
            let extra: Vec<&str> = record.names()[self.features.len()..].to_vec();
            return Err(AppError::SchemaMismatch(format!("unexpected features {extra:?}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CustomerFeatureVector, NamedFeature};

    fn customer() -> CustomerFeatureVector {
        CustomerFeatureVector {
            customer_id: "C1".to_string(),
            recency: 2.0,
            frequency: 10.0,
            monetary: 5000.0,
            avg_transaction_value: 500.0,
            transaction_variability: 50.0,
            product_category: "airtime".to_string(),
            channel_id: "ChannelId_3".to_string(),
            pricing_strategy: "2".to_string(),
        }
    }

    #[test]
    fn canonical_record_matches_schema() {
        let schema = FeatureSchema::credit_risk();
        let record = customer().to_record();
        assert_eq!(record.names(), schema.names());
        assert!(schema.check(&record).is_ok());
    }

    #[test]
    fn missing_feature_is_a_mismatch() {
        let schema = FeatureSchema::credit_risk();
        let mut record = customer().to_record();
        record.features.retain(|f| f.name != "monetary");
        let err = schema.check(&record).unwrap_err();
        assert!(matches!(err, AppError::SchemaMismatch(ref m) if m.contains("monetary")), "{err}");
    }

    #[test]
    fn truncated_record_is_a_mismatch() {
        let schema = FeatureSchema::credit_risk();
        let mut record = customer().to_record();
        record.features.pop();
        assert!(matches!(schema.check(&record), Err(AppError::SchemaMismatch(_))));
    }

    #[test]
    fn reordered_record_is_rejected_not_reordered() {
        let schema = FeatureSchema::credit_risk();
        let mut record = customer().to_record();
        record.features.swap(0, 1);
        let err = schema.check(&record).unwrap_err();
        assert!(err.to_string().contains("out of order"), "{err}");
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let schema = FeatureSchema::credit_risk();
        let mut record = customer().to_record();
        record.features[0] = NamedFeature::categorical("recency", "recent");
        assert!(matches!(schema.check(&record), Err(AppError::SchemaMismatch(_))));
    }

    #[test]
    fn extra_feature_is_rejected() {
        let schema = FeatureSchema::credit_risk();
        let mut record = customer().to_record();
        record.features.push(NamedFeature::numeric("fraud_count", 0.0));
        let err = schema.check(&record).unwrap_err();
        assert!(err.to_string().contains("fraud_count"));
    }
}
