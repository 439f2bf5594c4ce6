use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money leaving the customer account (positive amount).
    Debit,
    /// Money credited to the customer account (negative amount).
    Credit,
}

impl TransactionType {
    pub fn from_amount(amount: f64) -> Self {
        if amount < 0.0 {
            TransactionType::Credit
        } else {
            TransactionType::Debit
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "debit" => Some(TransactionType::Debit),
            "credit" => Some(TransactionType::Credit),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Debit => write!(f, "debit"),
            TransactionType::Credit => write!(f, "credit"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub customer_id: String,
    pub timestamp: DateTime<Utc>,
    /// Signed amount; credits are negative.
    pub amount: f64,
    pub transaction_type: TransactionType,
    pub product_category: String,
    pub channel_id: String,
    pub pricing_strategy: String,
}

// ---------------------------------------------------------------------------
// Customer features
// ---------------------------------------------------------------------------

/// Per-customer RFM profile. Built only for customers with at least one valid
/// transaction, so `frequency >= 1` and `recency >= 0` always hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerFeatureVector {
    pub customer_id: String,
    /// Whole days between the as-of date and the latest transaction.
    pub recency: f64,
    pub frequency: f64,
    /// Gross volume: sum of absolute amounts.
    pub monetary: f64,
    pub avg_transaction_value: f64,
    /// Sample standard deviation of absolute amounts, 0 for a single transaction.
    pub transaction_variability: f64,
    pub product_category: String,
    pub channel_id: String,
    pub pricing_strategy: String,
}

impl CustomerFeatureVector {
    /// RFM triple in the order the proxy labeler clusters on.
    pub fn rfm(&self) -> [f64; 3] {
        [self.recency, self.frequency, self.monetary]
    }

    /// Schema-addressed form, in the canonical training order.
    pub fn to_record(&self) -> FeatureRecord {
        FeatureRecord {
            customer_id: self.customer_id.clone(),
            features: vec![
                NamedFeature::numeric("recency", self.recency),
                NamedFeature::numeric("frequency", self.frequency),
                NamedFeature::numeric("monetary", self.monetary),
                NamedFeature::numeric("avg_transaction_value", self.avg_transaction_value),
                NamedFeature::numeric("transaction_variability", self.transaction_variability),
                NamedFeature::categorical("product_category", &self.product_category),
                NamedFeature::categorical("channel_id", &self.channel_id),
                NamedFeature::categorical("pricing_strategy", &self.pricing_strategy),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Numeric(f64),
    Categorical(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedFeature {
    pub name: String,
    pub value: FeatureValue,
}

impl NamedFeature {
    pub fn numeric(name: &str, value: f64) -> Self {
        Self { name: name.to_string(), value: FeatureValue::Numeric(value) }
    }

    pub fn categorical(name: &str, value: &str) -> Self {
        Self { name: name.to_string(), value: FeatureValue::Categorical(value.to_string()) }
    }
}

/// Ordered name/value pairs handed to the scorer. Order is significant and is
/// checked against the artifact schema, never rearranged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub customer_id: String,
    pub features: Vec<NamedFeature>,
}

impl FeatureRecord {
    pub fn names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }
}

// ---------------------------------------------------------------------------
// Proxy labels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskClass {
    HighRisk,
    LowRisk,
}

impl RiskClass {
    pub fn is_high_risk(self) -> bool {
        self == RiskClass::HighRisk
    }
}

impl std::fmt::Display for RiskClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskClass::HighRisk => write!(f, "high_risk"),
            RiskClass::LowRisk => write!(f, "low_risk"),
        }
    }
}

/// Where a label came from. Labels here are never observed defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum LabelSource {
    /// K-Means cluster membership over standardized RFM.
    RfmProxy { cluster: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskLabel {
    pub class: RiskClass,
    pub source: LabelSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledCustomer {
    pub features: CustomerFeatureVector,
    pub label: RiskLabel,
}

// ---------------------------------------------------------------------------
// Predictions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureAttribution {
    pub feature: String,
    /// Value after the artifact's preprocessing transform.
    pub transformed_value: f64,
    /// Additive contribution in log-odds.
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub customer_id: String,
    pub probability_of_default: f64,
    pub risk_label: RiskClass,
    /// Log-odds of the average training customer; `base_value + Σ contributions`
    /// equals the prediction's log-odds.
    pub base_value: f64,
    pub attributions: Vec<FeatureAttribution>,
    pub model_version: String,
}
