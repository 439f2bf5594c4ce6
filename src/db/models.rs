/// Row types for the `training_runs` table. Used by sqlx for typed queries.
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct TrainingRunRow {
    pub run_id: String,
    pub model_version: String,
    /// Nanosecond UTC epoch.
    pub trained_at: i64,
    /// Recency reference of the training features, nanosecond UTC epoch.
    pub as_of: i64,
    pub artifact_path: String,
    pub checksum: String,
    pub n_customers: i64,
    pub high_risk_cluster: i64,
    pub high_risk_count: i64,
    pub n_test: i64,
    pub accuracy: f64,
    pub precision_score: f64,
    pub recall: f64,
    pub f1: f64,
    pub roc_auc: Option<f64>,
}
