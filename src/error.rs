use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

/// Per-record problem in transaction input. Recovered locally: the record is
/// skipped and counted, the batch continues.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataQualityError {
    #[error("missing customer id")]
    MissingCustomerId,

    #[error("missing field {0}")]
    MissingField(&'static str),

    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),

    #[error("invalid amount {0:?}")]
    InvalidAmount(String),

    #[error("unknown transaction type {0:?}")]
    UnknownTransactionType(String),

    #[error("non-finite amount")]
    NonFiniteAmount,

    #[error("transaction dated after as-of date")]
    AfterAsOf,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Data quality error: {0}")]
    DataQuality(#[from] DataQualityError),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Invalid feature: {0}")]
    InvalidFeature(String),

    #[error("Artifact load error: {0}")]
    ArtifactLoad(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::SchemaMismatch(_) | AppError::InvalidFeature(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::ArtifactLoad(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
