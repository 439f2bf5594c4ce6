use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};

/// Clusters used to build the proxy label.
pub const KMEANS_CLUSTERS: usize = 3;

/// Independent k-means++ restarts; the lowest-inertia fit wins.
pub const KMEANS_N_INIT: usize = 10;

/// Lloyd iteration cap per restart.
pub const KMEANS_MAX_ITER: usize = 300;

/// Convergence threshold on total centroid movement (squared, standardized units).
pub const KMEANS_TOL: f64 = 1e-4;

/// Seed shared by clustering and the train/test split.
pub const RANDOM_SEED: u64 = 42;

/// Fraction of labeled customers held out for reporting metrics.
pub const TEST_SIZE: f64 = 0.2;

/// WoE additive smoothing; keeps log-ratios finite for single-class categories.
pub const WOE_REGULARIZATION: f64 = 1.0;

/// Probability at or above which a customer is labeled high-risk (`p >= threshold`,
/// so a probability of exactly 0.5 is high-risk at the default).
pub const RISK_THRESHOLD: f64 = 0.5;

/// Logistic regression defaults.
pub mod logistic_defaults {
    pub const LEARNING_RATE: f64 = 0.1;
    pub const EPOCHS: usize = 2000;
    pub const L2: f64 = 1e-3;
}

/// Artifact file layout inside `ARTIFACT_DIR`.
pub const ARTIFACT_POINTER_FILE: &str = "LATEST";
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub api_port: u16,
    pub db_path: String,
    /// Directory holding versioned artifacts and the `LATEST` pointer (ARTIFACT_DIR)
    pub artifact_dir: String,
    /// Raw transactions CSV used by `train` and `score` (TRANSACTIONS_PATH)
    pub transactions_path: String,
    /// Reference date for recency (AS_OF_DATE). None = latest transaction in the input.
    pub as_of: Option<DateTime<Utc>>,
    pub kmeans_clusters: usize,
    pub random_seed: u64,
    pub test_size: f64,
    pub risk_threshold: f64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let as_of = match std::env::var("AS_OF_DATE") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                crate::ingest::parse_timestamp(raw.trim())
                    .map_err(|_| AppError::Config(format!("AS_OF_DATE {raw:?} is not a date")))?,
            ),
            _ => None,
        };

        let cfg = Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "runs.db".to_string()),
            artifact_dir: std::env::var("ARTIFACT_DIR")
                .unwrap_or_else(|_| "models/artifacts".to_string()),
            transactions_path: std::env::var("TRANSACTIONS_PATH")
                .unwrap_or_else(|_| "data/raw/data.csv".to_string()),
            as_of,
            kmeans_clusters: std::env::var("KMEANS_CLUSTERS")
                .unwrap_or_else(|_| KMEANS_CLUSTERS.to_string())
                .parse::<usize>()
                .map_err(|_| AppError::Config("KMEANS_CLUSTERS must be a positive integer".to_string()))?,
            random_seed: std::env::var("RANDOM_SEED")
                .unwrap_or_else(|_| RANDOM_SEED.to_string())
                .parse::<u64>()
                .map_err(|_| AppError::Config("RANDOM_SEED must be an unsigned integer".to_string()))?,
            test_size: std::env::var("TEST_SIZE")
                .unwrap_or_else(|_| TEST_SIZE.to_string())
                .parse::<f64>()
                .map_err(|_| AppError::Config("TEST_SIZE must be a number".to_string()))?,
            risk_threshold: std::env::var("RISK_THRESHOLD")
                .unwrap_or_else(|_| RISK_THRESHOLD.to_string())
                .parse::<f64>()
                .map_err(|_| AppError::Config("RISK_THRESHOLD must be a number".to_string()))?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.kmeans_clusters < 2 {
            return Err(AppError::Config("KMEANS_CLUSTERS must be at least 2".to_string()));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(AppError::Config("TEST_SIZE must be in (0, 1)".to_string()));
        }
        if !(self.risk_threshold > 0.0 && self.risk_threshold < 1.0) {
            return Err(AppError::Config("RISK_THRESHOLD must be in (0, 1)".to_string()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            api_port: 8000,
            db_path: "runs.db".to_string(),
            artifact_dir: "models/artifacts".to_string(),
            transactions_path: "data/raw/data.csv".to_string(),
            as_of: None,
            kmeans_clusters: KMEANS_CLUSTERS,
            random_seed: RANDOM_SEED,
            test_size: TEST_SIZE,
            risk_threshold: RISK_THRESHOLD,
        }
    }
}
