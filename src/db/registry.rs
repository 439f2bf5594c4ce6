//! SQLite registry of training runs. One row per saved artifact.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::db::models::TrainingRunRow;
use crate::error::Result;
use crate::model::{SavedArtifact, TrainedModelArtifact};

const SELECT_RUNS: &str = r#"
    SELECT run_id, model_version, trained_at, as_of, artifact_path, checksum,
           n_customers, high_risk_cluster, high_risk_count, n_test,
           accuracy, precision_score, recall, f1, roc_auc
    FROM training_runs
"#;

#[derive(Clone)]
pub struct RunRegistry {
    pool: SqlitePool,
}

impl RunRegistry {
    /// Open (creating if needed) the database at `db_path` and run migrations.
    pub async fn connect(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        let registry = Self::from_pool(pool).await?;
        info!("[REGISTRY] ready at {db_path}");
        Ok(registry)
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn record_run(
        &self,
        artifact: &TrainedModelArtifact,
        saved: &SavedArtifact,
    ) -> Result<()> {
        let trained_at = artifact.trained_at.timestamp_nanos_opt().unwrap_or(i64::MAX);
        let as_of = artifact.as_of.timestamp_nanos_opt().unwrap_or(i64::MAX);
        let metrics = &artifact.metrics;

        sqlx::query(
            r#"
            INSERT INTO training_runs
                (run_id, model_version, trained_at, as_of, artifact_path, checksum,
                 n_customers, high_risk_cluster, high_risk_count, n_test,
                 accuracy, precision_score, recall, f1, roc_auc)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(artifact.run_id.to_string())
        .bind(&artifact.model_version)
        .bind(trained_at)
        .bind(as_of)
        .bind(saved.path.display().to_string())
        .bind(&saved.checksum)
        .bind(artifact.n_customers as i64)
        .bind(artifact.labeling.high_risk_cluster as i64)
        .bind(artifact.labeling.high_risk_count as i64)
        .bind(metrics.n_samples as i64)
        .bind(metrics.accuracy)
        .bind(metrics.precision)
        .bind(metrics.recall)
        .bind(metrics.f1)
        .bind(metrics.roc_auc)
        .execute(&self.pool)
        .await?;

        info!(
            run_id = %artifact.run_id,
            model_version = %artifact.model_version,
            "[REGISTRY] recorded run"
        );
        Ok(())
    }

    /// Most recent runs first.
    pub async fn recent_runs(&self, limit: i64) -> Result<Vec<TrainingRunRow>> {
        let sql = format!("{SELECT_RUNS} ORDER BY trained_at DESC, rowid DESC LIMIT ?");
        let rows = sqlx::query_as::<_, TrainingRunRow>(&sql)
            .bind(limit.max(0))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn latest_run(&self) -> Result<Option<TrainingRunRow>> {
        Ok(self.recent_runs(1).await?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labeling::ProxyLabeler;
    use crate::model::{ModelTrainer, TrainerConfig};
    use crate::test_support::{as_of, synthetic_customers};

    async fn memory_registry() -> RunRegistry {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        RunRegistry::from_pool(pool).await.unwrap()
    }

    fn trained() -> TrainedModelArtifact {
        let customers = synthetic_customers();
        let labeling = ProxyLabeler::new(3, 42).label(&customers).unwrap();
        ModelTrainer::new(TrainerConfig::default())
            .train(&labeling.attach(&customers), labeling.summary, as_of())
            .unwrap()
    }

    #[tokio::test]
    async fn empty_registry_has_no_latest_run() {
        let registry = memory_registry().await;
        assert!(registry.latest_run().await.unwrap().is_none());
        assert!(registry.recent_runs(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn records_and_reads_back_a_run() {
        let registry = memory_registry().await;
        let artifact = trained();
        let saved = SavedArtifact {
            path: "models/artifacts/test.json".into(),
            checksum: "abc123".to_string(),
        };
        registry.record_run(&artifact, &saved).await.unwrap();

        let row = registry.latest_run().await.unwrap().unwrap();
        assert_eq!(row.run_id, artifact.run_id.to_string());
        assert_eq!(row.model_version, artifact.model_version);
        assert_eq!(row.checksum, "abc123");
        assert_eq!(row.as_of, as_of().timestamp_nanos_opt().unwrap());
        assert_eq!(row.n_customers, 100);
        assert_eq!(row.high_risk_count as usize, artifact.labeling.high_risk_count);
        assert_eq!(row.roc_auc, artifact.metrics.roc_auc);
    }

    #[tokio::test]
    async fn recent_runs_are_newest_first_and_limited() {
        let registry = memory_registry().await;
        let mut versions = Vec::new();
        for i in 0..3 {
            let mut artifact = trained();
            artifact.trained_at = artifact.trained_at + chrono::Duration::seconds(i);
            artifact.model_version = format!("v-test-{i}");
            artifact.run_id = uuid::Uuid::new_v4();
            let saved = SavedArtifact {
                path: format!("a{i}.json").into(),
                checksum: format!("c{i}"),
            };
            registry.record_run(&artifact, &saved).await.unwrap();
            versions.push(artifact.model_version);
        }

        let rows = registry.recent_runs(2).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].model_version, "v-test-2");
        assert_eq!(rows[1].model_version, "v-test-1");
    }
}
