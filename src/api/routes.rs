use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::health::HealthState;
use crate::api::latency::{LatencySnapshot, LatencyStats};
use crate::db::{RunRegistry, TrainingRunRow};
use crate::error::AppError;
use crate::features::FeatureSchema;
use crate::labeling::LabelingSummary;
use crate::model::metrics::ClassificationReport;
use crate::scorer::CreditScorer;
use crate::types::{CustomerFeatureVector, FeatureRecord, PredictionResult};

#[derive(Clone)]
pub struct ApiState {
    pub scorer: CreditScorer,
    pub registry: RunRegistry,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(get_health))
        .route("/predict", post(post_predict))
        .route("/predict/features", post(post_predict_features))
        .route("/model", get(get_model))
        .route("/runs", get(get_runs))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RunsQuery {
    pub limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_version: String,
    pub predictions_served: u64,
    pub predictions_rejected: u64,
    pub last_prediction_at_ns: Option<u64>,
}

#[derive(Serialize)]
pub struct ModelResponse {
    pub model_version: String,
    pub run_id: String,
    pub trained_at: String,
    pub as_of: String,
    pub decision_threshold: f64,
    pub n_customers: usize,
    pub schema: FeatureSchema,
    pub metrics: ClassificationReport,
    pub labeling: LabelingSummary,
    pub information_values: Vec<(String, f64)>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let last = state.health.last_prediction_at_ns();
    Json(HealthResponse {
        status: "ok",
        model_version: state.scorer.model_version().to_string(),
        predictions_served: state.health.predictions_served(),
        predictions_rejected: state.health.predictions_rejected(),
        last_prediction_at_ns: (last != 0).then_some(last),
    })
}

async fn post_predict(
    State(state): State<ApiState>,
    Json(customer): Json<CustomerFeatureVector>,
) -> Result<Json<PredictionResult>, AppError> {
    score_timed(&state, &customer.to_record()).map(Json)
}

async fn post_predict_features(
    State(state): State<ApiState>,
    Json(record): Json<FeatureRecord>,
) -> Result<Json<PredictionResult>, AppError> {
    score_timed(&state, &record).map(Json)
}

/// Runs the scorer, feeding the latency histogram and health counters.
fn score_timed(state: &ApiState, record: &FeatureRecord) -> Result<PredictionResult, AppError> {
    let started = Instant::now();
    match state.scorer.score(record) {
        Ok(result) => {
            state.latency.record(started.elapsed());
            state.health.record_prediction(now_ns());
            Ok(result)
        }
        Err(e) => {
            state.health.record_rejection();
            warn!(customer_id = %record.customer_id, "[API] prediction rejected: {e}");
            Err(e)
        }
    }
}

async fn get_model(State(state): State<ApiState>) -> Json<ModelResponse> {
    let artifact = state.scorer.artifact();
    Json(ModelResponse {
        model_version: artifact.model_version.clone(),
        run_id: artifact.run_id.to_string(),
        trained_at: artifact.trained_at.to_rfc3339(),
        as_of: artifact.as_of.to_rfc3339(),
        decision_threshold: artifact.decision_threshold,
        n_customers: artifact.n_customers,
        schema: artifact.schema.clone(),
        metrics: artifact.metrics.clone(),
        labeling: artifact.labeling.clone(),
        information_values: artifact
            .preprocessor
            .information_values(&artifact.schema)
            .into_iter()
            .map(|(name, iv)| (name.to_string(), iv))
            .collect(),
    })
}

async fn get_runs(
    State(state): State<ApiState>,
    Query(params): Query<RunsQuery>,
) -> Result<Json<Vec<TrainingRunRow>>, AppError> {
    let limit = params.limit.unwrap_or(20).clamp(1, 500);
    let rows = state.registry.recent_runs(limit).await?;
    Ok(Json(rows))
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencySnapshot> {
    Json(state.latency.snapshot())
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use sqlx::sqlite::SqlitePoolOptions;
    use tower::ServiceExt;

    use crate::labeling::ProxyLabeler;
    use crate::model::{ModelTrainer, TrainerConfig};
    use crate::test_support::{as_of, synthetic_customers};

    async fn app() -> (Router, ApiState) {
        let customers = synthetic_customers();
        let labeling = ProxyLabeler::new(3, 42).label(&customers).unwrap();
        let artifact = ModelTrainer::new(TrainerConfig::default())
            .train(&labeling.attach(&customers), labeling.summary, as_of())
            .unwrap();
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let state = ApiState {
            scorer: CreditScorer::new(Arc::new(artifact)),
            registry: RunRegistry::from_pool(pool).await.unwrap(),
            health: Arc::new(HealthState::new()),
            latency: Arc::new(LatencyStats::new()),
        };
        (router(state.clone()), state)
    }

    fn post_json(uri: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_model_version() {
        let (app, state) = app().await;
        let resp = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["model_version"], state.scorer.model_version());
        assert!(json["last_prediction_at_ns"].is_null());
    }

    #[tokio::test]
    async fn predict_scores_a_customer_profile() {
        let (app, state) = app().await;
        let customer = &synthetic_customers()[0];
        let body = serde_json::to_string(customer).unwrap();

        let resp = app.oneshot(post_json("/predict", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let result: PredictionResult = serde_json::from_value(body_json(resp).await).unwrap();

        assert_eq!(result, state.scorer.score_customer(customer).unwrap());
        assert_eq!(state.health.predictions_served(), 1);
        assert_eq!(state.latency.len(), 1);
    }

    #[tokio::test]
    async fn predict_features_rejects_missing_feature() {
        let (app, state) = app().await;
        let mut record = synthetic_customers()[0].to_record();
        record.features.retain(|f| f.name != "monetary");
        let body = serde_json::to_string(&record).unwrap();

        let resp = app.oneshot(post_json("/predict/features", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(state.health.predictions_rejected(), 1);
        assert_eq!(state.health.predictions_served(), 0);
    }

    #[tokio::test]
    async fn model_endpoint_exposes_schema_and_labeling() {
        let (app, _state) = app().await;
        let resp = app
            .oneshot(Request::builder().uri("/model").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["schema"]["features"].as_array().unwrap().len(), 8);
        assert_eq!(json["labeling"]["n_clusters"], 3);
        assert_eq!(json["as_of"], as_of().to_rfc3339());
    }

    #[tokio::test]
    async fn runs_endpoint_is_empty_on_fresh_registry() {
        let (app, _state) = app().await;
        let resp = app
            .oneshot(Request::builder().uri("/runs?limit=5").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, serde_json::json!([]));
    }
}
