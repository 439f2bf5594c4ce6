use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use credit_risk::api::health::HealthState;
use credit_risk::api::latency::LatencyStats;
use credit_risk::api::routes::{router, ApiState};
use credit_risk::config::Config;
use credit_risk::db::RunRegistry;
use credit_risk::error::Result;
use credit_risk::model::TrainedModelArtifact;
use credit_risk::scorer::CreditScorer;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Model artifact (no artifact, no server) ---
    let artifact = TrainedModelArtifact::load(&cfg.artifact_dir)?;
    info!(
        model_version = %artifact.model_version,
        trained_at = %artifact.trained_at,
        high_risk_cluster = artifact.labeling.high_risk_cluster,
        "Model ready from {}",
        cfg.artifact_dir
    );
    let scorer = CreditScorer::new(Arc::new(artifact));

    // --- Run registry ---
    let registry = RunRegistry::connect(&cfg.db_path).await?;
    match registry.latest_run().await? {
        Some(run) if run.model_version != scorer.model_version() => info!(
            "[REGISTRY] latest recorded run is {} but serving {}",
            run.model_version,
            scorer.model_version()
        ),
        Some(_) => {}
        None => info!("[REGISTRY] no training runs recorded yet"),
    }

    // --- HTTP API server ---
    let api_state = ApiState {
        scorer,
        registry,
        health: Arc::new(HealthState::new()),
        latency: Arc::new(LatencyStats::new()),
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
