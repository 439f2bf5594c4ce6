use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use credit_risk::config::Config;
use credit_risk::db::RunRegistry;
use credit_risk::error::Result;
use credit_risk::ingest::read_transactions;
use credit_risk::pipeline::train_and_save;

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
        error!("Training failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| cfg.transactions_path.clone());
    let (records, stats) = read_transactions(&path)?;
    info!(
        "[INGEST] {} rows read, {} accepted, {} rejected",
        stats.rows_read,
        stats.accepted,
        stats.rejected()
    );

    let outcome = train_and_save(&records, &cfg)?;

    let registry = RunRegistry::connect(&cfg.db_path).await?;
    registry.record_run(&outcome.artifact, &outcome.saved).await?;

    let m = &outcome.artifact.metrics;
    info!(
        "[TRAIN] {} saved to {} | hold-out n={} acc={:.3} precision={:.3} recall={:.3} f1={:.3} auc={}",
        outcome.artifact.model_version,
        outcome.saved.path.display(),
        m.n_samples,
        m.accuracy,
        m.precision,
        m.recall,
        m.f1,
        m.roc_auc.map_or_else(|| "n/a".to_string(), |a| format!("{a:.3}")),
    );
    Ok(())
}
