use std::io::Write;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use credit_risk::config::Config;
use credit_risk::error::Result;
use credit_risk::ingest::read_transactions;
use credit_risk::model::TrainedModelArtifact;
use credit_risk::pipeline::score_transactions;
use credit_risk::scorer::explain::top_drivers;
use credit_risk::scorer::CreditScorer;

fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    // stdout carries the predictions; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cfg) {
        error!("Scoring failed: {e}");
        std::process::exit(1);
    }
}

fn run(cfg: Config) -> Result<()> {
    let scorer = CreditScorer::new(Arc::new(TrainedModelArtifact::load(&cfg.artifact_dir)?));

    let path = std::env::args().nth(1).unwrap_or_else(|| cfg.transactions_path.clone());
    let (records, _stats) = read_transactions(&path)?;
    let results = score_transactions(&scorer, &records, &cfg);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut high_risk = 0usize;
    for result in &results {
        if result.risk_label.is_high_risk() {
            high_risk += 1;
            let drivers: Vec<&str> = top_drivers(&result.attributions, 3)
                .into_iter()
                .map(|a| a.feature.as_str())
                .collect();
            info!(customer_id = %result.customer_id, p = result.probability_of_default, "[SCORE] high risk, drivers: {drivers:?}");
        }
        serde_json::to_writer(&mut out, result)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    info!(
        model_version = %scorer.model_version(),
        "[SCORE] {} customers scored, {} high risk",
        results.len(),
        high_risk
    );
    Ok(())
}
