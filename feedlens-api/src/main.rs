use anyhow::Context;
use feedlens_api::{start_server, AppState, PgReportStore};
use feedlens_core::config::FeedlensConfig;
use feedlens_core::{
    logging, BatchLlmClient, FeedbackAnalyzer, FeedbackClassifier, InMemoryReportStore,
    InsightSummarizer, LlmBatchConfig, ReportStore,
};
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let json_logs = std::env::var("FEEDLENS_LOG_JSON").is_ok();
    logging::init("info", json_logs);

    let config_file = std::env::var("FEEDLENS_CONFIG").ok().map(PathBuf::from);
    let config = FeedlensConfig::load(config_file.as_deref(), &[])
        .context("failed to load configuration")?;

    let store: Arc<dyn ReportStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .context("failed to connect to the database")?;
            let store = PgReportStore::new(pool);
            store.migrate().await?;
            info!("Using PostgreSQL report store");
            Arc::new(store)
        }
        None => {
            warn!("No database_url configured; saved reports live in memory only");
            Arc::new(InMemoryReportStore::new())
        }
    };

    let client = Arc::new(BatchLlmClient::new(LlmBatchConfig::from(&config.llm))?);
    let classifier: Arc<dyn FeedbackClassifier> = client.clone();
    let summarizer: Arc<dyn InsightSummarizer> = client;
    let analyzer = FeedbackAnalyzer::new(classifier, summarizer, config.orchestrator());

    let state = AppState::new(store, analyzer, config.classification_progress_share)?;

    info!("Starting Feedlens API server on {}", config.bind_address);
    start_server(&config.bind_address, state).await?;
    Ok(())
}
