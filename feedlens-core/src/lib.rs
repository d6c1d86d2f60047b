//! Feedlens: batch sentiment/topic analysis and aggregation for customer feedback

pub mod aggregator;
pub mod batcher;
pub mod classifier;
pub mod compare;
pub mod config;
pub mod data_source;
pub mod errors;
pub mod identity;
pub mod llm_batch;
pub mod logging;
pub mod models;
pub mod normalizer;
pub mod orchestrator;
pub mod outcome;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod run;
pub mod store;
pub mod summarizer;

// Re-exports
pub use aggregator::{filter_by_topic, top_topics, SentimentBreakdown};
pub use classifier::{ClassificationRequest, ClassifiedItem, FeedbackClassifier, InsightSummarizer};
pub use compare::{compare, MetricDelta, PercentChange, ReportComparison};
pub use config::FeedlensConfig;
pub use data_source::{parse_csv_text, DataSource, DataSourceConfig, ParsedCsv};
pub use errors::{FailureKind, FeedbackError, Result};
pub use identity::{FileIdentityProvider, IdentityProvider, StaticIdentity};
pub use llm_batch::{BatchLlmClient, LlmBatchConfig};
pub use models::{
    AnalysisUnit, ColumnMapping, KeyInsights, ProcessedReport, RawRow, Sentiment,
    SentimentDataPoint, TopicSentimentDistribution,
};
pub use outcome::Notice;
pub use pipeline::{AnalysisOutcome, FeedbackAnalyzer, RunSummary};
pub use progress::{ProgressEvent, ProgressSink, RunPhase};
pub use report::{
    default_analysis_name, AnalysisDetails, NewReport, ReportSummary, StoredReport,
    StoredReportRecord,
};
pub use store::{InMemoryReportStore, JsonFileReportStore, ReportStore};

use std::sync::Arc;

/// Analyzer backed by one shared LLM client for both classification and summaries
pub type LlmAnalyzer = FeedbackAnalyzer<Arc<BatchLlmClient>, Arc<BatchLlmClient>>;

/// Build the production analyzer from loaded configuration.
pub fn llm_analyzer(config: &FeedlensConfig) -> Result<LlmAnalyzer> {
    let client = Arc::new(BatchLlmClient::new(LlmBatchConfig::from(&config.llm))?);
    Ok(FeedbackAnalyzer::new(
        Arc::clone(&client),
        client,
        config.orchestrator(),
    ))
}
