use crate::errors::ApiError;
use crate::models::AnalyzeRequest;
use crate::services::monitoring::ServiceMetrics;
use crate::streaming::StreamEvent;
use feedlens_core::run::RunController;
use feedlens_core::{
    parse_csv_text, ColumnMapping, FeedbackAnalyzer, FeedbackClassifier, FeedbackError,
    InsightSummarizer, ParsedCsv, StoredReport,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Analyzer with the service seams erased so tests can plug in fakes.
pub type SharedAnalyzer =
    FeedbackAnalyzer<Arc<dyn FeedbackClassifier>, Arc<dyn InsightSummarizer>>;

/// Input checked before any event is streamed.
#[derive(Debug)]
pub struct PreparedRun {
    pub input: ParsedCsv,
    pub mapping: ColumnMapping,
    pub source_file_name: String,
}

pub struct AnalysisService {
    analyzer: Arc<SharedAnalyzer>,
    metrics: ServiceMetrics,
    progress_share: f64,
}

impl AnalysisService {
    pub fn new(analyzer: Arc<SharedAnalyzer>, metrics: ServiceMetrics, progress_share: f64) -> Self {
        Self {
            analyzer,
            metrics,
            progress_share,
        }
    }

    /// Parse the CSV and check the feedback column exists.
    pub fn prepare(&self, request: &AnalyzeRequest) -> Result<PreparedRun, ApiError> {
        let input = parse_csv_text(&request.csv_text, b',')?;
        let mapping = ColumnMapping::from(&request.mapping);

        if !input.has_column(&mapping.feedback_text_column) {
            return Err(FeedbackError::InvalidMapping(mapping.feedback_text_column).into());
        }

        Ok(PreparedRun {
            input,
            mapping,
            source_file_name: request.source_file_name.clone(),
        })
    }

    /// Drive one run, forwarding progress into `events`. Each request gets its own
    /// controller so a disconnecting client only abandons its own run.
    pub async fn run(&self, prepared: PreparedRun, events: mpsc::Sender<StreamEvent>) {
        let controller = RunController::new();
        let token = controller.begin();
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
        let started = Instant::now();

        self.metrics.active_streams.inc();
        info!(
            "Starting analysis of '{}' ({} rows)",
            prepared.source_file_name,
            prepared.input.rows.len()
        );

        let analysis = async {
            let progress_tx = progress_tx;
            self.analyzer
                .analyze_with_token(&prepared.input, &prepared.mapping, &progress_tx, &token)
                .await
        };

        let forward = async {
            while let Some(event) = progress_rx.recv().await {
                if events
                    .send(StreamEvent::from_progress(event, self.progress_share))
                    .await
                    .is_err()
                {
                    warn!("Client disconnected, abandoning run {}", token.generation());
                    controller.reset();
                    break;
                }
            }
        };

        let (result, ()) = tokio::join!(analysis, forward);

        let terminal = match result {
            Ok(outcome) => {
                self.metrics
                    .record_analysis_complete(&outcome.summary, started.elapsed().as_secs_f64());
                Some(StreamEvent::Complete {
                    report: StoredReport::from_report(&outcome.report),
                    summary: outcome.summary,
                })
            }
            Err(FeedbackError::RunReset(generation)) => {
                info!("Run {} was abandoned before completion", generation);
                self.metrics.record_analysis_failed("reset");
                None
            }
            Err(e) => {
                error!("Analysis of '{}' failed: {}", prepared.source_file_name, e);
                self.metrics.record_analysis_failed("error");
                Some(StreamEvent::Error {
                    message: e.to_string(),
                    recoverable: e.is_input_error(),
                })
            }
        };

        if let Some(event) = terminal {
            if events.send(event).await.is_err() {
                warn!("Client disconnected before the final event");
            }
        }
        self.metrics.active_streams.dec();
    }
}
