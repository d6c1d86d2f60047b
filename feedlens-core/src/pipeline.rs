//! Run controller: normalize → classify → summarize → aggregate → assemble
//!
//! The analyzer owns nothing across runs except the generation counter. Each call to
//! [`FeedbackAnalyzer::analyze`] builds its own unit collection, so a reset only has to
//! advance the generation; whatever the superseded run produces afterwards is discarded.

use crate::classifier::{FeedbackClassifier, InsightSummarizer};
use crate::data_source::ParsedCsv;
use crate::models::{ColumnMapping, ProcessedReport};
use crate::normalizer::RowNormalizer;
use crate::orchestrator::{ClassificationOrchestrator, OrchestratorConfig};
use crate::outcome::Notice;
use crate::progress::{ProgressEvent, ProgressSink, RunPhase};
use crate::report;
use crate::run::{RunController, RunToken};
use crate::summarizer;
use crate::{FeedbackError, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// What happened during one run, beyond the report itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub total_units: usize,
    pub labeled_units: usize,
    pub unprocessed_units: usize,
    pub failed_batches: Vec<usize>,
    pub insights_generated: bool,
    pub notices: Vec<Notice>,
}

impl RunSummary {
    pub fn is_complete(&self) -> bool {
        self.failed_batches.is_empty() && self.notices.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub report: ProcessedReport,
    pub summary: RunSummary,
}

pub struct FeedbackAnalyzer<C, S> {
    orchestrator: ClassificationOrchestrator<C>,
    summarizer: S,
    controller: RunController,
}

impl<C, S> FeedbackAnalyzer<C, S>
where
    C: FeedbackClassifier,
    S: InsightSummarizer,
{
    pub fn new(classifier: C, summarizer: S, config: OrchestratorConfig) -> Self {
        Self {
            orchestrator: ClassificationOrchestrator::new(classifier, config),
            summarizer,
            controller: RunController::new(),
        }
    }

    pub fn controller(&self) -> &RunController {
        &self.controller
    }

    /// Abandon the in-flight run, if any.
    pub fn reset(&self) {
        info!("Resetting analysis");
        self.controller.reset();
    }

    /// Run the whole pipeline over parsed CSV input. Only input errors (unknown feedback
    /// column, bad batch size) and a reset abort; every other failure becomes a notice.
    pub async fn analyze(
        &self,
        input: &ParsedCsv,
        mapping: &ColumnMapping,
        sink: &dyn ProgressSink,
    ) -> Result<AnalysisOutcome> {
        let token = self.controller.begin();
        self.analyze_with_token(input, mapping, sink, &token).await
    }

    pub async fn analyze_with_token(
        &self,
        input: &ParsedCsv,
        mapping: &ColumnMapping,
        sink: &dyn ProgressSink,
        token: &RunToken,
    ) -> Result<AnalysisOutcome> {
        let normalizer = RowNormalizer::default();
        let mut units = normalizer.normalize(&input.headers, &input.rows, mapping)?;
        info!(
            "Run {} (generation {}): {} rows, feedback column '{}'",
            normalizer.run_id(),
            token.generation(),
            units.len(),
            mapping.feedback_text_column
        );

        sink.emit(ProgressEvent::Phase {
            phase: RunPhase::Classifying,
        });
        let classification = self.orchestrator.run(&mut units, sink, token).await?;
        if classification.abandoned || !token.is_current() {
            return Err(FeedbackError::RunReset(token.generation()));
        }

        sink.emit(ProgressEvent::Phase {
            phase: RunPhase::Summarizing,
        });
        let summary = summarizer::summarize(&self.summarizer, &units).await;
        if !token.is_current() {
            warn!("Dropping late summary for reset run {}", token.generation());
            return Err(FeedbackError::RunReset(token.generation()));
        }

        let mut notices = classification.notices;
        if let Some(notice) = summary.notice {
            sink.emit(ProgressEvent::Notice {
                notice: notice.clone(),
            });
            notices.push(notice);
        }

        sink.emit(ProgressEvent::Phase {
            phase: RunPhase::Aggregating,
        });
        let insights_generated = summary.insights.is_some();
        let report = report::build_report(units, summary.insights);

        sink.emit(ProgressEvent::Phase {
            phase: RunPhase::Complete,
        });

        let run_summary = RunSummary {
            run_id: normalizer.run_id(),
            total_units: classification.total_units,
            labeled_units: classification.labeled_units,
            unprocessed_units: classification.unprocessed_units,
            failed_batches: classification.failed_batches,
            insights_generated,
            notices,
        };
        info!(
            "Run {} complete: {}/{} labeled, {} topics, insights={}",
            run_summary.run_id,
            run_summary.labeled_units,
            run_summary.total_units,
            report.topic_distribution.len(),
            insights_generated
        );

        Ok(AnalysisOutcome {
            report,
            summary: run_summary,
        })
    }
}
