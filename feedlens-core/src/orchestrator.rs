//! Batch classification: dispatch, tolerate failure, merge labels back by id

use crate::batcher::{self, BatchSpec};
use crate::classifier::{ClassificationRequest, ClassifiedItem, FeedbackClassifier};
use crate::errors::FailureKind;
use crate::models::AnalysisUnit;
use crate::outcome::{attempt, truncate_detail, CallFailure, CallOutcome, Notice};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::run::RunToken;
use crate::Result;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Configuration for batch classification
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum units per classifier call
    pub batch_size: usize,
    /// Batches in flight at once; 1 means strictly sequential
    pub max_concurrent_batches: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            batch_size: batcher::DEFAULT_BATCH_SIZE,
            max_concurrent_batches: 1,
        }
    }
}

/// Result of one batch call, not yet merged.
#[derive(Debug)]
pub struct PartialResult {
    pub batch: BatchSpec,
    pub outcome: CallOutcome<Vec<ClassifiedItem>>,
}

/// Totals for the classification phase of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationSummary {
    pub total_units: usize,
    pub labeled_units: usize,
    pub unprocessed_units: usize,
    /// 1-based numbers of batches whose call failed outright
    pub failed_batches: Vec<usize>,
    pub notices: Vec<Notice>,
    /// Set when the run was reset before every batch was attempted
    pub abandoned: bool,
}

pub fn requests_for(units: &[AnalysisUnit]) -> Vec<ClassificationRequest> {
    units
        .iter()
        .map(|u| ClassificationRequest {
            id: u.id.clone(),
            feedback_text: u.feedback_text.clone(),
        })
        .collect()
}

/// Call the classifier once for one batch.
pub async fn classify_batch<C>(
    classifier: &C,
    batch: BatchSpec,
    requests: Vec<ClassificationRequest>,
) -> PartialResult
where
    C: FeedbackClassifier + ?Sized,
{
    let label = format!("Batch {} of {}", batch.number, batch.of);
    debug!("Submitting {} ({} items)", label, requests.len());
    let outcome = attempt(&label, classifier.classify_batch(&requests)).await;
    PartialResult { batch, outcome }
}

/// Fold returned labels onto the units of `batch`, matching by id. Ids outside the batch
/// and repeated ids are ignored. Returns how many units were newly labeled.
pub fn merge(units: &mut [AnalysisUnit], batch: &BatchSpec, results: &[ClassifiedItem]) -> usize {
    let mut by_id: HashMap<&str, &ClassifiedItem> = HashMap::with_capacity(results.len());
    for item in results {
        by_id.entry(item.id.as_str()).or_insert(item);
    }

    let mut labeled = 0;
    for unit in &mut units[batch.range.clone()] {
        if let Some(item) = by_id.get(unit.id.as_str()) {
            if unit.apply_label(item.sentiment, item.topics.clone()) {
                labeled += 1;
            }
        }
    }
    labeled
}

pub fn batch_failure_notice(batch: &BatchSpec, failure: &CallFailure) -> Notice {
    let message = match failure.kind {
        FailureKind::Capacity => format!(
            "Analysis for Batch {} of {} failed due to API limits or service unavailability. Some results may be missing.",
            batch.number, batch.of
        ),
        FailureKind::Other => format!(
            "Analysis for Batch {} of {} failed: {}.",
            batch.number,
            batch.of,
            truncate_detail(&failure.message)
        ),
    };
    Notice {
        title: format!("Batch {} Analysis Error", batch.number),
        message,
        kind: failure.kind,
    }
}

/// Drives one classifier call per batch and merges the results into the run's units.
pub struct ClassificationOrchestrator<C> {
    classifier: C,
    config: OrchestratorConfig,
}

impl<C> ClassificationOrchestrator<C>
where
    C: FeedbackClassifier,
{
    pub fn new(classifier: C, config: OrchestratorConfig) -> Self {
        Self { classifier, config }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Classify every unit. Batch failures are recorded, never propagated; only an
    /// invalid batch size is an error. Every unit stays in `units` whether labeled or not.
    pub async fn run(
        &self,
        units: &mut [AnalysisUnit],
        sink: &dyn ProgressSink,
        token: &RunToken,
    ) -> Result<ClassificationSummary> {
        let plan = batcher::plan(units.len(), self.config.batch_size)?;
        let total = units.len();
        info!(
            "Classifying {} units in {} batches (batch_size={}, concurrency={})",
            total,
            plan.len(),
            self.config.batch_size,
            self.config.max_concurrent_batches
        );

        let work: Vec<(BatchSpec, Vec<ClassificationRequest>)> = plan
            .into_iter()
            .map(|spec| {
                let requests = requests_for(&units[spec.range.clone()]);
                (spec, requests)
            })
            .collect();

        let classifier = &self.classifier;
        let mut results = stream::iter(work)
            .map(|(spec, requests)| classify_batch(classifier, spec, requests))
            .buffered(self.config.max_concurrent_batches.max(1));

        let mut summary = ClassificationSummary {
            total_units: total,
            ..Default::default()
        };
        let mut attempted = 0;

        while let Some(partial) = results.next().await {
            if !token.is_current() {
                info!(
                    "Run {} was reset; dropping result of batch {} and remaining work",
                    token.generation(),
                    partial.batch.number
                );
                summary.abandoned = true;
                break;
            }

            match &partial.outcome {
                CallOutcome::Succeeded(items) => {
                    let labeled = merge(units, &partial.batch, items);
                    if labeled < partial.batch.len() {
                        debug!(
                            "Batch {} returned labels for {} of {} units",
                            partial.batch.number,
                            labeled,
                            partial.batch.len()
                        );
                    }
                    summary.labeled_units += labeled;
                }
                CallOutcome::Failed(failure) => {
                    summary.failed_batches.push(partial.batch.number);
                    let notice = batch_failure_notice(&partial.batch, failure);
                    sink.emit(ProgressEvent::Notice {
                        notice: notice.clone(),
                    });
                    summary.notices.push(notice);
                }
            }

            attempted += partial.batch.len();
            sink.emit(ProgressEvent::progress(attempted, total));
        }

        summary.unprocessed_units = total - summary.labeled_units;
        info!(
            "Classification finished: {} of {} units labeled, {} failed batches",
            summary.labeled_units,
            total,
            summary.failed_batches.len()
        );
        Ok(summary)
    }
}
