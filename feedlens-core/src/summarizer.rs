//! Single report-wide "urgent issue / overall sentiment" call

use crate::classifier::{InsightSummarizer, SummaryInput};
use crate::errors::FailureKind;
use crate::models::{AnalysisUnit, KeyInsights};
use crate::outcome::{attempt, truncate_detail, CallFailure, CallOutcome, Notice};
use crate::FeedbackError;
use tracing::{debug, info};

/// Labeled, non-empty units reduced to `{text, sentiment}`.
pub fn summary_payload(units: &[AnalysisUnit]) -> Vec<SummaryInput> {
    units
        .iter()
        .filter(|u| !u.feedback_text.is_empty())
        .filter_map(|u| {
            u.sentiment.map(|sentiment| SummaryInput {
                text: u.feedback_text.clone(),
                sentiment,
            })
        })
        .collect()
}

pub fn summary_failure_notice(failure: &CallFailure) -> Notice {
    let message = match failure.kind {
        FailureKind::Capacity => "Could not generate key insights due to API limits or service unavailability. Some insights might be unavailable.".to_string(),
        FailureKind::Other => format!(
            "Could not generate key insights: {}.",
            truncate_detail(&failure.message)
        ),
    };
    Notice {
        title: "Key Insight Generation Limited".to_string(),
        message,
        kind: failure.kind,
    }
}

/// Outcome of the summary step: insights when the call succeeded, a notice when it failed,
/// neither when there was nothing to summarize.
#[derive(Debug, Default)]
pub struct SummaryResult {
    pub insights: Option<KeyInsights>,
    pub notice: Option<Notice>,
    pub attempted: bool,
}

/// Skips the call entirely when no unit is labeled.
pub async fn summarize<S>(summarizer: &S, units: &[AnalysisUnit]) -> SummaryResult
where
    S: InsightSummarizer + ?Sized,
{
    let payload = summary_payload(units);
    if payload.is_empty() {
        info!("No labeled feedback; skipping key insight generation");
        return SummaryResult::default();
    }

    let feedback_data = match serde_json::to_string(&payload) {
        Ok(json) => json,
        Err(e) => {
            let failure = CallFailure {
                label: "Key insights".to_string(),
                kind: FailureKind::Other,
                message: FeedbackError::from(e).to_string(),
            };
            return SummaryResult {
                insights: None,
                notice: Some(summary_failure_notice(&failure)),
                attempted: false,
            };
        }
    };

    debug!("Requesting key insights for {} labeled items", payload.len());
    match attempt("Key insights", summarizer.summarize(&feedback_data)).await {
        CallOutcome::Succeeded(insights) => SummaryResult {
            insights: Some(insights),
            notice: None,
            attempted: true,
        },
        CallOutcome::Failed(failure) => SummaryResult {
            insights: None,
            notice: Some(summary_failure_notice(&failure)),
            attempted: true,
        },
    }
}
