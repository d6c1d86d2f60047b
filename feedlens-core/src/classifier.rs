//! Seams to the remote classification and summarization services

use crate::models::{KeyInsights, Sentiment};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One comment submitted for classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationRequest {
    pub id: String,
    pub feedback_text: String,
}

/// Labels returned for one submitted id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedItem {
    pub id: String,
    pub sentiment: Sentiment,
    #[serde(default)]
    pub topics: Vec<String>,
}

/// Payload entry for the insight summary call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryInput {
    pub text: String,
    pub sentiment: Sentiment,
}

/// Sentiment/topic classifier. May return fewer items than submitted, or fail outright.
#[async_trait]
pub trait FeedbackClassifier: Send + Sync {
    async fn classify_batch(&self, batch: &[ClassificationRequest]) -> Result<Vec<ClassifiedItem>>;
}

/// Urgent-issue / overall-sentiment summarizer. Receives the JSON-serialized
/// `[{text, sentiment}]` array.
#[async_trait]
pub trait InsightSummarizer: Send + Sync {
    async fn summarize(&self, feedback_data: &str) -> Result<KeyInsights>;
}

#[async_trait]
impl<T: FeedbackClassifier + ?Sized> FeedbackClassifier for std::sync::Arc<T> {
    async fn classify_batch(&self, batch: &[ClassificationRequest]) -> Result<Vec<ClassifiedItem>> {
        (**self).classify_batch(batch).await
    }
}

#[async_trait]
impl<T: InsightSummarizer + ?Sized> InsightSummarizer for std::sync::Arc<T> {
    async fn summarize(&self, feedback_data: &str) -> Result<KeyInsights> {
        (**self).summarize(feedback_data).await
    }
}
