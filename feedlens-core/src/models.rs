//! Domain records carried through the analysis pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One parsed CSV line, keyed by header name.
pub type RawRow = BTreeMap<String, String>;

/// Bucket key used when no labeled unit carries a timestamp.
pub const OVERALL_BUCKET: &str = "Overall";

/// Closed topic vocabulary the classifier may assign.
pub const ALLOWED_TOPICS: [&str; 8] = [
    "UI/UX",
    "Billing",
    "Performance",
    "Customer Support",
    "Feature Request",
    "Mobile App",
    "API",
    "General",
];

pub fn is_allowed_topic(topic: &str) -> bool {
    ALLOWED_TOPICS.contains(&topic)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Sentiment::Positive, Sentiment::Negative, Sentiment::Neutral];

    /// positive → 1, negative → -1, neutral → 0
    pub fn score(self) -> f64 {
        match self {
            Sentiment::Positive => 1.0,
            Sentiment::Negative => -1.0,
            Sentiment::Neutral => 0.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl std::str::FromStr for Sentiment {
    type Err = crate::FeedbackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            other => Err(crate::FeedbackError::Validation(format!(
                "Invalid sentiment label: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-chosen columns for one analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    pub feedback_text_column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_column: Option<String>,
}

impl ColumnMapping {
    pub fn new(feedback_text_column: impl Into<String>) -> Self {
        Self {
            feedback_text_column: feedback_text_column.into(),
            timestamp_column: None,
        }
    }

    pub fn with_timestamp(mut self, column: impl Into<String>) -> Self {
        self.timestamp_column = Some(column.into());
        self
    }
}

/// Canonical per-row record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisUnit {
    pub id: String,
    pub original_index: usize,
    pub full_data: RawRow,
    pub feedback_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<String>>,
}

impl AnalysisUnit {
    pub fn is_labeled(&self) -> bool {
        self.sentiment.is_some()
    }

    /// Attach classifier output. A unit is labeled at most once; later calls are ignored
    /// and return `false`.
    pub fn apply_label(&mut self, sentiment: Sentiment, topics: Vec<String>) -> bool {
        if self.sentiment.is_some() {
            return false;
        }
        self.sentiment = Some(sentiment);
        self.sentiment_score = Some(sentiment.score());
        self.topics = Some(topics);
        true
    }
}

/// Per-sentiment counters shared by the time series and the topic distribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentCounts {
    pub positive: u64,
    pub negative: u64,
    pub neutral: u64,
}

impl SentimentCounts {
    pub fn increment(&mut self, sentiment: Sentiment) {
        match sentiment {
            Sentiment::Positive => self.positive += 1,
            Sentiment::Negative => self.negative += 1,
            Sentiment::Neutral => self.neutral += 1,
        }
    }

    pub fn get(&self, sentiment: Sentiment) -> u64 {
        match sentiment {
            Sentiment::Positive => self.positive,
            Sentiment::Negative => self.negative,
            Sentiment::Neutral => self.neutral,
        }
    }

    pub fn total(&self) -> u64 {
        self.positive + self.negative + self.neutral
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentDataPoint {
    /// ISO calendar date (`YYYY-MM-DD`) or [`OVERALL_BUCKET`].
    #[serde(alias = "date")]
    pub bucket_key: String,
    pub positive: u64,
    pub negative: u64,
    pub neutral: u64,
}

impl SentimentDataPoint {
    pub fn from_counts(bucket_key: impl Into<String>, counts: SentimentCounts) -> Self {
        Self {
            bucket_key: bucket_key.into(),
            positive: counts.positive,
            negative: counts.negative,
            neutral: counts.neutral,
        }
    }

    pub fn is_overall(&self) -> bool {
        self.bucket_key == OVERALL_BUCKET
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSentimentDistribution {
    #[serde(alias = "name")]
    pub topic: String,
    pub positive: u64,
    pub negative: u64,
    pub neutral: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInsights {
    pub urgent_issue: String,
    pub overall_sentiment: String,
}

/// Full in-memory output of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedReport {
    pub feedback_items: Vec<AnalysisUnit>,
    pub sentiment_over_time: Vec<SentimentDataPoint>,
    pub topic_distribution: Vec<TopicSentimentDistribution>,
    pub key_insights: Option<KeyInsights>,
}

impl ProcessedReport {
    pub fn labeled_count(&self) -> usize {
        self.feedback_items.iter().filter(|u| u.is_labeled()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> AnalysisUnit {
        AnalysisUnit {
            id: "u-1".into(),
            original_index: 0,
            full_data: RawRow::new(),
            feedback_text: "Love it".into(),
            timestamp: None,
            sentiment: None,
            sentiment_score: None,
            topics: None,
        }
    }

    #[test]
    fn test_label_applied_once() {
        let mut u = unit();
        assert!(u.apply_label(Sentiment::Negative, vec!["Billing".into()]));
        assert_eq!(u.sentiment_score, Some(-1.0));

        // Second label is ignored
        assert!(!u.apply_label(Sentiment::Positive, vec![]));
        assert_eq!(u.sentiment, Some(Sentiment::Negative));
        assert_eq!(u.topics.as_deref(), Some(&["Billing".to_string()][..]));
    }

    #[test]
    fn test_sentiment_parsing() {
        assert_eq!("Positive".parse::<Sentiment>().unwrap(), Sentiment::Positive);
        assert_eq!(" neutral ".parse::<Sentiment>().unwrap(), Sentiment::Neutral);
        assert!("mixed".parse::<Sentiment>().is_err());
    }

    #[test]
    fn test_data_point_accepts_legacy_date_key() {
        let point: SentimentDataPoint = serde_json::from_str(
            r#"{"date":"2024-03-01","positive":1,"negative":0,"neutral":2}"#,
        )
        .unwrap();
        assert_eq!(point.bucket_key, "2024-03-01");

        let json = serde_json::to_value(&point).unwrap();
        assert_eq!(json["bucketKey"], "2024-03-01");
    }
}
