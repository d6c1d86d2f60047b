//! Report assembly and the storage representation
//!
//! The stored form differs from [`ProcessedReport`] in exactly one way: unit timestamps
//! are ISO-8601 strings instead of structured values. Strings read back from storage are
//! carried verbatim, so a stored record re-serializes bit-for-bit.

use crate::aggregator;
use crate::models::{
    AnalysisUnit, KeyInsights, ProcessedReport, RawRow, Sentiment, SentimentDataPoint,
    TopicSentimentDistribution,
};
use crate::{FeedbackError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Combine the labeled units, both projections and the optional insights.
pub fn assemble(
    feedback_items: Vec<AnalysisUnit>,
    sentiment_over_time: Vec<SentimentDataPoint>,
    topic_distribution: Vec<TopicSentimentDistribution>,
    key_insights: Option<KeyInsights>,
) -> ProcessedReport {
    let mut feedback_items = feedback_items;
    feedback_items.sort_by_key(|u| u.original_index);
    ProcessedReport {
        feedback_items,
        sentiment_over_time,
        topic_distribution,
        key_insights,
    }
}

/// Aggregate `units` and assemble them into a report.
pub fn build_report(units: Vec<AnalysisUnit>, key_insights: Option<KeyInsights>) -> ProcessedReport {
    let series = aggregator::sentiment_over_time(&units);
    let distribution = aggregator::topic_distribution(&units);
    assemble(units, series, distribution, key_insights)
}

/// Millisecond-precision `Z`-suffixed form used for every stored timestamp.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFeedbackItem {
    pub id: String,
    pub original_index: usize,
    pub full_data: RawRow,
    pub feedback_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<String>>,
}

impl From<&AnalysisUnit> for StoredFeedbackItem {
    fn from(unit: &AnalysisUnit) -> Self {
        Self {
            id: unit.id.clone(),
            original_index: unit.original_index,
            full_data: unit.full_data.clone(),
            feedback_text: unit.feedback_text.clone(),
            timestamp: unit.timestamp.as_ref().map(format_timestamp),
            sentiment: unit.sentiment,
            sentiment_score: unit.sentiment_score,
            topics: unit.topics.clone(),
        }
    }
}

impl TryFrom<&StoredFeedbackItem> for AnalysisUnit {
    type Error = FeedbackError;

    fn try_from(item: &StoredFeedbackItem) -> Result<Self> {
        let timestamp = match &item.timestamp {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(raw)
                    .map_err(|e| {
                        FeedbackError::Validation(format!(
                            "item {} has invalid timestamp '{}': {}",
                            item.id, raw, e
                        ))
                    })?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        Ok(AnalysisUnit {
            id: item.id.clone(),
            original_index: item.original_index,
            full_data: item.full_data.clone(),
            feedback_text: item.feedback_text.clone(),
            timestamp,
            sentiment: item.sentiment,
            sentiment_score: item.sentiment_score,
            topics: item.topics.clone(),
        })
    }
}

/// [`ProcessedReport`] in storage form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReport {
    pub feedback_items: Vec<StoredFeedbackItem>,
    pub sentiment_over_time: Vec<SentimentDataPoint>,
    pub topic_distribution: Vec<TopicSentimentDistribution>,
    #[serde(default)]
    pub key_insights: Option<KeyInsights>,
}

impl StoredReport {
    pub fn from_report(report: &ProcessedReport) -> Self {
        Self {
            feedback_items: report.feedback_items.iter().map(StoredFeedbackItem::from).collect(),
            sentiment_over_time: report.sentiment_over_time.clone(),
            topic_distribution: report.topic_distribution.clone(),
            key_insights: report.key_insights.clone(),
        }
    }

    pub fn to_report(&self) -> Result<ProcessedReport> {
        let feedback_items = self
            .feedback_items
            .iter()
            .map(AnalysisUnit::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(ProcessedReport {
            feedback_items,
            sentiment_over_time: self.sentiment_over_time.clone(),
            topic_distribution: self.topic_distribution.clone(),
            key_insights: self.key_insights.clone(),
        })
    }

    /// Parse untrusted JSON (a stored document or a request body) into the stored shape.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let stored: StoredReport = serde_json::from_value(value)
            .map_err(|e| FeedbackError::Validation(format!("malformed report: {}", e)))?;
        stored.to_report()?;
        Ok(stored)
    }
}

/// Input to a store's save operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    pub user_id: String,
    pub analysis_name: String,
    pub source_file_name: String,
    pub processed_data: StoredReport,
}

impl NewReport {
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(FeedbackError::Validation("user id is required".into()));
        }
        if self.analysis_name.trim().is_empty() {
            return Err(FeedbackError::Validation("analysis name is required".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReportRecord {
    pub storage_id: String,
    pub user_id: String,
    pub analysis_name: String,
    pub source_file_name: String,
    pub processed_data: StoredReport,
    pub created_at: DateTime<Utc>,
}

impl StoredReportRecord {
    pub fn from_new(storage_id: String, report: NewReport, created_at: DateTime<Utc>) -> Self {
        Self {
            storage_id,
            user_id: report.user_id,
            analysis_name: report.analysis_name,
            source_file_name: report.source_file_name,
            processed_data: report.processed_data,
            created_at,
        }
    }

    /// Parse a stored document. Any shape mismatch is a `Validation` error, which readers
    /// treat as "not found".
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let record: StoredReportRecord = serde_json::from_value(value)
            .map_err(|e| FeedbackError::Validation(format!("malformed stored record: {}", e)))?;
        if record.analysis_name.is_empty() {
            return Err(FeedbackError::Validation(format!(
                "record {} has no analysis name",
                record.storage_id
            )));
        }
        record.processed_data.to_report()?;
        Ok(record)
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            storage_id: self.storage_id.clone(),
            analysis_name: self.analysis_name.clone(),
            created_at: self.created_at,
        }
    }

    pub fn details(&self) -> AnalysisDetails {
        AnalysisDetails {
            id: self.storage_id.clone(),
            name: self.analysis_name.clone(),
            created_at: self.created_at,
            source_file_name: self.source_file_name.clone(),
        }
    }
}

/// Row of a per-user history listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub storage_id: String,
    pub analysis_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDetails {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub source_file_name: String,
}

/// `feedback.csv` → `feedback Analysis`
pub fn default_analysis_name(source_file_name: &str) -> String {
    let base = if source_file_name.len() >= 4
        && source_file_name.is_char_boundary(source_file_name.len() - 4)
        && source_file_name[source_file_name.len() - 4..].eq_ignore_ascii_case(".csv")
    {
        &source_file_name[..source_file_name.len() - 4]
    } else {
        source_file_name
    };
    format!("{} Analysis", base)
}

/// Newest first; equal timestamps fall back to id for a stable order.
pub fn sort_newest_first(summaries: &mut [ReportSummary]) {
    summaries.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.storage_id.cmp(&b.storage_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn labeled(index: usize, ts: Option<DateTime<Utc>>) -> AnalysisUnit {
        let mut unit = AnalysisUnit {
            id: format!("fb-{}", index),
            original_index: index,
            full_data: RawRow::from([("comment".to_string(), "ok".to_string())]),
            feedback_text: "ok".into(),
            timestamp: ts,
            sentiment: None,
            sentiment_score: None,
            topics: None,
        };
        unit.apply_label(Sentiment::Neutral, vec!["General".into()]);
        unit
    }

    #[test]
    fn test_assemble_restores_original_order() {
        let report = build_report(vec![labeled(2, None), labeled(0, None), labeled(1, None)], None);
        let order: Vec<usize> = report.feedback_items.iter().map(|u| u.original_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(report.sentiment_over_time[0].neutral, 3);
    }

    #[test]
    fn test_storage_form_only_changes_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 8, 15, 30).unwrap();
        let report = build_report(vec![labeled(0, Some(ts)), labeled(1, None)], None);

        let stored = StoredReport::from_report(&report);
        assert_eq!(
            stored.feedback_items[0].timestamp.as_deref(),
            Some("2024-05-01T08:15:30.000Z")
        );
        assert!(stored.feedback_items[1].timestamp.is_none());

        let json = serde_json::to_value(&stored).unwrap();
        assert!(json["feedbackItems"][1].get("timestamp").is_none());
        assert_eq!(stored.to_report().unwrap(), report);
    }

    #[test]
    fn test_stored_string_survives_reserialization() {
        let raw = r#"{"feedbackItems":[{"id":"a","originalIndex":0,"fullData":{},"feedbackText":"x","timestamp":"2023-11-02T10:00:00.000Z","sentiment":"positive","sentimentScore":1.0,"topics":["API"]}],"sentimentOverTime":[],"topicDistribution":[],"keyInsights":null}"#;
        let stored = StoredReport::from_value(serde_json::from_str(raw).unwrap()).unwrap();
        let reparsed = StoredReport::from_report(&stored.to_report().unwrap());
        assert_eq!(
            reparsed.feedback_items[0].timestamp,
            stored.feedback_items[0].timestamp
        );
    }

    #[test]
    fn test_invalid_timestamp_is_validation_error() {
        let value = serde_json::json!({
            "feedbackItems": [{"id": "a", "originalIndex": 0, "fullData": {}, "feedbackText": "x", "timestamp": "yesterday"}],
            "sentimentOverTime": [],
            "topicDistribution": []
        });
        assert!(matches!(
            StoredReport::from_value(value),
            Err(FeedbackError::Validation(_))
        ));
    }

    #[test]
    fn test_record_missing_fields_rejected() {
        let value = serde_json::json!({"storageId": "r1", "userId": "u"});
        assert!(matches!(
            StoredReportRecord::from_value(value),
            Err(FeedbackError::Validation(_))
        ));
    }

    #[test]
    fn test_default_analysis_name() {
        assert_eq!(default_analysis_name("q3_feedback.csv"), "q3_feedback Analysis");
        assert_eq!(default_analysis_name("EXPORT.CSV"), "EXPORT Analysis");
        assert_eq!(default_analysis_name("notes.txt"), "notes.txt Analysis");
    }
}
