//! Raw rows + column mapping → canonical analysis units

use crate::models::{AnalysisUnit, ColumnMapping, RawRow};
use crate::{FeedbackError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use uuid::Uuid;

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Parse a timestamp cell. Naive values are taken as UTC; unparseable values yield `None`.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    for format in NAIVE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
        }
    }

    None
}

/// Turns rows into units for a single run. Ids are `fb-<run>-<index>`, so they are unique
/// within the run by construction and distinct across runs.
#[derive(Debug, Clone)]
pub struct RowNormalizer {
    run_id: Uuid,
}

impl Default for RowNormalizer {
    fn default() -> Self {
        Self::new(Uuid::new_v4())
    }
}

impl RowNormalizer {
    pub fn new(run_id: Uuid) -> Self {
        Self { run_id }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn normalize(
        &self,
        headers: &[String],
        rows: &[RawRow],
        mapping: &ColumnMapping,
    ) -> Result<Vec<AnalysisUnit>> {
        if !headers.iter().any(|h| *h == mapping.feedback_text_column) {
            return Err(FeedbackError::InvalidMapping(
                mapping.feedback_text_column.clone(),
            ));
        }

        let run = self.run_id.simple().to_string();
        let units = rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                let feedback_text = row
                    .get(&mapping.feedback_text_column)
                    .cloned()
                    .unwrap_or_default();
                let timestamp = mapping
                    .timestamp_column
                    .as_ref()
                    .and_then(|column| row.get(column))
                    .and_then(|value| parse_timestamp(value));

                AnalysisUnit {
                    id: format!("fb-{}-{}", &run[..12], index),
                    original_index: index,
                    full_data: row.clone(),
                    feedback_text,
                    timestamp,
                    sentiment: None,
                    sentiment_score: None,
                    topics: None,
                }
            })
            .collect();

        Ok(units)
    }
}
