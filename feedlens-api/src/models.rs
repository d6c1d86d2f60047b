use chrono::{DateTime, Utc};
use feedlens_core::compare::ReportComparison;
use feedlens_core::{AnalysisDetails, ColumnMapping, ReportSummary, StoredReportRecord};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

// Analyze endpoint models
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct AnalyzeRequest {
    /// Raw CSV file text
    #[validate(length(min = 1, message = "csv_text must not be empty"))]
    pub csv_text: String,
    pub source_file_name: String,
    #[validate]
    pub mapping: ColumnMappingBody,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ColumnMappingBody {
    #[validate(length(min = 1))]
    pub feedback_text_column: String,
    #[serde(default)]
    pub timestamp_column: Option<String>,
}

impl From<&ColumnMappingBody> for ColumnMapping {
    fn from(body: &ColumnMappingBody) -> Self {
        let mapping = ColumnMapping::new(body.feedback_text_column.clone());
        match body.timestamp_column.as_deref().filter(|c| !c.is_empty()) {
            Some(column) => mapping.with_timestamp(column),
            None => mapping,
        }
    }
}

// Report endpoint models
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct SaveReportRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(length(min = 1, message = "analysis name is required"))]
    pub analysis_name: String,
    pub source_file_name: String,
    /// Report in storage form (timestamps as ISO-8601 strings)
    #[schema(value_type = Object)]
    pub processed_data: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SaveReportResponse {
    pub analysis_id: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AnalysisDetailsBody {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub source_file_name: String,
}

impl From<AnalysisDetails> for AnalysisDetailsBody {
    fn from(details: AnalysisDetails) -> Self {
        Self {
            id: details.id,
            name: details.name,
            created_at: details.created_at,
            source_file_name: details.source_file_name,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReportResponse {
    #[schema(value_type = Object)]
    pub processed_data: serde_json::Value,
    pub analysis_details: AnalysisDetailsBody,
}

impl ReportResponse {
    pub fn from_record(record: StoredReportRecord) -> Result<Self, serde_json::Error> {
        Ok(Self {
            analysis_details: record.details().into(),
            processed_data: serde_json::to_value(&record.processed_data)?,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReportSummaryBody {
    pub id: String,
    pub analysis_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<ReportSummary> for ReportSummaryBody {
    fn from(summary: ReportSummary) -> Self {
        Self {
            id: summary.storage_id,
            analysis_name: summary.analysis_name,
            created_at: summary.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompareResponse {
    pub current: AnalysisDetailsBody,
    pub previous: AnalysisDetailsBody,
    #[schema(value_type = Object)]
    pub comparison: ReportComparison,
}
