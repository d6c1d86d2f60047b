use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feedlens_core::report::sort_newest_first;
use feedlens_core::{
    FeedbackError, NewReport, ReportStore, ReportSummary, Result, StoredReport, StoredReportRecord,
};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{debug, warn};
use uuid::Uuid;

/// Reports in the `analyses` table, `processed_data` as JSONB.
#[derive(Clone)]
pub struct PgReportStore {
    pool: PgPool,
}

fn persistence(err: sqlx::Error) -> FeedbackError {
    FeedbackError::Persistence(err.to_string())
}

impl PgReportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| FeedbackError::Persistence(format!("migration failed: {}", e)))
    }

    fn record_from_row(row: &PgRow) -> Result<StoredReportRecord> {
        let id: Uuid = row.try_get("id").map_err(persistence)?;
        let processed_data: serde_json::Value =
            row.try_get("processed_data").map_err(persistence)?;
        let record = StoredReportRecord {
            storage_id: id.simple().to_string(),
            user_id: row.try_get("user_id").map_err(persistence)?,
            analysis_name: row.try_get("analysis_name").map_err(persistence)?,
            source_file_name: row.try_get("source_file_name").map_err(persistence)?,
            processed_data: StoredReport::from_value(processed_data)?,
            created_at: row.try_get("created_at").map_err(persistence)?,
        };
        if record.analysis_name.is_empty() {
            return Err(FeedbackError::Validation(format!(
                "record {} has no analysis name",
                record.storage_id
            )));
        }
        Ok(record)
    }
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn save(&self, report: NewReport) -> Result<String> {
        report.validate()?;
        let id = Uuid::new_v4();
        let processed_data = serde_json::to_value(&report.processed_data)?;

        sqlx::query(
            r#"
            INSERT INTO analyses (id, user_id, analysis_name, source_file_name, processed_data)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(&report.user_id)
        .bind(&report.analysis_name)
        .bind(&report.source_file_name)
        .bind(processed_data)
        .execute(&self.pool)
        .await
        .map_err(persistence)?;

        debug!("Saved report {} for user {}", id, report.user_id);
        Ok(id.simple().to_string())
    }

    async fn get_by_id(&self, storage_id: &str) -> Result<Option<StoredReportRecord>> {
        let Ok(id) = Uuid::parse_str(storage_id) else {
            return Ok(None);
        };

        let row = sqlx::query(
            r#"
            SELECT id, user_id, analysis_name, source_file_name, processed_data, created_at
            FROM analyses
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence)?;

        match row.as_ref().map(Self::record_from_row) {
            None => Ok(None),
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(FeedbackError::Validation(msg))) => {
                warn!("Ignoring invalid stored report {}: {}", storage_id, msg);
                Ok(None)
            }
            Some(Err(e)) => Err(e),
        }
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ReportSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, analysis_name, created_at
            FROM analyses
            WHERE user_id = $1 AND analysis_name <> ''
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;

        let mut summaries = rows
            .iter()
            .map(|row| {
                let id: Uuid = row.try_get("id").map_err(persistence)?;
                let created_at: DateTime<Utc> = row.try_get("created_at").map_err(persistence)?;
                Ok(ReportSummary {
                    storage_id: id.simple().to_string(),
                    analysis_name: row.try_get("analysis_name").map_err(persistence)?,
                    created_at,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        sort_newest_first(&mut summaries);
        Ok(summaries)
    }
}
