//! Report persistence seam plus in-memory and JSON-file stores

use crate::report::{sort_newest_first, NewReport, ReportSummary, StoredReportRecord};
use crate::{FeedbackError, Result};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Append-only report store. Records are never mutated after `save`.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Persist a report and return its storage id. Creation time is assigned by the store.
    async fn save(&self, report: NewReport) -> Result<String>;

    /// `Ok(None)` both for unknown ids and for records that fail validation.
    async fn get_by_id(&self, storage_id: &str) -> Result<Option<StoredReportRecord>>;

    /// Summaries for one user, newest first.
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ReportSummary>>;
}

#[async_trait]
impl<T: ReportStore + ?Sized> ReportStore for Arc<T> {
    async fn save(&self, report: NewReport) -> Result<String> {
        (**self).save(report).await
    }

    async fn get_by_id(&self, storage_id: &str) -> Result<Option<StoredReportRecord>> {
        (**self).get_by_id(storage_id).await
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ReportSummary>> {
        (**self).list_by_user(user_id).await
    }
}

fn new_storage_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Process-local store
#[derive(Debug, Default, Clone)]
pub struct InMemoryReportStore {
    records: Arc<DashMap<String, StoredReportRecord>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn save(&self, report: NewReport) -> Result<String> {
        report.validate()?;
        let storage_id = new_storage_id();
        let record = StoredReportRecord::from_new(storage_id.clone(), report, Utc::now());
        self.records.insert(storage_id.clone(), record);
        Ok(storage_id)
    }

    async fn get_by_id(&self, storage_id: &str) -> Result<Option<StoredReportRecord>> {
        Ok(self.records.get(storage_id).map(|r| r.value().clone()))
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ReportSummary>> {
        let mut summaries: Vec<ReportSummary> = self
            .records
            .iter()
            .filter(|r| r.value().user_id == user_id)
            .map(|r| r.value().summary())
            .collect();
        sort_newest_first(&mut summaries);
        Ok(summaries)
    }
}

/// One `<storage_id>.json` document per report in a directory.
#[derive(Debug, Clone)]
pub struct JsonFileReportStore {
    dir: PathBuf,
}

impl JsonFileReportStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|e| {
            FeedbackError::Persistence(format!("cannot create store at {}: {}", dir.display(), e))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, storage_id: &str) -> Option<PathBuf> {
        // Ids are generated here; anything else cannot name a record.
        if storage_id.is_empty() || !storage_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(self.dir.join(format!("{}.json", storage_id)))
    }

    async fn read_record(path: &Path) -> Result<Option<StoredReportRecord>> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(FeedbackError::Persistence(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let parsed = serde_json::from_slice::<serde_json::Value>(&bytes)
            .map_err(|e| FeedbackError::Validation(e.to_string()))
            .and_then(StoredReportRecord::from_value);
        match parsed {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!("Ignoring invalid report document {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl ReportStore for JsonFileReportStore {
    async fn save(&self, report: NewReport) -> Result<String> {
        report.validate()?;
        let storage_id = new_storage_id();
        let record = StoredReportRecord::from_new(storage_id.clone(), report, Utc::now());
        let json = serde_json::to_vec_pretty(&record)?;

        let path = self.dir.join(format!("{}.json", storage_id));
        let write = async {
            let mut file = fs::File::create(&path).await?;
            file.write_all(&json).await?;
            file.sync_all().await
        };
        write.await.map_err(|e| {
            FeedbackError::Persistence(format!("cannot write {}: {}", path.display(), e))
        })?;

        debug!("Saved report {} to {}", storage_id, path.display());
        Ok(storage_id)
    }

    async fn get_by_id(&self, storage_id: &str) -> Result<Option<StoredReportRecord>> {
        match self.path_for(storage_id) {
            Some(path) => Self::read_record(&path).await,
            None => Ok(None),
        }
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ReportSummary>> {
        let mut entries = fs::read_dir(&self.dir).await.map_err(|e| {
            FeedbackError::Persistence(format!("cannot list {}: {}", self.dir.display(), e))
        })?;

        let mut summaries = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(record) = Self::read_record(&path).await? {
                if record.user_id == user_id {
                    summaries.push(record.summary());
                }
            }
        }

        sort_newest_first(&mut summaries);
        Ok(summaries)
    }
}
