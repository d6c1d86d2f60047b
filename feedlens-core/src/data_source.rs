//! CSV input: file text to headers + raw rows

use crate::models::RawRow;
use crate::{FeedbackError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where the feedback rows come from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DataSourceConfig {
    Csv {
        path: PathBuf,
        delimiter: Option<u8>,
    },
    Text {
        content: String,
        delimiter: Option<u8>,
    },
    Memory {
        headers: Vec<String>,
        rows: Vec<RawRow>,
    },
}

/// Headers plus one [`RawRow`] per data line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedCsv {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl ParsedCsv {
    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }
}

#[derive(Debug, Clone)]
pub struct DataSource {
    config: DataSourceConfig,
}

impl DataSource {
    pub fn new(config: DataSourceConfig) -> Self {
        Self { config }
    }

    /// Create a CSV file data source
    pub fn csv(path: PathBuf) -> Self {
        Self::new(DataSourceConfig::Csv {
            path,
            delimiter: Some(b','),
        })
    }

    /// Create a data source over already-uploaded file text
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(DataSourceConfig::Text {
            content: content.into(),
            delimiter: Some(b','),
        })
    }

    /// Load every row. Fails with [`FeedbackError::Input`] when no headers or no rows result.
    pub async fn load(&self) -> Result<ParsedCsv> {
        let parsed = match &self.config {
            DataSourceConfig::Csv { path, delimiter } => {
                let path = path.clone();
                let delimiter = *delimiter;
                tokio::task::spawn_blocking(move || read_csv_file(&path, delimiter))
                    .await
                    .map_err(|e| FeedbackError::Input(e.to_string()))??
            }
            DataSourceConfig::Text { content, delimiter } => {
                parse_csv_text(content, delimiter.unwrap_or(b','))?
            }
            DataSourceConfig::Memory { headers, rows } => ParsedCsv {
                headers: headers.clone(),
                rows: rows.clone(),
            },
        };

        ensure_not_empty(parsed)
    }
}

fn ensure_not_empty(parsed: ParsedCsv) -> Result<ParsedCsv> {
    if parsed.headers.is_empty() || parsed.rows.is_empty() {
        return Err(FeedbackError::Input(
            "CSV file is empty or improperly formatted.".to_string(),
        ));
    }
    Ok(parsed)
}

fn read_csv_file(path: &Path, delimiter: Option<u8>) -> Result<ParsedCsv> {
    let content = std::fs::read_to_string(path)?;
    parse_csv_text(&content, delimiter.unwrap_or(b','))
}

/// Parse CSV text. Quoted fields may contain the delimiter and doubled quotes;
/// short rows are padded with empty strings and surplus fields are dropped.
/// Blank headers are skipped without shifting the columns after them. Fails with
/// [`FeedbackError::Input`] when no headers or no rows result.
pub fn parse_csv_text(content: &str, delimiter: u8) -> Result<ParsedCsv> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.trim().as_bytes());

    // (position in the record, header name)
    let columns: Vec<(usize, String)> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(position, h)| (position, h.trim().to_string()))
        .filter(|(_, h)| !h.is_empty())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = RawRow::new();
        for (position, header) in &columns {
            let value = record.get(*position).unwrap_or_default();
            row.insert(header.clone(), value.to_string());
        }
        rows.push(row);
    }

    let headers = columns.into_iter().map(|(_, h)| h).collect();
    ensure_not_empty(ParsedCsv { headers, rows })
}
