use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub path: PathBuf,
    pub name: String,
    pub size: Option<u64>,
}

impl UploadedFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = file_name_of(&path);
        let size = std::fs::metadata(&path).ok().map(|m| m.len());
        Self { path, name, size }
    }

    /// File name without its last extension, used to name scratch directories.
    pub fn stem(&self) -> String {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("upload")
            .to_string()
    }
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub encoding: String,
    pub delimiter: char,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            encoding: "utf-8".to_string(),
            delimiter: ',',
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ParsedTable {
    /// An empty header is the only failure signal the parser exposes.
    pub fn is_success(&self) -> bool {
        !self.header.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    pub success: bool,
    pub inserted: usize,
}

impl InsertOutcome {
    pub fn ok(inserted: usize) -> Self {
        Self { success: true, inserted }
    }

    pub fn failed() -> Self {
        Self { success: false, inserted: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageRecord {
    pub id: i64,
    pub file_source: String,
    pub data_type: Option<String>,
    pub row_number: i64,
    pub row_content: serde_json::Value,
    pub imported_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingSummary {
    pub source_filename: String,
    pub status: ProcessingStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ProcessingSummary {
    pub fn new(source_filename: impl Into<String>, status: ProcessingStatus, message: impl Into<String>) -> Self {
        Self {
            source_filename: source_filename.into(),
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Outcome of driving one uploaded file through the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub source_filename: String,
    pub succeeded: bool,
    pub summaries: Vec<ProcessingSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub overall_status: String,
    pub summaries: Vec<ProcessingSummary>,
}

impl RunReport {
    pub fn count(&self, status: ProcessingStatus) -> usize {
        self.summaries.iter().filter(|s| s.status == status).count()
    }
}
