use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use regex::Regex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    application::ingestion_service::IngestionService,
    config::Settings,
    domain::{
        content_type::CategoryTable,
        error::IngestionError,
        models::{ProcessingStatus, ProcessingSummary, RunReport, UploadedFile},
    },
    infrastructure::{
        archive::extractor::FsArchiveExtractor,
        detection::magic_resolver::MagicResolver,
        parsers::csv_parser::CsvParser,
        sqlite::data_repo::SqliteDataRepository,
    },
};

pub const STATUS_EMPTY: &str = "no files processed";
pub const STATUS_SUCCESS: &str = "all files processed successfully";
pub const STATUS_PARTIAL: &str = "completed with failures";

/// Drives the pipeline over a list of inputs, one file at a time.
pub struct BatchService {
    service: IngestionService,
    store_path: PathBuf,
    temp_dir: PathBuf,
    remote_source: Regex,
}

impl BatchService {
    pub fn new(settings: &Settings) -> Result<Self, IngestionError> {
        debug!("Initializing batch service");
        let service = IngestionService::new(
            Arc::new(MagicResolver::new(CategoryTable::default())),
            Arc::new(FsArchiveExtractor::new()),
            Arc::new(CsvParser::new()),
            Arc::new(SqliteDataRepository::new()),
            settings.parse_options(),
        );
        info!("Store: {}, working directory: {}", settings.database_path.display(), settings.temp_dir.display());

        Self::with_service(service, settings.database_path.clone(), settings.temp_dir.clone())
    }

    pub fn with_service(service: IngestionService, store_path: PathBuf, temp_dir: PathBuf) -> Result<Self, IngestionError> {
        let remote_source = Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://")
            .map_err(|e| IngestionError::Config(e.to_string()))?;
        Ok(Self {
            service,
            store_path,
            temp_dir,
            remote_source,
        })
    }

    /// Only a store that cannot be initialized aborts the run; every other
    /// failure ends up in the report.
    pub fn run(&self, inputs: &[String]) -> Result<RunReport, IngestionError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let span = tracing::info_span!("run", %run_id);
        let _entered = span.enter();

        info!("Starting run over {} input(s)", inputs.len());
        self.service.prepare_store(&self.store_path).map_err(|e| {
            error!("Aborting run: {}", e);
            e
        })?;

        let mut summaries = Vec::new();
        let mut any_failed = false;

        for (i, input) in inputs.iter().enumerate() {
            debug!("Processing input {} of {}: {}", i + 1, inputs.len(), input);

            if self.remote_source.is_match(input) {
                warn!("Skipping remote source {}, only local files are ingested", input);
                summaries.push(ProcessingSummary::new(
                    input.as_str(),
                    ProcessingStatus::Skipped,
                    "remote sources are not fetched",
                ));
                continue;
            }

            let upload = UploadedFile::from_path(input);
            let report = self.service.process_file(&upload, &self.store_path, &self.temp_dir);
            if !report.succeeded {
                any_failed = true;
            }
            summaries.extend(report.summaries);
        }

        let overall_status = if summaries.is_empty() {
            STATUS_EMPTY
        } else if any_failed {
            STATUS_PARTIAL
        } else {
            STATUS_SUCCESS
        };
        info!("Run finished: {}", overall_status);

        Ok(RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            overall_status: overall_status.to_string(),
            summaries,
        })
    }
}
