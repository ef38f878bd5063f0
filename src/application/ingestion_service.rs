use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use tracing::{debug, error, info, warn};

use crate::domain::{
    content_type::{Category, ResolvedType},
    error::IngestionError,
    models::{file_name_of, FileReport, ParseOptions, ProcessingStatus, ProcessingSummary, UploadedFile},
    ports::{ArchiveExtractor, ContentTypeResolver, DataParser, DataRepository},
};

/// Label stored with every row until template recognition exists.
pub const GENERIC_DATA_TYPE: &str = "generic_csv";

enum Extraction {
    Members(Vec<PathBuf>),
    Finished(ProcessingSummary),
}

pub struct IngestionService {
    resolver: Arc<dyn ContentTypeResolver>,
    extractor: Arc<dyn ArchiveExtractor>,
    data_parser: Arc<dyn DataParser>,
    data_repo: Arc<dyn DataRepository>,
    parse_options: ParseOptions,
}

impl IngestionService {
    pub fn new(
        resolver: Arc<dyn ContentTypeResolver>,
        extractor: Arc<dyn ArchiveExtractor>,
        data_parser: Arc<dyn DataParser>,
        data_repo: Arc<dyn DataRepository>,
        parse_options: ParseOptions,
    ) -> Self {
        Self {
            resolver,
            extractor,
            data_parser,
            data_repo,
            parse_options,
        }
    }

    pub fn prepare_store(&self, store_path: &Path) -> Result<(), IngestionError> {
        if self.data_repo.ensure_schema(store_path) {
            Ok(())
        } else {
            Err(IngestionError::SchemaInit(store_path.to_path_buf()))
        }
    }

    pub fn process_file(&self, upload: &UploadedFile, store_path: &Path, temp_base: &Path) -> FileReport {
        info!("Starting file processing: {} ({} bytes)", upload.name, upload.size.map_or("unknown".to_string(), |s| s.to_string()));

        let mut report = FileReport {
            source_filename: upload.name.clone(),
            succeeded: true,
            summaries: Vec::new(),
        };

        // Removed on drop, whichever way this function returns.
        let workspace = match create_workspace(upload, temp_base) {
            Ok(dir) => dir,
            Err(e) => {
                error!("Failed to create working directory for {} under {}: {}", upload.name, temp_base.display(), e);
                record(
                    &mut report,
                    ProcessingSummary::new(&upload.name, ProcessingStatus::Failed, "could not create working directory")
                        .with_details(json!({ "error": e.to_string() })),
                );
                return report;
            }
        };
        debug!("Working directory for {}: {}", upload.name, workspace.path().display());

        // Step 1: identify and extract
        let members = match self.identify_and_extract(upload, workspace.path()) {
            Extraction::Members(members) => members,
            Extraction::Finished(summary) => {
                record(&mut report, summary);
                finish(workspace, &report);
                return report;
            }
        };

        // Steps 2-4: per-member filter, parse, store
        for member in &members {
            let summary = self.process_member(member, store_path);
            record(&mut report, summary);
        }

        finish(workspace, &report);
        report
    }

    fn identify_and_extract(&self, upload: &UploadedFile, workspace: &Path) -> Extraction {
        debug!("Step 1: identifying content of {}", upload.name);

        let resolved = match self.resolver.resolve(&upload.path) {
            Ok(resolved) => resolved,
            Err(e) => {
                error!("Identification failed for {}: {}", upload.name, e);
                return Extraction::Finished(
                    ProcessingSummary::new(&upload.name, ProcessingStatus::Failed, format!("identification failed: {}", e.label()))
                        .with_details(json!({ "error": e.to_string() })),
                );
            }
        };
        let ResolvedType { content_type, category } = resolved;
        let details = json!({
            "content_type": content_type.as_str(),
            "category": category.to_string(),
            "size_bytes": upload.size,
        });

        match category {
            Category::Archive(kind) => {
                let output_dir = workspace.join(upload.stem());
                info!("Archive {} ({}) will be extracted to {}", upload.name, content_type, output_dir.display());

                let members = self.extractor.extract(&upload.path, kind, &output_dir);
                if members.is_empty() {
                    warn!("Archive {} ({}) yielded no files", upload.name, content_type);
                    return Extraction::Finished(
                        ProcessingSummary::new(
                            &upload.name,
                            ProcessingStatus::Failed,
                            format!("identified as {} but extraction produced no files", content_type),
                        )
                        .with_details(details),
                    );
                }

                let names: Vec<String> = members.iter().map(|m| file_name_of(m)).collect();
                info!("Archive {} extracted, {} file(s): {:?}", upload.name, members.len(), names);
                Extraction::Members(members)
            }
            Category::Tabular(_) => {
                let destination = workspace.join(&upload.name);
                match std::fs::copy(&upload.path, &destination) {
                    Ok(_) => {
                        info!("File {} ({}) staged at {}", upload.name, content_type, destination.display());
                        Extraction::Members(vec![destination])
                    }
                    Err(e) => {
                        error!("Copying {} into {} failed: {}", upload.name, workspace.display(), e);
                        Extraction::Finished(
                            ProcessingSummary::new(
                                &upload.name,
                                ProcessingStatus::Failed,
                                format!("identified as {} but staging the file failed", content_type),
                            )
                            .with_details(json!({ "error": e.to_string(), "content_type": content_type.as_str() })),
                        )
                    }
                }
            }
            Category::Unsupported => {
                warn!("Content type {} of {} is not supported", content_type, upload.name);
                Extraction::Finished(
                    ProcessingSummary::new(
                        &upload.name,
                        ProcessingStatus::Skipped,
                        format!("content type {} is not a supported archive or tabular format", content_type),
                    )
                    .with_details(details),
                )
            }
        }
    }

    fn process_member(&self, member: &Path, store_path: &Path) -> ProcessingSummary {
        let name = file_name_of(member);
        info!("Processing extracted file {}", name);

        // Step 2: only tabular members go further
        if !self.is_tabular_member(member, &name) {
            info!("File {} is not CSV, skipping parse and store", name);
            return ProcessingSummary::new(&name, ProcessingStatus::Skipped, "not a CSV or parseable text file");
        }

        // Step 3: parse
        debug!("Step 3: parsing {}", name);
        let table = self.data_parser.parse(member, &self.parse_options);
        if !table.is_success() {
            warn!("Could not parse {} or no header found", name);
            return ProcessingSummary::new(&name, ProcessingStatus::Failed, "could not parse CSV content or no header found")
                .with_details(json!({ "file_name": name }));
        }
        info!("Parsed {} as {}: {} rows", name, GENERIC_DATA_TYPE, table.rows.len());

        // Step 4: store
        debug!("Step 4: storing {} rows from {}", table.rows.len(), name);
        let outcome = self
            .data_repo
            .insert_rows(store_path, &name, GENERIC_DATA_TYPE, &table.header, &table.rows);
        let details = json!({
            "data_type": GENERIC_DATA_TYPE,
            "columns": table.header.len(),
            "parsed_rows": table.rows.len(),
            "stored_rows": outcome.inserted,
        });

        if outcome.success {
            info!("✅ Stored {} of {} rows from {}", outcome.inserted, table.rows.len(), name);
            ProcessingSummary::new(&name, ProcessingStatus::Success, format!("{} rows stored", outcome.inserted))
                .with_details(details)
        } else {
            error!("Storing rows from {} failed", name);
            ProcessingSummary::new(&name, ProcessingStatus::Failed, "storing rows failed").with_details(details)
        }
    }

    fn is_tabular_member(&self, member: &Path, name: &str) -> bool {
        if name.to_lowercase().ends_with(".csv") {
            return true;
        }
        match self.resolver.resolve(member) {
            Ok(resolved) => matches!(resolved.category, Category::Tabular(_)),
            Err(e) => {
                warn!("Could not identify extracted file {}: {}", name, e);
                false
            }
        }
    }
}

fn create_workspace(upload: &UploadedFile, temp_base: &Path) -> std::io::Result<TempDir> {
    std::fs::create_dir_all(temp_base)?;
    tempfile::Builder::new()
        .prefix(&format!("{}_proc", upload.stem()))
        .tempdir_in(temp_base)
}

fn record(report: &mut FileReport, summary: ProcessingSummary) {
    if summary.status == ProcessingStatus::Failed {
        report.succeeded = false;
    }
    report.summaries.push(summary);
}

fn finish(workspace: TempDir, report: &FileReport) {
    let path = workspace.path().to_path_buf();
    match workspace.close() {
        Ok(()) => debug!("Removed working directory {}", path.display()),
        Err(e) => error!("Failed to remove working directory {}: {}", path.display(), e),
    }

    if report.succeeded {
        info!("🎉 Finished processing {}", report.source_filename);
    } else {
        warn!("🚨 Processing of {} failed or only partly succeeded", report.source_filename);
    }
}
