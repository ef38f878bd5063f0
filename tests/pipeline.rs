use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tabular_ingest::batch_service::{BatchService, STATUS_EMPTY, STATUS_PARTIAL, STATUS_SUCCESS};
use tabular_ingest::config::Settings;
use tabular_ingest::domain::error::IngestionError;
use tabular_ingest::domain::models::{ProcessingStatus, ProcessingSummary, RunReport};
use tabular_ingest::infrastructure::sqlite::data_repo::SqliteDataRepository;

struct Harness {
    dir: tempfile::TempDir,
    settings: Settings,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            database_path: dir.path().join("store").join("data.sqlite"),
            log_file: None,
            temp_dir: dir.path().join("work"),
            ..Settings::default()
        };
        Self { dir, settings }
    }

    fn file(&self, name: &str, bytes: &[u8]) -> String {
        let path = self.dir.path().join(name);
        fs::write(&path, bytes).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn zip(&self, name: &str, entries: &[(&str, &[u8])]) -> String {
        let path = self.dir.path().join(name);
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        let options = zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (entry, bytes) in entries {
            writer.start_file(*entry, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap();
        path.to_string_lossy().into_owned()
    }

    fn run(&self, inputs: &[String]) -> RunReport {
        BatchService::new(&self.settings).unwrap().run(inputs).unwrap()
    }

    fn store(&self) -> &Path {
        &self.settings.database_path
    }

    fn work_dir(&self) -> PathBuf {
        self.settings.temp_dir.clone()
    }
}

fn entry<'a>(report: &'a RunReport, name: &str) -> &'a ProcessingSummary {
    report
        .summaries
        .iter()
        .find(|s| s.source_filename == name)
        .unwrap_or_else(|| panic!("no summary for {}", name))
}

fn stored_rows(summary: &ProcessingSummary) -> u64 {
    summary.details.as_ref().unwrap()["stored_rows"].as_u64().unwrap()
}

#[test]
fn plain_csv_is_stored() {
    let h = Harness::new();
    let input = h.file("daily.csv", b"A,B\n1,2\n3,4\n");

    let report = h.run(&[input]);

    assert_eq!(report.overall_status, STATUS_SUCCESS);
    let summary = entry(&report, "daily.csv");
    assert_eq!(summary.status, ProcessingStatus::Success);
    assert_eq!(stored_rows(summary), 2);

    let records = SqliteDataRepository::new().records_for_source(h.store(), "daily.csv").unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].row_content, serde_json::json!({"A": "1", "B": "2"}));
    assert_eq!(records[0].data_type.as_deref(), Some("generic_csv"));
}

#[test]
fn header_starting_with_a_short_signature_is_still_csv() {
    let h = Harness::new();
    let input = h.file("cars.csv", b"BMW,Price\nX5,60000\n");

    let report = h.run(&[input]);

    let summary = entry(&report, "cars.csv");
    assert_eq!(summary.status, ProcessingStatus::Success);
    assert_eq!(stored_rows(summary), 1);
}

#[test]
fn utf16_export_with_bom_is_stored() {
    let h = Harness::new();
    let mut bytes = vec![0xff, 0xfe];
    for unit in "A,B\r\n1,2\r\n".encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    let input = h.file("export.csv", &bytes);

    let report = h.run(&[input]);

    let summary = entry(&report, "export.csv");
    assert_eq!(summary.status, ProcessingStatus::Success);
    let records = SqliteDataRepository::new().records_for_source(h.store(), "export.csv").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].row_content, serde_json::json!({"A": "1", "B": "2"}));
}

#[test]
fn ragged_row_is_skipped_but_file_succeeds() {
    let h = Harness::new();
    let input = h.file("ragged.csv", b"A,B\n1,2,9\n3,4\n");

    let report = h.run(&[input]);

    let summary = entry(&report, "ragged.csv");
    assert_eq!(summary.status, ProcessingStatus::Success);
    assert_eq!(stored_rows(summary), 1);
}

#[test]
fn header_only_file_stores_nothing_successfully() {
    let h = Harness::new();
    let input = h.file("header.csv", b"A,B\n");

    let report = h.run(&[input]);

    let summary = entry(&report, "header.csv");
    assert_eq!(summary.status, ProcessingStatus::Success);
    assert_eq!(stored_rows(summary), 0);
    assert_eq!(SqliteDataRepository::new().count_rows(h.store()).unwrap(), 0);
}

#[test]
fn archive_with_one_bad_member_keeps_good_rows() {
    let h = Harness::new();
    let input = h.zip(
        "bundle.zip",
        &[("good.csv", b"A,B\n1,2\n3,4\n"), ("blank.csv", b"\n   \n")],
    );

    let report = h.run(&[input]);

    assert_eq!(report.overall_status, STATUS_PARTIAL);
    assert_eq!(entry(&report, "good.csv").status, ProcessingStatus::Success);
    assert_eq!(entry(&report, "blank.csv").status, ProcessingStatus::Failed);
    let records = SqliteDataRepository::new().records_for_source(h.store(), "good.csv").unwrap();
    assert_eq!(records.len(), 2);
}

#[test]
fn archive_members_that_are_not_tabular_are_skipped() {
    let h = Harness::new();
    let png = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0x0d];
    let input = h.zip("mixed.zip", &[("image.png", &png[..]), ("rates.txt", b"rate\n1.5\n")]);

    let report = h.run(&[input]);

    assert_eq!(report.overall_status, STATUS_SUCCESS);
    assert_eq!(entry(&report, "image.png").status, ProcessingStatus::Skipped);
    assert_eq!(entry(&report, "rates.txt").status, ProcessingStatus::Success);
}

#[test]
fn tarball_inside_gzip_is_ingested() {
    let h = Harness::new();
    let mut builder = tar::Builder::new(Vec::new());
    let body = b"code,price\nTX,17000\nMTX,17001\n";
    let mut header = tar::Header::new_gnu();
    header.set_size(body.len() as u64);
    header.set_mode(0o644);
    builder.append_data(&mut header, "nested/futures.csv", &body[..]).unwrap();
    let tar_bytes = builder.into_inner().unwrap();

    let path = h.dir.path().join("futures.tar.gz");
    let mut encoder = flate2::write::GzEncoder::new(File::create(&path).unwrap(), flate2::Compression::default());
    encoder.write_all(&tar_bytes).unwrap();
    encoder.finish().unwrap();

    let report = h.run(&[path.to_string_lossy().into_owned()]);

    assert_eq!(entry(&report, "futures.csv").status, ProcessingStatus::Success);
    assert_eq!(stored_rows(entry(&report, "futures.csv")), 2);
}

#[test]
fn missing_source_fails_without_stopping_the_run() {
    let h = Harness::new();
    let missing = h.dir.path().join("nowhere.csv").to_string_lossy().into_owned();
    let present = h.file("present.csv", b"A\n1\n");

    let report = h.run(&[missing, present]);

    assert_eq!(report.overall_status, STATUS_PARTIAL);
    let failed = entry(&report, "nowhere.csv");
    assert_eq!(failed.status, ProcessingStatus::Failed);
    assert_eq!(failed.message, "identification failed: error/file-not-accessible");
    assert_eq!(entry(&report, "present.csv").status, ProcessingStatus::Success);
}

#[test]
fn unsupported_content_is_skipped_not_failed() {
    let h = Harness::new();
    let input = h.file("photo.csv", &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0x0d]);

    let report = h.run(&[input]);

    assert_eq!(report.overall_status, STATUS_SUCCESS);
    assert_eq!(entry(&report, "photo.csv").status, ProcessingStatus::Skipped);
    assert_eq!(SqliteDataRepository::new().count_rows(h.store()).unwrap(), 0);
}

#[test]
fn remote_sources_are_skipped() {
    let h = Harness::new();

    let report = h.run(&["https://example.com/Daily.zip".to_string()]);

    assert_eq!(report.summaries.len(), 1);
    assert_eq!(report.summaries[0].status, ProcessingStatus::Skipped);
    assert_eq!(report.overall_status, STATUS_SUCCESS);
}

#[test]
fn empty_run_reports_nothing_processed() {
    let h = Harness::new();
    let report = h.run(&[]);
    assert_eq!(report.overall_status, STATUS_EMPTY);
    assert!(h.store().exists());
}

#[test]
fn working_directories_never_leak() {
    let h = Harness::new();
    let good = h.file("a.csv", b"A\n1\n");
    let archive = h.zip("b.zip", &[("b.csv", b"B\n2\n")]);
    let missing = h.dir.path().join("gone.zip").to_string_lossy().into_owned();

    h.run(&[good.clone(), archive.clone(), missing.clone()]);
    h.run(&[good, archive, missing]);

    assert_eq!(fs::read_dir(h.work_dir()).unwrap().count(), 0);
}

#[test]
fn unusable_store_aborts_the_run() {
    let h = Harness::new();
    let settings = Settings {
        database_path: h.dir.path().to_path_buf(),
        ..h.settings.clone()
    };
    let input = h.file("a.csv", b"A\n1\n");

    let result = BatchService::new(&settings).unwrap().run(&[input]);

    assert!(matches!(result, Err(IngestionError::SchemaInit(_))));
}
