use std::path::Path;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::domain::{
    models::{InsertOutcome, StorageRecord},
    ports::DataRepository,
};

pub const TABLE_NAME: &str = "generic_data";

const CREATE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS generic_data (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        file_source TEXT NOT NULL,
        data_type TEXT,
        row_number INTEGER NOT NULL,
        row_content TEXT NOT NULL,
        imported_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS idx_generic_data_file_source ON generic_data (file_source);
";

const INSERT_ROW: &str = "
    INSERT INTO generic_data (file_source, data_type, row_number, row_content)
    VALUES (?1, ?2, ?3, ?4)
";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("row content is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Append-only store of one JSON document per row. Every call opens and
/// closes its own connection.
#[derive(Debug, Default, Clone)]
pub struct SqliteDataRepository;

impl SqliteDataRepository {
    pub fn new() -> Self {
        Self
    }

    fn try_ensure_schema(&self, store_path: &Path) -> Result<(), StoreError> {
        if let Some(dir) = store_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if !dir.exists() {
                std::fs::create_dir_all(dir)?;
                info!("Created store directory {}", dir.display());
            }
        }

        let conn = Connection::open(store_path)?;
        conn.execute_batch(CREATE_SCHEMA)?;
        Ok(())
    }

    /// Writes every accepted row in one transaction. Any engine error drops the
    /// transaction, which rolls the whole batch back.
    fn write_batch(
        &self,
        store_path: &Path,
        file_source: &str,
        data_type: &str,
        accepted: &[(usize, String)],
    ) -> Result<usize, rusqlite::Error> {
        let mut conn = Connection::open(store_path)?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(INSERT_ROW)?;
            for (row_number, content) in accepted {
                stmt.execute(params![file_source, data_type, *row_number as i64, content])?;
            }
        }
        tx.commit()?;
        Ok(accepted.len())
    }

    pub fn records_for_source(&self, store_path: &Path, file_source: &str) -> Result<Vec<StorageRecord>, StoreError> {
        let conn = Connection::open(store_path)?;
        let mut stmt = conn.prepare(
            "SELECT id, file_source, data_type, row_number, row_content, imported_at
             FROM generic_data WHERE file_source = ?1 ORDER BY id",
        )?;

        let raw = stmt
            .query_map(params![file_source], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, NaiveDateTime>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(id, file_source, data_type, row_number, content, imported_at)| -> Result<StorageRecord, StoreError> {
                Ok(StorageRecord {
                    id,
                    file_source,
                    data_type,
                    row_number,
                    row_content: serde_json::from_str(&content)?,
                    imported_at,
                })
            })
            .collect()
    }

    pub fn count_rows(&self, store_path: &Path) -> Result<i64, StoreError> {
        let conn = Connection::open(store_path)?;
        let count = conn.query_row("SELECT COUNT(*) FROM generic_data", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl DataRepository for SqliteDataRepository {
    fn ensure_schema(&self, store_path: &Path) -> bool {
        info!("Initializing store at {}", store_path.display());
        match self.try_ensure_schema(store_path) {
            Ok(()) => {
                info!("Store {} ready, table {} available", store_path.display(), TABLE_NAME);
                true
            }
            Err(e) => {
                error!("Failed to initialize store {}: {}", store_path.display(), e);
                false
            }
        }
    }

    fn insert_rows(
        &self,
        store_path: &Path,
        file_source: &str,
        data_type: &str,
        header: &[String],
        rows: &[Vec<String>],
    ) -> InsertOutcome {
        debug!("Inserting rows from {} ({}) into {}", file_source, data_type, store_path.display());

        if header.is_empty() {
            warn!("Header for {} is empty, nothing inserted", file_source);
            return InsertOutcome::failed();
        }
        if rows.is_empty() {
            info!("No data rows to insert for {}", file_source);
            return InsertOutcome::ok(0);
        }

        let mut accepted = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let row_number = index + 1;
            if row.len() != header.len() {
                warn!(
                    "Row {} of {} has {} cells but header has {}, skipping",
                    row_number,
                    file_source,
                    row.len(),
                    header.len()
                );
                continue;
            }

            match row_document(header, row) {
                Ok(content) => accepted.push((row_number, content)),
                Err(e) => error!("Row {} of {} could not be serialized: {}", row_number, file_source, e),
            }
        }

        if accepted.is_empty() {
            warn!("No rows from {} passed validation", file_source);
            return InsertOutcome::ok(0);
        }

        match self.write_batch(store_path, file_source, data_type, &accepted) {
            Ok(inserted) => {
                info!(
                    "Inserted {} of {} rows from {} ({}) into {}",
                    inserted,
                    rows.len(),
                    file_source,
                    data_type,
                    store_path.display()
                );
                InsertOutcome::ok(inserted)
            }
            Err(e) => {
                error!("Batch for {} rolled back: {}", file_source, e);
                InsertOutcome::failed()
            }
        }
    }
}

/// JSON object in header order; a repeated column name keeps the last value.
fn row_document(header: &[String], row: &[String]) -> Result<String, serde_json::Error> {
    let document: serde_json::Map<String, serde_json::Value> = header
        .iter()
        .zip(row)
        .map(|(column, value)| (column.clone(), serde_json::Value::String(value.clone())))
        .collect();
    serde_json::to_string(&document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn rows(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter().map(|r| strings(r)).collect()
    }

    fn fresh_store(dir: &tempfile::TempDir) -> (SqliteDataRepository, PathBuf) {
        let repo = SqliteDataRepository::new();
        let path = dir.path().join("store.sqlite");
        assert!(repo.ensure_schema(&path));
        (repo, path)
    }

    #[test]
    fn stores_every_matching_row() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, store) = fresh_store(&dir);

        let outcome = repo.insert_rows(&store, "a.csv", "generic_csv", &strings(&["A", "B"]), &rows(&[&["1", "2"], &["3", "4"]]));

        assert_eq!(outcome, InsertOutcome::ok(2));
        let records = repo.records_for_source(&store, "a.csv").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].row_number, 1);
        assert_eq!(records[0].data_type.as_deref(), Some("generic_csv"));
        assert_eq!(records[1].row_content, serde_json::json!({"A": "3", "B": "4"}));
    }

    #[test]
    fn length_mismatch_skips_the_row_only() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, store) = fresh_store(&dir);

        let outcome = repo.insert_rows(&store, "a.csv", "generic_csv", &strings(&["A", "B"]), &rows(&[&["1", "2", "9"], &["3", "4"]]));

        assert_eq!(outcome, InsertOutcome::ok(1));
        let records = repo.records_for_source(&store, "a.csv").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].row_number, 2);
    }

    #[test]
    fn no_rows_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, store) = fresh_store(&dir);

        assert_eq!(
            repo.insert_rows(&store, "a.csv", "generic_csv", &strings(&["A", "B"]), &[]),
            InsertOutcome::ok(0)
        );
        assert_eq!(repo.count_rows(&store).unwrap(), 0);
    }

    #[test]
    fn empty_header_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, store) = fresh_store(&dir);

        assert_eq!(
            repo.insert_rows(&store, "a.csv", "generic_csv", &[], &rows(&[&["1"]])),
            InsertOutcome::failed()
        );
        assert_eq!(repo.count_rows(&store).unwrap(), 0);
    }

    #[test]
    fn engine_failure_rolls_back_whole_batch() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, store) = fresh_store(&dir);
        Connection::open(&store)
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_third BEFORE INSERT ON generic_data
                 WHEN NEW.row_number = 3
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let outcome = repo.insert_rows(
            &store,
            "a.csv",
            "generic_csv",
            &strings(&["A"]),
            &rows(&[&["1"], &["2"], &["3"], &["4"]]),
        );

        assert_eq!(outcome, InsertOutcome::failed());
        assert_eq!(repo.count_rows(&store).unwrap(), 0);
    }

    #[test]
    fn missing_schema_fails_insert() {
        let dir = tempfile::tempdir().unwrap();
        let repo = SqliteDataRepository::new();
        let store = dir.path().join("bare.sqlite");

        assert_eq!(
            repo.insert_rows(&store, "a.csv", "generic_csv", &strings(&["A"]), &rows(&[&["1"]])),
            InsertOutcome::failed()
        );
    }

    #[test]
    fn ensure_schema_is_idempotent_and_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let repo = SqliteDataRepository::new();
        let store = dir.path().join("nested").join("deeper").join("store.sqlite");

        assert!(repo.ensure_schema(&store));
        repo.insert_rows(&store, "a.csv", "generic_csv", &strings(&["A"]), &rows(&[&["1"]]));
        assert!(repo.ensure_schema(&store));
        assert_eq!(repo.count_rows(&store).unwrap(), 1);
    }

    #[test]
    fn ensure_schema_reports_engine_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!SqliteDataRepository::new().ensure_schema(dir.path()));
    }

    #[test]
    fn document_keeps_header_order_and_last_duplicate() {
        let json = row_document(&strings(&["z", "a", "z"]), &strings(&["1", "2", "3"])).unwrap();
        assert_eq!(json, r#"{"z":"3","a":"2"}"#);
    }

    #[test]
    fn separate_calls_append() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, store) = fresh_store(&dir);
        let header = strings(&["A"]);

        repo.insert_rows(&store, "a.csv", "generic_csv", &header, &rows(&[&["1"]]));
        repo.insert_rows(&store, "a.csv", "generic_csv", &header, &rows(&[&["1"]]));

        let records = repo.records_for_source(&store, "a.csv").unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].id < records[1].id);
    }
}
