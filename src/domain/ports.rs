use std::path::{Path, PathBuf};

use crate::domain::{
    content_type::{ArchiveKind, ResolvedType},
    error::ResolveError,
    models::{InsertOutcome, ParseOptions, ParsedTable},
};

pub trait ContentTypeResolver: Send + Sync {
    fn resolve(&self, path: &Path) -> Result<ResolvedType, ResolveError>;
}

pub trait ArchiveExtractor: Send + Sync {
    /// Returns absolute member paths; empty on failure or when the archive
    /// holds no visible files. Hidden means the file's own name starts with
    /// `.`; files under a hidden directory such as `.meta/x.csv` are returned.
    fn extract(&self, archive_path: &Path, kind: ArchiveKind, output_dir: &Path) -> Vec<PathBuf>;
}

pub trait DataParser: Send + Sync {
    fn parse(&self, path: &Path, options: &ParseOptions) -> ParsedTable;
}

pub trait DataRepository: Send + Sync {
    fn ensure_schema(&self, store_path: &Path) -> bool;

    fn insert_rows(
        &self,
        store_path: &Path,
        file_source: &str,
        data_type: &str,
        header: &[String],
        rows: &[Vec<String>],
    ) -> InsertOutcome;
}
