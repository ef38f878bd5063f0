use std::path::PathBuf;
use thiserror::Error;

/// Run-level failures. Everything below the file level is recovered inside the
/// pipeline and turned into a summary entry instead.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to initialize store schema at {0}")]
    SchemaInit(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("file {path} is not accessible: {reason}")]
    Access { path: PathBuf, reason: String },

    #[error("content type detection failed for {path}: {reason}")]
    Detection { path: PathBuf, reason: String },
}

impl ResolveError {
    pub fn label(&self) -> &'static str {
        match self {
            ResolveError::Access { .. } => "error/file-not-accessible",
            ResolveError::Detection { .. } => "error/mime-detection-failed",
        }
    }
}

/// Cause codes behind the parser's empty-header sentinel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("unknown encoding label '{0}'")]
    UnknownEncoding(String),

    #[error("content of {path} is not valid {encoding}")]
    Decode { path: PathBuf, encoding: String },

    #[error("delimiter {0:?} is not a single ASCII character")]
    InvalidDelimiter(char),

    #[error("malformed delimited text: {0}")]
    Malformed(String),

    #[error("no non-blank line to use as header")]
    NoHeader,
}
