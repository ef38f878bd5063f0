use std::fs::File;
use std::io::Read;
use std::path::Path;

use encoding_rs::Encoding;
use tracing::{debug, error, info};

use crate::domain::{
    content_type::{CategoryTable, ContentType, ResolvedType},
    error::ResolveError,
    ports::ContentTypeResolver,
};

const SAMPLE_SIZE: u64 = 8192;

pub const EMPTY: &str = "inode/x-empty";
pub const PLAIN_TEXT: &str = "text/plain";
pub const BINARY: &str = "application/octet-stream";

type Matcher = fn(&[u8]) -> bool;

// Container formats the extractor can be asked about. Their signatures are
// trusted ahead of the text check.
const ARCHIVE_SIGNATURES: [(Matcher, &str); 6] = [
    (infer::archive::is_zip, "application/zip"),
    (infer::archive::is_rar, "application/vnd.rar"),
    (infer::archive::is_7z, "application/x-7z-compressed"),
    (infer::archive::is_gz, "application/gzip"),
    (infer::archive::is_bz2, "application/x-bzip2"),
    (infer::archive::is_tar, "application/x-tar"),
];

/// Classifies files by their leading bytes: archive signatures first, then
/// byte-order marks and a printable-text check. Other magic numbers only name
/// samples that are not text, so a header like `BMW,Price` stays text.
pub struct MagicResolver {
    table: CategoryTable,
}

impl MagicResolver {
    pub fn new(table: CategoryTable) -> Self {
        Self { table }
    }

    fn read_sample(&self, path: &Path) -> Result<Vec<u8>, ResolveError> {
        let metadata = std::fs::metadata(path).map_err(|e| ResolveError::Access {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !metadata.is_file() {
            return Err(ResolveError::Access {
                path: path.to_path_buf(),
                reason: "not a regular file".to_string(),
            });
        }

        let file = File::open(path).map_err(|e| ResolveError::Access {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut sample = Vec::with_capacity(SAMPLE_SIZE as usize);
        file.take(SAMPLE_SIZE)
            .read_to_end(&mut sample)
            .map_err(|e| ResolveError::Detection {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(sample)
    }
}

impl Default for MagicResolver {
    fn default() -> Self {
        Self::new(CategoryTable::default())
    }
}

impl ContentTypeResolver for MagicResolver {
    fn resolve(&self, path: &Path) -> Result<ResolvedType, ResolveError> {
        let sample = self.read_sample(path).map_err(|e| {
            error!("Cannot detect content type of {}: {}", path.display(), e);
            e
        })?;
        debug!("Read {} byte sample from {}", sample.len(), path.display());

        let content_type = ContentType::new(classify(&sample));
        let category = self.table.category_of(&content_type);
        info!("Content type for {}: {} ({})", path.display(), content_type, category);

        Ok(ResolvedType { content_type, category })
    }
}

pub fn classify(sample: &[u8]) -> &'static str {
    if sample.is_empty() {
        return EMPTY;
    }
    if let Some(&(_, mime)) = ARCHIVE_SIGNATURES.iter().find(|(is_match, _)| is_match(sample)) {
        return mime;
    }
    if Encoding::for_bom(sample).is_some() || looks_like_text(sample) {
        return PLAIN_TEXT;
    }
    infer::get(sample).map_or(BINARY, |kind| kind.mime_type())
}

// Legacy single- and multi-byte encodings pass too; only NUL and a high share
// of control bytes mark a sample as binary.
fn looks_like_text(sample: &[u8]) -> bool {
    if sample.contains(&0) {
        return false;
    }
    let control = sample
        .iter()
        .filter(|&&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0c | 0x1b))
        .count();
    control * 10 <= sample.len()
}
