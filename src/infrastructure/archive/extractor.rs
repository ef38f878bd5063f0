use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;
use flate2::read::MultiGzDecoder;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::domain::{
    content_type::ArchiveKind,
    models::file_name_of,
    ports::ArchiveExtractor,
};

#[derive(Error, Debug)]
enum ExtractError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("7z error: {0}")]
    SevenZ(String),

    #[error("failed to walk extracted files: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("no extraction engine available for {0:?} archives")]
    Unsupported(ArchiveKind),
}

/// Expands archives onto the local filesystem.
#[derive(Debug, Default, Clone)]
pub struct FsArchiveExtractor;

impl FsArchiveExtractor {
    pub fn new() -> Self {
        Self
    }

    fn try_extract(&self, archive_path: &Path, kind: ArchiveKind, output_dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
        reset_dir(output_dir)?;

        match kind {
            ArchiveKind::Zip => {
                let mut archive = zip::ZipArchive::new(File::open(archive_path)?)?;
                debug!("Zip archive holds {} entries", archive.len());
                archive.extract(output_dir)?;
            }
            ArchiveKind::Tar => unpack_tar(File::open(archive_path)?, output_dir)?,
            ArchiveKind::Gz => {
                let decoder = MultiGzDecoder::new(BufReader::new(File::open(archive_path)?));
                unpack_stream(decoder, &stream_member_name(archive_path, kind), output_dir)?;
            }
            ArchiveKind::Bz2 => {
                let decoder = BzDecoder::new(BufReader::new(File::open(archive_path)?));
                unpack_stream(decoder, &stream_member_name(archive_path, kind), output_dir)?;
            }
            ArchiveKind::SevenZ => {
                sevenz_rust::decompress_file(archive_path, output_dir)
                    .map_err(|e| ExtractError::SevenZ(e.to_string()))?;
            }
            ArchiveKind::Rar => return Err(ExtractError::Unsupported(kind)),
        }

        collect_files(output_dir)
    }
}

impl ArchiveExtractor for FsArchiveExtractor {
    fn extract(&self, archive_path: &Path, kind: ArchiveKind, output_dir: &Path) -> Vec<PathBuf> {
        let archive_name = file_name_of(archive_path);
        info!("Extracting {} to {}", archive_name, output_dir.display());

        match self.try_extract(archive_path, kind, output_dir) {
            Ok(files) => {
                if files.is_empty() {
                    warn!("No files found after extracting {} into {}", archive_name, output_dir.display());
                } else {
                    info!("Extracted {} file(s) from {}", files.len(), archive_name);
                }
                files
            }
            Err(e) => {
                error!("Extraction failed for {}: {}", archive_name, e);
                if output_dir.exists() {
                    if let Err(e) = fs::remove_dir_all(output_dir) {
                        warn!("Could not remove {} after failed extraction: {}", output_dir.display(), e);
                    }
                }
                Vec::new()
            }
        }
    }
}

fn reset_dir(dir: &Path) -> io::Result<()> {
    if dir.exists() {
        debug!("Removing stale extraction directory {}", dir.display());
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)
}

fn unpack_tar<R: Read>(reader: R, output_dir: &Path) -> io::Result<()> {
    tar::Archive::new(reader).unpack(output_dir)
}

/// Writes a single decompressed stream into `output_dir`. Streams that turn
/// out to be tarballs (`.tar.gz`, `.tgz`, `.tar.bz2`) are unpacked in place.
fn unpack_stream<R: Read>(mut decoder: R, member_name: &str, output_dir: &Path) -> io::Result<()> {
    let partial = output_dir.join(format!(".{}.partial", member_name));
    {
        let mut out = File::create(&partial)?;
        let written = io::copy(&mut decoder, &mut out)?;
        debug!("Decompressed {} bytes for member {}", written, member_name);
    }

    let mut head = Vec::with_capacity(512);
    File::open(&partial)?.take(512).read_to_end(&mut head)?;

    if infer::archive::is_tar(&head) {
        debug!("Decompressed stream {} is a tar archive, unpacking", member_name);
        unpack_tar(File::open(&partial)?, output_dir)?;
        fs::remove_file(&partial)
    } else {
        fs::rename(&partial, output_dir.join(member_name))
    }
}

fn stream_member_name(archive_path: &Path, kind: ArchiveKind) -> String {
    let name = file_name_of(archive_path);
    let suffixes: &[(&str, &str)] = match kind {
        ArchiveKind::Gz => &[(".tgz", ".tar"), (".gz", "")],
        ArchiveKind::Bz2 => &[(".tbz2", ".tar"), (".tbz", ".tar"), (".bz2", "")],
        _ => &[],
    };

    let stripped = suffixes.iter().find_map(|(suffix, replacement)| {
        let cut = name.len().checked_sub(suffix.len())?;
        (name.is_char_boundary(cut) && name[cut..].eq_ignore_ascii_case(suffix))
            .then(|| format!("{}{}", &name[..cut], replacement))
    });

    match stripped {
        Some(member) if !member.is_empty() && !member.starts_with('.') => member,
        Some(_) => "data".to_string(),
        None => Path::new(&name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty() && !s.starts_with('.'))
            .unwrap_or("data")
            .to_string(),
    }
}

fn collect_files(output_dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let root = output_dir.canonicalize()?;
    let mut files = Vec::new();

    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            debug!("Ignoring hidden file {}", entry.path().display());
            continue;
        }
        files.push(entry.into_path());
    }

    Ok(files)
}
