use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Normalized MIME-like label reported by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentType(String);

impl ContentType {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
    Zip,
    Rar,
    #[serde(rename = "7z")]
    SevenZ,
    Gz,
    Tar,
    Bz2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabularKind {
    Text,
    Csv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Archive(ArchiveKind),
    Tabular(TabularKind),
    Unsupported,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Archive(ArchiveKind::Zip) => f.write_str("zip"),
            Category::Archive(ArchiveKind::Rar) => f.write_str("rar"),
            Category::Archive(ArchiveKind::SevenZ) => f.write_str("7z"),
            Category::Archive(ArchiveKind::Gz) => f.write_str("gz"),
            Category::Archive(ArchiveKind::Tar) => f.write_str("tar"),
            Category::Archive(ArchiveKind::Bz2) => f.write_str("bz2"),
            Category::Tabular(TabularKind::Text) => f.write_str("text"),
            Category::Tabular(TabularKind::Csv) => f.write_str("csv"),
            Category::Unsupported => f.write_str("unsupported"),
        }
    }
}

/// Explicit content-type to category mapping. Lookups are exact; anything not
/// listed is unsupported.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    entries: HashMap<String, Category>,
}

impl CategoryTable {
    pub fn empty() -> Self {
        Self { entries: HashMap::new() }
    }

    pub fn with(mut self, content_type: &str, category: Category) -> Self {
        self.entries.insert(content_type.to_string(), category);
        self
    }

    pub fn category_of(&self, content_type: &ContentType) -> Category {
        self.entries
            .get(content_type.as_str())
            .copied()
            .unwrap_or(Category::Unsupported)
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        use ArchiveKind::*;
        use TabularKind::*;

        Self::empty()
            .with("application/zip", Category::Archive(Zip))
            .with("application/x-zip-compressed", Category::Archive(Zip))
            .with("application/x-rar-compressed", Category::Archive(Rar))
            .with("application/x-rar", Category::Archive(Rar))
            .with("application/vnd.rar", Category::Archive(Rar))
            .with("application/x-7z-compressed", Category::Archive(SevenZ))
            .with("application/gzip", Category::Archive(Gz))
            .with("application/x-gzip", Category::Archive(Gz))
            .with("application/x-tar", Category::Archive(Tar))
            .with("application/x-bzip2", Category::Archive(Bz2))
            .with("text/plain", Category::Tabular(Text))
            .with("text/csv", Category::Tabular(Csv))
            .with("application/vnd.ms-excel", Category::Tabular(Csv))
            .with("application/x-empty", Category::Tabular(Text))
            .with("inode/x-empty", Category::Tabular(Text))
    }
}

/// What the resolver hands downstream: the raw label plus its category,
/// looked up once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedType {
    pub content_type: ContentType,
    pub category: Category,
}
