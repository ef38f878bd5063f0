use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{error::IngestionError, models::ParseOptions};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_path: PathBuf,
    pub log_file: Option<PathBuf>,
    pub log_level: String,
    pub download_urls: Vec<String>,
    pub temp_dir: PathBuf,
    pub default_encoding: String,
    pub delimiter: char,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("ingest_data.sqlite"),
            log_file: Some(PathBuf::from("ingest.log")),
            log_level: "info".to_string(),
            download_urls: Vec::new(),
            temp_dir: PathBuf::from("temp_uploads"),
            default_encoding: "utf-8".to_string(),
            delimiter: ',',
        }
    }
}

impl Settings {
    /// Reads the settings file, writing one with defaults when it is missing.
    /// `.yaml`/`.yml` files are YAML, anything else is JSON.
    pub fn load_or_create(path: &Path) -> Result<Self, IngestionError> {
        let mut settings: Settings = if path.exists() {
            debug!("Loading settings from {}", path.display());
            let raw = std::fs::read_to_string(path)?;
            if is_yaml(path) {
                serde_yaml::from_str(&raw)
                    .map_err(|e| IngestionError::Config(format!("{}: {}", path.display(), e)))?
            } else {
                serde_json::from_str(&raw)
                    .map_err(|e| IngestionError::Config(format!("{}: {}", path.display(), e)))?
            }
        } else {
            let defaults = Settings::default();
            let raw = if is_yaml(path) {
                serde_yaml::to_string(&defaults).map_err(|e| IngestionError::Config(e.to_string()))?
            } else {
                serde_json::to_string_pretty(&defaults).map_err(|e| IngestionError::Config(e.to_string()))?
            };
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            std::fs::write(path, raw)?;
            info!("{} not found, created it with default settings", path.display());
            defaults
        };

        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("INGEST_DATABASE_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(level) = lookup("INGEST_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(dir) = lookup("INGEST_TEMP_DIR") {
            self.temp_dir = PathBuf::from(dir);
        }
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            encoding: self.default_encoding.clone(),
            delimiter: self.delimiter,
        }
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(str::to_lowercase).as_deref(),
        Some("yaml") | Some("yml")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let settings = Settings::load_or_create(&path).unwrap();

        assert!(path.exists());
        let written: Settings = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, Settings::default());
        assert_eq!(settings.delimiter, ',');
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"database_path": "db/data.sqlite", "log_file": null, "download_urls": ["a.zip"]}"#,
        )
        .unwrap();

        let settings = Settings::load_or_create(&path).unwrap();

        assert_eq!(settings.log_file, None);
        assert_eq!(settings.download_urls, vec!["a.zip".to_string()]);
        assert_eq!(settings.default_encoding, "utf-8");
    }

    #[test]
    fn yaml_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "log_level: debug\ndelimiter: ';'\ndefault_encoding: big5\n").unwrap();

        let settings = Settings::load_or_create(&path).unwrap();
        let options = settings.parse_options();

        assert_eq!(settings.log_level, "debug");
        assert_eq!(options.delimiter, ';');
        assert_eq!(options.encoding, "big5");
    }

    #[test]
    fn invalid_json_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(Settings::load_or_create(&path), Err(IngestionError::Config(_))));
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut settings = Settings::default();
        settings.apply_overrides(|key| match key {
            "INGEST_DATABASE_PATH" => Some("/data/other.sqlite".to_string()),
            "INGEST_TEMP_DIR" => Some("/scratch".to_string()),
            _ => None,
        });

        assert_eq!(settings.database_path, PathBuf::from("/data/other.sqlite"));
        assert_eq!(settings.temp_dir, PathBuf::from("/scratch"));
        assert_eq!(settings.log_level, "info");
    }
}
