// Settings: where the tool lives, which flags it always gets and where the
// manifest, cookies, archive ledger and downloads are kept. Persisted as a
// small JSON file in the user's config directory.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const APP_DIR: &str = "gallery-dl-menu";
const FILE_NAME: &str = "settings.json";

/// Everything the menu needs to drive the external tool. Missing fields in
/// the file fall back to the defaults below.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Name or path of the download tool binary.
    pub tool: String,
    /// Flags passed on every download, before the archive/output flags.
    pub tool_args: Vec<String>,
    /// Flags used by the Update action.
    pub update_args: Vec<String>,
    pub download_dir: PathBuf,
    /// Archive ledger location handed to the tool via `--download-archive`.
    pub archive_file: PathBuf,
    pub manifest_file: PathBuf,
    pub cookie_dir: PathBuf,
    /// Extensions (without the dot) recognised as cookie files.
    pub cookie_extensions: Vec<String>,
    /// Kill a download that runs longer than this. `None` waits forever.
    pub timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            tool: "gallery-dl".into(),
            tool_args: vec!["--verbose".into()],
            update_args: vec!["-U".into(), "--update-check".into()],
            download_dir: PathBuf::from("./downloads"),
            archive_file: PathBuf::from("downloaded.txt"),
            manifest_file: PathBuf::from("URLS.txt"),
            cookie_dir: PathBuf::from("cookies"),
            cookie_extensions: vec!["txt".into()],
            timeout_secs: None,
        }
    }
}

impl Settings {
    /// Default settings file location: `<config_dir>/gallery-dl-menu/settings.json`,
    /// or the current directory when no config dir is known.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("."))
            .join(FILE_NAME)
    }

    /// Load settings from `path` (or the default location). A missing file is
    /// created with the defaults so the user has something to edit; if it
    /// cannot be written the defaults are still used for this run.
    pub fn load_or_create(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);

        if !path.exists() {
            let settings = Settings::default();
            match settings.write_to(&path) {
                Ok(()) => info!(path = %path.display(), "created default settings"),
                Err(e) => warn!("using default settings: {}", e),
            }
            return Ok(settings);
        }

        let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let settings: Settings =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), ?settings, "loaded settings");
        Ok(settings)
    }

    fn write_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(io_err)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(FILE_NAME);

        let settings = Settings::load_or_create(Some(&path)).unwrap();

        assert_eq!(settings, Settings::default());
        assert!(path.exists());
        let reloaded = Settings::load_or_create(Some(&path)).unwrap();
        assert_eq!(reloaded, settings);
    }

    #[test]
    fn unwritable_location_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();
        let path = blocker.join(FILE_NAME);

        let settings = Settings::load_or_create(Some(&path)).unwrap();

        assert_eq!(settings, Settings::default());
        assert!(!path.exists());
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        fs::write(&path, r#"{ "tool": "/opt/bin/gallery-dl", "timeout_secs": 30 }"#).unwrap();

        let settings = Settings::load_or_create(Some(&path)).unwrap();

        assert_eq!(settings.tool, "/opt/bin/gallery-dl");
        assert_eq!(settings.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(settings.archive_file, PathBuf::from("downloaded.txt"));
        assert_eq!(settings.manifest_file, PathBuf::from("URLS.txt"));
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        fs::write(&path, "not json").unwrap();

        let err = Settings::load_or_create(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
