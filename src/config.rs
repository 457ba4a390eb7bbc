//! Runtime settings, read from `settings.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::stats::DEFAULT_BINS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding `model_<ts>.json` / `features_<ts>.json` pairs.
    pub model_dir: PathBuf,
    /// SQLite file for predictions and dataset status.
    pub database: PathBuf,
    pub histogram_bins: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            database: PathBuf::from("rusty-wrench.db"),
            histogram_bins: DEFAULT_BINS,
        }
    }
}

impl Settings {
    /// `<config dir>/rusty-wrench/settings.toml`
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rusty-wrench")
            .join("settings.toml")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read settings {}", path.display()))?;
        let settings: Settings = toml::from_str(&text)
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        Ok(settings)
    }

    /// Settings from the default location, or defaults when there is no file
    /// or it cannot be parsed.
    pub fn load_default() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("{e:#}; using default settings");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "model_dir = \"/srv/models\"\n").unwrap();

        let s = Settings::load(&path).unwrap();
        assert_eq!(s.model_dir, PathBuf::from("/srv/models"));
        assert_eq!(s.database, PathBuf::from("rusty-wrench.db"));
        assert_eq!(s.histogram_bins, 10);
    }

    #[test]
    fn bad_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "histogram_bins = \"many\"\n").unwrap();
        assert!(Settings::load(&path).is_err());
        assert!(Settings::load(&dir.path().join("missing.toml")).is_err());
    }
}
