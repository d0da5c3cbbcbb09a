//! Persisted config (collection source, Ollama, search defaults) in the app
//! data directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app_data;
use crate::ollama::{DEFAULT_BASE_URL, DEFAULT_EMBED_MODEL};
use crate::warm_index::{DEFAULT_PAGE_SIZE, DEFAULT_TOP_K};

const CONFIG_FILENAME: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub ollama: OllamaConfig,
    pub search: SearchConfig,
}

/// Where the warm index is loaded from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Jsonl,
    Chroma,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// JSONL file or directory (for `kind = "jsonl"`).
    pub path: Option<String>,
    pub chroma_url: String,
    pub collection: String,
    pub page_size: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Jsonl,
            path: None,
            chroma_url: "http://localhost:8000".to_string(),
            collection: "fit_installations".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub url: String,
    pub embed_model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_BASE_URL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { top_k: DEFAULT_TOP_K }
    }
}

impl Config {
    /// Configured JSONL source path, if any.
    pub fn source_path(&self) -> Option<PathBuf> {
        self.source
            .path
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
    }
}

/// Default location of the config file, inside the app data directory.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let data_dir = app_data::app_data_dir().ok_or(ConfigError::NoDataDir)?;
    Ok(data_dir.join(CONFIG_FILENAME))
}

/// Load config from the app data directory. Returns default config if missing or invalid.
pub fn load_config() -> Config {
    default_config_path()
        .ok()
        .and_then(|path| load_config_from(&path).ok())
        .unwrap_or_default()
}

/// Load config from an explicit file. Unlike [`load_config`], errors are reported.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
    toml::from_str(&s).map_err(ConfigError::Parse)
}

/// Save config to the app data directory.
pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    save_config_to(config, &default_config_path()?)
}

/// Save config to an explicit file.
pub fn save_config_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    let s = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    std::fs::write(path, s).map_err(ConfigError::Write)
}

/// Point the config at a JSONL file or directory and persist it to `config_file`.
pub fn set_source_path(config_file: &Path, source: &Path) -> Result<Config, ConfigError> {
    let source = source.canonicalize().map_err(ConfigError::Canonicalize)?;
    if !source.is_dir() && !source.is_file() {
        return Err(ConfigError::NotASource(source));
    }
    let mut config = if config_file.exists() {
        load_config_from(config_file)?
    } else {
        Config::default()
    };
    config.source.kind = SourceKind::Jsonl;
    config.source.path = Some(source.to_string_lossy().into_owned());
    save_config_to(&config, config_file)?;
    Ok(config)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine app data directory")]
    NoDataDir,
    #[error("failed to read config {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("failed to write config: {0}")]
    Write(std::io::Error),
    #[error("failed to resolve path: {0}")]
    Canonicalize(std::io::Error),
    #[error("not a file or directory: {0}")]
    NotASource(PathBuf),
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[source]\nkind = \"chroma\"\ncollection = \"fit\"\n\n[search]\ntop_k = 25\n",
        )
        .unwrap();
        let config = load_config_from(&path).unwrap();
        assert_eq!(config.source.kind, SourceKind::Chroma);
        assert_eq!(config.source.collection, "fit");
        assert_eq!(config.source.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.search.top_k, 25);
        assert_eq!(config.ollama, OllamaConfig::default());
    }

    #[test]
    fn bad_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[source\n").unwrap();
        assert!(matches!(load_config_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.ollama.embed_model = "all-minilm".to_string();
        save_config_to(&config, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), config);
    }

    #[test]
    fn set_source_switches_to_jsonl() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let data = dir.path().join("fit");
        std::fs::create_dir(&data).unwrap();
        save_config_to(
            &Config {
                source: SourceConfig {
                    kind: SourceKind::Chroma,
                    ..SourceConfig::default()
                },
                ..Config::default()
            },
            &path,
        )
        .unwrap();

        let config = set_source_path(&path, &data).unwrap();
        assert_eq!(config.source.kind, SourceKind::Jsonl);
        assert_eq!(config.source_path(), Some(data.canonicalize().unwrap()));
        assert_eq!(load_config_from(&path).unwrap(), config);
    }

    #[test]
    fn set_source_rejects_missing_path() {
        let dir = TempDir::new().unwrap();
        let err = set_source_path(&dir.path().join("config.toml"), &dir.path().join("nope"));
        assert!(matches!(err, Err(ConfigError::Canonicalize(_))));
    }
}
