//! Configuration File Loading
//!
//! Finds the configuration file in the usual locations and parses it as
//! TOML or JSON depending on its extension. Without a file the defaults
//! apply.

use super::Config;
use crate::error::{Error, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "PEXE_CONFIG";

/// Configuration file loader
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Candidate files, in priority order
    search_paths: Vec<PathBuf>,
    /// File the configuration came from (if any)
    current_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML format
    Toml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    /// Format implied by a file extension; TOML unless it ends in `.json`
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConfigFormat::Toml => "TOML",
            ConfigFormat::Json => "JSON",
        }
    }
}

impl ConfigLoader {
    /// Create a loader over the default search paths
    pub fn new() -> Self {
        Self {
            search_paths: Self::get_search_paths(),
            current_path: None,
        }
    }

    /// Load from `explicit` if given, otherwise the first file found on the
    /// search paths, otherwise the defaults. The result is validated.
    pub fn load(&mut self, explicit: Option<&Path>) -> Result<Config> {
        let config = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::ConfigLoadFailed {
                        path: path.to_path_buf(),
                        reason: "file does not exist".to_string(),
                    });
                }
                let config = Self::load_file(path)?;
                self.current_path = Some(path.to_path_buf());
                config
            }
            None => match self.find_and_load_config()? {
                Some((path, config)) => {
                    self.current_path = Some(path);
                    config
                }
                None => {
                    debug!("No configuration file found, using defaults");
                    Config::default()
                }
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse one configuration file
    pub fn load_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| Error::ConfigLoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&content, ConfigFormat::from_path(path))
    }

    /// Parse configuration text
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Config> {
        let parsed = match format {
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|reason| Error::ConfigParseFailed {
            format: format.name().to_string(),
            reason,
        })
    }

    /// Write `config` to `path` in the format its extension implies
    pub fn save_to_path(config: &Config, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let format = ConfigFormat::from_path(path);
        let content = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(config)?,
            ConfigFormat::Toml => toml::to_string_pretty(config).map_err(|e| Error::ConfigParseFailed {
                format: format.name().to_string(),
                reason: e.to_string(),
            })?,
        };

        fs::write(path, content)?;
        Ok(())
    }

    /// First existing file on the search paths. A file that fails to parse
    /// is an error rather than silently skipped.
    fn find_and_load_config(&self) -> Result<Option<(PathBuf, Config)>> {
        for path in &self.search_paths {
            if path.is_file() {
                info!("Loading configuration from {}", path.display());
                let config = Self::load_file(path)?;
                return Ok(Some((path.clone(), config)));
            }
        }
        Ok(None)
    }

    /// Default search paths, in priority order
    fn get_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(explicit) = env::var(CONFIG_ENV_VAR) {
            if !explicit.trim().is_empty() {
                paths.push(PathBuf::from(explicit));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("pexe").join("config.toml"));
            paths.push(config_dir.join("pexe").join("config.json"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".pexe").join("config.toml"));
        }

        if let Ok(cwd) = env::current_dir() {
            paths.push(cwd.join("pexe.toml"));
        }

        paths
    }

    /// Get the configuration file path the last load used
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// List all search paths
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Clear all search paths and add a single path
    pub fn set_search_path(&mut self, path: PathBuf) {
        self.search_paths = vec![path];
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
