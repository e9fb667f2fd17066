//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! solkit has a single, user-level configuration scope. Solution trees carry
//! no tool configuration of their own.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$SOLKIT_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/solkit/config.toml`
//! 3. `~/.solkit/config.toml` (canonical write location)
//!
//! # Example
//!
//! ```no_run
//! use solution_kit::core::config::Config;
//!
//! let config = Config::load().unwrap().config;
//! println!("Default tag: {}", config.default_tag());
//! println!("Skip levels: {}", config.skip_levels());
//! ```

pub mod schema;

pub use schema::GlobalConfig;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use schema::{ArchiveConfig, ForkConfig, IsolationConfig};

/// Tag value treated as the default when nothing is configured.
pub const DEFAULT_TAG: &str = "stable";

/// Keys accepted by [`Config::get`] and [`Config::set`].
pub const CONFIG_KEYS: [&str; 4] = [
    "isolation.default_tag",
    "isolation.allow_leftover_markers",
    "fork.path_warnings",
    "archive.skip_levels",
];

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("unknown config key '{0}'")]
    UnknownKey(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
}

/// Loaded configuration with defaults applied by accessor methods.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Path to the global config file (if loaded)
    global_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    /// A missing config file is not an error (defaults are used).
    pub fn load() -> Result<ConfigLoadResult, ConfigError> {
        let (global, global_path) = Self::load_global()?;
        global.validate()?;
        Ok(ConfigLoadResult {
            config: Config {
                global,
                global_path,
            },
        })
    }

    /// Load global configuration from standard locations.
    fn load_global() -> Result<(GlobalConfig, Option<PathBuf>), ConfigError> {
        // 1. Check $SOLKIT_CONFIG
        if let Ok(path) = std::env::var("SOLKIT_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                let config = Self::read_global_config(&path)?;
                return Ok((config, Some(path)));
            }
        }

        // 2. Check $XDG_CONFIG_HOME/solkit/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("solkit/config.toml");
            if path.exists() {
                let config = Self::read_global_config(&path)?;
                return Ok((config, Some(path)));
            }
        }

        // 3. Check ~/.solkit/config.toml
        if let Some(home) = dirs::home_dir() {
            let path = home.join(".solkit/config.toml");
            if path.exists() {
                let config = Self::read_global_config(&path)?;
                return Ok((config, Some(path)));
            }
        }

        Ok((GlobalConfig::default(), None))
    }

    /// Read and parse a global config file.
    fn read_global_config(path: &Path) -> Result<GlobalConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Get the canonical path for global config.
    ///
    /// Honors `$SOLKIT_CONFIG`, otherwise returns `~/.solkit/config.toml`.
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        if let Ok(path) = std::env::var("SOLKIT_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".solkit/config.toml"))
    }

    /// Write global config atomically.
    ///
    /// Creates parent directories if needed. Uses atomic write
    /// (write to temp file, then rename) to prevent corruption.
    pub fn write_global(config: &GlobalConfig) -> Result<PathBuf, ConfigError> {
        let path = Self::global_config_path()?;
        Self::write_config_atomic(&path, config)?;
        Ok(path)
    }

    /// Write `self.global` back to the file it was loaded from, or to the
    /// canonical location if none was loaded.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        match &self.global_path {
            Some(path) => {
                Self::write_config_atomic(path, &self.global)?;
                Ok(path.clone())
            }
            None => Self::write_global(&self.global),
        }
    }

    /// Write a config file atomically.
    fn write_config_atomic<T: serde::Serialize>(
        path: &Path,
        config: &T,
    ) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents =
            toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        // Write to temp file in same directory (for atomic rename)
        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        file.write_all(contents.as_bytes())
            .map_err(|e| ConfigError::WriteError {
                path: temp_path.clone(),
                source: e,
            })?;

        file.sync_all().map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// Get the default tag value.
    ///
    /// Defaults to "stable" if not configured.
    pub fn default_tag(&self) -> &str {
        self.global
            .isolation
            .as_ref()
            .and_then(|i| i.default_tag.as_deref())
            .unwrap_or(DEFAULT_TAG)
    }

    /// Check if leftover markers after isolation are tolerated.
    ///
    /// Defaults to `true` if not configured.
    pub fn allow_leftover_markers(&self) -> bool {
        self.global
            .isolation
            .as_ref()
            .and_then(|i| i.allow_leftover_markers)
            .unwrap_or(true)
    }

    /// Check if fork should warn about identifier-bearing paths.
    ///
    /// Defaults to `true` if not configured.
    pub fn fork_path_warnings(&self) -> bool {
        self.global
            .fork
            .as_ref()
            .and_then(|f| f.path_warnings)
            .unwrap_or(true)
    }

    /// Get the number of leading archive directories to skip.
    ///
    /// Defaults to 0 if not configured.
    pub fn skip_levels(&self) -> usize {
        self.global
            .archive
            .as_ref()
            .and_then(|a| a.skip_levels)
            .unwrap_or(0)
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    // =========================================================================
    // Key access for the config command
    // =========================================================================

    /// Get the effective value of a dotted key.
    pub fn get(&self, key: &str) -> Result<String, ConfigError> {
        let value = match key {
            "isolation.default_tag" => self.default_tag().to_string(),
            "isolation.allow_leftover_markers" => self.allow_leftover_markers().to_string(),
            "fork.path_warnings" => self.fork_path_warnings().to_string(),
            "archive.skip_levels" => self.skip_levels().to_string(),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        };
        Ok(value)
    }

    /// Set a dotted key on a global config, parsing and validating `value`.
    pub fn set(global: &mut GlobalConfig, key: &str, value: &str) -> Result<(), ConfigError> {
        let parse_bool = |v: &str| {
            v.parse::<bool>()
                .map_err(|_| ConfigError::InvalidValue(format!("'{v}' is not a boolean")))
        };
        match key {
            "isolation.default_tag" => {
                global
                    .isolation
                    .get_or_insert_with(IsolationConfig::default)
                    .default_tag = Some(value.to_string());
            }
            "isolation.allow_leftover_markers" => {
                global
                    .isolation
                    .get_or_insert_with(IsolationConfig::default)
                    .allow_leftover_markers = Some(parse_bool(value)?);
            }
            "fork.path_warnings" => {
                global.fork.get_or_insert_with(ForkConfig::default).path_warnings =
                    Some(parse_bool(value)?);
            }
            "archive.skip_levels" => {
                let levels = value.parse::<usize>().map_err(|_| {
                    ConfigError::InvalidValue(format!("'{value}' is not a non-negative integer"))
                })?;
                global
                    .archive
                    .get_or_insert_with(ArchiveConfig::default)
                    .skip_levels = Some(levels);
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        global.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_apply() {
        let config = Config::default();
        assert_eq!(config.default_tag(), "stable");
        assert!(config.allow_leftover_markers());
        assert!(config.fork_path_warnings());
        assert_eq!(config.skip_levels(), 0);
    }

    #[test]
    fn read_config_file() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
            [isolation]
            default_tag = "prod"
            "#,
        )
        .unwrap();

        let global = Config::read_global_config(&config_path).unwrap();
        let config = Config {
            global,
            global_path: Some(config_path),
        };
        assert_eq!(config.default_tag(), "prod");
    }

    #[test]
    fn parse_error_names_path() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "[isolation\n").unwrap();

        let err = Config::read_global_config(&config_path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { ref path, .. } if path == &config_path));
    }

    #[test]
    fn write_config_atomic_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/config.toml");
        let mut global = GlobalConfig::default();
        Config::set(&mut global, "archive.skip_levels", "2").unwrap();

        Config::write_config_atomic(&path, &global).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("toml.tmp").exists());
        let loaded = Config::read_global_config(&path).unwrap();
        assert_eq!(loaded, global);
    }

    #[test]
    fn set_and_get_keys() {
        let mut global = GlobalConfig::default();
        Config::set(&mut global, "isolation.default_tag", "prod").unwrap();
        Config::set(&mut global, "fork.path_warnings", "false").unwrap();
        let config = Config {
            global,
            global_path: None,
        };
        assert_eq!(config.get("isolation.default_tag").unwrap(), "prod");
        assert_eq!(config.get("fork.path_warnings").unwrap(), "false");
        assert_eq!(config.get("archive.skip_levels").unwrap(), "0");
    }

    #[test]
    fn set_rejects_bad_values() {
        let mut global = GlobalConfig::default();
        assert!(Config::set(&mut global, "fork.path_warnings", "maybe").is_err());
        assert!(Config::set(&mut global, "archive.skip_levels", "-1").is_err());
        assert!(Config::set(&mut global, "isolation.default_tag", " ").is_err());
        assert!(matches!(
            Config::set(&mut global, "nope", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn every_key_is_readable() {
        let config = Config::default();
        for key in CONFIG_KEYS {
            assert!(config.get(key).is_ok(), "key {key} not readable");
        }
    }
}
