//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$SOLKIT_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/solkit/config.toml`
//! 3. `~/.solkit/config.toml` (canonical write location)
//!
//! # Validation
//!
//! Config values are validated after parsing to ensure they conform to
//! expected formats (e.g., the default tag must not be empty).

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Largest accepted `archive.skip_levels`.
pub const MAX_SKIP_LEVELS: usize = 16;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// [isolation]
/// default_tag = "stable"
/// allow_leftover_markers = true
///
/// [fork]
/// path_warnings = true
///
/// [archive]
/// skip_levels = 1
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Isolation defaults
    pub isolation: Option<IsolationConfig>,

    /// Fork defaults
    pub fork: Option<ForkConfig>,

    /// Archive defaults
    pub archive: Option<ArchiveConfig>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(isolation) = &self.isolation {
            isolation.validate()?;
        }
        if let Some(archive) = &self.archive {
            archive.validate()?;
        }
        Ok(())
    }
}

/// Isolation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct IsolationConfig {
    /// Tag value that helper functions reduce to an empty string
    pub default_tag: Option<String>,

    /// Whether unresolved markers left after isolation are only warned about
    pub allow_leftover_markers: Option<bool>,
}

impl IsolationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(tag) = &self.default_tag {
            if tag.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "isolation.default_tag cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Fork settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ForkConfig {
    /// Warn about declared paths that embed the solution identifier
    pub path_warnings: Option<bool>,
}

/// Archive settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Leading directories to skip when extracting
    pub skip_levels: Option<usize>,
}

impl ArchiveConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(levels) = self.skip_levels {
            if levels > MAX_SKIP_LEVELS {
                return Err(ConfigError::InvalidValue(format!(
                    "archive.skip_levels must be at most {MAX_SKIP_LEVELS}, got {levels}"
                )));
            }
        }
        Ok(())
    }
}
