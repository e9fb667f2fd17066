//! isolation::env
//!
//! Variable environment for isolation.
//!
//! # Sources
//!
//! The environment comes from exactly one of:
//! - an explicit tag, giving `{"env": {"tag": <tag>, "dependencyTags": {}}}`
//! - an environment file: a JSON object of arbitrary shape, conventionally
//!   `{"env": {"tag": "...", "dependencyTags": {...}}}`
//!
//! An explicit tag always wins over an environment file.
//!
//! Once the manifest has been resolved, `sys.solutionId` is injected with
//! the resolved solution name.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};
use tracing::warn;

use super::IsolationError;

/// Where the variable environment comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentSource {
    Tag(String),
    File(PathBuf),
}

impl EnvironmentSource {
    /// Choose the environment source from optional inputs.
    ///
    /// # Errors
    ///
    /// Returns `IsolationError::AmbiguousEnvironmentSource` if neither input
    /// is given.
    pub fn resolve(tag: Option<String>, file: Option<PathBuf>) -> Result<Self, IsolationError> {
        match (tag, file) {
            (Some(tag), Some(file)) => {
                warn!(
                    tag = %tag,
                    file = %file.display(),
                    "both a tag and an environment file were given; using the tag"
                );
                Ok(EnvironmentSource::Tag(tag))
            }
            (Some(tag), None) => Ok(EnvironmentSource::Tag(tag)),
            (None, Some(file)) => Ok(EnvironmentSource::File(file)),
            (None, None) => Err(IsolationError::AmbiguousEnvironmentSource),
        }
    }
}

/// Variables available to marker expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    vars: Value,
}

impl Environment {
    /// Build the environment for a source.
    pub fn load(source: &EnvironmentSource) -> Result<Self, IsolationError> {
        match source {
            EnvironmentSource::Tag(tag) => Ok(Self::from_tag(tag)),
            EnvironmentSource::File(path) => Self::from_file(path),
        }
    }

    /// Environment for an explicit tag.
    pub fn from_tag(tag: &str) -> Self {
        Self {
            vars: json!({"env": {"tag": tag, "dependencyTags": {}}}),
        }
    }

    /// Environment read from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `IsolationError::EnvironmentFile` if the file cannot be read
    /// or is not a JSON object.
    pub fn from_file(path: &Path) -> Result<Self, IsolationError> {
        let env_err = |message: String| IsolationError::EnvironmentFile {
            path: path.to_path_buf(),
            message,
        };
        let bytes = fs::read(path).map_err(|e| env_err(e.to_string()))?;
        let vars: Value = serde_json::from_slice(&bytes).map_err(|e| env_err(e.to_string()))?;
        Self::from_value(vars).map_err(env_err)
    }

    /// Environment from an already parsed JSON value.
    ///
    /// Returns the reason as an error if `vars` is not an object.
    pub fn from_value(vars: Value) -> Result<Self, String> {
        if vars.is_object() {
            Ok(Self { vars })
        } else {
            Err("environment must be a JSON object".to_string())
        }
    }

    /// Return a copy with `sys.solutionId` set.
    pub fn with_solution_id(mut self, solution_id: &str) -> Self {
        if let Value::Object(root) = &mut self.vars {
            let sys = root
                .entry("sys")
                .or_insert_with(|| Value::Object(Map::new()));
            if !sys.is_object() {
                *sys = Value::Object(Map::new());
            }
            if let Value::Object(sys) = sys {
                sys.insert("solutionId".to_string(), Value::String(solution_id.to_string()));
            }
        }
        self
    }

    /// The variable root.
    pub fn vars(&self) -> &Value {
        &self.vars
    }

    /// The environment's tag, if any.
    pub fn tag(&self) -> Option<&str> {
        self.vars.get("env")?.get("tag")?.as_str()
    }
}
