//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`SolutionName`] - Solution identifier with optional pseudo-isolation suffix
//! - [`ObjectType`] - Namespaced object type such as `fmm:entity`
//! - [`Encoding`] - File encoding derived from a file extension
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use solution_kit::core::types::{Encoding, ObjectType, SolutionName};
//!
//! let name = SolutionName::new("acme${$tagSuffix(env.tag)}").unwrap();
//! assert_eq!(name.identifier(), "acme");
//! assert_eq!(name.suffix(), Some("${$tagSuffix(env.tag)}"));
//!
//! let ty = ObjectType::new("fmm:entity").unwrap();
//! assert_eq!(ty.kind(), "entity");
//!
//! assert_eq!(Encoding::from_file_name("a.yml"), Encoding::Yaml);
//! assert!(SolutionName::new("").is_err());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid solution name: {0}")]
    InvalidSolutionName(String),

    #[error("invalid object type: {0}")]
    InvalidObjectType(String),
}

/// A solution identifier as declared in a manifest's `name` field.
///
/// A declared name may end with a pseudo-isolation suffix: a trailing
/// `${...}` marker that makes the name environment dependent. The suffix is
/// kept verbatim and re-attached by [`SolutionName::with_identifier`].
///
/// # Example
///
/// ```
/// use solution_kit::core::types::SolutionName;
///
/// let old = SolutionName::new("acme${env.tag}").unwrap();
/// let new = old.with_identifier("globex").unwrap();
/// assert_eq!(new.as_str(), "globex${env.tag}");
///
/// // Plain names have no suffix
/// let plain = SolutionName::new("acme").unwrap();
/// assert_eq!(plain.suffix(), None);
///
/// // Whitespace and path separators are rejected
/// assert!(SolutionName::new("has space").is_err());
/// assert!(SolutionName::new("a/b").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SolutionName {
    full: String,
    /// Byte offset where the suffix starts (== full.len() when absent).
    split: usize,
}

impl SolutionName {
    /// Create a new validated solution name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidSolutionName` if the identifier part is
    /// empty or contains whitespace, path separators or an embedded marker.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let full = name.into();
        let split = Self::suffix_start(&full).unwrap_or(full.len());
        Self::validate_identifier(&full[..split])?;
        Ok(Self { full, split })
    }

    /// Find the start of a trailing `${...}` marker, if any.
    ///
    /// Separators directly before the marker (`acme-${...}`) belong to the
    /// suffix, so the identifier always ends on an alphanumeric character.
    fn suffix_start(name: &str) -> Option<usize> {
        if !name.ends_with('}') {
            return None;
        }
        let start = name.rfind("${")?;
        // The marker must be a single trailing marker with no nested close
        if name[start + 2..name.len() - 1].contains('}') {
            return None;
        }
        let ident = name[..start].trim_end_matches(|c: char| !c.is_alphanumeric());
        Some(ident.len())
    }

    fn validate_identifier(ident: &str) -> Result<(), TypeError> {
        if ident.is_empty() {
            return Err(TypeError::InvalidSolutionName(
                "solution identifier cannot be empty".into(),
            ));
        }
        if ident.contains("${") {
            return Err(TypeError::InvalidSolutionName(format!(
                "'{ident}' contains an expression marker outside the suffix"
            )));
        }
        for c in ident.chars() {
            if c.is_whitespace() || c.is_control() {
                return Err(TypeError::InvalidSolutionName(format!(
                    "'{ident}' cannot contain whitespace or control characters"
                )));
            }
            if c == '/' || c == '\\' {
                return Err(TypeError::InvalidSolutionName(format!(
                    "'{ident}' cannot contain path separators"
                )));
            }
        }
        Ok(())
    }

    /// The identifier without the pseudo-isolation suffix.
    pub fn identifier(&self) -> &str {
        &self.full[..self.split]
    }

    /// The pseudo-isolation suffix, if present.
    pub fn suffix(&self) -> Option<&str> {
        if self.split == self.full.len() {
            None
        } else {
            Some(&self.full[self.split..])
        }
    }

    /// Whether the name carries a pseudo-isolation suffix.
    pub fn is_pseudo_isolated(&self) -> bool {
        self.suffix().is_some()
    }

    /// Build a new name with a different identifier and the same suffix.
    ///
    /// # Errors
    ///
    /// Returns an error if `identifier` is invalid or itself carries a suffix.
    pub fn with_identifier(&self, identifier: &str) -> Result<Self, TypeError> {
        let candidate = Self::new(identifier)?;
        if candidate.is_pseudo_isolated() {
            return Err(TypeError::InvalidSolutionName(format!(
                "'{identifier}' must not carry an isolation suffix"
            )));
        }
        Self::new(format!("{}{}", identifier, self.suffix().unwrap_or("")))
    }

    /// Get the full declared name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.full
    }
}

impl TryFrom<String> for SolutionName {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SolutionName> for String {
    fn from(name: SolutionName) -> Self {
        name.full
    }
}

impl fmt::Display for SolutionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

/// A namespaced object type such as `fmm:entity`.
///
/// The namespace is everything before the last `:`; the kind is everything
/// after it. Types without a namespace are accepted (the whole string is the
/// kind) because unresolved manifests may hold an expression there.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectType(String);

impl ObjectType {
    /// Create a new object type.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidObjectType` if the type or its kind is empty.
    pub fn new(ty: impl Into<String>) -> Result<Self, TypeError> {
        let ty = ty.into();
        if ty.trim().is_empty() {
            return Err(TypeError::InvalidObjectType(
                "object type cannot be empty".into(),
            ));
        }
        if ty.ends_with(':') {
            return Err(TypeError::InvalidObjectType(format!(
                "'{ty}' has an empty kind"
            )));
        }
        Ok(Self(ty))
    }

    /// The namespace part, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.0.rsplit_once(':').map(|(ns, _)| ns)
    }

    /// The kind part (after the last `:`).
    pub fn kind(&self) -> &str {
        self.0.rsplit_once(':').map_or(self.0.as_str(), |(_, k)| k)
    }

    /// Get the type as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ObjectType {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ObjectType> for String {
    fn from(ty: ObjectType) -> Self {
        ty.0
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Encoding of a solution file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Json,
    Yaml,
    Unknown,
}

impl Encoding {
    /// Derive the encoding from a file name.
    pub fn from_file_name(name: &str) -> Self {
        match name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
            Some(ext) if ext == "json" => Encoding::Json,
            Some(ext) if ext == "yaml" || ext == "yml" => Encoding::Yaml,
            _ => Encoding::Unknown,
        }
    }

    /// Whether files of this encoding can be decoded into documents.
    pub fn is_structured(self) -> bool {
        !matches!(self, Encoding::Unknown)
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Encoding::Json => "json",
            Encoding::Yaml => "yaml",
            Encoding::Unknown => "unknown",
        };
        f.write_str(s)
    }
}
