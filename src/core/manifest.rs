//! core::manifest
//!
//! Solution manifest schema and loading.
//!
//! # Location
//!
//! The manifest lives at the root of a solution tree. The first of these
//! that exists is used, and its extension fixes the manifest format:
//! 1. `solution.json`
//! 2. `solution.yaml`
//! 3. `solution.yml`
//!
//! # Example
//!
//! ```json
//! {
//!   "formatVersion": "1",
//!   "name": "acme${$tagSuffix(env.tag)}",
//!   "version": "1.0.0",
//!   "dependencies": [{ "name": "core", "version": "2.0.0" }],
//!   "knowledgeTypes": ["knowledge/types.json"],
//!   "objects": [
//!     { "type": "fmm:entity", "objectsDir": "objects/model/entities" },
//!     { "type": "fmm:namespace", "objectsFile": "objects/acme.json" }
//!   ]
//! }
//! ```
//!
//! Fields the engines do not interpret (`formatVersion`, `version`,
//! `description`, `contact`, ...) are kept in insertion order and written
//! back unchanged.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::document::Document;
use super::tree::TreeError;
use super::types::{ObjectType, SolutionName, TypeError};

/// Manifest file names, in lookup order.
pub const MANIFEST_FILE_NAMES: [&str; 3] = ["solution.json", "solution.yaml", "solution.yml"];

/// Serialization format of the manifest file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ManifestFormat {
    #[default]
    Json,
    Yaml,
}

impl ManifestFormat {
    /// Derive the format from a manifest file name.
    fn from_file_name(name: &str) -> Self {
        if name.ends_with(".json") {
            ManifestFormat::Json
        } else {
            ManifestFormat::Yaml
        }
    }
}

/// Where a declared object lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectLocation<'a> {
    /// A single file, relative to the solution root.
    File(&'a str),
    /// A directory of files, relative to the solution root.
    Dir(&'a str),
}

/// A dependency on another solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,

    #[serde(flatten)]
    pub extra: IndexMap<String, Document>,
}

/// A manifest object declaration.
///
/// Exactly one of `objects_file` and `objects_dir` must be set; this is
/// checked when the manifest is parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDeclaration {
    #[serde(rename = "type")]
    pub object_type: ObjectType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objects_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objects_dir: Option<String>,

    #[serde(flatten)]
    pub extra: IndexMap<String, Document>,
}

impl ObjectDeclaration {
    /// Get the declared location.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::AmbiguousObjectDeclaration` unless exactly one of
    /// `objectsFile` / `objectsDir` is set.
    pub fn location(&self) -> Result<ObjectLocation<'_>, TreeError> {
        match (&self.objects_file, &self.objects_dir) {
            (Some(file), None) => Ok(ObjectLocation::File(file)),
            (None, Some(dir)) => Ok(ObjectLocation::Dir(dir)),
            (Some(_), Some(_)) => Err(TreeError::AmbiguousObjectDeclaration {
                object_type: self.object_type.to_string(),
                reason: "both objectsFile and objectsDir are set".into(),
            }),
            (None, None) => Err(TreeError::AmbiguousObjectDeclaration {
                object_type: self.object_type.to_string(),
                reason: "neither objectsFile nor objectsDir is set".into(),
            }),
        }
    }
}

/// A parsed solution manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Solution identifier, possibly with a pseudo-isolation suffix.
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub knowledge_types: Vec<String>,

    #[serde(default)]
    pub objects: Vec<ObjectDeclaration>,

    /// Uninterpreted fields.
    #[serde(flatten)]
    pub extra: IndexMap<String, Document>,

    #[serde(skip)]
    format: ManifestFormat,

    #[serde(skip)]
    file_name: String,
}

impl Manifest {
    /// Find the manifest file under `root`.
    ///
    /// Returns the file name of the first candidate that exists.
    pub fn locate(root: &Path) -> Option<&'static str> {
        MANIFEST_FILE_NAMES
            .into_iter()
            .find(|name| root.join(name).is_file())
    }

    /// Read and parse the manifest under `root`.
    ///
    /// # Errors
    ///
    /// - `ManifestUnreadable` if no manifest exists or it cannot be read
    /// - `ManifestMalformed` if it cannot be decoded
    /// - `AmbiguousObjectDeclaration` if a declaration is ill-formed
    pub fn load(root: &Path) -> Result<(Self, Vec<u8>), TreeError> {
        let file_name = Self::locate(root).ok_or_else(|| TreeError::ManifestUnreadable {
            path: root.join(MANIFEST_FILE_NAMES[0]),
            message: "no solution manifest found".into(),
        })?;
        let path = root.join(file_name);
        let bytes = std::fs::read(&path).map_err(|e| TreeError::ManifestUnreadable {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let manifest = Self::parse(&bytes, file_name).map_err(|e| match e {
            TreeError::ManifestMalformed { message, .. } => TreeError::ManifestMalformed {
                path: path.clone(),
                message,
            },
            other => other,
        })?;
        Ok((manifest, bytes))
    }

    /// Parse manifest bytes. `file_name` selects the format.
    pub fn parse(bytes: &[u8], file_name: &str) -> Result<Self, TreeError> {
        let format = ManifestFormat::from_file_name(file_name);
        let malformed = |message: String| TreeError::ManifestMalformed {
            path: file_name.into(),
            message,
        };
        let mut manifest: Manifest = match format {
            ManifestFormat::Json => {
                serde_json::from_slice(bytes).map_err(|e| malformed(e.to_string()))?
            }
            ManifestFormat::Yaml => {
                serde_yaml::from_slice(bytes).map_err(|e| malformed(e.to_string()))?
            }
        };
        manifest.format = format;
        manifest.file_name = file_name.to_string();

        for decl in &manifest.objects {
            decl.location()?;
        }
        Ok(manifest)
    }

    /// Serialize the manifest in its own format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TreeError> {
        let encode_err = |message: String| TreeError::Encode {
            path: self.file_name.clone().into(),
            message,
        };
        match self.format {
            ManifestFormat::Json => {
                let mut out =
                    serde_json::to_vec_pretty(self).map_err(|e| encode_err(e.to_string()))?;
                out.push(b'\n');
                Ok(out)
            }
            ManifestFormat::Yaml => serde_yaml::to_string(self)
                .map(String::into_bytes)
                .map_err(|e| encode_err(e.to_string())),
        }
    }

    /// The manifest's format marker.
    pub fn format(&self) -> ManifestFormat {
        self.format
    }

    /// The manifest's file name relative to the solution root.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The validated solution name.
    pub fn solution_name(&self) -> Result<SolutionName, TypeError> {
        SolutionName::new(self.name.clone())
    }

    /// Every path the manifest declares: object files, object directories
    /// and knowledge-type files, in declaration order.
    pub fn declared_paths(&self) -> Vec<&str> {
        self.objects
            .iter()
            .filter_map(|d| d.objects_file.as_deref().or(d.objects_dir.as_deref()))
            .chain(self.knowledge_types.iter().map(String::as_str))
            .collect()
    }

    /// The declared solution version, if any.
    pub fn version(&self) -> Option<&str> {
        self.extra.get("version").and_then(Document::as_str)
    }

    /// The declared description, if any.
    pub fn description(&self) -> Option<&str> {
        self.extra.get("description").and_then(Document::as_str)
    }
}

/// Normalize a declared relative path: forward slashes, no `./` prefix and
/// no trailing `/`.
pub fn normalize_declared_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut path = path.as_str();
    while let Some(rest) = path.strip_prefix("./") {
        path = rest;
    }
    path.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const JSON_MANIFEST: &str = r#"{
        "formatVersion": "1",
        "name": "acme",
        "version": "1.0.0",
        "dependencies": [{"name": "core", "version": "2.0.0"}],
        "knowledgeTypes": ["knowledge/types.json"],
        "objects": [
            {"type": "fmm:entity", "objectsDir": "objects/model/entities"},
            {"type": "fmm:namespace", "objectsFile": "objects/acme.json"}
        ]
    }"#;

    #[test]
    fn parse_json_manifest() {
        let manifest = Manifest::parse(JSON_MANIFEST.as_bytes(), "solution.json").unwrap();
        assert_eq!(manifest.name, "acme");
        assert_eq!(manifest.format(), ManifestFormat::Json);
        assert_eq!(manifest.version(), Some("1.0.0"));
        assert_eq!(manifest.dependencies[0].name, "core");
        assert_eq!(
            manifest.objects[0].location().unwrap(),
            ObjectLocation::Dir("objects/model/entities")
        );
        assert_eq!(
            manifest.declared_paths(),
            vec![
                "objects/model/entities",
                "objects/acme.json",
                "knowledge/types.json"
            ]
        );
    }

    #[test]
    fn parse_yaml_manifest() {
        let yaml = "name: acme\nobjects:\n  - type: fmm:entity\n    objectsFile: e.yaml\n";
        let manifest = Manifest::parse(yaml.as_bytes(), "solution.yml").unwrap();
        assert_eq!(manifest.format(), ManifestFormat::Yaml);
        assert_eq!(manifest.file_name(), "solution.yml");
        assert_eq!(
            manifest.objects[0].location().unwrap(),
            ObjectLocation::File("e.yaml")
        );
    }

    #[test]
    fn both_locations_is_ambiguous() {
        let json = r#"{"name": "a", "objects": [{"type": "x:y", "objectsFile": "f.json", "objectsDir": "d"}]}"#;
        let err = Manifest::parse(json.as_bytes(), "solution.json").unwrap_err();
        assert!(matches!(err, TreeError::AmbiguousObjectDeclaration { .. }));
    }

    #[test]
    fn no_location_is_ambiguous() {
        let json = r#"{"name": "a", "objects": [{"type": "x:y"}]}"#;
        let err = Manifest::parse(json.as_bytes(), "solution.json").unwrap_err();
        assert!(matches!(err, TreeError::AmbiguousObjectDeclaration { .. }));
    }

    #[test]
    fn malformed_manifest() {
        let err = Manifest::parse(b"{", "solution.json").unwrap_err();
        assert!(matches!(err, TreeError::ManifestMalformed { .. }));
    }

    #[test]
    fn extra_fields_survive_roundtrip() {
        let manifest = Manifest::parse(JSON_MANIFEST.as_bytes(), "solution.json").unwrap();
        let bytes = manifest.to_bytes().unwrap();
        let again = Manifest::parse(&bytes, "solution.json").unwrap();
        assert_eq!(again, manifest);
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"formatVersion\": \"1\""));
    }

    #[test]
    fn load_missing_manifest() {
        let temp = TempDir::new().unwrap();
        let err = Manifest::load(temp.path()).unwrap_err();
        assert!(matches!(err, TreeError::ManifestUnreadable { .. }));
    }

    #[test]
    fn load_prefers_json() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("solution.yaml"), "name: from-yaml\n").unwrap();
        fs::write(temp.path().join("solution.json"), r#"{"name": "from-json"}"#).unwrap();
        let (manifest, _) = Manifest::load(temp.path()).unwrap();
        assert_eq!(manifest.name, "from-json");
    }

    #[test]
    fn normalize_paths() {
        assert_eq!(normalize_declared_path("./objects/a/"), "objects/a");
        assert_eq!(normalize_declared_path("objects\\a.json"), "objects/a.json");
        assert_eq!(normalize_declared_path("a.json"), "a.json");
    }
}
