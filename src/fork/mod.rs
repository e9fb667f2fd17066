//! fork
//!
//! Structural renaming of a solution.
//!
//! # Overview
//!
//! Forking produces a copy of a solution under a new identifier. Unlike
//! isolation, which is textual, forking decodes every JSON or YAML file into
//! a [`Document`] and rewrites only string values, so mapping keys and
//! partial-word matches are never touched.
//!
//! # Per-file Rules
//!
//! - the `.tag` cache file is deleted
//! - files of unknown encoding are skipped and reported
//! - a namespace object file named `<old>.<ext>` is renamed to `<new>.<ext>`
//! - files with no match keep their original bytes
//!
//! The manifest gets the new name, keeping any pseudo-isolation suffix, and
//! has its object types rewritten with the same whole-word rule. Declared
//! paths that contain the old identifier are reported as warnings since they
//! are not renamed.
//!
//! # Example
//!
//! ```ignore
//! let mut tree = SolutionTree::build(Path::new("acme"))?;
//! let report = fork(&mut tree, "globex", &ForkOptions::default())?;
//! tree.write(Path::new("globex"))?;
//! ```

pub mod renamer;

pub use renamer::Renamer;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::document::{Document, DocumentError};
use crate::core::manifest::{normalize_declared_path, ObjectLocation};
use crate::core::tree::{File, FileKind, SolutionTree, TreeError, Visit};
use crate::core::types::{ObjectType, TypeError};

/// Name of the cached tag file removed by a fork.
pub const TAG_FILE: &str = ".tag";

/// Object type kind marking a namespace object.
pub const NAMESPACE_KIND: &str = "namespace";

/// Errors from forking.
#[derive(Debug, Error)]
pub enum ForkError {
    #[error("invalid solution name '{name}': {reason}")]
    InvalidSolutionName { name: String, reason: String },

    #[error("failed to process '{path}': {message}")]
    EncodeDecodeError { path: String, message: String },

    #[error(transparent)]
    Tree(#[from] TreeError),
}

impl ForkError {
    fn document(path: &str, err: DocumentError) -> Self {
        ForkError::EncodeDecodeError {
            path: path.to_string(),
            message: err.to_string(),
        }
    }

    fn object_type(path: &str, err: TypeError) -> Self {
        ForkError::EncodeDecodeError {
            path: path.to_string(),
            message: err.to_string(),
        }
    }
}

/// Options for a fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkOptions {
    /// Report declared paths that contain the old identifier.
    pub path_warnings: bool,
}

impl Default for ForkOptions {
    fn default() -> Self {
        Self {
            path_warnings: true,
        }
    }
}

/// A file whose contents were rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    /// Replacements made in the file.
    pub count: usize,
}

/// What a fork did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForkReport {
    pub old_name: String,
    pub new_name: String,
    pub changed: Vec<FileChange>,
    /// `(from, to)` relative paths.
    pub renamed: Vec<(String, String)>,
    pub deleted: Vec<String>,
    /// `(path, reason)` for files left as they were.
    pub skipped: Vec<(String, String)>,
    pub warnings: Vec<String>,
}

impl ForkReport {
    /// Total replacements across all files.
    pub fn replacements(&self) -> usize {
        self.changed.iter().map(|c| c.count).sum()
    }
}

/// Rename the solution in `tree` to `new_identifier`.
///
/// The tree is modified in place. On error the file contents may already
/// be updated but the manifest is not.
pub fn fork(
    tree: &mut SolutionTree,
    new_identifier: &str,
    options: &ForkOptions,
) -> Result<ForkReport, ForkError> {
    let old = tree
        .manifest
        .solution_name()
        .map_err(|e| ForkError::InvalidSolutionName {
            name: tree.manifest.name.clone(),
            reason: e.to_string(),
        })?;
    let renamer = Renamer::new(&old, new_identifier)?;
    let mut report = ForkReport {
        old_name: old.to_string(),
        new_name: renamer.new_name().to_string(),
        ..ForkReport::default()
    };
    info!(from = %report.old_name, to = %report.new_name, "forking solution");

    if options.path_warnings {
        report.warnings = path_warnings(tree, &renamer)?;
        for warning in &report.warnings {
            warn!("{warning}");
        }
    }

    tree.walk(|entry| visit_file(&renamer, &entry.path, entry.file, &mut report))?;
    rewrite_manifest(tree, &renamer, &mut report)?;

    info!(
        changed = report.changed.len(),
        replacements = report.replacements(),
        "fork complete"
    );
    Ok(report)
}

fn visit_file(
    renamer: &Renamer,
    path: &str,
    file: &File,
    report: &mut ForkReport,
) -> Result<Visit, ForkError> {
    if file.kind == FileKind::Hidden && file.name == TAG_FILE {
        debug!(path, "removing tag file");
        report.deleted.push(path.to_string());
        return Ok(Visit::Delete);
    }
    if !file.encoding.is_structured() {
        debug!(path, "skipping file of unknown encoding");
        report
            .skipped
            .push((path.to_string(), "unknown encoding".to_string()));
        return Ok(Visit::Continue);
    }

    let mut doc =
        Document::decode(&file.contents, file.encoding).map_err(|e| ForkError::document(path, e))?;
    let count = renamer.rename_document(&mut doc);
    let contents = if count > 0 {
        debug!(path, count, "renamed identifier occurrences");
        report.changed.push(FileChange {
            path: path.to_string(),
            count,
        });
        Some(
            doc.encode(file.encoding)
                .map_err(|e| ForkError::document(path, e))?,
        )
    } else {
        None
    };

    let is_namespace = file
        .kind
        .object_type()
        .is_some_and(|t| t.kind() == NAMESPACE_KIND);
    let new_name = if is_namespace {
        renamer.rename_namespace_file(&file.name)
    } else {
        None
    };
    if let Some(name) = &new_name {
        let to = match path.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/{name}"),
            None => name.clone(),
        };
        debug!(from = path, to = %to, "renaming namespace file");
        report.renamed.push((path.to_string(), to));
    }

    Ok(match (contents, new_name) {
        (None, None) => Visit::Continue,
        (Some(contents), None) => Visit::Replace(contents),
        (None, Some(name)) => Visit::Rename(name),
        (Some(contents), Some(name)) => Visit::ReplaceAndRename { contents, name },
    })
}

/// Set the new name and rewrite object types in the manifest.
///
/// An `objectsFile` declaration pointing at a renamed namespace file is
/// updated to the new path.
fn rewrite_manifest(
    tree: &mut SolutionTree,
    renamer: &Renamer,
    report: &mut ForkReport,
) -> Result<(), ForkError> {
    let mut manifest = tree.manifest.clone();
    let file_name = manifest.file_name().to_string();
    let mut count = 0;

    for decl in &mut manifest.objects {
        let (renamed, n) = renamer.rename_str(decl.object_type.as_str());
        if n > 0 {
            decl.object_type =
                ObjectType::new(renamed).map_err(|e| ForkError::object_type(&file_name, e))?;
            count += n;
        }
        if let Some(declared) = &decl.objects_file {
            let normalized = normalize_declared_path(declared);
            if let Some((_, to)) = report.renamed.iter().find(|(from, _)| *from == normalized) {
                decl.objects_file = Some(to.clone());
            }
        }
    }

    if manifest.name != renamer.new_name().as_str() {
        manifest.name = renamer.new_name().to_string();
        count += 1;
    }
    if count > 0 {
        report.changed.push(FileChange {
            path: file_name,
            count,
        });
    }
    tree.set_manifest(manifest)?;
    Ok(())
}

/// Warnings for declared paths containing the old identifier.
fn path_warnings(tree: &SolutionTree, renamer: &Renamer) -> Result<Vec<String>, ForkError> {
    let identifier = renamer.old_name().identifier();
    let mut paths = Vec::new();
    for decl in &tree.manifest.objects {
        match decl.location()? {
            ObjectLocation::File(path) | ObjectLocation::Dir(path) => paths.push(path),
        }
    }
    paths.extend(tree.manifest.knowledge_types.iter().map(String::as_str));

    Ok(paths
        .into_iter()
        .filter(|path| renamer.matches(path))
        .map(|path| {
            format!("declared path '{path}' contains the identifier '{identifier}' and will not be renamed")
        })
        .collect())
}
