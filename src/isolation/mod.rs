//! isolation
//!
//! Expression substitution over a whole solution tree.
//!
//! # Overview
//!
//! Isolation turns a solution whose files contain `${...}` markers into a
//! concrete copy with every marker resolved against an [`Environment`].
//! Files are treated as text, not as documents, so any encoding can carry
//! markers.
//!
//! # Pipeline
//!
//! Isolation runs in two explicit steps:
//!
//! 1. [`Isolator::resolve_manifest`] isolates and re-parses the manifest and
//!    returns the environment augmented with `sys.solutionId`.
//! 2. [`Isolator::isolate_remaining_files`] isolates every other file, in
//!    declaration order first (object files, object directories, knowledge
//!    types) and then whatever is left in walk order.
//!
//! # Inert Markers
//!
//! A marker whose trimmed body starts with `.` is left untouched. Such
//! markers belong to templates evaluated by other systems downstream.
//!
//! # Example
//!
//! ```ignore
//! let source = SolutionTree::build(Path::new("acme"))?;
//! let mut isolator = Isolator::new("stable");
//! let (isolated, report) = isolator.isolate(&source, Environment::from_tag("dev"))?;
//! isolated.write(Path::new("acme-dev"))?;
//! ```

pub mod env;
pub mod eval;
pub mod expr;

pub use env::{Environment, EnvironmentSource};

use std::collections::HashSet;
use std::path::PathBuf;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::manifest::{normalize_declared_path, Manifest, ObjectLocation};
use crate::core::tree::{SolutionTree, TreeError, Visit};
use eval::{evaluate_to_string, ExpressionCache, Scope};

/// Pattern matching one `${...}` marker; group 1 is the body.
pub const MARKER_PATTERN: &str = r"\$\{([^}]*)\}";

/// Errors from isolation.
#[derive(Debug, Error)]
pub enum IsolationError {
    #[error("exactly one of a tag or an environment file must be given")]
    AmbiguousEnvironmentSource,

    #[error("invalid environment file '{path}': {message}")]
    EnvironmentFile { path: PathBuf, message: String },

    #[error("cannot compile expression '{expr}' in '{file}': {message}")]
    ExpressionCompileError {
        file: String,
        expr: String,
        message: String,
    },

    #[error("cannot evaluate expression '{expr}' in '{file}': {message}")]
    ExpressionEvalError {
        file: String,
        expr: String,
        message: String,
    },

    #[error("manifest '{file}' is not valid UTF-8")]
    ManifestNotText { file: String },

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// A marker that survived isolation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeftoverMarker {
    /// File containing the marker, relative to the root.
    pub path: String,
    /// The full marker text.
    pub marker: String,
}

/// Summary of an isolation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IsolationReport {
    /// The resolved solution name.
    pub solution_id: String,
    /// Files whose contents changed, with the number of markers resolved.
    pub changed: Vec<(String, usize)>,
    /// Number of files visited, including the manifest.
    pub visited: usize,
    /// Number of inert markers left in place.
    pub inert: usize,
}

impl IsolationReport {
    /// Total markers resolved across all files.
    pub fn resolved(&self) -> usize {
        self.changed.iter().map(|(_, n)| n).sum()
    }
}

/// Result of isolating one text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolatedText {
    pub text: String,
    /// Markers replaced.
    pub resolved: usize,
    /// Inert markers skipped.
    pub inert: usize,
}

/// Per-run isolation state: the marker regex and the expression cache.
#[derive(Debug)]
pub struct Isolator {
    markers: Regex,
    cache: ExpressionCache,
    default_tag: String,
}

impl Isolator {
    /// Create an isolator. `default_tag` is the tag value that the
    /// tag helper functions reduce to an empty string.
    pub fn new(default_tag: impl Into<String>) -> Self {
        Self {
            markers: marker_regex(),
            cache: ExpressionCache::new(),
            default_tag: default_tag.into(),
        }
    }

    /// Resolve every marker in `text`.
    ///
    /// All replacements are computed against the original text in one pass.
    /// `file` only labels errors.
    pub fn isolate_text(
        &mut self,
        file: &str,
        text: &str,
        env: &Environment,
    ) -> Result<IsolatedText, IsolationError> {
        let scope = Scope {
            vars: env.vars(),
            default_tag: &self.default_tag,
        };
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        let mut resolved = 0;
        let mut inert = 0;

        for caps in self.markers.captures_iter(text) {
            let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let source = body.as_str().trim();
            if source.starts_with('.') {
                inert += 1;
                continue;
            }

            let expr =
                self.cache
                    .compile(source)
                    .map_err(|e| IsolationError::ExpressionCompileError {
                        file: file.to_string(),
                        expr: whole.as_str().to_string(),
                        message: e.message,
                    })?;
            let value =
                evaluate_to_string(expr, scope).map_err(|e| IsolationError::ExpressionEvalError {
                    file: file.to_string(),
                    expr: whole.as_str().to_string(),
                    message: e.message,
                })?;

            out.push_str(&text[last..whole.start()]);
            out.push_str(&value);
            last = whole.end();
            resolved += 1;
        }
        out.push_str(&text[last..]);

        Ok(IsolatedText {
            text: out,
            resolved,
            inert,
        })
    }

    /// Isolate raw bytes. Returns `None` when nothing changed or the bytes
    /// are not text.
    fn isolate_bytes(
        &mut self,
        file: &str,
        bytes: &[u8],
        env: &Environment,
        report: &mut IsolationReport,
    ) -> Result<Option<Vec<u8>>, IsolationError> {
        report.visited += 1;
        let Ok(text) = std::str::from_utf8(bytes) else {
            debug!(file, "not UTF-8, copying unchanged");
            return Ok(None);
        };
        let isolated = self.isolate_text(file, text, env)?;
        report.inert += isolated.inert;
        if isolated.resolved == 0 {
            return Ok(None);
        }
        debug!(file, markers = isolated.resolved, "isolated file");
        report.changed.push((file.to_string(), isolated.resolved));
        Ok(Some(isolated.text.into_bytes()))
    }

    /// Step 1: isolate and re-parse the manifest.
    ///
    /// Returns the resolved manifest and `env` augmented with
    /// `sys.solutionId`.
    pub fn resolve_manifest(
        &mut self,
        tree: &SolutionTree,
        env: Environment,
        report: &mut IsolationReport,
    ) -> Result<(Manifest, Environment), IsolationError> {
        let file = tree.manifest.file_name().to_string();
        let text = std::str::from_utf8(tree.manifest_contents())
            .map_err(|_| IsolationError::ManifestNotText { file: file.clone() })?;

        report.visited += 1;
        let isolated = self.isolate_text(&file, text, &env)?;
        report.inert += isolated.inert;
        if isolated.resolved > 0 {
            report.changed.push((file.clone(), isolated.resolved));
        }

        let manifest = Manifest::parse(isolated.text.as_bytes(), &file)?;
        let env = env.with_solution_id(&manifest.name);
        report.solution_id = manifest.name.clone();
        info!(solution = %manifest.name, "resolved manifest");
        Ok((manifest, env))
    }

    /// Step 2: isolate every file of `tree` other than the manifest.
    ///
    /// `tree` must already carry the resolved manifest.
    pub fn isolate_remaining_files(
        &mut self,
        tree: &mut SolutionTree,
        env: &Environment,
        report: &mut IsolationReport,
    ) -> Result<(), IsolationError> {
        let mut visited = HashSet::new();

        for path in declaration_order(tree)? {
            if !visited.insert(path.clone()) {
                continue;
            }
            let Some(file) = tree.file(&path) else {
                continue;
            };
            let contents = file.contents.clone();
            if let Some(isolated) = self.isolate_bytes(&path, &contents, env, report)? {
                if let Some(file) = tree.file_mut(&path) {
                    file.contents = isolated;
                }
            }
        }

        tree.walk(|entry| {
            if visited.contains(&entry.path) {
                return Ok(Visit::Continue);
            }
            Ok(
                match self.isolate_bytes(&entry.path, &entry.file.contents, env, report)? {
                    Some(isolated) => Visit::Replace(isolated),
                    None => Visit::Continue,
                },
            )
        })
    }

    /// Isolate a whole tree into a new tree. The source is not modified.
    pub fn isolate(
        &mut self,
        source: &SolutionTree,
        env: Environment,
    ) -> Result<(SolutionTree, IsolationReport), IsolationError> {
        let mut report = IsolationReport::default();
        let (manifest, env) = self.resolve_manifest(source, env, &mut report)?;

        let mut tree = source.clone();
        tree.set_manifest(manifest)?;
        tree.reannotate()?;

        self.isolate_remaining_files(&mut tree, &env, &mut report)?;
        info!(
            files = report.visited,
            changed = report.changed.len(),
            markers = report.resolved(),
            "isolation complete"
        );
        Ok((tree, report))
    }
}

/// The regex for `${...}` markers.
pub fn marker_regex() -> Regex {
    Regex::new(MARKER_PATTERN).expect("marker pattern is valid")
}

/// Relative paths of declared files in the order isolation visits them:
/// object files, files under object directories, knowledge-type files.
fn declaration_order(tree: &SolutionTree) -> Result<Vec<String>, TreeError> {
    let mut order = Vec::new();
    let mut dirs = Vec::new();

    for decl in &tree.manifest.objects {
        match decl.location()? {
            ObjectLocation::File(path) => order.push(normalize_declared_path(path)),
            ObjectLocation::Dir(path) => dirs.push(normalize_declared_path(path)),
        }
    }

    for dir in dirs {
        let prefix = format!("{dir}/");
        for sub in tree.directories() {
            if sub.path == dir || sub.path.starts_with(&prefix) {
                order.extend(sub.files.iter().map(|f| format!("{}/{}", sub.path, f.name)));
            }
        }
    }

    order.extend(
        tree.manifest
            .knowledge_types
            .iter()
            .map(|p| normalize_declared_path(p)),
    );
    Ok(order)
}

/// Find markers still present in `tree` (manifest included), ignoring
/// inert ones.
pub fn find_leftover_markers(tree: &SolutionTree) -> Result<Vec<LeftoverMarker>, IsolationError> {
    let markers = marker_regex();
    let manifest = tree.manifest.to_bytes()?;
    let files = std::iter::once((tree.manifest.file_name().to_string(), manifest.as_slice()))
        .chain(tree.files().map(|(path, f)| (path, f.contents.as_slice())));

    let mut leftovers = Vec::new();
    for (path, bytes) in files {
        let Ok(text) = std::str::from_utf8(bytes) else {
            continue;
        };
        for caps in markers.captures_iter(text) {
            let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if !body.as_str().trim().starts_with('.') {
                leftovers.push(LeftoverMarker {
                    path: path.clone(),
                    marker: whole.as_str().to_string(),
                });
            }
        }
    }
    Ok(leftovers)
}
