//! engine
//!
//! Orchestrates one operation: Load -> Transform -> Check -> Emit.
//!
//! # Architecture
//!
//! Every command follows the same lifecycle:
//!
//! ```text
//! Load (dir or zip) -> Transform (isolate | fork) -> Check -> Emit (dir or zip)
//! ```
//!
//! 1. **Load**: resolve the [`Source`], extracting archives into a staging
//!    directory, and build the [`SolutionTree`](crate::core::tree::SolutionTree)
//! 2. **Transform**: run exactly one engine over the in-memory tree
//! 3. **Check**: post-conditions such as leftover markers
//! 4. **Emit**: write the tree to a [`Target`] directory or pack it
//!
//! The target is checked before any work is done so that a non-empty target
//! fails fast.
//!
//! # Invariants
//!
//! - The source is never modified
//! - Nothing is written to the target unless the transform succeeded
//! - Staging directories are removed when the operation ends
//!
//! # Example
//!
//! ```ignore
//! use solution_kit::engine::{self, IsolateRequest, Source, Target};
//!
//! let outcome = engine::isolate(&config, IsolateRequest {
//!     source: Source::from_path("acme.zip")?,
//!     environment: EnvironmentSource::Tag("dev".into()),
//!     target: Target::Dir("acme-dev".into()),
//!     skip_levels: 1,
//!     force: false,
//! })?;
//! ```

pub mod runner;
pub mod source;
pub mod target;

pub use runner::{fork, info, isolate, ForkOutcome, ForkRequest, IsolateOutcome, IsolateRequest};
pub use source::{LoadedTree, Source};
pub use target::Target;

use std::io;
use std::path::PathBuf;

use crate::archive::ArchiveError;
use crate::core::tree::TreeError;
use crate::fork::ForkError;
use crate::isolation::IsolationError;

/// Execution context for commands.
///
/// Contains global settings derived from CLI flags that affect command behavior.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Working directory override; relative paths resolve against it.
    pub cwd: Option<PathBuf>,
    /// Debug logging enabled.
    pub debug: bool,
    /// Quiet mode (minimal output).
    pub quiet: bool,
}

impl Context {
    /// Resolve a user-supplied path against `cwd`.
    pub fn resolve(&self, path: impl Into<PathBuf>) -> PathBuf {
        let path = path.into();
        match &self.cwd {
            Some(cwd) if path.is_relative() => cwd.join(path),
            _ => path,
        }
    }
}

/// Errors from engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The source is neither a directory nor a zip file.
    #[error("invalid source '{path}': {reason}")]
    InvalidSource { path: PathBuf, reason: String },

    /// A write was requested without a target.
    #[error("a target directory or file is required")]
    MissingTarget,

    /// The target already has content and `--force` was not given.
    #[error("target '{path}' is not empty (use --force to overwrite)")]
    TargetNotEmpty { path: PathBuf },

    /// Markers remained after isolation and the config forbids it.
    #[error("{count} unresolved marker(s) remain after isolation")]
    LeftoverMarkers { count: usize },

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Isolation(#[from] IsolationError),

    #[error(transparent)]
    Fork(#[from] ForkError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }
}
