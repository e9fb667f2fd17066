//! engine::source
//!
//! Loading a solution tree from a directory or a zip archive.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use super::EngineError;
use crate::archive::{self, RootedDir};
use crate::core::tree::SolutionTree;

/// Where a solution is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Dir(PathBuf),
    Archive(PathBuf),
}

impl Source {
    /// Classify `path`: an existing directory or an existing `.zip` file.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let path = path.into();
        if path.is_dir() {
            return Ok(Source::Dir(path));
        }
        if !path.exists() {
            return Err(EngineError::InvalidSource {
                path,
                reason: "does not exist".into(),
            });
        }
        if is_zip(&path) {
            Ok(Source::Archive(path))
        } else {
            Err(EngineError::InvalidSource {
                path,
                reason: "expected a directory or a .zip file".into(),
            })
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Source::Dir(p) | Source::Archive(p) => p,
        }
    }

    /// Build the tree, extracting archives into a staging directory first.
    pub fn load(&self, skip_levels: usize) -> Result<LoadedTree, EngineError> {
        match self {
            Source::Dir(dir) => Ok(LoadedTree {
                tree: SolutionTree::build(dir)?,
                _staging: None,
            }),
            Source::Archive(zip) => {
                let staging = TempDir::new().map_err(|e| EngineError::io(zip, e))?;
                let files = archive::unpack(zip, &RootedDir::new(staging.path()), skip_levels)?;
                debug!(archive = %zip.display(), files, "extracted source archive");
                Ok(LoadedTree {
                    tree: SolutionTree::build(staging.path())?,
                    _staging: Some(staging),
                })
            }
        }
    }
}

/// A loaded tree and the staging directory it came from, if any.
#[derive(Debug)]
pub struct LoadedTree {
    pub tree: SolutionTree,
    _staging: Option<TempDir>,
}

pub(crate) fn is_zip(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}
