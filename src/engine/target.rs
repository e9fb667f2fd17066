//! engine::target
//!
//! Writing a solution tree to a directory or a new zip archive.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use super::EngineError;
use crate::archive;
use crate::core::tree::SolutionTree;

/// Where a result is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Dir(PathBuf),
    Archive(PathBuf),
}

impl Target {
    pub fn path(&self) -> &Path {
        match self {
            Target::Dir(p) | Target::Archive(p) => p,
        }
    }

    /// Fail unless the target is absent or empty, or `force` is set.
    ///
    /// With `force`, existing files are overwritten and other content is
    /// left in place.
    pub fn check(&self, force: bool) -> Result<(), EngineError> {
        if force {
            return Ok(());
        }
        let occupied = match self {
            Target::Dir(dir) if dir.is_dir() => fs::read_dir(dir)
                .map_err(|e| EngineError::io(dir, e))?
                .next()
                .is_some(),
            Target::Dir(dir) | Target::Archive(dir) => dir.exists(),
        };
        if occupied {
            return Err(EngineError::TargetNotEmpty {
                path: self.path().to_path_buf(),
            });
        }
        Ok(())
    }

    /// Write `tree` to the target.
    pub fn emit(&self, tree: &SolutionTree, force: bool) -> Result<(), EngineError> {
        self.check(force)?;
        match self {
            Target::Dir(dir) => {
                tree.write(dir)?;
            }
            Target::Archive(zip) => {
                let staging = TempDir::new().map_err(|e| EngineError::io(zip, e))?;
                tree.write(staging.path())?;
                let files = archive::pack(staging.path(), zip)?;
                debug!(archive = %zip.display(), files, "packed result");
            }
        }
        Ok(())
    }
}
