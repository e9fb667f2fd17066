//! archive::target
//!
//! Destinations for extracted entries.

use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use super::ArchiveError;

/// Something archive entries can be extracted into.
///
/// Paths passed in are already validated: relative, `/`-free components,
/// no `..`. Implementations may check again.
pub trait ExtractTarget {
    /// Create a directory (and its parents).
    fn create_dir(&self, rel: &Path) -> Result<(), ArchiveError>;

    /// Create a file from `contents`, creating parent directories.
    fn write_file(&self, rel: &Path, contents: &mut dyn Read) -> Result<(), ArchiveError>;
}

/// Filesystem target confined to a root directory.
#[derive(Debug, Clone)]
pub struct RootedDir {
    root: PathBuf,
}

impl RootedDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join `rel` onto the root, refusing anything but plain components.
    fn resolve(&self, rel: &Path) -> Result<PathBuf, ArchiveError> {
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(ArchiveError::PathTraversalRejected {
                entry: rel.display().to_string(),
            });
        }
        Ok(self.root.join(rel))
    }
}

impl ExtractTarget for RootedDir {
    fn create_dir(&self, rel: &Path) -> Result<(), ArchiveError> {
        let path = self.resolve(rel)?;
        fs::create_dir_all(&path).map_err(|e| ArchiveError::io(&path, e))
    }

    fn write_file(&self, rel: &Path, contents: &mut dyn Read) -> Result<(), ArchiveError> {
        let path = self.resolve(rel)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
        }
        let mut file = fs::File::create(&path).map_err(|e| ArchiveError::io(&path, e))?;
        io::copy(contents, &mut file).map_err(|e| ArchiveError::io(&path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_below_root() {
        let temp = TempDir::new().unwrap();
        let target = RootedDir::new(temp.path());
        target
            .write_file(Path::new("a/b.txt"), &mut "hi".as_bytes())
            .unwrap();
        assert_eq!(fs::read_to_string(temp.path().join("a/b.txt")).unwrap(), "hi");
    }

    #[test]
    fn refuses_parent_components() {
        let temp = TempDir::new().unwrap();
        let target = RootedDir::new(temp.path().join("root"));
        let err = target
            .write_file(Path::new("../escape.txt"), &mut "x".as_bytes())
            .unwrap_err();
        assert!(matches!(err, ArchiveError::PathTraversalRejected { .. }));
        assert!(!temp.path().join("escape.txt").exists());
    }

    #[test]
    fn refuses_absolute_paths() {
        let temp = TempDir::new().unwrap();
        let target = RootedDir::new(temp.path());
        let err = target.create_dir(Path::new("/etc")).unwrap_err();
        assert!(matches!(err, ArchiveError::PathTraversalRejected { .. }));
    }
}
