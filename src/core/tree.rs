//! core::tree
//!
//! In-memory model of a solution directory.
//!
//! # Architecture
//!
//! A [`SolutionTree`] is built once per operation by scanning a directory
//! and annotating every file with the role the manifest assigns to it.
//! It is then mutated by exactly one transformation pass and written back
//! with [`SolutionTree::write`].
//!
//! # Walking
//!
//! [`SolutionTree::walk`] visits every file exactly once: root files first,
//! then directories in lexical path order, files in name order. The visitor
//! answers with a [`Visit`]. Edits are collected during the walk and applied
//! only after it completes, so the walk never observes its own changes and a
//! failing visitor leaves the tree untouched.
//!
//! # Example
//!
//! ```ignore
//! use solution_kit::core::tree::{SolutionTree, Visit};
//!
//! let mut tree = SolutionTree::build(Path::new("my-solution"))?;
//! tree.walk(|entry| {
//!     println!("{} ({})", entry.path, entry.file.encoding);
//!     Ok::<_, TreeError>(Visit::Continue)
//! })?;
//! tree.write(Path::new("out"))?;
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use super::manifest::{normalize_declared_path, Manifest, ObjectLocation};
use super::types::{Encoding, ObjectType};

/// Errors from building, walking or writing a solution tree.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("cannot read solution manifest '{path}': {message}")]
    ManifestUnreadable { path: PathBuf, message: String },

    #[error("malformed solution manifest '{path}': {message}")]
    ManifestMalformed { path: PathBuf, message: String },

    #[error("component '{path}' declared in the manifest does not exist")]
    ComponentNotFound { path: String },

    #[error("ambiguous declaration for object type '{object_type}': {reason}")]
    AmbiguousObjectDeclaration { object_type: String, reason: String },

    #[error("path '{path}' escapes the solution root")]
    PathEscapesRoot { path: PathBuf },

    #[error("file name '{name}' already exists in '{dir}'")]
    NameCollision { dir: String, name: String },

    #[error("failed to encode '{path}': {message}")]
    Encode { path: PathBuf, message: String },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl TreeError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TreeError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Role the manifest assigns to a file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FileKind {
    #[default]
    Unknown,
    KnowledgeType,
    ObjectType(ObjectType),
    /// Dot-file at the solution root, such as the local tag cache.
    Hidden,
}

impl FileKind {
    /// The object type, if this file holds declared objects.
    pub fn object_type(&self) -> Option<&ObjectType> {
        match self {
            FileKind::ObjectType(ty) => Some(ty),
            _ => None,
        }
    }

    /// Short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            FileKind::Unknown => "unknown",
            FileKind::KnowledgeType => "knowledge-type",
            FileKind::ObjectType(_) => "object-type",
            FileKind::Hidden => "hidden",
        }
    }
}

/// Role the manifest assigns to a directory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DirRole {
    #[default]
    None,
    ObjectsDir(ObjectType),
}

/// A file in a solution tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    /// File name, unique within its parent.
    pub name: String,
    pub kind: FileKind,
    pub encoding: Encoding,
    /// Raw contents.
    pub contents: Vec<u8>,
}

impl File {
    /// Create an unannotated file; the encoding is derived from the name.
    pub fn new(name: impl Into<String>, contents: Vec<u8>) -> Self {
        let name = name.into();
        Self {
            encoding: Encoding::from_file_name(&name),
            kind: FileKind::Unknown,
            name,
            contents,
        }
    }
}

/// A directory below the solution root.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubDirectory {
    /// Path relative to the root, `/`-separated.
    pub path: String,
    pub role: DirRole,
    /// Files directly in this directory, ordered by name.
    pub files: Vec<File>,
}

/// What to do with the file just visited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visit {
    /// Leave the file as it is.
    Continue,
    /// Replace the file's contents.
    Replace(Vec<u8>),
    /// Rename the file within its directory.
    Rename(String),
    /// Replace contents and rename.
    ReplaceAndRename { contents: Vec<u8>, name: String },
    /// Remove the file from the tree.
    Delete,
    /// Stop walking; edits collected so far are still applied.
    Stop,
}

/// The file passed to a walk visitor.
#[derive(Debug)]
pub struct WalkEntry<'a> {
    /// Path of the file relative to the root.
    pub path: String,
    /// The containing directory, or `None` for root files.
    pub dir: Option<&'a SubDirectory>,
    pub file: &'a File,
}

/// Position of a file inside the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Root(usize),
    Dir(String, usize),
}

/// In-memory solution directory annotated against its manifest.
#[derive(Debug, Clone)]
pub struct SolutionTree {
    /// Directory the tree was built from.
    root: PathBuf,
    /// The parsed manifest.
    pub manifest: Manifest,
    /// The manifest file as read from disk.
    manifest_contents: Vec<u8>,
    /// Directories keyed by relative path.
    directories: BTreeMap<String, SubDirectory>,
    /// Files directly under the root, excluding the manifest.
    root_files: Vec<File>,
}

impl SolutionTree {
    /// Scan `root` and annotate it against its manifest.
    ///
    /// # Errors
    ///
    /// Fails on the first manifest, annotation or I/O error.
    pub fn build(root: &Path) -> Result<Self, TreeError> {
        let (manifest, manifest_contents) = Manifest::load(root)?;
        let mut tree = Self {
            root: root.to_path_buf(),
            manifest,
            manifest_contents,
            directories: BTreeMap::new(),
            root_files: Vec::new(),
        };
        tree.scan()?;
        tree.annotate()?;
        debug!(
            root = %root.display(),
            directories = tree.directories.len(),
            files = tree.file_count(),
            "built solution tree"
        );
        Ok(tree)
    }

    /// Re-derive file and directory roles from the current manifest.
    pub fn reannotate(&mut self) -> Result<(), TreeError> {
        for file in &mut self.root_files {
            if file.kind != FileKind::Hidden {
                file.kind = FileKind::Unknown;
            }
        }
        for dir in self.directories.values_mut() {
            dir.role = DirRole::None;
            for file in &mut dir.files {
                file.kind = FileKind::Unknown;
            }
        }
        self.annotate()
    }

    fn scan(&mut self) -> Result<(), TreeError> {
        let manifest_name = self.manifest.file_name().to_string();
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&self.root).to_path_buf();
                TreeError::io(path, e.into())
            })?;
            let rel = relative_path(&self.root, entry.path())?;
            let file_type = entry.file_type();

            if file_type.is_dir() {
                self.directories
                    .entry(rel.clone())
                    .or_insert_with(|| SubDirectory {
                        path: rel,
                        ..Default::default()
                    });
                continue;
            }
            if !file_type.is_file() {
                debug!(path = %rel, "skipping non-regular file");
                continue;
            }

            let contents = fs::read(entry.path()).map_err(|e| TreeError::io(entry.path(), e))?;
            match rel.rsplit_once('/') {
                None if rel == manifest_name => {}
                None => {
                    let mut file = File::new(rel.clone(), contents);
                    if rel.starts_with('.') {
                        file.kind = FileKind::Hidden;
                    }
                    self.root_files.push(file);
                }
                Some((dir, name)) => {
                    let dir = self
                        .directories
                        .entry(dir.to_string())
                        .or_insert_with(|| SubDirectory {
                            path: dir.to_string(),
                            ..Default::default()
                        });
                    dir.files.push(File::new(name, contents));
                }
            }
        }
        Ok(())
    }

    /// Mark files and directories with the roles the manifest declares.
    fn annotate(&mut self) -> Result<(), TreeError> {
        let knowledge_types: Vec<String> = self
            .manifest
            .knowledge_types
            .iter()
            .map(|p| normalize_declared_path(p))
            .collect();
        for path in knowledge_types {
            let file = self
                .file_mut(&path)
                .ok_or(TreeError::ComponentNotFound { path: path.clone() })?;
            file.kind = FileKind::KnowledgeType;
        }

        let declarations: Vec<(ObjectType, bool, String)> = self
            .manifest
            .objects
            .iter()
            .map(|decl| -> Result<_, TreeError> {
                let (is_dir, path) = match decl.location()? {
                    ObjectLocation::File(p) => (false, p),
                    ObjectLocation::Dir(p) => (true, p),
                };
                Ok((decl.object_type.clone(), is_dir, normalize_declared_path(path)))
            })
            .collect::<Result<_, TreeError>>()?;

        for (object_type, is_dir, path) in declarations {
            if is_dir {
                self.annotate_dir(&path, &object_type)?;
            } else {
                let file = self
                    .file_mut(&path)
                    .ok_or(TreeError::ComponentNotFound { path: path.clone() })?;
                file.kind = FileKind::ObjectType(object_type);
            }
        }
        Ok(())
    }

    /// Annotate a declared directory and every file below it.
    fn annotate_dir(&mut self, path: &str, object_type: &ObjectType) -> Result<(), TreeError> {
        let prefix = format!("{path}/");
        let mut found = false;
        for dir in self.directories.values_mut() {
            if dir.path == path || dir.path.starts_with(&prefix) {
                found = true;
                dir.role = DirRole::ObjectsDir(object_type.clone());
                for file in &mut dir.files {
                    file.kind = FileKind::ObjectType(object_type.clone());
                }
            }
        }
        if found {
            Ok(())
        } else {
            Err(TreeError::ComponentNotFound {
                path: path.to_string(),
            })
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Directory the tree was built from (empty for in-memory trees).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The manifest file as it was read.
    pub fn manifest_contents(&self) -> &[u8] {
        &self.manifest_contents
    }

    /// Files directly under the root.
    pub fn root_files(&self) -> &[File] {
        &self.root_files
    }

    /// Directories in lexical path order.
    pub fn directories(&self) -> impl Iterator<Item = &SubDirectory> {
        self.directories.values()
    }

    /// Look up a directory by relative path.
    pub fn directory(&self, path: &str) -> Option<&SubDirectory> {
        self.directories.get(path)
    }

    /// Look up a file by relative path.
    pub fn file(&self, path: &str) -> Option<&File> {
        match path.rsplit_once('/') {
            None => self.root_files.iter().find(|f| f.name == path),
            Some((dir, name)) => self
                .directories
                .get(dir)
                .and_then(|d| d.files.iter().find(|f| f.name == name)),
        }
    }

    /// Look up a file by relative path, mutably.
    pub fn file_mut(&mut self, path: &str) -> Option<&mut File> {
        match path.rsplit_once('/') {
            None => self.root_files.iter_mut().find(|f| f.name == path),
            Some((dir, name)) => self
                .directories
                .get_mut(dir)
                .and_then(|d| d.files.iter_mut().find(|f| f.name == name)),
        }
    }

    /// Every file with its relative path, in walk order.
    pub fn files(&self) -> impl Iterator<Item = (String, &File)> {
        let root = self.root_files.iter().map(|f| (f.name.clone(), f));
        let nested = self
            .directories
            .values()
            .flat_map(|d| d.files.iter().map(move |f| (format!("{}/{}", d.path, f.name), f)));
        root.chain(nested)
    }

    /// Number of files, excluding the manifest.
    pub fn file_count(&self) -> usize {
        self.root_files.len() + self.directories.values().map(|d| d.files.len()).sum::<usize>()
    }

    /// Replace the manifest, keeping its raw contents in step.
    pub fn set_manifest(&mut self, manifest: Manifest) -> Result<(), TreeError> {
        self.manifest_contents = manifest.to_bytes()?;
        self.manifest = manifest;
        Ok(())
    }

    // =========================================================================
    // Walk
    // =========================================================================

    /// Visit every file exactly once and apply the requested edits.
    ///
    /// Edits are applied after the last visit. If the visitor fails, no edit
    /// is applied and the error is returned.
    pub fn walk<F, E>(&mut self, mut visitor: F) -> Result<(), E>
    where
        F: FnMut(&WalkEntry<'_>) -> Result<Visit, E>,
        E: From<TreeError>,
    {
        let mut edits: Vec<(Slot, Visit)> = Vec::new();

        'walk: {
            for (i, file) in self.root_files.iter().enumerate() {
                let entry = WalkEntry {
                    path: file.name.clone(),
                    dir: None,
                    file,
                };
                match visitor(&entry)? {
                    Visit::Continue => {}
                    Visit::Stop => break 'walk,
                    edit => edits.push((Slot::Root(i), edit)),
                }
            }
            for dir in self.directories.values() {
                for (i, file) in dir.files.iter().enumerate() {
                    let entry = WalkEntry {
                        path: format!("{}/{}", dir.path, file.name),
                        dir: Some(dir),
                        file,
                    };
                    match visitor(&entry)? {
                        Visit::Continue => {}
                        Visit::Stop => break 'walk,
                        edit => edits.push((Slot::Dir(dir.path.clone(), i), edit)),
                    }
                }
            }
        }

        self.apply(edits).map_err(E::from)
    }

    fn apply(&mut self, edits: Vec<(Slot, Visit)>) -> Result<(), TreeError> {
        self.check_final_names(&edits)?;

        let mut deletions = Vec::new();
        for (slot, edit) in edits {
            let (contents, name) = match edit {
                Visit::Replace(contents) => (Some(contents), None),
                Visit::Rename(name) => (None, Some(name)),
                Visit::ReplaceAndRename { contents, name } => (Some(contents), Some(name)),
                Visit::Delete => {
                    deletions.push(slot);
                    continue;
                }
                Visit::Continue | Visit::Stop => continue,
            };

            let files = match &slot {
                Slot::Root(_) => &mut self.root_files,
                Slot::Dir(path, _) => match self.directories.get_mut(path) {
                    Some(dir) => &mut dir.files,
                    None => continue,
                },
            };
            let index = match slot {
                Slot::Root(i) | Slot::Dir(_, i) => i,
            };

            if let Some(name) = name {
                files[index].encoding = Encoding::from_file_name(&name);
                files[index].name = name;
            }
            if let Some(contents) = contents {
                files[index].contents = contents;
            }
        }

        // Remove from the back so earlier indices stay valid
        deletions.sort_by(|a, b| slot_index(b).cmp(&slot_index(a)));
        for slot in deletions {
            match slot {
                Slot::Root(i) => {
                    self.root_files.remove(i);
                }
                Slot::Dir(path, i) => {
                    if let Some(dir) = self.directories.get_mut(&path) {
                        dir.files.remove(i);
                    }
                }
            }
        }

        for dir in self.directories.values_mut() {
            dir.files.sort_by(|a, b| a.name.cmp(&b.name));
        }
        self.root_files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(())
    }

    /// Reject edits that leave two surviving files with one name in a
    /// directory. Names are compared after deletions and renames, so a swap
    /// or a rename onto a deleted file is allowed.
    fn check_final_names(&self, edits: &[(Slot, Visit)]) -> Result<(), TreeError> {
        let names = |files: &[File]| -> Vec<Option<String>> {
            files.iter().map(|f| Some(f.name.clone())).collect()
        };
        let mut finals: BTreeMap<Option<String>, Vec<Option<String>>> = BTreeMap::new();
        finals.insert(None, names(&self.root_files));
        for dir in self.directories.values() {
            finals.insert(Some(dir.path.clone()), names(&dir.files));
        }

        for (slot, edit) in edits {
            let (dir, index) = slot_index(slot);
            let Some(entry) = finals
                .get_mut(&dir.map(str::to_string))
                .and_then(|names| names.get_mut(index))
            else {
                continue;
            };
            match edit {
                Visit::Delete => *entry = None,
                Visit::Rename(name) | Visit::ReplaceAndRename { name, .. } => {
                    *entry = Some(name.clone())
                }
                Visit::Replace(_) | Visit::Continue | Visit::Stop => {}
            }
        }

        for (dir, names) in finals {
            let mut seen = BTreeSet::new();
            for name in names.into_iter().flatten() {
                if !seen.insert(name.clone()) {
                    return Err(TreeError::NameCollision {
                        dir: dir.unwrap_or_default(),
                        name,
                    });
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Write
    // =========================================================================

    /// Write the manifest and every file under `target`.
    ///
    /// Directories are created as needed, including empty ones. The manifest
    /// is serialized in its own format.
    pub fn write(&self, target: &Path) -> Result<(), TreeError> {
        fs::create_dir_all(target).map_err(|e| TreeError::io(target, e))?;

        let manifest_path = target.join(self.manifest.file_name());
        let manifest = self.manifest.to_bytes()?;
        fs::write(&manifest_path, manifest).map_err(|e| TreeError::io(&manifest_path, e))?;

        for file in &self.root_files {
            let path = target.join(&file.name);
            fs::write(&path, &file.contents).map_err(|e| TreeError::io(&path, e))?;
        }

        for dir in self.directories.values() {
            let dir_path = target.join(&dir.path);
            fs::create_dir_all(&dir_path).map_err(|e| TreeError::io(&dir_path, e))?;
            for file in &dir.files {
                let path = dir_path.join(&file.name);
                fs::write(&path, &file.contents).map_err(|e| TreeError::io(&path, e))?;
            }
        }

        debug!(target = %target.display(), files = self.file_count(), "wrote solution tree");
        Ok(())
    }
}

fn slot_index(slot: &Slot) -> (Option<&str>, usize) {
    match slot {
        Slot::Root(i) => (None, *i),
        Slot::Dir(path, i) => (Some(path.as_str()), *i),
    }
}

/// Relative `/`-separated path of `path` below `root`.
fn relative_path(root: &Path, path: &Path) -> Result<String, TreeError> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| TreeError::PathEscapesRoot {
            path: path.to_path_buf(),
        })?;
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            _ => {
                return Err(TreeError::PathEscapesRoot {
                    path: path.to_path_buf(),
                })
            }
        }
    }
    Ok(parts.join("/"))
}
