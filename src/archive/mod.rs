//! archive
//!
//! Zip packing and safe extraction.
//!
//! # Extraction
//!
//! [`unpack`] validates every entry before anything is written:
//!
//! - `\` separators are normalized to `/`
//! - `.` components are dropped and `..` pops the previous component
//! - absolute names, drive prefixes, and names that climb above the root are
//!   rejected with [`ArchiveError::PathTraversalRejected`]
//! - the first `skip_levels` components are stripped; a file that sits
//!   above that depth is rejected with [`ArchiveError::ShallowEntry`]
//!
//! Only once all entries pass are they streamed, one at a time, into an
//! [`ExtractTarget`].
//!
//! # Packing
//!
//! [`pack`] writes every file and directory under a source directory into a
//! deflate-compressed zip. Entries are added in lexical order with a fixed
//! timestamp so the same tree always packs to the same bytes.

pub mod target;

pub use target::{ExtractTarget, RootedDir};

use std::fs;
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// Errors from packing or unpacking archives.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive entry '{entry}' escapes the extraction root")]
    PathTraversalRejected { entry: String },

    #[error("archive entry '{entry}' is a file above the skipped directory levels")]
    ShallowEntry { entry: String },

    #[error("zip error in '{path}': {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: ZipError,
    },

    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ArchiveError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn zip(path: &Path, source: ZipError) -> Self {
        ArchiveError::Zip {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A validated entry ready for extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PlannedEntry {
    index: usize,
    path: PathBuf,
    is_dir: bool,
}

/// Validate one entry name and strip `skip_levels` leading components.
///
/// Returns `None` for directories consumed by the skip.
fn plan_entry(name: &str, is_dir: bool, skip_levels: usize) -> Result<Option<PathBuf>, ArchiveError> {
    let normalized = name.replace('\\', "/");
    let rejected = || ArchiveError::PathTraversalRejected {
        entry: name.to_string(),
    };
    if normalized.starts_with('/') {
        return Err(rejected());
    }

    let mut parts: Vec<&str> = Vec::new();
    for part in normalized.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop().ok_or_else(rejected)?;
            }
            // Drive prefixes such as `C:`
            p if p.contains(':') && parts.is_empty() => return Err(rejected()),
            p => parts.push(p),
        }
    }

    let is_dir = is_dir || normalized.ends_with('/');
    if parts.len() <= skip_levels {
        if is_dir || parts.is_empty() {
            return Ok(None);
        }
        return Err(ArchiveError::ShallowEntry {
            entry: name.to_string(),
        });
    }
    Ok(Some(parts[skip_levels..].iter().collect()))
}

/// Extract the zip at `archive` into `target`.
///
/// Returns the number of files written.
pub fn unpack(
    archive: &Path,
    target: &dyn ExtractTarget,
    skip_levels: usize,
) -> Result<usize, ArchiveError> {
    let file = fs::File::open(archive).map_err(|e| ArchiveError::io(archive, e))?;
    unpack_reader(file, archive, target, skip_levels)
}

/// Extract a zip read from `reader`. `label` names the archive in errors.
pub fn unpack_reader<R: Read + Seek>(
    reader: R,
    label: &Path,
    target: &dyn ExtractTarget,
    skip_levels: usize,
) -> Result<usize, ArchiveError> {
    let mut zip = ZipArchive::new(reader).map_err(|e| ArchiveError::zip(label, e))?;

    let mut plan = Vec::with_capacity(zip.len());
    for index in 0..zip.len() {
        let entry = zip.by_index(index).map_err(|e| ArchiveError::zip(label, e))?;
        if let Some(path) = plan_entry(entry.name(), entry.is_dir(), skip_levels)? {
            plan.push(PlannedEntry {
                index,
                path,
                is_dir: entry.is_dir(),
            });
        }
    }

    let mut files = 0;
    for planned in plan {
        if planned.is_dir {
            target.create_dir(&planned.path)?;
            continue;
        }
        let mut entry = zip
            .by_index(planned.index)
            .map_err(|e| ArchiveError::zip(label, e))?;
        target.write_file(&planned.path, &mut entry)?;
        files += 1;
    }

    debug!(archive = %label.display(), files, "unpacked archive");
    Ok(files)
}

/// Pack every file under `source` into a new zip at `archive`.
///
/// The archive is written to a temporary file next to `archive` and moved
/// into place once complete.
pub fn pack(source: &Path, archive: &Path) -> Result<usize, ArchiveError> {
    let parent = match archive.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
    let temp = NamedTempFile::new_in(parent).map_err(|e| ArchiveError::io(parent, e))?;

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());
    let mut zip = ZipWriter::new(temp);
    let mut files = 0;

    for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            ArchiveError::io(&path, e.into())
        })?;
        let rel = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| ArchiveError::PathTraversalRejected {
                entry: entry.path().display().to_string(),
            })?;
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{name}/"), options)
                .map_err(|e| ArchiveError::zip(archive, e))?;
        } else {
            zip.start_file(name, options)
                .map_err(|e| ArchiveError::zip(archive, e))?;
            let mut input =
                fs::File::open(entry.path()).map_err(|e| ArchiveError::io(entry.path(), e))?;
            io::copy(&mut input, &mut zip).map_err(|e| ArchiveError::io(entry.path(), e))?;
            files += 1;
        }
    }

    let mut temp = zip.finish().map_err(|e| ArchiveError::zip(archive, e))?;
    temp.flush().map_err(|e| ArchiveError::io(archive, e))?;
    temp.persist(archive)
        .map_err(|e| ArchiveError::io(archive, e.error))?;

    debug!(archive = %archive.display(), files, "packed archive");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn zip_of(entries: &[(&str, &str)]) -> Cursor<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, contents) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, options).unwrap();
            } else {
                zip.start_file(*name, options).unwrap();
                zip.write_all(contents.as_bytes()).unwrap();
            }
        }
        let mut cursor = zip.finish().unwrap();
        cursor.set_position(0);
        cursor
    }

    #[test]
    fn plan_normalizes_separators() {
        assert_eq!(
            plan_entry("a\\b\\c.json", false, 0).unwrap(),
            Some(PathBuf::from("a/b/c.json"))
        );
        assert_eq!(
            plan_entry("./a/./b/../c.json", false, 0).unwrap(),
            Some(PathBuf::from("a/c.json"))
        );
    }

    #[test]
    fn plan_rejects_escapes() {
        for name in ["../x", "a/../../x", "/etc/passwd", "\\evil", "C:/x", "..\\..\\x"] {
            let err = plan_entry(name, false, 0).unwrap_err();
            assert!(
                matches!(err, ArchiveError::PathTraversalRejected { .. }),
                "{name}"
            );
        }
    }

    #[test]
    fn plan_skips_levels() {
        assert_eq!(
            plan_entry("top/sol/a.json", false, 1).unwrap(),
            Some(PathBuf::from("sol/a.json"))
        );
        assert_eq!(plan_entry("top/", true, 1).unwrap(), None);
        let err = plan_entry("readme.txt", false, 1).unwrap_err();
        assert!(matches!(err, ArchiveError::ShallowEntry { .. }));
    }

    #[test]
    fn unpack_extracts_entries() {
        let temp = TempDir::new().unwrap();
        let target = RootedDir::new(temp.path());
        let zip = zip_of(&[
            ("acme/", ""),
            ("acme/solution.json", "{}"),
            ("acme/entities/a.json", "{\"a\": 1}"),
        ]);

        let files = unpack_reader(zip, Path::new("t.zip"), &target, 1).unwrap();
        assert_eq!(files, 2);
        assert_eq!(fs::read_to_string(temp.path().join("solution.json")).unwrap(), "{}");
        assert!(temp.path().join("entities/a.json").is_file());
    }

    #[test]
    fn zip_slip_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("out");
        fs::create_dir(&root).unwrap();
        let target = RootedDir::new(&root);
        let zip = zip_of(&[("good.json", "{}"), ("../../etc/passwd", "root")]);

        let err = unpack_reader(zip, Path::new("evil.zip"), &target, 0).unwrap_err();
        match err {
            ArchiveError::PathTraversalRejected { entry } => assert_eq!(entry, "../../etc/passwd"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fs::read_dir(&root).unwrap().count(), 0);
    }

    #[test]
    fn shallow_entry_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let target = RootedDir::new(temp.path());
        let zip = zip_of(&[("top/a.json", "{}"), ("loose.txt", "x")]);

        let err = unpack_reader(zip, Path::new("t.zip"), &target, 1).unwrap_err();
        assert!(matches!(err, ArchiveError::ShallowEntry { .. }));
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn pack_then_unpack() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src");
        fs::create_dir_all(source.join("entities")).unwrap();
        fs::create_dir_all(source.join("empty")).unwrap();
        fs::write(source.join("solution.json"), "{\"name\": \"acme\"}").unwrap();
        fs::write(source.join("entities/a.json"), "{}").unwrap();

        let archive = temp.path().join("out/acme.zip");
        assert_eq!(pack(&source, &archive).unwrap(), 2);

        let dest = temp.path().join("dest");
        assert_eq!(unpack(&archive, &RootedDir::new(&dest), 0).unwrap(), 2);
        assert_eq!(
            fs::read_to_string(dest.join("solution.json")).unwrap(),
            "{\"name\": \"acme\"}"
        );
        assert!(dest.join("entities/a.json").is_file());
        assert!(dest.join("empty").is_dir());
    }

    #[test]
    fn pack_is_deterministic() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src");
        fs::create_dir_all(source.join("b")).unwrap();
        fs::write(source.join("b/z.json"), "{}").unwrap();
        fs::write(source.join("a.json"), "[]").unwrap();

        let first = temp.path().join("1.zip");
        let second = temp.path().join("2.zip");
        pack(&source, &first).unwrap();
        pack(&source, &second).unwrap();
        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());

        let zip = ZipArchive::new(fs::File::open(&first).unwrap()).unwrap();
        let names: Vec<_> = zip.file_names().collect();
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn corrupt_archive_is_zip_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.zip");
        fs::write(&path, "not a zip").unwrap();
        let err = unpack(&path, &RootedDir::new(temp.path().join("o")), 0).unwrap_err();
        assert!(matches!(err, ArchiveError::Zip { .. }));
    }
}
