use std::fmt::Debug;
use std::io;
use std::path::Path;

use crate::FileInfo;

pub type Result<T> = std::result::Result<T, crate::Error>;

/// Signal returned by a [`Filesystem::walk`] visitor.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WalkControl {
    /// Keep walking.
    Continue,
    /// Do not descend into the directory just visited (no-op for files).
    SkipDir,
    /// Stop the walk immediately; `walk` returns `Ok(())`.
    Break,
}

/// An open file or directory session.
///
/// Reading, writing and seeking go through the std I/O traits. A handle must be
/// closed once; `close` is idempotent and a handle dropped unclosed is closed
/// on drop.
pub trait File: io::Read + io::Write + io::Seek + Debug {
    /// Releases the handle. Buffered writes are flushed exactly once.
    fn close(&mut self) -> Result<()>;

    /// Returns the entries of a directory handle that were not yet returned,
    /// in lexical ascending order.
    fn readdir(&mut self) -> Result<Vec<FileInfo>>;

    /// Returns details of the opened file or directory.
    fn stat(&self) -> Result<FileInfo>;
}

/// Operations on named files, implemented by every filesystem in the crate.
///
/// Implementations take `&self`: in-memory views and open handles share the
/// underlying tree, so mutation goes through interior mutability. None of the
/// implementations is safe for concurrent mutation.
pub trait Filesystem {
    /// Creates a file or truncates an existing one, returning a write handle.
    fn create<P: AsRef<Path>>(&self, path: P) -> Result<Box<dyn File>>;

    /// Creates a directory. It's a no-op if the directory already exists.
    fn mkdir<P: AsRef<Path>>(&self, path: P, perm: u32) -> Result<()>;

    /// Creates a directory and all its missing parents. `perm` applies to the
    /// newly created directories only.
    fn mkdir_all<P: AsRef<Path>>(&self, path: P, perm: u32) -> Result<()>;

    /// Opens a file or a directory.
    fn open<P: AsRef<Path>>(&self, path: P) -> Result<Box<dyn File>>;

    /// Removes a file. Directories are refused.
    fn remove<P: AsRef<Path>>(&self, path: P) -> Result<()>;

    /// Removes a file or a directory with all its descendants.
    fn remove_all<P: AsRef<Path>>(&self, path: P) -> Result<()>;

    /// Returns details of a file or a directory.
    fn stat<P: AsRef<Path>>(&self, path: P) -> Result<FileInfo>;

    /// Walks the tree rooted at `root` depth-first, pre-order, in lexical
    /// ascending order, calling `visitor` for `root` first and then for
    /// every descendant.
    fn walk<P, F>(&self, root: P, visitor: F) -> Result<()>
    where
        P: AsRef<Path>,
        F: FnMut(&Path, &FileInfo) -> WalkControl;

    /// Forgets what a recording filesystem kept of `path` and its descendants,
    /// without touching the filesystem read from. Filesystems that record
    /// nothing have nothing to forget.
    fn untrack<P: AsRef<Path>>(&self, _path: P) -> Result<()> {
        Ok(())
    }
}

impl<T: Filesystem> Filesystem for &T {
    fn create<P: AsRef<Path>>(&self, path: P) -> Result<Box<dyn File>> {
        (**self).create(path)
    }

    fn mkdir<P: AsRef<Path>>(&self, path: P, perm: u32) -> Result<()> {
        (**self).mkdir(path, perm)
    }

    fn mkdir_all<P: AsRef<Path>>(&self, path: P, perm: u32) -> Result<()> {
        (**self).mkdir_all(path, perm)
    }

    fn open<P: AsRef<Path>>(&self, path: P) -> Result<Box<dyn File>> {
        (**self).open(path)
    }

    fn remove<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        (**self).remove(path)
    }

    fn remove_all<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        (**self).remove_all(path)
    }

    fn stat<P: AsRef<Path>>(&self, path: P) -> Result<FileInfo> {
        (**self).stat(path)
    }

    fn walk<P, F>(&self, root: P, visitor: F) -> Result<()>
    where
        P: AsRef<Path>,
        F: FnMut(&Path, &FileInfo) -> WalkControl,
    {
        (**self).walk(root, visitor)
    }

    fn untrack<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        (**self).untrack(path)
    }
}

pub mod utils {
    use std::path::{Component, Path, PathBuf};

    use crate::ErrorKind;

    /// Removes `.` and `..` components and redundant separators.
    /// `..` never climbs above the first component.
    pub fn normalize<P: AsRef<Path>>(path: P) -> PathBuf {
        let path = path.as_ref();
        let mut result = PathBuf::new();

        for component in path.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    if let Some(comp) = result.parent() {
                        result = comp.to_path_buf();
                    }
                }
                _ => result.push(component),
            }
        }
        result
    }

    /// Splits `path` into the names of its segments, after normalization.
    /// Roots and prefixes are dropped, so `/a/b`, `a/b/` and `./a/x/../b`
    /// all give `["a", "b"]`, and `/`, `.` and `` give no names at all.
    pub fn names<P: AsRef<Path>>(path: P) -> std::result::Result<Vec<String>, ErrorKind> {
        normalize(path)
            .components()
            .filter_map(|component| match component {
                Component::Normal(name) => Some(name),
                _ => None,
            })
            .map(|name| name.to_str().map(str::to_owned).ok_or(ErrorKind::InvalidPath))
            .collect()
    }

    /// Returns `true` if `path` denotes the root of the tree it is resolved in.
    pub fn is_virtual_root<P: AsRef<Path>>(path: P) -> bool {
        matches!(names(path), Ok(names) if names.is_empty())
    }

    /// Returns `true` if `name` can be stored as a directory entry.
    ///
    /// Names made of whitespace only, or holding control characters such as
    /// `\n` or `\t`, are refused: a tree text could not carry them.
    pub fn is_valid_name(name: &str) -> bool {
        !name.trim().is_empty()
            && !name.chars().any(char::is_control)
            && name != "."
            && name != ".."
            && !name.contains('/')
            && !name.contains(std::path::MAIN_SEPARATOR)
    }
}
