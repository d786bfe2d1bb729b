//! This module provides a filesystem implementation whose tree lives in memory.

use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::core::{File, Filesystem, Result, WalkControl, utils};
use crate::vfs::entry::{DEFAULT_UMASK, DirRef, Directory, FileNode, Node, Property};
use crate::vfs::map_file::{MapFile, dir_handle, dir_info, node_info};
use crate::{Error, ErrorKind, FileInfo, MODE_PERM};

/// A filesystem whose files and directories are kept in a tree of in-memory nodes.
///
/// ### Internal state
///
/// * `tree` - The directory this view is rooted at. Inner paths are resolved against it:
///   `/a/b`, `a/b` and `./a/b` all denote the same entry, and `..` never climbs above it.
///   Directories are shared, so clones of a `MapFS`, views made by [`MapFS::cd`] and open
///   handles all see each other's changes.
///
/// * `umask` - The file mode creation mask applied to files created by [`Filesystem::create`]
///   and to the root of a new tree. Default value: `0o002`.
///
/// ### Invariants
///
/// 1. **Root**: the root of a view always exists, is a directory and cannot be removed.
/// 2. **Names**: every entry name is non-empty and never contains the path separator.
/// 3. **Ordering**: `readdir` and `walk` yield entries in lexical ascending order.
///
/// ### Thread Safety
///
/// `MapFS` is neither `Send` nor `Sync`. Interleaving handles and mutations on a single
/// thread is fine; the last flushed write wins.
///
/// ### Example
///
/// ```no_run
/// use std::io::Write;
/// use vfs_tree::{Filesystem, MapFS};
///
/// let fs = MapFS::new();
/// fs.mkdir_all("/docs", 0o755).unwrap();
///
/// let mut f = fs.create("/docs/note.txt").unwrap();
/// f.write_all(b"Hello").unwrap();
/// f.close().unwrap();
///
/// assert_eq!(fs.read("/docs/note.txt").unwrap(), b"Hello");
/// ```
#[derive(Debug, Clone)]
pub struct MapFS {
    tree: DirRef,
    umask: u32,
}

impl MapFS {
    /// Creates an empty tree with the default umask.
    pub fn new() -> Self {
        Self::with_umask(DEFAULT_UMASK)
    }

    /// Creates an empty tree that applies `umask` to newly created files.
    pub fn with_umask(umask: u32) -> Self {
        Self {
            tree: Directory::shared(Property::dir(umask)),
            umask: umask & MODE_PERM,
        }
    }

    /// Wraps an existing tree.
    pub fn from_tree(tree: DirRef) -> Self {
        Self {
            tree,
            umask: DEFAULT_UMASK,
        }
    }

    /// Returns the file mode creation mask.
    pub fn umask(&self) -> u32 {
        self.umask
    }

    /// Returns the root directory of this view.
    pub fn tree(&self) -> &DirRef {
        &self.tree
    }

    /// Returns a view rooted at the directory `path`.
    ///
    /// The view shares the subtree with `self`: changes made through either are visible
    /// through both.
    pub fn cd<P: AsRef<Path>>(&self, path: P) -> Result<MapFS> {
        let path = path.as_ref();
        let names = utils::names(path).map_err(|kind| Error::path("cd", path, kind))?;
        let tree = self
            .lookup(&names)
            .map_err(|kind| Error::path("cd", path, kind))?;
        Ok(MapFS {
            tree,
            umask: self.umask,
        })
    }

    /// Checks if a file or directory exists at `path`.
    pub fn exists<P: AsRef<Path>>(&self, path: P) -> bool {
        self.stat(path).is_ok()
    }

    /// Returns the whole content of the file at `path`.
    pub fn read<P: AsRef<Path>>(&self, path: P) -> Result<Vec<u8>> {
        let path = path.as_ref();
        let (dir, base) = self.dirbase("read", path)?;
        let Some(base) = base else {
            return Err(Error::path("read", path, ErrorKind::IsADirectory));
        };
        match dir.borrow().get(&base) {
            Some(Node::File(file)) => Ok(file.content.clone()),
            Some(Node::Directory(_)) => Err(Error::path("read", path, ErrorKind::IsADirectory)),
            None => Err(Error::path("read", path, ErrorKind::NotExist)),
        }
    }

    /// Creates or truncates the file at `path` and writes `content` to it.
    pub fn write<P: AsRef<Path>>(&self, path: P, content: &[u8]) -> Result<()> {
        let path = path.as_ref();
        let mut file = self.create(path)?;
        file.write_all(content)
            .map_err(|err| Error::host("write", path, err))?;
        file.close()
    }

    /// Follows `names` from the root, through directories only.
    fn lookup(&self, names: &[String]) -> std::result::Result<DirRef, ErrorKind> {
        let mut dir = self.tree.clone();
        for name in names {
            let next = match dir.borrow().get(name) {
                Some(Node::Directory(sub)) => sub.clone(),
                Some(Node::File(_)) => return Err(ErrorKind::NotADirectory),
                None => return Err(ErrorKind::NotExist),
            };
            dir = next;
        }
        Ok(dir)
    }

    /// Splits `path` into its parent directory and the last name.
    /// The name is `None` when `path` denotes the root itself.
    fn dirbase(&self, op: &'static str, path: &Path) -> Result<(DirRef, Option<String>)> {
        let mut names = utils::names(path).map_err(|kind| Error::path(op, path, kind))?;
        let Some(base) = names.pop() else {
            return Ok((self.tree.clone(), None));
        };
        let dir = self
            .lookup(&names)
            .map_err(|kind| Error::path(op, path, kind))?;
        Ok((dir, Some(base)))
    }
}

impl Default for MapFS {
    fn default() -> Self {
        Self::new()
    }
}

impl Filesystem for MapFS {
    /// Creates a file or truncates an existing one; an existing file keeps its mode.
    fn create<P: AsRef<Path>>(&self, path: P) -> Result<Box<dyn File>> {
        let path = path.as_ref();
        let (dir, base) = self.dirbase("create", path)?;
        let Some(base) = base else {
            return Err(Error::path("create", path, ErrorKind::IsADirectory));
        };

        let property = {
            let mut d = dir.borrow_mut();
            let property = match d.get(&base) {
                Some(Node::Directory(_)) => {
                    return Err(Error::path("create", path, ErrorKind::IsADirectory));
                }
                Some(Node::File(file)) => Property::new(file.property.mode),
                None => Property::file(self.umask),
            };
            d.insert(&base, Node::File(FileNode::new(property)))
                .map_err(|err| Error::path("create", path, err.kind()))?;
            property
        };

        debug!(path = %path.display(), "create");
        Ok(Box::new(MapFile::writer(path, dir, base, property)))
    }

    fn mkdir<P: AsRef<Path>>(&self, path: P, perm: u32) -> Result<()> {
        let path = path.as_ref();
        let (dir, base) = self.dirbase("mkdir", path)?;
        let Some(base) = base else {
            return Ok(());
        };

        let mut d = dir.borrow_mut();
        match d.get(&base) {
            Some(Node::Directory(_)) => Ok(()),
            Some(Node::File(_)) => Err(Error::path("mkdir", path, ErrorKind::NotADirectory)),
            None => {
                let sub = Directory::shared(Property::new(perm & MODE_PERM));
                d.insert(&base, Node::Directory(sub))
                    .map_err(|err| Error::path("mkdir", path, err.kind()))?;
                debug!(path = %path.display(), perm, "mkdir");
                Ok(())
            }
        }
    }

    fn mkdir_all<P: AsRef<Path>>(&self, path: P, perm: u32) -> Result<()> {
        let path = path.as_ref();
        let names = utils::names(path).map_err(|kind| Error::path("mkdir_all", path, kind))?;

        let mut dir = self.tree.clone();
        for name in &names {
            let next = {
                let mut d = dir.borrow_mut();
                match d.get(name) {
                    Some(Node::Directory(sub)) => sub.clone(),
                    Some(Node::File(_)) => {
                        return Err(Error::path("mkdir_all", path, ErrorKind::NotADirectory));
                    }
                    None => {
                        let sub = Directory::shared(Property::new(perm & MODE_PERM));
                        d.insert(name, Node::Directory(sub.clone()))
                            .map_err(|err| Error::path("mkdir_all", path, err.kind()))?;
                        sub
                    }
                }
            };
            dir = next;
        }
        debug!(path = %path.display(), "mkdir_all");
        Ok(())
    }

    fn open<P: AsRef<Path>>(&self, path: P) -> Result<Box<dyn File>> {
        let path = path.as_ref();
        let (dir, base) = self.dirbase("open", path)?;
        let Some(base) = base else {
            return Ok(Box::new(dir_handle(path, &dir)));
        };

        let node = dir.borrow().get(&base).cloned();
        match node {
            Some(Node::File(file)) => Ok(Box::new(MapFile::reader(path, dir, base, file))),
            Some(Node::Directory(sub)) => Ok(Box::new(dir_handle(path, &sub))),
            None => Err(Error::path("open", path, ErrorKind::NotExist)),
        }
    }

    fn remove<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let (dir, base) = self.dirbase("remove", path)?;
        let Some(base) = base else {
            return Err(Error::path("remove", path, ErrorKind::PermissionDenied));
        };

        let mut d = dir.borrow_mut();
        match d.get(&base) {
            Some(Node::File(_)) => {
                d.remove(&base);
                debug!(path = %path.display(), "remove");
                Ok(())
            }
            Some(Node::Directory(_)) => Err(Error::path("remove", path, ErrorKind::IsADirectory)),
            None => Err(Error::path("remove", path, ErrorKind::NotExist)),
        }
    }

    fn remove_all<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let (dir, base) = self.dirbase("remove_all", path)?;
        let Some(base) = base else {
            return Err(Error::path("remove_all", path, ErrorKind::PermissionDenied));
        };

        match dir.borrow_mut().remove(&base) {
            Some(_) => {
                debug!(path = %path.display(), "remove_all");
                Ok(())
            }
            None => Err(Error::path("remove_all", path, ErrorKind::NotExist)),
        }
    }

    fn stat<P: AsRef<Path>>(&self, path: P) -> Result<FileInfo> {
        let path = path.as_ref();
        let (dir, base) = self.dirbase("stat", path)?;
        let Some(base) = base else {
            return Ok(dir_info(path, &dir));
        };

        match dir.borrow().get(&base) {
            Some(node) => Ok(node_info(path, node)),
            None => Err(Error::path("stat", path, ErrorKind::NotExist)),
        }
    }

    fn walk<P, F>(&self, root: P, mut visitor: F) -> Result<()>
    where
        P: AsRef<Path>,
        F: FnMut(&Path, &FileInfo) -> WalkControl,
    {
        let root = root.as_ref();
        let (dir, base) = self.dirbase("walk", root)?;
        let start = match base {
            None => (root.to_path_buf(), dir_info(root, &dir), Some(dir)),
            Some(base) => match dir.borrow().get(&base) {
                Some(node) => (root.to_path_buf(), node_info(root, node), node.as_dir().cloned()),
                None => return Err(Error::path("walk", root, ErrorKind::NotExist)),
            },
        };

        let mut stack = vec![start];
        while let Some((path, info, sub)) = stack.pop() {
            match visitor(&path, &info) {
                WalkControl::Break => return Ok(()),
                WalkControl::SkipDir => continue,
                WalkControl::Continue => {}
            }
            let Some(sub) = sub else {
                continue;
            };
            // pushed in reverse, so the smallest name is visited first
            for (name, node) in sub.borrow().iter().rev() {
                let child = path.join(name);
                let info = node_info(&child, node);
                stack.push((child, info, node.as_dir().cloned()));
            }
        }
        Ok(())
    }
}
