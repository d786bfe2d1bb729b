//! A filesystem decorator that records what was read from one filesystem into another.

use std::fmt::Debug;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::core::{File, Filesystem, Result, WalkControl};
use crate::{Error, FileInfo};

/// Mirrors every successful operation on `read` onto `write`.
///
/// Opening, creating or stating a path on `read` makes the same path, with the
/// discovered mode and kind, appear on `write`; reading an opened directory
/// mirrors each returned child. Removals are replayed on `write` too, where a path
/// that was never recorded is silently skipped.
///
/// Wrapping a host [`DirFS`](crate::DirFS) and an empty [`MapFS`](crate::MapFS) gives
/// an in-memory record of exactly the part of the host tree a tool traversed.
///
/// `write` is cloned into directory handles, so it should be a cheap handle to
/// shared state (both `MapFS` and `DirFS` are).
#[derive(Debug, Clone)]
pub struct TeeFS<R, W> {
    read: R,
    write: W,
}

impl<R, W> TeeFS<R, W>
where
    R: Filesystem,
    W: Filesystem + Clone + Debug + 'static,
{
    pub fn new(read: R, write: W) -> Self {
        Self { read, write }
    }

    /// The filesystem operations are served from.
    pub fn reader(&self) -> &R {
        &self.read
    }

    /// The filesystem successful operations are recorded into.
    pub fn writer(&self) -> &W {
        &self.write
    }

    pub fn into_inner(self) -> (R, W) {
        (self.read, self.write)
    }

    /// Records the parent directory of `path`, with the mode it has on `read`.
    fn mirror_parent(&self, path: &Path) -> Result<()> {
        let Some(parent) = path.parent() else {
            return Ok(());
        };
        let info = self.read.stat(parent)?;
        self.write.mkdir_all(parent, info.permissions())
    }

    fn mirror(&self, path: &Path, info: &FileInfo) -> Result<()> {
        if info.is_dir() {
            trace!(path = %path.display(), "mirror dir");
            return self.write.mkdir_all(path, info.permissions());
        }
        self.mirror_parent(path)?;
        mirror_file(&self.write, path)
    }
}

/// Creates an empty file at `path` on `write` unless something is already there.
fn mirror_file<W: Filesystem>(write: &W, path: &Path) -> Result<()> {
    match write.stat(path) {
        Ok(_) => Ok(()),
        Err(err) if err.is_not_exist() => {
            trace!(path = %path.display(), "mirror file");
            write.create(path)?.close()
        }
        Err(err) => Err(err),
    }
}

/// Replays a removal; a path that is not recorded is not an error.
fn ignore_untracked(result: Result<()>) -> Result<()> {
    match result {
        Err(err) if err.is_not_exist() => Ok(()),
        result => result,
    }
}

impl<R, W> Filesystem for TeeFS<R, W>
where
    R: Filesystem,
    W: Filesystem + Clone + Debug + 'static,
{
    fn create<P: AsRef<Path>>(&self, path: P) -> Result<Box<dyn File>> {
        let path = path.as_ref();
        let mut file = self.read.create(path)?;
        let mirrored = self
            .mirror_parent(path)
            .and_then(|_| self.write.create(path)?.close());
        if let Err(err) = mirrored {
            file.close()?;
            return Err(err);
        }
        trace!(path = %path.display(), "mirror create");
        Ok(file)
    }

    fn mkdir<P: AsRef<Path>>(&self, path: P, perm: u32) -> Result<()> {
        let path = path.as_ref();
        self.read.mkdir(path, perm)?;
        self.write.mkdir_all(path, perm)
    }

    fn mkdir_all<P: AsRef<Path>>(&self, path: P, perm: u32) -> Result<()> {
        let path = path.as_ref();
        self.read.mkdir_all(path, perm)?;
        self.write.mkdir_all(path, perm)
    }

    fn open<P: AsRef<Path>>(&self, path: P) -> Result<Box<dyn File>> {
        let path = path.as_ref();
        let mut file = self.read.open(path)?;
        let info = match file.stat() {
            Ok(info) => info,
            Err(err) => {
                file.close()?;
                return Err(err);
            }
        };
        if let Err(err) = self.mirror(path, &info) {
            file.close()?;
            return Err(err);
        }
        if info.is_dir() {
            return Ok(Box::new(TeeDir {
                inner: file,
                dir: path.to_path_buf(),
                mirror: self.write.clone(),
            }));
        }
        Ok(file)
    }

    fn remove<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.read.remove(path)?;
        trace!(path = %path.display(), "mirror remove");
        ignore_untracked(self.write.remove(path))
    }

    fn remove_all<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.read.remove_all(path)?;
        trace!(path = %path.display(), "mirror remove_all");
        ignore_untracked(self.write.remove_all(path))
    }

    fn stat<P: AsRef<Path>>(&self, path: P) -> Result<FileInfo> {
        let path = path.as_ref();
        let info = self.read.stat(path)?;
        self.mirror(path, &info)?;
        Ok(info)
    }

    /// Walks `read`, recording every visited entry. Entries below a skipped
    /// directory are not visited and so not recorded.
    fn walk<P, F>(&self, root: P, mut visitor: F) -> Result<()>
    where
        P: AsRef<Path>,
        F: FnMut(&Path, &FileInfo) -> WalkControl,
    {
        let root = root.as_ref();
        let mut failure: Option<Error> = None;
        self.read.walk(root, |path, info| {
            let mirrored = if path == root {
                self.mirror(path, info)
            } else if info.is_dir() {
                self.write.mkdir(path, info.permissions())
            } else {
                mirror_file(&self.write, path)
            };
            if let Err(err) = mirrored {
                failure = Some(err);
                return WalkControl::Break;
            }
            visitor(path, info)
        })?;
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Drops `path` from the recording only; the read side is left alone.
    fn untrack<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        trace!(path = %path.display(), "untrack");
        ignore_untracked(self.write.remove_all(path))
    }
}

/// A directory handle whose `readdir` records the returned children.
#[derive(Debug)]
pub struct TeeDir<W> {
    inner: Box<dyn File>,
    dir: PathBuf,
    mirror: W,
}

impl<W: Filesystem + Debug> Read for TeeDir<W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<W: Filesystem + Debug> Write for TeeDir<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Filesystem + Debug> Seek for TeeDir<W> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl<W: Filesystem + Debug> File for TeeDir<W> {
    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }

    fn readdir(&mut self) -> Result<Vec<FileInfo>> {
        let entries = self.inner.readdir()?;
        for info in &entries {
            let path = self.dir.join(info.base_name());
            if info.is_dir() {
                trace!(path = %path.display(), "mirror dir");
                self.mirror.mkdir(&path, info.permissions())?;
            } else {
                mirror_file(&self.mirror, &path)?;
            }
        }
        Ok(entries)
    }

    fn stat(&self) -> Result<FileInfo> {
        self.inner.stat()
    }
}
