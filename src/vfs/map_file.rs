//! Open-file sessions over the in-memory tree.

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::warn;

use crate::core::File;
use crate::vfs::dir_handle::DirHandle;
use crate::vfs::entry::{DirRef, FileNode, Node, Property};
use crate::{Error, ErrorKind, FileInfo, Result};

pub(crate) fn node_info(path: &Path, node: &Node) -> FileInfo {
    let property = node.property();
    FileInfo::new(
        path,
        node.size(),
        property.mode,
        property.mod_time,
        node.is_dir(),
    )
}

pub(crate) fn dir_info(path: &Path, dir: &DirRef) -> FileInfo {
    let property = dir.borrow().property;
    FileInfo::new(path, 0, property.mode, property.mod_time, true)
}

/// A file handle.
///
/// Reads and seeks go over a snapshot of the content taken when the handle was
/// opened. Writes are buffered and replace the content of the file entry when
/// the handle is closed.
#[derive(Debug)]
pub struct MapFile {
    path: PathBuf,
    parent: DirRef,
    name: String,
    property: Property,
    reader: Cursor<Vec<u8>>,
    writer: Option<Vec<u8>>,
    closed: bool,
}

impl MapFile {
    pub(crate) fn reader(path: &Path, parent: DirRef, name: String, file: FileNode) -> MapFile {
        MapFile {
            path: path.to_path_buf(),
            parent,
            name,
            property: file.property,
            reader: Cursor::new(file.content),
            writer: None,
            closed: false,
        }
    }

    pub(crate) fn writer(path: &Path, parent: DirRef, name: String, property: Property) -> MapFile {
        MapFile {
            path: path.to_path_buf(),
            parent,
            name,
            property,
            reader: Cursor::new(Vec::new()),
            writer: Some(Vec::new()),
            closed: false,
        }
    }

    fn check_open(&self, op: &'static str) -> io::Result<()> {
        if self.closed {
            return Err(Error::path(op, &self.path, ErrorKind::Closed).into());
        }
        Ok(())
    }

    fn flush_once(&mut self) -> Result<()> {
        let Some(content) = self.writer.take() else {
            return Ok(());
        };
        let mut parent = self.parent.borrow_mut();
        match parent.get_mut(&self.name) {
            Some(Node::File(file)) => {
                file.content = content;
                file.property.mod_time = SystemTime::now();
                Ok(())
            }
            Some(Node::Directory(_)) => {
                Err(Error::path("close", &self.path, ErrorKind::IsADirectory))
            }
            None => Err(Error::path("close", &self.path, ErrorKind::NotExist)),
        }
    }
}

impl Read for MapFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check_open("read")?;
        self.reader.read(buf)
    }
}

impl Write for MapFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check_open("write")?;
        self.writer.get_or_insert_with(Vec::new).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MapFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.check_open("seek")?;
        self.reader.seek(pos)
    }
}

impl File for MapFile {
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.flush_once()
    }

    fn readdir(&mut self) -> Result<Vec<FileInfo>> {
        Err(Error::path("readdir", &self.path, ErrorKind::NotADirectory))
    }

    fn stat(&self) -> Result<FileInfo> {
        Ok(FileInfo::new(
            &self.path,
            self.reader.get_ref().len() as u64,
            self.property.mode,
            self.property.mod_time,
            false,
        ))
    }
}

impl Drop for MapFile {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("failed to flush {}: {}", self.path.display(), err);
        }
    }
}

/// Opens a directory handle over the current children of `dir`.
pub(crate) fn dir_handle(path: &Path, dir: &DirRef) -> DirHandle {
    let entries = dir
        .borrow()
        .iter()
        .map(|(name, node)| node_info(&path.join(name), node))
        .collect();
    DirHandle::new(dir_info(path, dir), entries)
}
