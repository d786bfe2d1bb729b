use std::collections::VecDeque;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use crate::core::File;
use crate::{Error, ErrorKind, FileInfo, Result};

/// An open directory. The children are captured when the directory is opened and
/// handed out by [`File::readdir`] once, in lexical ascending order.
///
/// Byte I/O on a directory fails with [`ErrorKind::IsADirectory`].
#[derive(Debug)]
pub struct DirHandle {
    path: PathBuf,
    info: FileInfo,
    entries: VecDeque<FileInfo>,
    closed: bool,
}

impl DirHandle {
    pub(crate) fn new(info: FileInfo, mut entries: Vec<FileInfo>) -> DirHandle {
        entries.sort_by(|a, b| a.base_name().cmp(b.base_name()));
        DirHandle {
            path: info.name().to_path_buf(),
            info,
            entries: entries.into(),
            closed: false,
        }
    }

    fn refuse(&self, op: &'static str) -> io::Error {
        Error::path(op, &self.path, ErrorKind::IsADirectory).into()
    }
}

impl Read for DirHandle {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(self.refuse("read"))
    }
}

impl Write for DirHandle {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(self.refuse("write"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for DirHandle {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(self.refuse("seek"))
    }
}

impl File for DirHandle {
    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn readdir(&mut self) -> Result<Vec<FileInfo>> {
        if self.closed {
            return Err(Error::path("readdir", &self.path, ErrorKind::Closed));
        }
        Ok(self.entries.drain(..).collect())
    }

    fn stat(&self) -> Result<FileInfo> {
        Ok(self.info.clone())
    }
}
