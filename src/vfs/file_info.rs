use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Type flag set in [`FileInfo::mode`] for directories.
pub const MODE_DIR: u32 = 0o040000;

/// Mask selecting permission bits out of a mode.
pub const MODE_PERM: u32 = 0o7777;

/// Details of a file or a directory, as returned by `stat` and `readdir`.
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    path: PathBuf,
    size: u64,
    perm: u32,
    mod_time: SystemTime,
    is_dir: bool,
}

impl FileInfo {
    pub fn new<P: AsRef<Path>>(
        path: P,
        size: u64,
        perm: u32,
        mod_time: SystemTime,
        is_dir: bool,
    ) -> FileInfo {
        FileInfo {
            path: path.as_ref().to_path_buf(),
            size,
            perm: perm & MODE_PERM,
            mod_time,
            is_dir,
        }
    }

    /// The path the entry was reached by, exactly as the caller spelled it.
    pub fn name(&self) -> &Path {
        &self.path
    }

    /// The last segment of [`name`](Self::name), or an empty string for a root.
    pub fn base_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }

    /// Length of the content in bytes; 0 for directories.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Permission bits together with the [`MODE_DIR`] type flag.
    pub fn mode(&self) -> u32 {
        if self.is_dir {
            self.perm | MODE_DIR
        } else {
            self.perm
        }
    }

    /// Permission bits only.
    pub fn permissions(&self) -> u32 {
        self.perm
    }

    pub fn mod_time(&self) -> SystemTime {
        self.mod_time
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    pub fn is_file(&self) -> bool {
        !self.is_dir
    }
}
