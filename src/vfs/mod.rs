pub(crate) mod dir_fs;
pub(crate) mod dir_handle;
pub(crate) mod entry;
pub(crate) mod file_info;
pub(crate) mod map_file;
pub(crate) mod map_fs;
pub(crate) mod tee_fs;

pub use dir_fs::{DirFS, HostFile};
pub use dir_handle::DirHandle;
pub use entry::{DEFAULT_UMASK, DirRef, Directory, FileNode, Node, Property};
pub use file_info::{FileInfo, MODE_DIR, MODE_PERM};
pub use map_file::MapFile;
pub use map_fs::MapFS;
pub use tee_fs::{TeeDir, TeeFS};
