//! This module provides a filesystem implementation that maps to a real directory on the host
//! system. All operations are confined to a designated root directory: inner paths such as
//! `/docs/note.txt` are resolved below the root, and `..` never climbs above it.

use std::fs::{self, Metadata};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::core::{File, Filesystem, Result, WalkControl, utils};
use crate::vfs::dir_handle::DirHandle;
use crate::{Error, ErrorKind, FileInfo, MODE_PERM};

/// A filesystem backed by a directory on the host.
///
/// `DirFS` is the "real" counterpart of [`MapFS`](crate::MapFS): both implement
/// [`Filesystem`], so tools written against the trait work on either, and
/// [`TeeFS`](crate::TeeFS) can record the part of a host tree that a tool touched.
///
/// ### Usage notes:
/// - `DirFS` does not follow symlinks when removing; `remove()` removes the link, not the target.
/// - Permissions passed to `mkdir`/`mkdir_all` are further masked by the process umask.
/// - Errors carry the inner path as given by the caller and the host error as their source.
///
/// ### Example:
/// ```no_run
/// use vfs_tree::{DirFS, Filesystem};
///
/// let root = std::env::temp_dir().join("my_vfs");
///
/// let fs = DirFS::new(root).unwrap();
/// fs.mkdir_all("/docs", 0o755).unwrap();
/// assert!(fs.stat("/docs").unwrap().is_dir());
/// ```
#[derive(Debug, Clone)]
pub struct DirFS {
    root: PathBuf, // host-related absolute normalized path
}

impl DirFS {
    /// Creates a new DirFS instance with the root directory at `root`.
    /// * `root` is an absolute host path. If it does not exist it is created with all its parents.
    ///
    /// Fails if `root` is empty, relative, or names something other than a directory.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();

        if root.as_os_str().is_empty() || root.is_relative() {
            return Err(Error::path("new", root, ErrorKind::InvalidPath));
        }
        let root = utils::normalize(root);

        match fs::metadata(&root) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(Error::path("new", &root, ErrorKind::NotADirectory)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                fs::create_dir_all(&root).map_err(|err| Error::host("new", &root, err))?;
                debug!(root = %root.display(), "created root");
            }
            Err(err) => return Err(Error::host("new", &root, err)),
        }

        Ok(Self { root })
    }

    /// Returns root path related to the host file system.
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    /// Returns a filesystem rooted at the directory `path` of this one.
    pub fn cd<P: AsRef<Path>>(&self, path: P) -> Result<DirFS> {
        let path = path.as_ref();
        let host = self.to_host("cd", path)?;
        let meta = fs::metadata(&host).map_err(|err| Error::host("cd", path, err))?;
        if !meta.is_dir() {
            return Err(Error::path("cd", path, ErrorKind::NotADirectory));
        }
        Ok(DirFS { root: host })
    }

    /// Returns the path on the host system that matches the specified inner path.
    fn to_host(&self, op: &'static str, path: &Path) -> Result<PathBuf> {
        let names = utils::names(path).map_err(|kind| Error::path(op, path, kind))?;
        Ok(names.iter().fold(self.root.clone(), |host, name| host.join(name)))
    }

    /// Returns the entries of the host directory `host`, sorted by name.
    /// Entries whose names are not UTF-8 cannot be addressed by a path and are skipped.
    fn read_sorted(
        &self,
        op: &'static str,
        path: &Path,
        host: &Path,
    ) -> Result<Vec<(String, FileInfo)>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(host).map_err(|err| Error::host(op, path, err))? {
            let entry = entry.map_err(|err| Error::host(op, path, err))?;
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    warn!(dir = %path.display(), name = ?raw, "skipping non UTF-8 entry");
                    continue;
                }
            };
            let meta = entry
                .metadata()
                .map_err(|err| Error::host(op, path.join(&name), err))?;
            let info = host_info(&path.join(&name), &meta);
            entries.push((name, info));
        }
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(entries)
    }
}

fn host_perm(meta: &Metadata) -> u32 {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & MODE_PERM
    }
    #[cfg(not(unix))]
    {
        match (meta.is_dir(), meta.permissions().readonly()) {
            (true, _) => 0o777,
            (false, true) => 0o444,
            (false, false) => 0o666,
        }
    }
}

fn host_info(path: &Path, meta: &Metadata) -> FileInfo {
    let size = if meta.is_dir() { 0 } else { meta.len() };
    let mod_time = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    FileInfo::new(path, size, host_perm(meta), mod_time, meta.is_dir())
}

fn create_dir(host: &Path, perm: u32) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(perm & MODE_PERM);
    }
    #[cfg(not(unix))]
    let _ = perm;
    builder.create(host)
}

impl Filesystem for DirFS {
    fn create<P: AsRef<Path>>(&self, path: P) -> Result<Box<dyn File>> {
        let path = path.as_ref();
        let host = self.to_host("create", path)?;
        if utils::is_virtual_root(path) || host.is_dir() {
            return Err(Error::path("create", path, ErrorKind::IsADirectory));
        }
        let file = fs::File::create(&host).map_err(|err| Error::host("create", path, err))?;
        debug!(path = %path.display(), "create");
        Ok(Box::new(HostFile::new(path, file)))
    }

    fn mkdir<P: AsRef<Path>>(&self, path: P, perm: u32) -> Result<()> {
        let path = path.as_ref();
        let host = self.to_host("mkdir", path)?;
        match fs::metadata(&host) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(Error::path("mkdir", path, ErrorKind::NotADirectory)),
            Err(_) => {
                create_dir(&host, perm).map_err(|err| Error::host("mkdir", path, err))?;
                debug!(path = %path.display(), perm, "mkdir");
                Ok(())
            }
        }
    }

    fn mkdir_all<P: AsRef<Path>>(&self, path: P, perm: u32) -> Result<()> {
        let path = path.as_ref();
        let names = utils::names(path).map_err(|kind| Error::path("mkdir_all", path, kind))?;

        let mut built = self.root.clone();
        for name in &names {
            built.push(name);
            match fs::metadata(&built) {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => return Err(Error::path("mkdir_all", path, ErrorKind::NotADirectory)),
                Err(_) => {
                    create_dir(&built, perm).map_err(|err| Error::host("mkdir_all", path, err))?
                }
            }
        }
        debug!(path = %path.display(), "mkdir_all");
        Ok(())
    }

    fn open<P: AsRef<Path>>(&self, path: P) -> Result<Box<dyn File>> {
        let path = path.as_ref();
        let host = self.to_host("open", path)?;
        let meta = fs::metadata(&host).map_err(|err| Error::host("open", path, err))?;
        if meta.is_dir() {
            let entries = self
                .read_sorted("open", path, &host)?
                .into_iter()
                .map(|(_, info)| info)
                .collect();
            return Ok(Box::new(DirHandle::new(host_info(path, &meta), entries)));
        }
        let file = fs::File::open(&host).map_err(|err| Error::host("open", path, err))?;
        Ok(Box::new(HostFile::new(path, file)))
    }

    fn remove<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if utils::is_virtual_root(path) {
            return Err(Error::path("remove", path, ErrorKind::PermissionDenied));
        }
        let host = self.to_host("remove", path)?;
        let meta = fs::symlink_metadata(&host).map_err(|err| Error::host("remove", path, err))?;
        if meta.is_dir() {
            return Err(Error::path("remove", path, ErrorKind::IsADirectory));
        }
        fs::remove_file(&host).map_err(|err| Error::host("remove", path, err))?;
        debug!(path = %path.display(), "remove");
        Ok(())
    }

    fn remove_all<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if utils::is_virtual_root(path) {
            return Err(Error::path("remove_all", path, ErrorKind::PermissionDenied));
        }
        let host = self.to_host("remove_all", path)?;
        let meta =
            fs::symlink_metadata(&host).map_err(|err| Error::host("remove_all", path, err))?;
        let result = if meta.is_dir() {
            fs::remove_dir_all(&host)
        } else {
            fs::remove_file(&host)
        };
        result.map_err(|err| Error::host("remove_all", path, err))?;
        debug!(path = %path.display(), "remove_all");
        Ok(())
    }

    fn stat<P: AsRef<Path>>(&self, path: P) -> Result<FileInfo> {
        let path = path.as_ref();
        let host = self.to_host("stat", path)?;
        let meta = fs::metadata(&host).map_err(|err| Error::host("stat", path, err))?;
        Ok(host_info(path, &meta))
    }

    fn walk<P, F>(&self, root: P, mut visitor: F) -> Result<()>
    where
        P: AsRef<Path>,
        F: FnMut(&Path, &FileInfo) -> WalkControl,
    {
        let root = root.as_ref();
        let host = self.to_host("walk", root)?;
        let meta = fs::metadata(&host).map_err(|err| Error::host("walk", root, err))?;

        let mut stack = vec![(root.to_path_buf(), host_info(root, &meta), host)];
        while let Some((path, info, host)) = stack.pop() {
            match visitor(&path, &info) {
                WalkControl::Break => return Ok(()),
                WalkControl::SkipDir => continue,
                WalkControl::Continue => {}
            }
            if !info.is_dir() {
                continue;
            }
            for (name, child) in self.read_sorted("walk", &path, &host)?.into_iter().rev() {
                stack.push((child.name().to_path_buf(), child, host.join(name)));
            }
        }
        Ok(())
    }
}

/// A handle to a regular host file.
#[derive(Debug)]
pub struct HostFile {
    path: PathBuf,
    file: Option<fs::File>,
}

impl HostFile {
    fn new(path: &Path, file: fs::File) -> HostFile {
        HostFile {
            path: path.to_path_buf(),
            file: Some(file),
        }
    }

    fn file(&mut self, op: &'static str) -> io::Result<&mut fs::File> {
        match self.file.as_mut() {
            Some(file) => Ok(file),
            None => Err(Error::path(op, &self.path, ErrorKind::Closed).into()),
        }
    }
}

impl Read for HostFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file("read")?.read(buf)
    }
}

impl Write for HostFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file("write")?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file("flush")?.flush()
    }
}

impl Seek for HostFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file("seek")?.seek(pos)
    }
}

impl File for HostFile {
    fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()
                .map_err(|err| Error::host("close", &self.path, err))?;
        }
        Ok(())
    }

    fn readdir(&mut self) -> Result<Vec<FileInfo>> {
        Err(Error::path("readdir", &self.path, ErrorKind::NotADirectory))
    }

    fn stat(&self) -> Result<FileInfo> {
        let file = self
            .file
            .as_ref()
            .ok_or_else(|| Error::path("stat", &self.path, ErrorKind::Closed))?;
        let meta = file
            .metadata()
            .map_err(|err| Error::host("stat", &self.path, err))?;
        Ok(host_info(&self.path, &meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn setup_test_env() -> TempDir {
        TempDir::new("dirfs_test").unwrap()
    }

    /// Creates `/project/{main.rs, tests/test.rs, docs/}` below a fresh root.
    fn setup_project() -> anyhow::Result<(TempDir, DirFS)> {
        let temp_dir = setup_test_env();
        let fs = DirFS::new(temp_dir.path())?;
        fs.mkdir_all("/project/tests", 0o755)?;
        fs.mkdir("/project/docs", 0o755)?;
        let mut f = fs.create("/project/main.rs")?;
        f.write_all(b"fn main() {}")?;
        f.close()?;
        fs.create("/project/tests/test.rs")?.close()?;
        Ok((temp_dir, fs))
    }

    mod creations {
        use super::*;

        #[test]
        fn test_new_absolute_path_existing() {
            let temp_dir = setup_test_env();
            let root = temp_dir.path().to_path_buf();

            let fs = DirFS::new(&root).unwrap();
            assert_eq!(fs.root(), root);
        }

        #[test]
        fn test_new_nested_nonexistent_path() {
            let temp_dir = setup_test_env();
            let nested = temp_dir.path().join("a/b/c");

            let fs = DirFS::new(&nested).unwrap();

            assert_eq!(fs.root(), nested);
            assert!(nested.is_dir());
        }

        #[test]
        fn test_new_normalize_path() {
            let temp_dir = setup_test_env();
            let messy_path = temp_dir.path().join("././subdir/../subdir");

            let fs = DirFS::new(&messy_path).unwrap();
            assert_eq!(fs.root(), utils::normalize(temp_dir.path().join("subdir")));
        }

        #[test]
        fn test_new_invalid_roots() {
            let temp_dir = setup_test_env();
            let file_path = temp_dir.path().join("file.txt");
            std::fs::write(&file_path, "content").unwrap();

            assert!(DirFS::new(&file_path).unwrap_err().is_not_a_directory());
            assert_eq!(DirFS::new("").unwrap_err().kind(), ErrorKind::InvalidPath);
            assert_eq!(
                DirFS::new("relative/root").unwrap_err().kind(),
                ErrorKind::InvalidPath
            );
        }

        #[test]
        fn test_new_special_characters() {
            let temp_dir = setup_test_env();
            let special = temp_dir.path().join("папка с пробелами и юникод!");

            let fs = DirFS::new(&special).unwrap();
            assert_eq!(fs.root(), special);
            assert!(special.exists());
        }
    }

    mod cd {
        use super::*;

        #[test]
        fn test_cd_sub_root() -> anyhow::Result<()> {
            let (temp_dir, fs) = setup_project()?;
            let sub = fs.cd("/project/tests")?;
            assert_eq!(sub.root(), temp_dir.path().join("project/tests"));
            assert!(sub.stat("/test.rs")?.is_file());
            assert!(sub.stat("/../main.rs").unwrap_err().is_not_exist());
            Ok(())
        }

        #[test]
        fn test_cd_errors() -> anyhow::Result<()> {
            let (_temp_dir, fs) = setup_project()?;
            assert!(fs.cd("/missing").unwrap_err().is_not_exist());
            assert!(fs.cd("/project/main.rs").unwrap_err().is_not_a_directory());
            Ok(())
        }
    }

    mod create {
        use super::*;

        #[test]
        fn test_create_and_read_back() -> anyhow::Result<()> {
            let (temp_dir, fs) = setup_project()?;
            let content = std::fs::read(temp_dir.path().join("project/main.rs"))?;
            assert_eq!(content, b"fn main() {}");

            let mut f = fs.open("/project/main.rs")?;
            let mut read = String::new();
            f.read_to_string(&mut read)?;
            assert_eq!(read, "fn main() {}");
            assert_eq!(f.stat()?.size(), 12);
            Ok(())
        }

        #[test]
        fn test_create_truncates() -> anyhow::Result<()> {
            let (_temp_dir, fs) = setup_project()?;
            fs.create("/project/main.rs")?.close()?;
            assert_eq!(fs.stat("/project/main.rs")?.size(), 0);
            Ok(())
        }

        #[test]
        fn test_create_errors() -> anyhow::Result<()> {
            let (_temp_dir, fs) = setup_project()?;
            assert!(fs.create("/").unwrap_err().is_a_directory());
            assert!(fs.create("/project").unwrap_err().is_a_directory());
            assert!(fs.create("/missing/file").unwrap_err().is_not_exist());
            Ok(())
        }

        #[test]
        fn test_closed_handle() -> anyhow::Result<()> {
            let (_temp_dir, fs) = setup_project()?;
            let mut f = fs.create("/x.txt")?;
            f.close()?;
            f.close()?;
            assert!(f.write(b"late").is_err());
            assert_eq!(f.stat().unwrap_err().kind(), ErrorKind::Closed);
            Ok(())
        }
    }

    mod mkdir {
        use super::*;

        #[test]
        fn test_mkdir_idempotent() -> anyhow::Result<()> {
            let (_temp_dir, fs) = setup_project()?;
            fs.mkdir("/project/docs", 0o755)?;
            fs.mkdir("/", 0o755)?;
            assert!(fs.stat("/project/docs")?.is_dir());
            Ok(())
        }

        #[test]
        fn test_mkdir_errors() -> anyhow::Result<()> {
            let (_temp_dir, fs) = setup_project()?;
            assert!(fs.mkdir("/project/main.rs", 0o755).unwrap_err().is_not_a_directory());
            assert!(fs.mkdir("/a/b", 0o755).unwrap_err().is_not_exist());
            Ok(())
        }

        #[test]
        fn test_mkdir_all() -> anyhow::Result<()> {
            let (temp_dir, fs) = setup_project()?;
            fs.mkdir_all("/a/b/c", 0o700)?;
            assert!(temp_dir.path().join("a/b/c").is_dir());

            #[cfg(unix)]
            assert_eq!(fs.stat("/a/b")?.permissions(), 0o700);

            let err = fs.mkdir_all("/project/main.rs/sub", 0o755).unwrap_err();
            assert!(err.is_not_a_directory());
            Ok(())
        }
    }

    mod remove {
        use super::*;

        #[test]
        fn test_remove_file_and_dir() -> anyhow::Result<()> {
            let (temp_dir, fs) = setup_project()?;
            fs.remove("/project/main.rs")?;
            assert!(!temp_dir.path().join("project/main.rs").exists());

            assert!(fs.remove("/project").unwrap_err().is_a_directory());
            fs.remove_all("/project")?;
            assert!(fs.stat("/project").unwrap_err().is_not_exist());
            assert!(temp_dir.path().exists());
            Ok(())
        }

        #[test]
        fn test_remove_root_denied() -> anyhow::Result<()> {
            let (_temp_dir, fs) = setup_project()?;
            assert!(fs.remove("/").unwrap_err().is_permission_denied());
            assert!(fs.remove_all("/").unwrap_err().is_permission_denied());
            assert!(fs.remove_all("/..").unwrap_err().is_permission_denied());
            assert!(fs.remove_all("/missing").unwrap_err().is_not_exist());
            Ok(())
        }
    }

    mod listing {
        use super::*;

        #[test]
        fn test_open_dir_readdir_sorted() -> anyhow::Result<()> {
            let (_temp_dir, fs) = setup_project()?;
            let mut d = fs.open("/project")?;
            let names: Vec<_> = d
                .readdir()?
                .iter()
                .map(|fi| (fi.base_name().to_owned(), fi.is_dir()))
                .collect();
            assert_eq!(
                names,
                vec![
                    ("docs".to_owned(), true),
                    ("main.rs".to_owned(), false),
                    ("tests".to_owned(), true),
                ]
            );
            assert!(d.readdir()?.is_empty());
            Ok(())
        }

        #[test]
        fn test_walk_pre_order() -> anyhow::Result<()> {
            let (_temp_dir, fs) = setup_project()?;
            let mut paths = Vec::new();
            fs.walk("/", |path, _| {
                paths.push(path.to_path_buf());
                WalkControl::Continue
            })?;
            let expected: Vec<PathBuf> = [
                "/",
                "/project",
                "/project/docs",
                "/project/main.rs",
                "/project/tests",
                "/project/tests/test.rs",
            ]
            .iter()
            .map(PathBuf::from)
            .collect();
            assert_eq!(paths, expected);
            Ok(())
        }

        #[test]
        fn test_walk_skip_dir() -> anyhow::Result<()> {
            let (_temp_dir, fs) = setup_project()?;
            let mut paths = Vec::new();
            fs.walk("/project", |path, info| {
                paths.push(path.to_path_buf());
                if info.is_dir() && info.base_name() == "tests" {
                    WalkControl::SkipDir
                } else {
                    WalkControl::Continue
                }
            })?;
            assert!(paths.contains(&PathBuf::from("/project/tests")));
            assert!(!paths.contains(&PathBuf::from("/project/tests/test.rs")));
            Ok(())
        }

        #[cfg(target_os = "linux")]
        #[test]
        fn test_non_utf8_names_are_skipped() -> anyhow::Result<()> {
            use std::ffi::OsStr;
            use std::os::unix::ffi::OsStrExt;

            use crate::fsutil::Control;

            let temp_dir = setup_test_env();
            let fs = DirFS::new(temp_dir.path())?;
            fs.mkdir("/d", 0o755)?;
            fs.create("/d/ok.txt")?.close()?;
            std::fs::write(temp_dir.path().join("d").join(OsStr::from_bytes(b"bad\xff")), b"")?;

            let names: Vec<_> = fs
                .open("/d")?
                .readdir()?
                .iter()
                .map(|fi| fi.base_name().to_owned())
                .collect();
            assert_eq!(names, vec!["ok.txt".to_owned()]);

            let mut visited = Vec::new();
            fs.walk("/", |path, _| {
                visited.push(path.to_path_buf());
                WalkControl::Continue
            })?;
            assert_eq!(
                visited,
                vec![PathBuf::from("/"), PathBuf::from("/d"), PathBuf::from("/d/ok.txt")]
            );

            assert_eq!(
                Control::new(&fs).find("/", 0)?,
                vec![PathBuf::from("/d"), PathBuf::from("/d/ok.txt")]
            );
            Ok(())
        }
    }
}
