//! Directory utilities written against the [`Filesystem`] trait only, so they
//! run the same over a host directory, an in-memory tree or a [`TeeFS`].
//!
//! [`TeeFS`]: crate::TeeFS

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{Filesystem, Result};

/// Alters the behavior of the directory utilities.
///
/// Names beginning with a dot are skipped unless [`Control::hidden`] is set.
///
/// ```
/// use vfs_tree::{fsutil::Control, tree};
///
/// let fs = tree::unmarshal_tab(b".\na\n\tb\n\t\tc\n.git/\n").unwrap();
/// let found = Control::new(&fs).find("/", 1).unwrap();
/// assert_eq!(found, ["/a", "/a/b"].map(std::path::PathBuf::from));
/// ```
#[derive(Debug, Clone)]
pub struct Control<F> {
    fs: F,
    hidden: bool,
}

impl<F: Filesystem> Control<F> {
    pub fn new(fs: F) -> Self {
        Self { fs, hidden: false }
    }

    /// Includes names beginning with a dot in the results.
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn filesystem(&self) -> &F {
        &self.fs
    }

    fn is_hidden(&self, name: &str) -> bool {
        !self.hidden && name.starts_with('.')
    }

    /// Reads the names of the files and of the subdirectories of `dir`, in
    /// lexical ascending order.
    ///
    /// Skipped hidden names are untracked, so a recording filesystem such as
    /// [`TeeFS`](crate::TeeFS) keeps only what the caller was given.
    pub fn readpaths<P: AsRef<Path>>(&self, dir: P) -> Result<(Vec<String>, Vec<String>)> {
        let dir = dir.as_ref();
        let mut handle = self.fs.open(dir)?;
        let infos = handle.readdir();
        handle.close()?;

        let (mut files, mut dirs) = (Vec::new(), Vec::new());
        for info in infos? {
            let name = info.base_name();
            if self.is_hidden(name) {
                if let Err(err) = self.fs.untrack(dir.join(name)) {
                    debug!(dir = %dir.display(), name, "untrack failed: {}", err);
                }
                continue;
            }
            if info.is_dir() {
                dirs.push(name.to_owned());
            } else {
                files.push(name.to_owned());
            }
        }
        Ok((files, dirs))
    }

    /// Reads the names of the subdirectories of `dir`, in lexical ascending order.
    pub fn readdirnames<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<String>> {
        self.readpaths(dir).map(|(_, dirs)| dirs)
    }

    /// Reads the paths of the subdirectories of `dir`, in lexical ascending order.
    pub fn readdirpaths<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        let names = self.readdirnames(dir)?;
        Ok(names.into_iter().map(|name| dir.join(name)).collect())
    }

    /// Collects the paths of every file and directory below `dir`, sorted.
    ///
    /// Directories up to `max_depth` levels below `dir` are read, so the deepest
    /// paths returned are `max_depth + 1` levels down. Zero means no limit.
    /// Only `dir` itself must be readable; directories that fail to read later
    /// are skipped.
    pub fn find<P: AsRef<Path>>(&self, dir: P, max_depth: usize) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        let mut all = Vec::new();
        let mut glob = vec![(dir.to_path_buf(), 0)];
        while let Some((path, depth)) = glob.pop() {
            let (files, dirs) = match self.readpaths(&path) {
                Ok(entries) => entries,
                Err(err) if depth == 0 => return Err(err),
                Err(err) => {
                    debug!(path = %path.display(), "find: skipping directory: {}", err);
                    continue;
                }
            };
            all.extend(files.into_iter().map(|name| path.join(name)));
            for name in dirs {
                let sub = path.join(name);
                if max_depth == 0 || depth < max_depth {
                    glob.push((sub.clone(), depth + 1));
                }
                all.push(sub);
            }
        }
        all.sort();
        Ok(all)
    }

    /// Returns the deepest directories common to the trees rooted at `src` and
    /// `dst`, as paths relative to both roots, sorted.
    ///
    /// A common directory is returned when its subdirectories differ between the
    /// two trees, or when either side has none; common subdirectories are
    /// followed further. The roots themselves are never returned.
    pub fn intersect<P, Q>(&self, src: P, dst: Q) -> Result<Vec<PathBuf>>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let (src, dst) = (src.as_ref(), dst.as_ref());
        let mut found = Vec::new();
        let mut glob = vec![PathBuf::new()];
        while let Some(rel) = glob.pop() {
            let top = rel.as_os_str().is_empty();
            let at = |root: &Path| if top { root.to_path_buf() } else { root.join(&rel) };

            let (src_dirs, dst_dirs) =
                match (self.readdirnames(at(src)), self.readdirnames(at(dst))) {
                    (Ok(src_dirs), Ok(dst_dirs)) => (src_dirs, dst_dirs),
                    (Err(err), _) | (_, Err(err)) if top => return Err(err),
                    (Err(err), _) | (_, Err(err)) => {
                        debug!(path = %rel.display(), "intersect: skipping directory: {}", err);
                        continue;
                    }
                };

            if !top && (src_dirs.is_empty() || dst_dirs.is_empty() || src_dirs != dst_dirs) {
                found.push(rel.clone());
            }
            for name in dst_dirs {
                if src_dirs.binary_search(&name).is_ok() {
                    glob.push(rel.join(name));
                }
            }
        }
        found.sort();
        Ok(found)
    }

    /// Runs [`intersect`](Control::intersect) and maps each returned path to the
    /// subdirectories under `dst` that the result leaves out.
    ///
    /// Only a path with other results below it gets a list: its subdirectories
    /// in `dst` that neither are a result nor contain one. Every other path maps
    /// to an empty list.
    pub fn intersect_include<P, Q>(
        &self,
        src: P,
        dst: Q,
    ) -> Result<BTreeMap<PathBuf, Vec<PathBuf>>>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let dst = dst.as_ref();
        let found = self.intersect(src, dst)?;

        let mut include = BTreeMap::new();
        for rel in &found {
            let deeper = found.iter().any(|other| other != rel && other.starts_with(rel));
            let mut left_out = Vec::new();
            if deeper {
                for name in self.readdirnames(dst.join(rel))? {
                    let sub = rel.join(name);
                    if !found.iter().any(|other| other.starts_with(&sub)) {
                        left_out.push(sub);
                    }
                }
            }
            include.insert(rel.clone(), left_out);
        }
        Ok(include)
    }
}
