use std::io::Write;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use vfs_tree::{DirFS, Filesystem, MapFS, TeeFS, WalkControl, fsutil::Control, tree};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    // host directory to look at, the current one by default
    let root = match std::env::args().nth(1) {
        Some(root) => std::path::PathBuf::from(root),
        None => std::env::current_dir()?,
    };
    let root = std::path::absolute(&root).context("resolving root")?;
    let disk = DirFS::new(&root).with_context(|| format!("opening {}", root.display()))?;

    // everything read through `tee` is recorded in `seen`
    let seen = MapFS::new();
    let tee = TeeFS::new(disk, seen.clone());

    // two levels of directories are listed; nothing deeper is touched
    let found = Control::new(&tee).find("/", 2)?;
    tracing::info!(paths = found.len(), "find done");

    // walking a skipped directory records the directory only
    tee.walk("/", |path, info| {
        if info.is_dir() && path.file_name().is_some_and(|name| name == "target") {
            return WalkControl::SkipDir;
        }
        if path.components().count() > 2 {
            return WalkControl::SkipDir;
        }
        WalkControl::Continue
    })?;

    let mut out = std::io::stdout().lock();
    out.write_all(&tree::marshal_unix(&seen)?)?;
    writeln!(out, "\n{} entries under {}", found.len(), root.display())?;

    Ok(())
}
