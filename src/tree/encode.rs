use std::io::{BufWriter, Write};

use tracing::debug;

use super::{Dialect, EncodingState};
use crate::vfs::entry::{DirRef, Node};
use crate::{MapFS, Result};

/// A directory being written, with the names of its entries not yet written.
struct Frame {
    dir: DirRef,
    // Descending, so that `pop` yields names in ascending order.
    queue: Vec<String>,
}

impl Frame {
    fn new(dir: DirRef) -> Frame {
        let queue = dir.borrow().names().rev().map(str::to_owned).collect();
        Frame { dir, queue }
    }
}

pub(crate) fn encode<D, W>(dialect: &D, fs: &MapFS, writer: W) -> Result<()>
where
    D: Dialect + ?Sized,
    W: Write,
{
    let mut w = BufWriter::new(writer);
    w.write_all(b".\n")?;

    let (mut dirs, mut files) = (0, 0);
    let mut frames = vec![Frame::new(fs.tree().clone())];
    while let Some(top) = frames.last_mut() {
        let Some(name) = top.queue.pop() else {
            frames.pop();
            continue;
        };
        let last = top.queue.is_empty();
        let child = top.dir.borrow().get(&name).and_then(Node::as_dir).cloned();

        let depth = frames.len() - 1;
        for frame in &frames[..depth] {
            let state = if frame.queue.is_empty() {
                EncodingState::LevelLast
            } else {
                EncodingState::Level
            };
            w.write_all(dialect.encode_state(state).as_bytes())?;
        }
        let state = if last {
            EncodingState::ItemLast
        } else {
            EncodingState::Item
        };
        w.write_all(dialect.encode_state(state).as_bytes())?;
        w.write_all(name.as_bytes())?;

        match child {
            Some(dir) => {
                dirs += 1;
                let frame = Frame::new(dir);
                if frame.queue.is_empty() {
                    w.write_all(b"/\n")?;
                } else {
                    w.write_all(b"\n")?;
                    frames.push(frame);
                }
            }
            None => {
                files += 1;
                w.write_all(b"\n")?;
            }
        }
    }

    if let Some(trailer) = dialect.trailer(dirs, files) {
        w.write_all(trailer.as_bytes())?;
    }
    w.flush()?;
    debug!(dirs, files, "encoded tree");
    Ok(())
}
