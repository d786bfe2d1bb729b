use std::io::{self, BufRead};

use tracing::debug;

use super::Dialect;
use crate::core::Filesystem;
use crate::integrity::fsck;
use crate::vfs::entry::{DirRef, Directory, FileNode, Node, Property};
use crate::{Error, MapFS, Result};

/// A node read from a line whose kind is decided by the line after it.
struct Pending {
    line: usize,
    depth: usize,
    name: String,
}

/// Consumes the rest of the input, so that a pipe is never left half-read.
fn drain<R: BufRead>(reader: &mut R) -> io::Result<u64> {
    io::copy(reader, &mut io::sink())
}

fn malformed<R: BufRead>(reader: &mut R, line: usize, text: &str) -> Error {
    if let Err(err) = drain(reader) {
        debug!("draining after malformed line {}: {}", line, err);
    }
    Error::MalformedTree {
        line,
        text: text.to_owned(),
    }
}

/// Reads line `number` without its `\n` or `\r\n` ending; `None` at the end of input.
///
/// A line that is not UTF-8 is malformed. The input is drained on every failure.
fn next_line<R: BufRead>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    number: usize,
) -> Result<Option<String>> {
    buf.clear();
    match reader.read_until(b'\n', buf) {
        Ok(0) => Ok(None),
        Ok(_) => {
            let bytes: &[u8] = buf;
            let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
            let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
            match std::str::from_utf8(bytes) {
                Ok(text) => Ok(Some(text.to_owned())),
                Err(_) => Err(malformed(reader, number, &String::from_utf8_lossy(bytes))),
            }
        }
        Err(err) => {
            if let Err(err) = drain(reader) {
                debug!("draining after read error at line {}: {}", number, err);
            }
            Err(err.into())
        }
    }
}

/// Inserts `node` into the directory on top of the stack, then adjusts the stack
/// to the depth of the line that follows it (`None` at the end of the tree).
fn commit(stack: &mut Vec<DirRef>, node: Pending, next: Option<usize>, umask: u32) -> Result<()> {
    let invalid = |_| Error::MalformedTree {
        line: node.line,
        text: node.name.clone(),
    };
    let Some(current) = stack.last().cloned() else {
        return Err(Error::Corrupted);
    };
    let (name, empty_dir) = match node.name.strip_suffix('/') {
        Some(name) => (name, true),
        None => (node.name.as_str(), false),
    };

    match next {
        Some(depth) if depth > node.depth => {
            let sub = Directory::shared(Property::dir(umask));
            current
                .borrow_mut()
                .insert(name, Node::Directory(sub.clone()))
                .map_err(invalid)?;
            stack.push(sub);
        }
        _ => {
            let value = if empty_dir {
                Node::Directory(Directory::shared(Property::dir(umask)))
            } else {
                Node::File(FileNode::new(Property::file(umask)))
            };
            current.borrow_mut().insert(name, value).map_err(invalid)?;
            if let Some(depth) = next.filter(|&depth| depth < node.depth) {
                let keep = (stack.len() + depth).saturating_sub(node.depth).max(1);
                stack.truncate(keep);
            }
        }
    }
    Ok(())
}

pub(crate) fn decode<D, R>(dialect: &D, mut reader: R) -> Result<MapFS>
where
    D: Dialect + ?Sized,
    R: BufRead,
{
    let fs = MapFS::new();
    let umask = fs.umask();

    let mut buf = Vec::new();
    let Some(header) = next_line(&mut reader, &mut buf, 1)? else {
        return Err(Error::MalformedTree {
            line: 1,
            text: String::new(),
        });
    };
    let start = match header.trim() {
        "." => fs.tree().clone(),
        "" => return Err(malformed(&mut reader, 1, "")),
        header => {
            fs.mkdir_all(header, Property::dir(umask).mode)?;
            fs.cd(header)?.tree().clone()
        }
    };

    let mut stack = vec![start];
    let mut pending: Option<Pending> = None;
    let mut number = 1;
    loop {
        number += 1;
        let line = next_line(&mut reader, &mut buf, number)?;

        let current = match line.as_deref() {
            None => None,
            Some(text) if text.trim().is_empty() || dialect.is_trailer(text.trim()) => None,
            Some(text) => match dialect.decode_line(text) {
                Some((depth, name)) => Some(Pending {
                    line: number,
                    depth,
                    name: name.to_owned(),
                }),
                None => return Err(malformed(&mut reader, number, text)),
            },
        };

        if let Some(node) = pending.take() {
            let next = current.as_ref().map(|node| node.depth);
            if let Err(err) = commit(&mut stack, node, next, umask) {
                return Err(match err {
                    Error::MalformedTree { line, text } => malformed(&mut reader, line, &text),
                    err => err,
                });
            }
        }

        match current {
            Some(node) => pending = Some(node),
            None => {
                drain(&mut reader)?;
                break;
            }
        }
    }

    if !fsck(&fs) {
        return Err(Error::Corrupted);
    }
    debug!(lines = number - 1, "decoded tree");
    Ok(fs)
}

#[cfg(test)]
mod tests {
    use std::io::{BufReader, Cursor, Read};

    use super::*;
    use crate::tree::{Tab, Unix, unmarshal_tab, unmarshal_unix};
    use crate::{ErrorKind, integrity::compare};

    /// Builds the expected tree from paths; a trailing `/` marks a directory.
    fn expected(paths: &[&str]) -> MapFS {
        let fs = MapFS::new();
        for path in paths {
            match path.strip_suffix('/') {
                Some(dir) => fs.mkdir_all(dir, 0o775).unwrap(),
                None => {
                    if let Some(parent) = std::path::Path::new(path).parent() {
                        fs.mkdir_all(parent, 0o775).unwrap();
                    }
                    fs.create(path).unwrap().close().unwrap();
                }
            }
        }
        fs
    }

    mod unix {
        use super::*;

        #[test]
        fn test_flat() -> Result<()> {
            let text = ".\n├── out.gif\n├── out.ogv\n├── output2.gif\n├── output3.gif\n└── output.gif";
            let fs = unmarshal_unix(text.as_bytes())?;
            let want = expected(&[
                "/out.gif",
                "/out.ogv",
                "/output2.gif",
                "/output3.gif",
                "/output.gif",
            ]);
            assert!(compare(&fs, &want));
            Ok(())
        }

        #[test]
        fn test_path_header() -> Result<()> {
            let text = "/github.com/rjeczalik/tools
├── doc.go
├── fs
│   ├── fs.go
│   ├── glob
│   │   ├── glob.go
│   │   └── glob_test.go
│   ├── memfs
│   │   ├── memfs.go
│   │   ├── memfs_test.go
│   │   ├── tree.go
│   │   ├── tree_test.go
│   │   ├── util.go
│   │   └── util_test.go
│   └── testdata
│       └── tree.txt
├── LICENSE
├── netz
│   ├── memnetz
│   │   ├── memnetz.go
│   │   └── memnetz_test.go
│   ├── netz.go
│   ├── split.go
│   └── split_test.go
└── README.md";
            let fs = unmarshal_unix(text.as_bytes())?;
            let want = expected(&[
                "/github.com/rjeczalik/tools/doc.go",
                "/github.com/rjeczalik/tools/fs/fs.go",
                "/github.com/rjeczalik/tools/fs/glob/glob.go",
                "/github.com/rjeczalik/tools/fs/glob/glob_test.go",
                "/github.com/rjeczalik/tools/fs/memfs/memfs.go",
                "/github.com/rjeczalik/tools/fs/memfs/memfs_test.go",
                "/github.com/rjeczalik/tools/fs/memfs/tree.go",
                "/github.com/rjeczalik/tools/fs/memfs/tree_test.go",
                "/github.com/rjeczalik/tools/fs/memfs/util.go",
                "/github.com/rjeczalik/tools/fs/memfs/util_test.go",
                "/github.com/rjeczalik/tools/fs/testdata/tree.txt",
                "/github.com/rjeczalik/tools/LICENSE",
                "/github.com/rjeczalik/tools/netz/memnetz/memnetz.go",
                "/github.com/rjeczalik/tools/netz/memnetz/memnetz_test.go",
                "/github.com/rjeczalik/tools/netz/netz.go",
                "/github.com/rjeczalik/tools/netz/split.go",
                "/github.com/rjeczalik/tools/netz/split_test.go",
                "/github.com/rjeczalik/tools/README.md",
            ]);
            assert!(compare(&fs, &want));
            Ok(())
        }

        #[test]
        fn test_summary_is_discarded() -> Result<()> {
            let text = ".
├── a
│   ├── b1
│   │   ├── c1
│   │   │   └── c1.txt
│   │   ├── c2
│   │   │   └── c2.txt
│   │   └── c3
│   │       ├── c3.txt
│   │       └── d1
│   │           └── e1
│   │               ├── _
│   │               │   └── _.txt
│   │               ├── e1.txt
│   │               └── e2.txt
│   └── b2
│       └── c1
│           ├── d1.txt
│           ├── d2.txt
│           └── d3.txt
├── a.txt
└── w
    ├── w.txt
    └── x
        ├── y
        │   └── z
        │       └── 1.txt
        └── y.txt

14 directories, 13 files";
            let fs = unmarshal_unix(text.as_bytes())?;
            let want = expected(&[
                "/a/b1/c1/c1.txt",
                "/a/b1/c2/c2.txt",
                "/a/b1/c3/c3.txt",
                "/a/b1/c3/d1/e1/_/_.txt",
                "/a/b1/c3/d1/e1/e1.txt",
                "/a/b1/c3/d1/e1/e2.txt",
                "/a/b2/c1/d1.txt",
                "/a/b2/c1/d2.txt",
                "/a/b2/c1/d3.txt",
                "/a.txt",
                "/w/w.txt",
                "/w/x/y/z/1.txt",
                "/w/x/y.txt",
            ]);
            assert!(compare(&fs, &want));

            let mut summary = Vec::new();
            Unix::default().with_summary(true).encode(&fs, &mut summary)?;
            assert!(String::from_utf8_lossy(&summary).ends_with("\n\n14 directories, 13 files\n"));
            Ok(())
        }

        #[test]
        fn test_bare_summary_line_ends_tree() -> Result<()> {
            let fs = unmarshal_unix(".\n└── a\n1 directory, 0 files\n└── b\n".as_bytes())?;
            assert!(compare(&fs, &expected(&["/a"])));
            Ok(())
        }
    }

    mod tab {
        use super::*;

        #[test]
        fn test_depth_jumps_back_several_levels() -> Result<()> {
            let fs = unmarshal_tab(b".\na\n\tb\n\t\tc\n\t\t\td.txt\ne.txt\n")?;
            assert!(compare(&fs, &expected(&["/a/b/c/d.txt", "/e.txt"])));
            Ok(())
        }

        #[test]
        fn test_empty_directories() -> Result<()> {
            let fs = unmarshal_tab(b".\na/\nb\n\tc/\n")?;
            assert!(compare(&fs, &expected(&["/a/", "/b/c/"])));
            Ok(())
        }

        #[test]
        fn test_blank_line_ends_tree() -> Result<()> {
            let fs = unmarshal_tab(b".\na\n\n\tb\n")?;
            assert!(compare(&fs, &expected(&["/a"])));
            Ok(())
        }

        #[test]
        fn test_only_line_endings_are_stripped() -> Result<()> {
            let fs = unmarshal_tab(b".\r\na \r\n\t b.txt \r\n")?;
            assert!(fs.stat("/a ")?.is_dir());
            assert!(fs.stat("/a / b.txt ")?.is_file());
            assert!(!fs.exists("/a"));
            Ok(())
        }
    }

    mod errors {
        use super::*;

        #[test]
        fn test_empty_input() {
            let err = unmarshal_tab(b"").unwrap_err();
            assert!(matches!(err, Error::MalformedTree { line: 1, .. }));
        }

        #[test]
        fn test_malformed_line() {
            let err = unmarshal_unix(".\n├── a\nnot a tree line\n└── b\n".as_bytes()).unwrap_err();
            match err {
                Error::MalformedTree { line, text } => {
                    assert_eq!(line, 3);
                    assert_eq!(text, "not a tree line");
                }
                err => panic!("unexpected error: {err}"),
            }
        }

        #[test]
        fn test_invalid_name() {
            let err = unmarshal_tab(b".\na\n\t..\n").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedTree);

            let err = unmarshal_tab(b".\n/\n").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedTree);
        }

        #[test]
        fn test_input_is_drained() -> Result<()> {
            let text = ".\na\n\nleft over\n".to_owned();
            let mut reader = BufReader::new(Cursor::new(text.into_bytes()));
            Tab.decode(&mut reader)?;
            let mut rest = Vec::new();
            reader.read_to_end(&mut rest)?;
            assert!(rest.is_empty());

            let mut reader = BufReader::new(Cursor::new(b".\nbroken \x1b\n\tline\nmore\n".to_vec()));
            assert!(Unix::default().decode(&mut reader).is_err());
            let mut rest = Vec::new();
            reader.read_to_end(&mut rest)?;
            assert!(rest.is_empty());
            Ok(())
        }

        fn assert_malformed_and_drained<D: Dialect>(dialect: D, input: &[u8], line: usize) {
            let mut reader = BufReader::new(Cursor::new(input.to_vec()));
            match dialect.decode(&mut reader) {
                Err(Error::MalformedTree { line: at, .. }) => assert_eq!(at, line),
                other => panic!("unexpected result: {other:?}"),
            }
            let mut rest = Vec::new();
            reader.read_to_end(&mut rest).unwrap();
            assert!(rest.is_empty());
        }

        #[test]
        fn test_invalid_utf8_is_malformed_and_drained() {
            assert_malformed_and_drained(Tab, b".\na\n\tb\xff\nmore\nlines\n", 3);
            let mut unix = ".\n├── a\n│   └── b".as_bytes().to_vec();
            unix.extend_from_slice(b"\xff\n");
            unix.extend_from_slice("└── x\n".as_bytes());
            assert_malformed_and_drained(Unix::default(), &unix, 3);
            assert_malformed_and_drained(Tab, b"\xfe\xff\na\n", 1);
        }

        /// Hands out its chunks one read at a time; `None` is a failed read.
        struct Flaky(Vec<Option<&'static [u8]>>);

        impl Read for Flaky {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.0.is_empty() {
                    return Ok(0);
                }
                match self.0.remove(0) {
                    Some(chunk) => {
                        buf[..chunk.len()].copy_from_slice(chunk);
                        Ok(chunk.len())
                    }
                    None => Err(io::Error::other("device went away")),
                }
            }
        }

        #[test]
        fn test_read_error_still_drains() {
            let mut source = Flaky(vec![
                Some(&b".\na\n"[..]),
                None,
                Some(&b"\tb\n"[..]),
                Some(&b"c\n"[..]),
            ]);
            let err = Tab.decode(BufReader::new(&mut source)).unwrap_err();
            assert!(matches!(err, Error::Io(_)));
            assert!(source.0.is_empty());
        }
    }
}
