//! Text codecs for in-memory trees.
//!
//! A tree is written as `"."` followed by one line per node, in pre-order. Each
//! line carries an indentation prefix built from [`EncodingState`]s, the node's
//! name, and a trailing `/` if the node is an empty directory. Two dialects are
//! provided: [`Unix`] reproduces the output of the `tree` command, [`Tab`]
//! indents with one tab per level.
//!
//! ```
//! use vfs_tree::tree::{self, Dialect, Unix};
//!
//! let fs = tree::unmarshal_tab(b".\na\n\tb.txt\n").unwrap();
//! let text = tree::marshal_unix(&fs).unwrap();
//! assert_eq!(text, ".\n└── a\n    └── b.txt\n".as_bytes());
//! ```
//!
//! File content and properties are not part of the text: decoding gives empty
//! files and default modes.

mod decode;
mod dialect;
mod encode;

use std::io::{BufRead, Write};

pub use dialect::{Tab, Unix};

use crate::{MapFS, Result};

/// The part of a line being written by [`Dialect::encode`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EncodingState {
    /// Indentation under an ancestor that has siblings left (`"│   "`).
    Level,
    /// Indentation under an ancestor that was the last sibling (`"    "`).
    LevelLast,
    /// The node itself, with siblings following (`"├── "`).
    Item,
    /// The node itself, the last sibling (`"└── "`).
    ItemLast,
}

/// A text convention for trees.
pub trait Dialect {
    /// Parses a non-blank line, without its line ending, into the depth and the name of a node.
    /// Returns `None` if the line is malformed.
    fn decode_line<'a>(&self, line: &'a str) -> Option<(usize, &'a str)>;

    /// Returns the prefix written for `state`.
    fn encode_state(&self, state: EncodingState) -> &'static str;

    /// Returns `true` for a line that ends the tree, like the summary printed by `tree`.
    fn is_trailer(&self, _line: &str) -> bool {
        false
    }

    /// Text written after the last node, given the number of directories and files.
    fn trailer(&self, _dirs: usize, _files: usize) -> Option<String> {
        None
    }

    /// Builds a tree from its text representation.
    ///
    /// The first line is either `"."` or a path, which is created and decoded
    /// into. Decoding stops at a blank line, a trailer or the end of input; the
    /// rest of the input is always consumed, also on failure.
    fn decode<R: BufRead>(&self, reader: R) -> Result<MapFS> {
        decode::decode(self, reader)
    }

    /// Writes the text representation of the tree.
    fn encode<W: Write>(&self, fs: &MapFS, writer: W) -> Result<()> {
        encode::encode(self, fs, writer)
    }
}

/// Serializes the tree as the `tree` command prints it (without the summary).
pub fn marshal_unix(fs: &MapFS) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(128);
    Unix::default().encode(fs, &mut buf)?;
    Ok(buf)
}

/// Builds a tree from the output of the `tree` command.
pub fn unmarshal_unix(text: &[u8]) -> Result<MapFS> {
    Unix::default().decode(text)
}

/// Serializes the tree as tab-indented text.
pub fn marshal_tab(fs: &MapFS) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    Tab.encode(fs, &mut buf)?;
    Ok(buf)
}

/// Builds a tree from tab-indented text.
pub fn unmarshal_tab(text: &[u8]) -> Result<MapFS> {
    Tab.decode(text)
}
