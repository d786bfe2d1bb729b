//! In-memory file trees, interchangeable filesystems and a `tree` text codec.
//!
//! ### Overview
//!
//! `vfs-tree` lets code work against a filesystem-like API without caring whether the files
//! live on disk or in memory. It defines the [`Filesystem`] and [`File`] traits and provides
//! three implementations: [`MapFS`] (an in-memory tree), [`DirFS`] (a host directory) and
//! [`TeeFS`] (a decorator that records on a second filesystem what was read from the first).
//!
//! **Key ideas**:
//! - **Abstraction**: utilities such as [`fsutil::Control`] are written once against the traits.
//! - **Views**: [`MapFS::cd`] returns a view sharing the subtree, never a copy.
//! - **Text trees**: [`tree`] reads and writes the output of the Unix `tree` command, or a
//!   tab-indented variant, so fixtures are written as text.
//! - **Integrity**: [`integrity::compare`] and [`integrity::fsck`] check the shape of trees.
//! - **Errors**: every failure is an [`Error`] whose [`ErrorKind`] can be tested without
//!   looking at messages.
//!
//! ```
//! use vfs_tree::{File, Filesystem, TeeFS, tree};
//!
//! let disk = tree::unmarshal_tab(b".\nsrc\n\tlib.rs\n\tbin\n\t\tmain.rs\nREADME.md\n").unwrap();
//! let seen = vfs_tree::MapFS::new();
//! let tee = TeeFS::new(&disk, seen.clone());
//!
//! tee.open("/src").unwrap().readdir().unwrap();
//! assert_eq!(
//!     tree::marshal_unix(&seen).unwrap(),
//!     ".\n└── src\n    ├── bin/\n    └── lib.rs\n".as_bytes(),
//! );
//! ```
//!
//! None of the filesystems is safe for concurrent mutation.

mod core;
mod error;
mod vfs;

pub mod fsutil;
pub mod integrity;
pub mod tree;

pub use crate::core::{File, Filesystem, Result, WalkControl, utils};
pub use crate::error::{Error, ErrorKind};
pub use crate::vfs::*;
