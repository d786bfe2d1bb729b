//! The node model of the in-memory tree.
//!
//! A tree is a [`Directory`] whose entries map names to [`Node`]s. Directories
//! are held behind [`DirRef`] (shared ownership), so views made by `MapFS::cd`
//! and open handles alias the same subtree instead of copying it.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::SystemTime;

use crate::core::utils;
use crate::{Error, ErrorKind, Result};

/// Default file mode creation mask.
pub const DEFAULT_UMASK: u32 = 0o002;

/// Shared handle to a directory node.
pub type DirRef = Rc<RefCell<Directory>>;

/// Permission bits and modification time of a node.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Property {
    pub mode: u32,
    pub mod_time: SystemTime,
}

impl Property {
    pub fn new(mode: u32) -> Property {
        Property {
            mode,
            mod_time: SystemTime::now(),
        }
    }

    /// `0666 & !umask`
    pub fn file(umask: u32) -> Property {
        Property::new(0o666 & !umask)
    }

    /// `0777 & !umask`
    pub fn dir(umask: u32) -> Property {
        Property::new(0o777 & !umask)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileNode {
    pub property: Property,
    pub content: Vec<u8>,
}

impl FileNode {
    pub fn new(property: Property) -> FileNode {
        FileNode {
            property,
            content: Vec::new(),
        }
    }

    pub fn with_content(property: Property, content: &[u8]) -> FileNode {
        FileNode {
            property,
            content: content.to_vec(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    File(FileNode),
    Directory(DirRef),
}

impl Node {
    pub fn is_file(&self) -> bool {
        matches!(self, Node::File(_))
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Directory(_))
    }

    pub fn property(&self) -> Property {
        match self {
            Node::File(file) => file.property,
            Node::Directory(dir) => dir.borrow().property,
        }
    }

    /// Content length for files, 0 for directories.
    pub fn size(&self) -> u64 {
        match self {
            Node::File(file) => file.content.len() as u64,
            Node::Directory(_) => 0,
        }
    }

    pub fn as_dir(&self) -> Option<&DirRef> {
        match self {
            Node::Directory(dir) => Some(dir),
            Node::File(_) => None,
        }
    }
}

/// A directory node. Entry names are unique, non-empty and never contain the
/// path separator; [`Directory::insert`] enforces it.
#[derive(Debug, Clone)]
pub struct Directory {
    pub property: Property,
    entries: BTreeMap<String, Node>,
}

impl Directory {
    pub fn new(property: Property) -> Directory {
        Directory {
            property,
            entries: BTreeMap::new(),
        }
    }

    /// Creates a new empty shared directory.
    pub fn shared(property: Property) -> DirRef {
        Rc::new(RefCell::new(Directory::new(property)))
    }

    /// Inserts `node` under `name`, replacing any previous entry.
    pub fn insert(&mut self, name: &str, node: Node) -> Result<Option<Node>> {
        if !utils::is_valid_name(name) {
            return Err(Error::path("insert", name, ErrorKind::InvalidPath));
        }
        Ok(self.entries.insert(name.to_owned(), node))
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.entries.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.entries.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Node> {
        self.entries.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns the child directory `name`, if there is one.
    pub fn child_dir(&self, name: &str) -> Option<DirRef> {
        self.entries.get(name).and_then(Node::as_dir).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry names in lexical ascending order.
    pub fn names(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in lexical ascending order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(name, node)| (name.as_str(), node))
    }
}
