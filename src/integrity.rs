//! Structural checks over the in-memory tree.
//!
//! Both functions walk the tree with an explicit worklist, so the depth of a
//! tree is bounded by memory only.

use std::collections::HashSet;
use std::rc::Rc;

use tracing::debug;

use crate::MapFS;
use crate::core::utils;
use crate::vfs::entry::{DirRef, Node};

/// Returns `true` if both trees have the same shape: the same names at every
/// level, each naming the same kind of node. Content and properties are not
/// compared.
///
/// The trees must pass [`fsck`]; a tree that contains itself is walked forever.
pub fn compare(lhs: &MapFS, rhs: &MapFS) -> bool {
    let mut glob: Vec<(DirRef, DirRef)> = vec![(lhs.tree().clone(), rhs.tree().clone())];
    while let Some((lhs, rhs)) = glob.pop() {
        if Rc::ptr_eq(&lhs, &rhs) {
            continue;
        }
        let (lhs, rhs) = (lhs.borrow(), rhs.borrow());
        if lhs.len() != rhs.len() {
            return false;
        }
        for (name, left) in lhs.iter() {
            match (left, rhs.get(name)) {
                (Node::File(_), Some(Node::File(_))) => {}
                (Node::Directory(l), Some(Node::Directory(r))) => glob.push((l.clone(), r.clone())),
                _ => return false,
            }
        }
    }
    true
}

/// Checks the invariants of the tree: every entry name is valid, and every
/// directory is reached exactly once from the root.
///
/// The public API keeps both; a tree built by inserting one [`DirRef`] twice,
/// or into itself, fails the check.
pub fn fsck(fs: &MapFS) -> bool {
    let mut seen = HashSet::new();
    let mut glob = vec![fs.tree().clone()];
    while let Some(dir) = glob.pop() {
        if !seen.insert(Rc::as_ptr(&dir)) {
            debug!("fsck: directory reached twice");
            return false;
        }
        for (name, node) in dir.borrow().iter() {
            if !utils::is_valid_name(name) {
                debug!(name, "fsck: invalid entry name");
                return false;
            }
            if let Node::Directory(sub) = node {
                glob.push(sub.clone());
            }
        }
    }
    true
}
