//! Error taxonomy shared by every filesystem implementation in the crate.
//!
//! Failures that concern a path are reported as an `{operation, path, cause}`
//! triple ([`Error::Path`]); callers branch on [`Error::kind`] rather than on
//! message text.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Cause category of an [`Error`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A path segment does not exist.
    NotExist,
    /// A path segment that must be a directory is a file.
    NotADirectory,
    /// A file operation was attempted on a directory.
    IsADirectory,
    /// The operation is never allowed (e.g. removing the root).
    PermissionDenied,
    /// The path or entry name cannot be represented in the tree.
    InvalidPath,
    /// The handle was already closed.
    Closed,
    /// The tree violates its structural invariants.
    Corrupted,
    /// A tree text line could not be parsed.
    MalformedTree,
    /// Any other host I/O failure.
    Other,
}

impl ErrorKind {
    fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotExist => "file does not exist",
            ErrorKind::NotADirectory => "not a directory",
            ErrorKind::IsADirectory => "is a directory",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::InvalidPath => "invalid path",
            ErrorKind::Closed => "file already closed",
            ErrorKind::Corrupted => "tree is corrupted",
            ErrorKind::MalformedTree => "malformed tree",
            ErrorKind::Other => "i/o error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<io::ErrorKind> for ErrorKind {
    fn from(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::NotFound => ErrorKind::NotExist,
            io::ErrorKind::NotADirectory => ErrorKind::NotADirectory,
            io::ErrorKind::IsADirectory => ErrorKind::IsADirectory,
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            io::ErrorKind::InvalidInput => ErrorKind::InvalidPath,
            _ => ErrorKind::Other,
        }
    }
}

/// Errors returned by filesystem, codec and integrity operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An operation on a path failed.
    #[error("{op} {}: {kind}", path.display())]
    Path {
        /// Name of the failed operation (`"open"`, `"mkdir"`, ...).
        op: &'static str,
        /// The path as given by the caller.
        path: PathBuf,
        /// Cause category.
        kind: ErrorKind,
        /// Underlying host error, if any.
        #[source]
        source: Option<io::Error>,
    },

    /// A tree text line could not be parsed by the dialect.
    #[error("malformed tree at line {line}: {text:?}")]
    MalformedTree {
        /// 1-based line number.
        line: usize,
        /// The offending line, trimmed.
        text: String,
    },

    /// The tree violates its structural invariants.
    #[error("tree is corrupted")]
    Corrupted,

    /// Reading or writing a text stream failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn path<P: AsRef<Path>>(op: &'static str, path: P, kind: ErrorKind) -> Self {
        Error::Path {
            op,
            path: path.as_ref().to_path_buf(),
            kind,
            source: None,
        }
    }

    /// Wraps a host error, keeping its cause category.
    pub(crate) fn host<P: AsRef<Path>>(op: &'static str, path: P, err: io::Error) -> Self {
        Error::Path {
            op,
            path: path.as_ref().to_path_buf(),
            kind: err.kind().into(),
            source: Some(err),
        }
    }

    /// Returns the cause category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Path { kind, .. } => *kind,
            Error::MalformedTree { .. } => ErrorKind::MalformedTree,
            Error::Corrupted => ErrorKind::Corrupted,
            // Unreadable codec input.
            Error::Io(err) if err.kind() == io::ErrorKind::InvalidData => ErrorKind::MalformedTree,
            Error::Io(err) => err.kind().into(),
        }
    }

    /// Returns `true` if a path segment does not exist.
    pub fn is_not_exist(&self) -> bool {
        self.kind() == ErrorKind::NotExist
    }

    /// Returns `true` if a path segment is not a directory.
    pub fn is_not_a_directory(&self) -> bool {
        self.kind() == ErrorKind::NotADirectory
    }

    /// Returns `true` if the path denotes a directory where a file was expected.
    pub fn is_a_directory(&self) -> bool {
        self.kind() == ErrorKind::IsADirectory
    }

    /// Returns `true` if the operation is forbidden.
    pub fn is_permission_denied(&self) -> bool {
        self.kind() == ErrorKind::PermissionDenied
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match err.kind() {
            ErrorKind::NotExist => io::ErrorKind::NotFound,
            ErrorKind::NotADirectory => io::ErrorKind::NotADirectory,
            ErrorKind::IsADirectory => io::ErrorKind::IsADirectory,
            ErrorKind::PermissionDenied => io::ErrorKind::PermissionDenied,
            ErrorKind::InvalidPath => io::ErrorKind::InvalidInput,
            ErrorKind::Corrupted | ErrorKind::MalformedTree => io::ErrorKind::InvalidData,
            ErrorKind::Closed | ErrorKind::Other => io::ErrorKind::Other,
        };
        match err {
            Error::Io(err) => err,
            err => io::Error::new(kind, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_error_message() {
        let err = Error::path("remove", "/dir", ErrorKind::IsADirectory);
        assert_eq!(err.to_string(), "remove /dir: is a directory");
        assert!(err.is_a_directory());
    }

    #[test]
    fn test_host_error_keeps_category() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err = Error::host("open", "/x", io_err);
        assert!(err.is_not_exist());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_into_io_error() {
        let err: io::Error = Error::path("read", "/d", ErrorKind::IsADirectory).into();
        assert_eq!(err.kind(), io::ErrorKind::IsADirectory);

        let err: io::Error = Error::MalformedTree {
            line: 2,
            text: "x".into(),
        }
        .into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_kind_of_wrapped_io() {
        let err = Error::from(io::Error::new(io::ErrorKind::PermissionDenied, "no"));
        assert!(err.is_permission_denied());

        let err = Error::from(io::Error::new(io::ErrorKind::InvalidData, "not utf-8"));
        assert_eq!(err.kind(), ErrorKind::MalformedTree);
        let err = Error::host("open", "/x", io::Error::new(io::ErrorKind::InvalidData, "bad"));
        assert_eq!(err.kind(), ErrorKind::Other);
    }
}
