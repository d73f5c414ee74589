//! Error types for vtfs operations.
//!
//! Two layers:
//!
//! - [`StoreError`]: what a storage backend reports from inside a transaction.
//! - [`FsError`]: the closed taxonomy every filesystem operation returns. Each
//!   variant maps to exactly one POSIX errno, emitted negated on the wire.

use snafu::Snafu;

use crate::types::InodeNumber;

/// Errors from store operations inside a transaction.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    /// A row with the same unique key already exists.
    #[snafu(display("unique constraint violated on {table}"))]
    UniqueViolation {
        /// Table holding the constraint.
        table: &'static str,
    },

    /// A row that must exist for the mutation is missing.
    #[snafu(display("{table} row {key} not found"))]
    MissingRow {
        /// Table that was searched.
        table: &'static str,
        /// Human-readable key.
        key: String,
    },

    /// A mutation would break a stored invariant.
    #[snafu(display("store invariant violated: {reason}"))]
    InvariantViolation {
        /// What would have been broken.
        reason: String,
    },

    /// A mutation was attempted through a read transaction.
    #[snafu(display("write attempted in a read-only transaction"))]
    ReadOnlyTransaction,

    /// A fault injected by a test backend fired.
    #[snafu(display("injected fault at {point}"))]
    InjectedFault {
        /// Name of the injection point.
        point: &'static str,
    },

    /// The underlying backend failed.
    #[snafu(display("storage backend failure: {source}"))]
    Backend {
        /// The backend-specific error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StoreError {
    /// Wrap a backend-specific error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        StoreError::Backend { source: Box::new(err) }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { .. })
    }
}

/// POSIX errno values understood by the kernel client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i64)]
pub enum Errno {
    Eperm = 1,
    Enoent = 2,
    Enomem = 12,
    Eexist = 17,
    Enotdir = 20,
    Eisdir = 21,
    Einval = 22,
    Enotempty = 39,
}

impl Errno {
    /// Positive errno value.
    pub fn value(self) -> i64 {
        self as i64
    }

    /// Status code as emitted on the wire (negated errno).
    pub fn wire_code(self) -> i64 {
        -(self as i64)
    }
}

/// Errors returned by filesystem operations.
///
/// This is a closed set: storage failures that are not one of the domain
/// conditions collapse into [`FsError::OutOfResources`].
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum FsError {
    /// Malformed, missing or out-of-range parameter.
    #[snafu(display("invalid argument: {reason}"))]
    InvalidArgument {
        /// Which parameter was rejected and why.
        reason: String,
    },

    /// Referenced entry or inode does not exist.
    #[snafu(display("{what} not found"))]
    NotFound {
        /// Description of the missing object.
        what: String,
    },

    /// Name already bound in the parent directory.
    #[snafu(display("entry '{name}' already exists"))]
    AlreadyExists {
        /// The colliding name (or token for namespaces).
        name: String,
    },

    /// Inode was expected to be a directory.
    #[snafu(display("inode {ino} is not a directory"))]
    NotADirectory {
        /// Offending inode number.
        ino: InodeNumber,
    },

    /// Inode was expected to be a regular file.
    #[snafu(display("inode {ino} is a directory"))]
    IsADirectory {
        /// Offending inode number.
        ino: InodeNumber,
    },

    /// Directory still owns entries.
    #[snafu(display("directory {ino} is not empty"))]
    DirectoryNotEmpty {
        /// Offending directory inode number.
        ino: InodeNumber,
    },

    /// Protected object violation.
    #[snafu(display("operation not permitted: {reason}"))]
    OperationNotPermitted {
        /// Which protection was hit.
        reason: String,
    },

    /// Unexpected internal or storage failure.
    ///
    /// The source is kept for logging only and never reaches the wire.
    #[snafu(display("out of resources"))]
    OutOfResources {
        /// The underlying store failure.
        source: StoreError,
    },
}

impl FsError {
    /// Errno this error maps to.
    pub fn errno(&self) -> Errno {
        match self {
            FsError::InvalidArgument { .. } => Errno::Einval,
            FsError::NotFound { .. } => Errno::Enoent,
            FsError::AlreadyExists { .. } => Errno::Eexist,
            FsError::NotADirectory { .. } => Errno::Enotdir,
            FsError::IsADirectory { .. } => Errno::Eisdir,
            FsError::DirectoryNotEmpty { .. } => Errno::Enotempty,
            FsError::OperationNotPermitted { .. } => Errno::Eperm,
            FsError::OutOfResources { .. } => Errno::Enomem,
        }
    }

    /// Negative status code for the response frame.
    pub fn wire_code(&self) -> i64 {
        self.errno().wire_code()
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        FsError::InvalidArgument { reason: reason.into() }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        FsError::NotFound { what: what.into() }
    }

    pub fn not_permitted(reason: impl Into<String>) -> Self {
        FsError::OperationNotPermitted { reason: reason.into() }
    }
}

impl From<StoreError> for FsError {
    fn from(source: StoreError) -> Self {
        FsError::OutOfResources { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_values() {
        assert_eq!(Errno::Eperm.value(), 1);
        assert_eq!(Errno::Enoent.value(), 2);
        assert_eq!(Errno::Enomem.value(), 12);
        assert_eq!(Errno::Eexist.value(), 17);
        assert_eq!(Errno::Enotdir.value(), 20);
        assert_eq!(Errno::Eisdir.value(), 21);
        assert_eq!(Errno::Einval.value(), 22);
        assert_eq!(Errno::Enotempty.value(), 39);
    }

    #[test]
    fn test_wire_code_is_negated() {
        assert_eq!(FsError::not_found("inode 5").wire_code(), -2);
        assert_eq!(FsError::DirectoryNotEmpty { ino: 1001 }.wire_code(), -39);
        assert_eq!(FsError::invalid("offset").wire_code(), -22);
    }

    #[test]
    fn test_store_error_collapses_to_out_of_resources() {
        let err: FsError = StoreError::ReadOnlyTransaction.into();
        assert_eq!(err.errno(), Errno::Enomem);
        // Diagnostic detail stays in the source chain, not the message.
        assert_eq!(err.to_string(), "out of resources");
    }

    #[test]
    fn test_unique_violation_predicate() {
        assert!(StoreError::UniqueViolation { table: "dir_entries" }.is_unique_violation());
        assert!(!StoreError::ReadOnlyTransaction.is_unique_violation());
    }
}
