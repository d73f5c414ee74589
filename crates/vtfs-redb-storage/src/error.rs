//! Error types for redb storage operations.
//!
//! Every variant surfaces to filesystem callers as the catch-all
//! out-of-resources error; the detail exists for the server log.

use std::path::PathBuf;

use snafu::Snafu;
use vtfs_core::StoreError;

/// Errors from RedbBackend operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RedbStoreError {
    /// The data directory for the vtfs database could not be created at startup.
    #[snafu(display("failed to create vtfs data directory {}: {source}", path.display()))]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The vtfs database file is missing, locked by another process or corrupt.
    #[snafu(display("failed to open vtfs database at {}: {source}", path.display()))]
    OpenDatabase {
        path: PathBuf,
        #[snafu(source(from(redb::DatabaseError, Box::new)))]
        source: Box<redb::DatabaseError>,
    },

    /// A mutating filesystem call could not start its transaction.
    #[snafu(display("cannot start mutating filesystem transaction: {source}"))]
    BeginWrite {
        #[snafu(source(from(redb::TransactionError, Box::new)))]
        source: Box<redb::TransactionError>,
    },

    /// A read-only filesystem call (lookup, read, iterate_dir...) could not start its snapshot.
    #[snafu(display("cannot start read-only filesystem snapshot: {source}"))]
    BeginRead {
        #[snafu(source(from(redb::TransactionError, Box::new)))]
        source: Box<redb::TransactionError>,
    },

    /// One of the namespaces, inodes, dir_entries or contents tables is unreadable.
    #[snafu(display("cannot open vtfs table: {source}"))]
    OpenTable {
        #[snafu(source(from(redb::TableError, Box::new)))]
        source: Box<redb::TableError>,
    },

    /// The operation's changes were not made durable; none of them are visible.
    #[snafu(display("filesystem change not committed: {source}"))]
    Commit {
        #[snafu(source(from(redb::CommitError, Box::new)))]
        source: Box<redb::CommitError>,
    },

    /// Writing a namespace, inode, entry or content row failed.
    #[snafu(display("cannot store vtfs row: {source}"))]
    Insert {
        #[snafu(source(from(redb::StorageError, Box::new)))]
        source: Box<redb::StorageError>,
    },

    /// Point lookup of a vtfs row failed at the storage layer (not "row absent").
    #[snafu(display("cannot load vtfs row: {source}"))]
    Get {
        #[snafu(source(from(redb::StorageError, Box::new)))]
        source: Box<redb::StorageError>,
    },

    /// Deleting an entry, inode or content row failed.
    #[snafu(display("cannot delete vtfs row: {source}"))]
    Remove {
        #[snafu(source(from(redb::StorageError, Box::new)))]
        source: Box<redb::StorageError>,
    },

    /// Positioning a directory listing scan failed.
    #[snafu(display("cannot scan directory entries: {source}"))]
    Range {
        #[snafu(source(from(redb::StorageError, Box::new)))]
        source: Box<redb::StorageError>,
    },

    /// Reading the next entry of a directory listing scan failed.
    #[snafu(display("directory scan interrupted: {source}"))]
    Iterator {
        #[snafu(source(from(redb::StorageError, Box::new)))]
        source: Box<redb::StorageError>,
    },

    /// A namespace or inode record could not be bincode-encoded.
    #[snafu(display("cannot encode vtfs record: {source}"))]
    Serialize {
        #[snafu(source(from(bincode::Error, Box::new)))]
        source: Box<bincode::Error>,
    },

    /// A stored namespace or inode record does not decode; the file is corrupt
    /// or was written by an incompatible version.
    #[snafu(display("corrupt vtfs record: {source}"))]
    Deserialize {
        #[snafu(source(from(bincode::Error, Box::new)))]
        source: Box<bincode::Error>,
    },
}

impl From<RedbStoreError> for StoreError {
    fn from(err: RedbStoreError) -> Self {
        StoreError::backend(err)
    }
}

#[cfg(test)]
mod tests {
    use snafu::ResultExt;
    use vtfs_core::Namespace;

    use super::*;

    #[test]
    fn test_corrupt_record_becomes_backend_error() {
        let err = bincode::deserialize::<Namespace>(&[0xff])
            .context(DeserializeSnafu)
            .unwrap_err();
        assert!(err.to_string().starts_with("corrupt vtfs record"));

        let store_err = StoreError::from(err);
        assert!(matches!(store_err, StoreError::Backend { .. }));
        assert!(!store_err.is_unique_violation());
    }
}
