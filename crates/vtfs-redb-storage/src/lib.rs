//! Redb-based storage backend for vtfs.
//!
//! Implements the vtfs store traits on top of the redb embedded database.
//! redb provides serializable write transactions (one writer at a time) and
//! MVCC snapshots for readers, which covers the isolation the orchestrator
//! needs: relative ref-count adjustments cannot lose updates, and a reader
//! never observes a half-applied mutation.
//!
//! # Tables
//!
//! | Table | Key | Value |
//! |---|---|---|
//! | `namespaces` | token | bincode `Namespace` |
//! | `inodes` | (token, ino) | bincode `Inode` |
//! | `dir_entries` | (token, parent, name) | target ino |
//! | `contents` | (token, ino) | raw bytes |
//!
//! Directory entries are keyed so that a range scan over `(token, parent, "")..`
//! yields a directory's entries in ascending byte order of the name.

mod backend;
mod error;
mod transaction;

pub use backend::RedbBackend;
pub use error::RedbStoreError;
pub use transaction::RedbTransaction;
