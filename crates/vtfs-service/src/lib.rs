//! Filesystem semantics for vtfs.
//!
//! [`FileSystemService`] is the operation orchestrator: it validates
//! preconditions, runs each mutation as exactly one transaction against a
//! [`vtfs_core::StorageBackend`], and reports results through the closed
//! [`vtfs_core::FsError`] taxonomy. [`NamespaceManager`] owns the per-tenant
//! root and inode counter.
//!
//! The service is synchronous. Async callers should run it on a blocking pool.

mod namespace;
mod service;
pub mod validation;

pub use namespace::NamespaceManager;
pub use service::FileSystemService;
