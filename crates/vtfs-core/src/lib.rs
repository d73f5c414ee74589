//! Core types and traits for the vtfs metadata backend.
//!
//! This crate holds everything the orchestration layer and the storage
//! backends agree on: the filesystem data model, the closed error taxonomy
//! with its errno mapping, the store traits, and the fixed binary layouts
//! the kernel client parses.
//!
//! # Key Components
//!
//! - **Types**: `Namespace`, `Inode`, `NodeKind`, `DirectoryEntry`
//! - **Traits**: `NamespaceStore`, `InodeStore`, `DirectoryStore`, `ContentStore`,
//!   `StoreTransaction`, `StorageBackend`
//! - **Wire**: `NodeMeta`, `Dirent`, `ResponseFrame`
//! - **In-memory backend**: `MemoryBackend` with one-shot fault injection for tests
//! - **Constants**: Tiger Style resource limits and well-known numbers

pub mod constants;
pub mod error;
pub mod inmemory;
pub mod traits;
pub mod types;
pub mod wire;

pub use constants::DIRENT_NAME_LEN;
pub use constants::DIRENT_SIZE;
pub use constants::MAX_FILE_SIZE;
pub use constants::MAX_NAME_LEN;
pub use constants::NODE_META_SIZE;
pub use constants::ROOT_INODE;
pub use constants::ROOT_MODE;
pub use error::Errno;
pub use error::FsError;
pub use error::StoreError;
pub use inmemory::FaultPoint;
pub use inmemory::MemoryBackend;
pub use inmemory::MemoryTransaction;
pub use traits::ContentStore;
pub use traits::DirectoryStore;
pub use traits::InodeStore;
pub use traits::NamespaceStore;
pub use traits::StorageBackend;
pub use traits::StoreTransaction;
pub use types::DirectoryEntry;
pub use types::Inode;
pub use types::InodeNumber;
pub use types::Namespace;
pub use types::NodeKind;
pub use wire::Dirent;
pub use wire::NodeMeta;
pub use wire::ResponseFrame;
