//! Per-tenant namespace lifecycle.

use std::sync::Arc;

use tracing::debug;
use vtfs_core::FsError;
use vtfs_core::Inode;
use vtfs_core::InodeNumber;
use vtfs_core::InodeStore;
use vtfs_core::Namespace;
use vtfs_core::NamespaceStore;
use vtfs_core::NodeKind;
use vtfs_core::ROOT_INODE;
use vtfs_core::ROOT_MODE;
use vtfs_core::StorageBackend;
use vtfs_core::StoreError;
use vtfs_core::StoreTransaction;
use vtfs_core::types::now_unix_ms;

/// Creates namespaces and hands out inode numbers.
///
/// The namespace table's uniqueness constraint on the token is the only
/// serialization point between concurrent creators.
pub struct NamespaceManager<B> {
    backend: Arc<B>,
}

impl<B> Clone for NamespaceManager<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: StorageBackend> NamespaceManager<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Return the namespace for `token`, creating it with its root on first access.
    ///
    /// Losing a creation race is not an error: the winner's row is re-read.
    pub fn get_or_create(&self, token: &str) -> Result<Namespace, FsError> {
        if let Some(namespace) = self.read(token)? {
            return Ok(namespace);
        }

        let mut txn = self.backend.begin_write()?;
        let created = insert_namespace(&mut txn, token).and_then(|namespace| txn.commit().map(|()| namespace));
        match created {
            Ok(namespace) => {
                debug!(token, root_ino = namespace.root_ino, "namespace created");
                Ok(namespace)
            }
            Err(err) if err.is_unique_violation() => {
                debug!(token, "namespace created concurrently, re-reading");
                self.read(token)?.ok_or_else(|| FsError::not_found(format!("namespace {token}")))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Create the namespace for `token`. Fails with `AlreadyExists` if it exists.
    pub fn create(&self, token: &str) -> Result<Namespace, FsError> {
        let mut txn = self.backend.begin_write()?;
        if txn.get_namespace(token)?.is_some() {
            return Err(FsError::AlreadyExists { name: token.to_string() });
        }
        let created = insert_namespace(&mut txn, token).and_then(|namespace| txn.commit().map(|()| namespace));
        match created {
            Ok(namespace) => {
                debug!(token, root_ino = namespace.root_ino, "namespace initialized");
                Ok(namespace)
            }
            Err(err) if err.is_unique_violation() => Err(FsError::AlreadyExists { name: token.to_string() }),
            Err(err) => Err(err.into()),
        }
    }

    /// Take the next inode number inside the caller's transaction.
    ///
    /// Must run in the same transaction that creates the inode.
    pub fn allocate_inode<T: NamespaceStore>(txn: &mut T, token: &str) -> Result<InodeNumber, FsError> {
        let ino = txn.allocate_inode(token)?;
        debug!(token, ino, "allocated inode number");
        Ok(ino)
    }

    /// Burn `ino` so it is never handed out, in a transaction of its own.
    pub fn retire(&self, token: &str, ino: InodeNumber) -> Result<(), FsError> {
        let mut txn = self.backend.begin_write()?;
        txn.retire_inode_number(token, ino)?;
        txn.commit()?;
        Ok(())
    }

    fn read(&self, token: &str) -> Result<Option<Namespace>, FsError> {
        let txn = self.backend.begin_read()?;
        Ok(txn.get_namespace(token)?)
    }
}

/// Insert the namespace row and its root directory.
fn insert_namespace<T: NamespaceStore + InodeStore>(txn: &mut T, token: &str) -> Result<Namespace, StoreError> {
    let namespace = Namespace {
        token: token.to_string(),
        root_ino: ROOT_INODE,
        next_ino: ROOT_INODE + 1,
        created_at_ms: now_unix_ms(),
    };
    txn.create_namespace(&namespace)?;
    txn.create_inode(&Inode::new(token, ROOT_INODE, NodeKind::Directory, ROOT_MODE))?;
    Ok(namespace)
}
