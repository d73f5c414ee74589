//! Store traits for vtfs.
//!
//! The orchestrator never talks to a database directly. It acquires a
//! transaction from a [`StorageBackend`] at the start of each call and passes
//! it by reference to the four store interfaces below. Every method runs
//! inside that transaction; nothing is visible to other transactions until
//! [`StoreTransaction::commit`] returns, and dropping an uncommitted
//! transaction discards all of its effects.

use crate::error::StoreError;
use crate::types::DirectoryEntry;
use crate::types::Inode;
use crate::types::InodeNumber;
use crate::types::Namespace;
use crate::types::NodeKind;

/// Per-tenant root and inode-counter storage.
pub trait NamespaceStore {
    /// Fetch a namespace. `None` if the token was never initialized.
    fn get_namespace(&self, token: &str) -> Result<Option<Namespace>, StoreError>;

    /// Insert a namespace row.
    ///
    /// Fails with [`StoreError::UniqueViolation`] if the token already exists.
    fn create_namespace(&mut self, namespace: &Namespace) -> Result<(), StoreError>;

    /// Return the namespace's next inode number and advance the counter.
    fn allocate_inode(&mut self, token: &str) -> Result<InodeNumber, StoreError>;

    /// Ensure the counter is strictly greater than `ino`.
    ///
    /// Used to burn a number whose creating transaction rolled back.
    fn retire_inode_number(&mut self, token: &str, ino: InodeNumber) -> Result<(), StoreError>;
}

/// Inode metadata storage.
pub trait InodeStore {
    fn get_inode(&self, token: &str, ino: InodeNumber) -> Result<Option<Inode>, StoreError>;

    /// Insert an inode row. Fails with [`StoreError::UniqueViolation`] on a duplicate number.
    fn create_inode(&mut self, inode: &Inode) -> Result<(), StoreError>;

    fn update_size(&mut self, token: &str, ino: InodeNumber, size: u64) -> Result<(), StoreError>;

    /// Apply a relative adjustment to the reference count and return the new count.
    ///
    /// The adjustment is performed by the store within the caller's
    /// transaction. A result below zero is an invariant violation.
    fn adjust_ref_count(&mut self, token: &str, ino: InodeNumber, delta: i32) -> Result<u32, StoreError>;

    /// Delete an inode and any content it owns.
    fn delete_inode(&mut self, token: &str, ino: InodeNumber) -> Result<(), StoreError>;

    /// `true` iff the inode exists and has the given kind.
    fn is_kind(&self, token: &str, ino: InodeNumber, kind: NodeKind) -> Result<bool, StoreError> {
        Ok(self.get_inode(token, ino)?.is_some_and(|inode| inode.kind == kind))
    }
}

/// Name to inode bindings, one table per (namespace, parent).
pub trait DirectoryStore {
    fn lookup_entry(&self, token: &str, parent: InodeNumber, name: &str) -> Result<Option<InodeNumber>, StoreError>;

    fn entry_exists(&self, token: &str, parent: InodeNumber, name: &str) -> Result<bool, StoreError> {
        Ok(self.lookup_entry(token, parent, name)?.is_some())
    }

    /// Bind `name` under `parent`. Fails with [`StoreError::UniqueViolation`] if already bound.
    fn create_entry(
        &mut self,
        token: &str,
        parent: InodeNumber,
        name: &str,
        target: InodeNumber,
    ) -> Result<(), StoreError>;

    /// Remove a binding. Fails with [`StoreError::MissingRow`] if absent.
    fn delete_entry(&mut self, token: &str, parent: InodeNumber, name: &str) -> Result<(), StoreError>;

    /// `true` iff no entry has `dir` as its parent.
    fn is_empty(&self, token: &str, dir: InodeNumber) -> Result<bool, StoreError>;

    /// All entries of `parent`, ascending by name (byte order).
    fn entries(&self, token: &str, parent: InodeNumber) -> Result<Vec<DirectoryEntry>, StoreError>;

    /// Entry at zero-based `offset` in the ordering of [`DirectoryStore::entries`].
    fn entry_at(&self, token: &str, parent: InodeNumber, offset: u64) -> Result<Option<DirectoryEntry>, StoreError> {
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        Ok(self.entries(token, parent)?.into_iter().nth(offset))
    }
}

/// Whole-blob file content storage.
pub trait ContentStore {
    /// Full content. Empty if no row exists.
    fn get_content(&self, token: &str, ino: InodeNumber) -> Result<Vec<u8>, StoreError>;

    /// Up to `len` bytes starting at `offset`, clamped to end of content.
    fn get_content_range(&self, token: &str, ino: InodeNumber, offset: u64, len: u64) -> Result<Vec<u8>, StoreError> {
        let content = self.get_content(token, ino)?;
        Ok(clamp_range(&content, offset, len).to_vec())
    }

    /// Replace the whole content (upsert).
    fn set_content(&mut self, token: &str, ino: InodeNumber, data: &[u8]) -> Result<(), StoreError>;

    fn delete_content(&mut self, token: &str, ino: InodeNumber) -> Result<(), StoreError>;
}

/// A unit of work across all four stores.
///
/// Dropping without calling [`StoreTransaction::commit`] rolls back.
pub trait StoreTransaction: NamespaceStore + InodeStore + DirectoryStore + ContentStore {
    fn commit(self) -> Result<(), StoreError>;
}

/// Factory for transactions against one durable store.
///
/// Backends must provide at least read-committed isolation, and must apply
/// [`InodeStore::adjust_ref_count`] without losing concurrent updates.
pub trait StorageBackend: Send + Sync + 'static {
    type Transaction<'a>: StoreTransaction
    where
        Self: 'a;

    /// Begin a transaction that only reads. Mutations fail with
    /// [`StoreError::ReadOnlyTransaction`].
    fn begin_read(&self) -> Result<Self::Transaction<'_>, StoreError>;

    fn begin_write(&self) -> Result<Self::Transaction<'_>, StoreError>;
}

/// Slice of `content` covering `[offset, offset + len)`, clamped to its end.
pub fn clamp_range(content: &[u8], offset: u64, len: u64) -> &[u8] {
    let total = content.len() as u64;
    if offset >= total {
        return &[];
    }
    let end = offset.saturating_add(len).min(total);
    &content[offset as usize..end as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_range() {
        let content = b"hello world";
        assert_eq!(clamp_range(content, 0, 5), b"hello");
        assert_eq!(clamp_range(content, 6, 100), b"world");
        assert_eq!(clamp_range(content, 11, 1), b"");
        assert_eq!(clamp_range(content, 50, 1), b"");
        assert_eq!(clamp_range(content, 3, u64::MAX), b"lo world");
    }
}
