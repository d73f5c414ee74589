//! In-memory storage backend.
//!
//! A deterministic implementation of the store traits for tests and local
//! experiments. Every transaction starts from an `Arc` snapshot of the last
//! committed state. Writers are serialized by a mutex and copy the snapshot
//! on their first mutation; commit swaps that copy in. Dropping a write
//! transaction discards the copy, which is the rollback contract the
//! orchestrator relies on.
//!
//! Faults can be armed per [`FaultPoint`] to make the next matching store call
//! fail, for exercising rollback paths.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use parking_lot::MutexGuard;
use parking_lot::RwLock;

use crate::error::StoreError;
use crate::traits::ContentStore;
use crate::traits::DirectoryStore;
use crate::traits::InodeStore;
use crate::traits::NamespaceStore;
use crate::traits::StorageBackend;
use crate::traits::StoreTransaction;
use crate::types::DirectoryEntry;
use crate::types::Inode;
use crate::types::InodeNumber;
use crate::types::Namespace;

const NAMESPACES: &str = "namespaces";
const INODES: &str = "inodes";
const DIR_ENTRIES: &str = "dir_entries";

/// Store calls that can be made to fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    CreateNamespace,
    AllocateInode,
    CreateInode,
    CreateEntry,
    DeleteEntry,
    AdjustRefCount,
    DeleteInode,
    SetContent,
    DeleteContent,
    UpdateSize,
    Commit,
}

impl FaultPoint {
    fn name(self) -> &'static str {
        match self {
            FaultPoint::CreateNamespace => "create_namespace",
            FaultPoint::AllocateInode => "allocate_inode",
            FaultPoint::CreateInode => "create_inode",
            FaultPoint::CreateEntry => "create_entry",
            FaultPoint::DeleteEntry => "delete_entry",
            FaultPoint::AdjustRefCount => "adjust_ref_count",
            FaultPoint::DeleteInode => "delete_inode",
            FaultPoint::SetContent => "set_content",
            FaultPoint::DeleteContent => "delete_content",
            FaultPoint::UpdateSize => "update_size",
            FaultPoint::Commit => "commit",
        }
    }
}

type InodeKey = (String, InodeNumber);
type EntryKey = (String, InodeNumber, String);

#[derive(Debug, Clone, Default)]
struct MemoryState {
    namespaces: BTreeMap<String, Namespace>,
    inodes: BTreeMap<InodeKey, Inode>,
    entries: BTreeMap<EntryKey, InodeNumber>,
    contents: BTreeMap<InodeKey, Vec<u8>>,
}

impl MemoryState {
    fn entries_of<'s>(&'s self, token: &str, parent: InodeNumber) -> impl Iterator<Item = DirectoryEntry> + 's {
        let start = (token.to_string(), parent, String::new());
        let token = token.to_string();
        self.entries
            .range(start..)
            .take_while(move |((t, p, _), _)| *t == token && *p == parent)
            .map(|((_, p, name), target)| DirectoryEntry {
                parent: *p,
                name: name.clone(),
                target: *target,
            })
    }
}

/// In-memory implementation of [`StorageBackend`].
#[derive(Debug, Default)]
pub struct MemoryBackend {
    committed: RwLock<Arc<MemoryState>>,
    writer: Mutex<()>,
    faults: Mutex<HashSet<FaultPoint>>,
}

impl MemoryBackend {
    /// Create a new empty backend wrapped in Arc.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Arm a one-shot fault: the next store call at `point` fails.
    pub fn inject_fault(&self, point: FaultPoint) {
        self.faults.lock().insert(point);
    }

    fn take_fault(&self, point: FaultPoint) -> Result<(), StoreError> {
        if self.faults.lock().remove(&point) {
            tracing::debug!(point = point.name(), "injected fault fired");
            return Err(StoreError::InjectedFault { point: point.name() });
        }
        Ok(())
    }

    /// Committed inodes of a namespace, ascending by number.
    pub fn inodes(&self, token: &str) -> Vec<Inode> {
        let state = self.committed.read().clone();
        state.inodes.values().filter(|inode| inode.token == token).cloned().collect()
    }

    /// Committed entries of a namespace across every directory.
    pub fn all_entries(&self, token: &str) -> Vec<DirectoryEntry> {
        let state = self.committed.read().clone();
        state
            .entries
            .iter()
            .filter(|((t, _, _), _)| t == token)
            .map(|((_, parent, name), target)| DirectoryEntry {
                parent: *parent,
                name: name.clone(),
                target: *target,
            })
            .collect()
    }

    /// `true` iff a content row exists for the inode.
    pub fn has_content(&self, token: &str, ino: InodeNumber) -> bool {
        self.committed.read().contents.contains_key(&(token.to_string(), ino))
    }
}

/// Transaction over a [`MemoryBackend`].
pub struct MemoryTransaction<'a> {
    backend: &'a MemoryBackend,
    /// Shared with the committed snapshot until the first mutation.
    state: Arc<MemoryState>,
    /// Held for the lifetime of a write transaction. `None` for readers.
    writer: Option<MutexGuard<'a, ()>>,
}

impl MemoryTransaction<'_> {
    fn check_writable(&self, point: FaultPoint) -> Result<(), StoreError> {
        if self.writer.is_none() {
            return Err(StoreError::ReadOnlyTransaction);
        }
        self.backend.take_fault(point)
    }

    fn state_mut(&mut self) -> &mut MemoryState {
        Arc::make_mut(&mut self.state)
    }

    fn inode_mut(&mut self, token: &str, ino: InodeNumber) -> Result<&mut Inode, StoreError> {
        self.state_mut()
            .inodes
            .get_mut(&(token.to_string(), ino))
            .ok_or_else(|| StoreError::MissingRow {
                table: INODES,
                key: format!("{token}/{ino}"),
            })
    }
}

impl StorageBackend for MemoryBackend {
    type Transaction<'a> = MemoryTransaction<'a>;

    fn begin_read(&self) -> Result<MemoryTransaction<'_>, StoreError> {
        Ok(MemoryTransaction {
            backend: self,
            state: self.committed.read().clone(),
            writer: None,
        })
    }

    fn begin_write(&self) -> Result<MemoryTransaction<'_>, StoreError> {
        let guard = self.writer.lock();
        Ok(MemoryTransaction {
            backend: self,
            state: self.committed.read().clone(),
            writer: Some(guard),
        })
    }
}

impl NamespaceStore for MemoryTransaction<'_> {
    fn get_namespace(&self, token: &str) -> Result<Option<Namespace>, StoreError> {
        Ok(self.state.namespaces.get(token).cloned())
    }

    fn create_namespace(&mut self, namespace: &Namespace) -> Result<(), StoreError> {
        self.check_writable(FaultPoint::CreateNamespace)?;
        if self.state.namespaces.contains_key(&namespace.token) {
            return Err(StoreError::UniqueViolation { table: NAMESPACES });
        }
        self.state_mut().namespaces.insert(namespace.token.clone(), namespace.clone());
        Ok(())
    }

    fn allocate_inode(&mut self, token: &str) -> Result<InodeNumber, StoreError> {
        self.check_writable(FaultPoint::AllocateInode)?;
        let namespace = self.state_mut().namespaces.get_mut(token).ok_or_else(|| StoreError::MissingRow {
            table: NAMESPACES,
            key: token.to_string(),
        })?;
        let ino = namespace.next_ino;
        namespace.next_ino = ino.checked_add(1).ok_or_else(|| StoreError::InvariantViolation {
            reason: format!("inode counter exhausted for {token}"),
        })?;
        Ok(ino)
    }

    fn retire_inode_number(&mut self, token: &str, ino: InodeNumber) -> Result<(), StoreError> {
        self.check_writable(FaultPoint::AllocateInode)?;
        let namespace = self.state_mut().namespaces.get_mut(token).ok_or_else(|| StoreError::MissingRow {
            table: NAMESPACES,
            key: token.to_string(),
        })?;
        namespace.next_ino = namespace.next_ino.max(ino.saturating_add(1));
        Ok(())
    }
}

impl InodeStore for MemoryTransaction<'_> {
    fn get_inode(&self, token: &str, ino: InodeNumber) -> Result<Option<Inode>, StoreError> {
        Ok(self.state.inodes.get(&(token.to_string(), ino)).cloned())
    }

    fn create_inode(&mut self, inode: &Inode) -> Result<(), StoreError> {
        self.check_writable(FaultPoint::CreateInode)?;
        let key = (inode.token.clone(), inode.ino);
        if self.state.inodes.contains_key(&key) {
            return Err(StoreError::UniqueViolation { table: INODES });
        }
        self.state_mut().inodes.insert(key, inode.clone());
        Ok(())
    }

    fn update_size(&mut self, token: &str, ino: InodeNumber, size: u64) -> Result<(), StoreError> {
        self.check_writable(FaultPoint::UpdateSize)?;
        self.inode_mut(token, ino)?.size = size;
        Ok(())
    }

    fn adjust_ref_count(&mut self, token: &str, ino: InodeNumber, delta: i32) -> Result<u32, StoreError> {
        self.check_writable(FaultPoint::AdjustRefCount)?;
        let inode = self.inode_mut(token, ino)?;
        let updated = i64::from(inode.ref_count) + i64::from(delta);
        let updated = u32::try_from(updated).map_err(|_| StoreError::InvariantViolation {
            reason: format!("ref_count of {token}/{ino} would become {updated}"),
        })?;
        inode.ref_count = updated;
        Ok(updated)
    }

    fn delete_inode(&mut self, token: &str, ino: InodeNumber) -> Result<(), StoreError> {
        self.check_writable(FaultPoint::DeleteInode)?;
        let key = (token.to_string(), ino);
        if self.state_mut().inodes.remove(&key).is_none() {
            return Err(StoreError::MissingRow {
                table: INODES,
                key: format!("{token}/{ino}"),
            });
        }
        self.state_mut().contents.remove(&key);
        Ok(())
    }
}

impl DirectoryStore for MemoryTransaction<'_> {
    fn lookup_entry(&self, token: &str, parent: InodeNumber, name: &str) -> Result<Option<InodeNumber>, StoreError> {
        Ok(self.state.entries.get(&(token.to_string(), parent, name.to_string())).copied())
    }

    fn create_entry(
        &mut self,
        token: &str,
        parent: InodeNumber,
        name: &str,
        target: InodeNumber,
    ) -> Result<(), StoreError> {
        self.check_writable(FaultPoint::CreateEntry)?;
        let key = (token.to_string(), parent, name.to_string());
        if self.state.entries.contains_key(&key) {
            return Err(StoreError::UniqueViolation { table: DIR_ENTRIES });
        }
        self.state_mut().entries.insert(key, target);
        Ok(())
    }

    fn delete_entry(&mut self, token: &str, parent: InodeNumber, name: &str) -> Result<(), StoreError> {
        self.check_writable(FaultPoint::DeleteEntry)?;
        let key = (token.to_string(), parent, name.to_string());
        match self.state_mut().entries.remove(&key) {
            Some(_) => Ok(()),
            None => Err(StoreError::MissingRow {
                table: DIR_ENTRIES,
                key: format!("{token}/{parent}/{name}"),
            }),
        }
    }

    fn is_empty(&self, token: &str, dir: InodeNumber) -> Result<bool, StoreError> {
        Ok(self.state.entries_of(token, dir).next().is_none())
    }

    fn entries(&self, token: &str, parent: InodeNumber) -> Result<Vec<DirectoryEntry>, StoreError> {
        Ok(self.state.entries_of(token, parent).collect())
    }

    fn entry_at(&self, token: &str, parent: InodeNumber, offset: u64) -> Result<Option<DirectoryEntry>, StoreError> {
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        Ok(self.state.entries_of(token, parent).nth(offset))
    }
}

impl ContentStore for MemoryTransaction<'_> {
    fn get_content(&self, token: &str, ino: InodeNumber) -> Result<Vec<u8>, StoreError> {
        Ok(self.state.contents.get(&(token.to_string(), ino)).cloned().unwrap_or_default())
    }

    fn set_content(&mut self, token: &str, ino: InodeNumber, data: &[u8]) -> Result<(), StoreError> {
        self.check_writable(FaultPoint::SetContent)?;
        self.state_mut().contents.insert((token.to_string(), ino), data.to_vec());
        Ok(())
    }

    fn delete_content(&mut self, token: &str, ino: InodeNumber) -> Result<(), StoreError> {
        self.check_writable(FaultPoint::DeleteContent)?;
        self.state_mut().contents.remove(&(token.to_string(), ino));
        Ok(())
    }
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn commit(self) -> Result<(), StoreError> {
        if self.writer.is_none() {
            return Ok(());
        }
        self.backend.take_fault(FaultPoint::Commit)?;
        *self.backend.committed.write() = self.state;
        Ok(())
    }
}
