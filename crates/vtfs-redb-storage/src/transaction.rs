use redb::ReadTransaction;
use redb::ReadableTable;
use redb::WriteTransaction;
use snafu::ResultExt;
use vtfs_core::ContentStore;
use vtfs_core::DirectoryEntry;
use vtfs_core::DirectoryStore;
use vtfs_core::Inode;
use vtfs_core::InodeNumber;
use vtfs_core::InodeStore;
use vtfs_core::Namespace;
use vtfs_core::NamespaceStore;
use vtfs_core::StoreError;
use vtfs_core::StoreTransaction;

use crate::backend::CONTENTS_TABLE;
use crate::backend::DIR_ENTRIES_TABLE;
use crate::backend::INODES_TABLE;
use crate::backend::NAMESPACES_TABLE;
use crate::error::CommitSnafu;
use crate::error::DeserializeSnafu;
use crate::error::GetSnafu;
use crate::error::InsertSnafu;
use crate::error::IteratorSnafu;
use crate::error::OpenTableSnafu;
use crate::error::RangeSnafu;
use crate::error::RedbStoreError;
use crate::error::RemoveSnafu;
use crate::error::SerializeSnafu;

/// Open `$def` in whichever kind of transaction `$txn` holds and evaluate
/// `$body` with the table bound to `$table`.
macro_rules! with_table {
    ($txn:expr, $def:expr, |$table:ident| $body:expr) => {
        match $txn {
            Inner::Read(txn) => {
                let $table = txn.open_table($def).context(OpenTableSnafu)?;
                $body
            }
            Inner::Write(txn) => {
                let $table = txn.open_table($def).context(OpenTableSnafu)?;
                $body
            }
        }
    };
}

enum Inner {
    Read(ReadTransaction),
    Write(WriteTransaction),
}

/// A read or write transaction over a [`crate::RedbBackend`].
///
/// Dropping an uncommitted write transaction aborts it.
pub struct RedbTransaction {
    inner: Inner,
}

impl RedbTransaction {
    pub(crate) fn read(txn: ReadTransaction) -> Self {
        Self { inner: Inner::Read(txn) }
    }

    pub(crate) fn write(txn: WriteTransaction) -> Self {
        Self {
            inner: Inner::Write(txn),
        }
    }

    fn writer(&self) -> Result<&WriteTransaction, StoreError> {
        match &self.inner {
            Inner::Write(txn) => Ok(txn),
            Inner::Read(_) => Err(StoreError::ReadOnlyTransaction),
        }
    }

    fn missing(table: &'static str, key: String) -> StoreError {
        StoreError::MissingRow { table, key }
    }
}

// ====================================================================================
// Table helpers, generic over read-only and writable tables
// ====================================================================================

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, RedbStoreError> {
    bincode::deserialize(bytes).context(DeserializeSnafu)
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, RedbStoreError> {
    bincode::serialize(value).context(SerializeSnafu)
}

fn read_namespace<T>(table: &T, token: &str) -> Result<Option<Namespace>, RedbStoreError>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    match table.get(token).context(GetSnafu)? {
        Some(value) => Ok(Some(decode(value.value())?)),
        None => Ok(None),
    }
}

fn read_inode<T>(table: &T, token: &str, ino: InodeNumber) -> Result<Option<Inode>, RedbStoreError>
where
    T: ReadableTable<(&'static str, u64), &'static [u8]>,
{
    match table.get((token, ino)).context(GetSnafu)? {
        Some(value) => Ok(Some(decode(value.value())?)),
        None => Ok(None),
    }
}

fn read_content<T>(table: &T, token: &str, ino: InodeNumber) -> Result<Vec<u8>, RedbStoreError>
where
    T: ReadableTable<(&'static str, u64), &'static [u8]>,
{
    Ok(table
        .get((token, ino))
        .context(GetSnafu)?
        .map(|value| value.value().to_vec())
        .unwrap_or_default())
}

fn read_entry<T>(table: &T, token: &str, parent: InodeNumber, name: &str) -> Result<Option<InodeNumber>, RedbStoreError>
where
    T: ReadableTable<(&'static str, u64, &'static str), u64>,
{
    Ok(table.get((token, parent, name)).context(GetSnafu)?.map(|value| value.value()))
}

/// Scan the entries of `parent` in name order, stopping after `limit` entries.
fn scan_entries<T>(
    table: &T,
    token: &str,
    parent: InodeNumber,
    skip: usize,
    limit: usize,
) -> Result<Vec<DirectoryEntry>, RedbStoreError>
where
    T: ReadableTable<(&'static str, u64, &'static str), u64>,
{
    let mut entries = Vec::new();
    if limit == 0 {
        return Ok(entries);
    }

    let range = table.range((token, parent, "")..).context(RangeSnafu)?;
    for item in range.skip(skip) {
        let (key, value) = item.context(IteratorSnafu)?;
        let (entry_token, entry_parent, name) = key.value();
        if entry_token != token || entry_parent != parent {
            break;
        }
        entries.push(DirectoryEntry {
            parent,
            name: name.to_string(),
            target: value.value(),
        });
        if entries.len() >= limit {
            break;
        }
    }
    Ok(entries)
}

// ====================================================================================
// Store trait implementations
// ====================================================================================

impl NamespaceStore for RedbTransaction {
    fn get_namespace(&self, token: &str) -> Result<Option<Namespace>, StoreError> {
        Ok(with_table!(&self.inner, NAMESPACES_TABLE, |table| read_namespace(&table, token)?))
    }

    fn create_namespace(&mut self, namespace: &Namespace) -> Result<(), StoreError> {
        let txn = self.writer()?;
        let mut table = txn.open_table(NAMESPACES_TABLE).context(OpenTableSnafu)?;
        if table.get(namespace.token.as_str()).context(GetSnafu)?.is_some() {
            return Err(StoreError::UniqueViolation { table: "namespaces" });
        }
        let serialized = encode(namespace)?;
        table.insert(namespace.token.as_str(), serialized.as_slice()).context(InsertSnafu)?;
        Ok(())
    }

    fn allocate_inode(&mut self, token: &str) -> Result<InodeNumber, StoreError> {
        let txn = self.writer()?;
        let mut table = txn.open_table(NAMESPACES_TABLE).context(OpenTableSnafu)?;
        let mut namespace =
            read_namespace(&table, token)?.ok_or_else(|| Self::missing("namespaces", token.to_string()))?;

        let ino = namespace.next_ino;
        namespace.next_ino = ino.checked_add(1).ok_or_else(|| StoreError::InvariantViolation {
            reason: format!("inode counter exhausted for {token}"),
        })?;

        let serialized = encode(&namespace)?;
        table.insert(token, serialized.as_slice()).context(InsertSnafu)?;
        Ok(ino)
    }

    fn retire_inode_number(&mut self, token: &str, ino: InodeNumber) -> Result<(), StoreError> {
        let txn = self.writer()?;
        let mut table = txn.open_table(NAMESPACES_TABLE).context(OpenTableSnafu)?;
        let mut namespace =
            read_namespace(&table, token)?.ok_or_else(|| Self::missing("namespaces", token.to_string()))?;

        let floor = ino.saturating_add(1);
        if namespace.next_ino < floor {
            namespace.next_ino = floor;
            let serialized = encode(&namespace)?;
            table.insert(token, serialized.as_slice()).context(InsertSnafu)?;
        }
        Ok(())
    }
}

impl InodeStore for RedbTransaction {
    fn get_inode(&self, token: &str, ino: InodeNumber) -> Result<Option<Inode>, StoreError> {
        Ok(with_table!(&self.inner, INODES_TABLE, |table| read_inode(&table, token, ino)?))
    }

    fn create_inode(&mut self, inode: &Inode) -> Result<(), StoreError> {
        let txn = self.writer()?;
        let mut table = txn.open_table(INODES_TABLE).context(OpenTableSnafu)?;
        let key = (inode.token.as_str(), inode.ino);
        if table.get(key).context(GetSnafu)?.is_some() {
            return Err(StoreError::UniqueViolation { table: "inodes" });
        }
        let serialized = encode(inode)?;
        table.insert(key, serialized.as_slice()).context(InsertSnafu)?;
        Ok(())
    }

    fn update_size(&mut self, token: &str, ino: InodeNumber, size: u64) -> Result<(), StoreError> {
        let txn = self.writer()?;
        let mut table = txn.open_table(INODES_TABLE).context(OpenTableSnafu)?;
        let mut inode = read_inode(&table, token, ino)?.ok_or_else(|| Self::missing("inodes", format!("{token}/{ino}")))?;
        inode.size = size;
        let serialized = encode(&inode)?;
        table.insert((token, ino), serialized.as_slice()).context(InsertSnafu)?;
        Ok(())
    }

    fn adjust_ref_count(&mut self, token: &str, ino: InodeNumber, delta: i32) -> Result<u32, StoreError> {
        // redb admits one write transaction at a time, so this
        // read-modify-write cannot interleave with another adjustment.
        let txn = self.writer()?;
        let mut table = txn.open_table(INODES_TABLE).context(OpenTableSnafu)?;
        let mut inode = read_inode(&table, token, ino)?.ok_or_else(|| Self::missing("inodes", format!("{token}/{ino}")))?;

        let updated = i64::from(inode.ref_count) + i64::from(delta);
        inode.ref_count = u32::try_from(updated).map_err(|_| StoreError::InvariantViolation {
            reason: format!("ref_count of {token}/{ino} would become {updated}"),
        })?;

        let serialized = encode(&inode)?;
        table.insert((token, ino), serialized.as_slice()).context(InsertSnafu)?;
        Ok(inode.ref_count)
    }

    fn delete_inode(&mut self, token: &str, ino: InodeNumber) -> Result<(), StoreError> {
        let txn = self.writer()?;
        {
            let mut inodes = txn.open_table(INODES_TABLE).context(OpenTableSnafu)?;
            if inodes.remove((token, ino)).context(RemoveSnafu)?.is_none() {
                return Err(Self::missing("inodes", format!("{token}/{ino}")));
            }
        }
        let mut contents = txn.open_table(CONTENTS_TABLE).context(OpenTableSnafu)?;
        contents.remove((token, ino)).context(RemoveSnafu)?;
        Ok(())
    }
}

impl DirectoryStore for RedbTransaction {
    fn lookup_entry(&self, token: &str, parent: InodeNumber, name: &str) -> Result<Option<InodeNumber>, StoreError> {
        Ok(with_table!(&self.inner, DIR_ENTRIES_TABLE, |table| read_entry(&table, token, parent, name)?))
    }

    fn create_entry(
        &mut self,
        token: &str,
        parent: InodeNumber,
        name: &str,
        target: InodeNumber,
    ) -> Result<(), StoreError> {
        let txn = self.writer()?;
        let mut table = txn.open_table(DIR_ENTRIES_TABLE).context(OpenTableSnafu)?;
        if read_entry(&table, token, parent, name)?.is_some() {
            return Err(StoreError::UniqueViolation { table: "dir_entries" });
        }
        table.insert((token, parent, name), target).context(InsertSnafu)?;
        Ok(())
    }

    fn delete_entry(&mut self, token: &str, parent: InodeNumber, name: &str) -> Result<(), StoreError> {
        let txn = self.writer()?;
        let mut table = txn.open_table(DIR_ENTRIES_TABLE).context(OpenTableSnafu)?;
        if table.remove((token, parent, name)).context(RemoveSnafu)?.is_none() {
            return Err(Self::missing("dir_entries", format!("{token}/{parent}/{name}")));
        }
        Ok(())
    }

    fn is_empty(&self, token: &str, dir: InodeNumber) -> Result<bool, StoreError> {
        let first = with_table!(&self.inner, DIR_ENTRIES_TABLE, |table| scan_entries(&table, token, dir, 0, 1)?);
        Ok(first.is_empty())
    }

    fn entries(&self, token: &str, parent: InodeNumber) -> Result<Vec<DirectoryEntry>, StoreError> {
        Ok(with_table!(&self.inner, DIR_ENTRIES_TABLE, |table| scan_entries(
            &table,
            token,
            parent,
            0,
            usize::MAX
        )?))
    }

    fn entry_at(&self, token: &str, parent: InodeNumber, offset: u64) -> Result<Option<DirectoryEntry>, StoreError> {
        let skip = usize::try_from(offset).unwrap_or(usize::MAX);
        let found = with_table!(&self.inner, DIR_ENTRIES_TABLE, |table| scan_entries(&table, token, parent, skip, 1)?);
        Ok(found.into_iter().next())
    }
}

impl ContentStore for RedbTransaction {
    fn get_content(&self, token: &str, ino: InodeNumber) -> Result<Vec<u8>, StoreError> {
        Ok(with_table!(&self.inner, CONTENTS_TABLE, |table| read_content(&table, token, ino)?))
    }

    fn set_content(&mut self, token: &str, ino: InodeNumber, data: &[u8]) -> Result<(), StoreError> {
        let txn = self.writer()?;
        let mut table = txn.open_table(CONTENTS_TABLE).context(OpenTableSnafu)?;
        table.insert((token, ino), data).context(InsertSnafu)?;
        Ok(())
    }

    fn delete_content(&mut self, token: &str, ino: InodeNumber) -> Result<(), StoreError> {
        let txn = self.writer()?;
        let mut table = txn.open_table(CONTENTS_TABLE).context(OpenTableSnafu)?;
        table.remove((token, ino)).context(RemoveSnafu)?;
        Ok(())
    }
}

impl StoreTransaction for RedbTransaction {
    fn commit(self) -> Result<(), StoreError> {
        match self.inner {
            Inner::Write(txn) => {
                txn.commit().context(CommitSnafu)?;
                Ok(())
            }
            Inner::Read(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use vtfs_core::NodeKind;
    use vtfs_core::StorageBackend;

    use super::*;
    use crate::RedbBackend;

    fn open() -> (TempDir, RedbBackend) {
        let temp_dir = TempDir::new().unwrap();
        let backend = RedbBackend::open(temp_dir.path().join("vtfs.redb")).unwrap();
        (temp_dir, backend)
    }

    fn namespace(token: &str) -> Namespace {
        Namespace {
            token: token.to_string(),
            root_ino: 1000,
            next_ino: 1001,
            created_at_ms: 0,
        }
    }

    #[test]
    fn test_namespace_round_trip_and_uniqueness() {
        let (_dir, backend) = open();
        let mut txn = backend.begin_write().unwrap();
        txn.create_namespace(&namespace("tok")).unwrap();
        let err = txn.create_namespace(&namespace("tok")).unwrap_err();
        assert!(err.is_unique_violation());
        txn.commit().unwrap();

        let read = backend.begin_read().unwrap();
        assert_eq!(read.get_namespace("tok").unwrap(), Some(namespace("tok")));
        assert_eq!(read.get_namespace("missing").unwrap(), None);
    }

    #[test]
    fn test_allocate_persists_counter() {
        let (_dir, backend) = open();
        let mut txn = backend.begin_write().unwrap();
        txn.create_namespace(&namespace("tok")).unwrap();
        assert_eq!(txn.allocate_inode("tok").unwrap(), 1001);
        txn.commit().unwrap();

        let mut txn = backend.begin_write().unwrap();
        assert_eq!(txn.allocate_inode("tok").unwrap(), 1002);
        txn.retire_inode_number("tok", 1005).unwrap();
        assert_eq!(txn.allocate_inode("tok").unwrap(), 1006);
    }

    #[test]
    fn test_aborted_write_is_invisible() {
        let (_dir, backend) = open();
        {
            let mut txn = backend.begin_write().unwrap();
            txn.create_namespace(&namespace("tok")).unwrap();
        }
        let read = backend.begin_read().unwrap();
        assert!(read.get_namespace("tok").unwrap().is_none());
    }

    #[test]
    fn test_read_transaction_rejects_writes() {
        let (_dir, backend) = open();
        let mut txn = backend.begin_read().unwrap();
        let err = txn.set_content("tok", 1001, b"x").unwrap_err();
        assert!(matches!(err, StoreError::ReadOnlyTransaction));
    }

    #[test]
    fn test_entries_ordered_and_scoped_to_parent() {
        let (_dir, backend) = open();
        let mut txn = backend.begin_write().unwrap();
        txn.create_entry("tok", 1000, "zeta", 1003).unwrap();
        txn.create_entry("tok", 1000, "alpha", 1001).unwrap();
        txn.create_entry("tok", 1000, "Beta", 1002).unwrap();
        txn.create_entry("tok", 1001, "child", 1004).unwrap();
        txn.create_entry("tok2", 1000, "other", 1005).unwrap();
        txn.commit().unwrap();

        let read = backend.begin_read().unwrap();
        let names: Vec<_> = read.entries("tok", 1000).unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["Beta", "alpha", "zeta"]);

        let second = read.entry_at("tok", 1000, 1).unwrap().unwrap();
        assert_eq!(second.name, "alpha");
        assert_eq!(second.target, 1001);
        assert!(read.entry_at("tok", 1000, 3).unwrap().is_none());

        assert!(!read.is_empty("tok", 1001).unwrap());
        assert!(read.is_empty("tok", 1004).unwrap());
        assert_eq!(read.lookup_entry("tok", 1001, "child").unwrap(), Some(1004));
        assert!(!read.entry_exists("tok", 1001, "nope").unwrap());
    }

    #[test]
    fn test_duplicate_entry_is_unique_violation() {
        let (_dir, backend) = open();
        let mut txn = backend.begin_write().unwrap();
        txn.create_entry("tok", 1000, "a", 1001).unwrap();
        assert!(txn.create_entry("tok", 1000, "a", 1002).unwrap_err().is_unique_violation());
        assert!(matches!(
            txn.delete_entry("tok", 1000, "missing").unwrap_err(),
            StoreError::MissingRow { .. }
        ));
    }

    #[test]
    fn test_inode_ref_count_and_cascade() {
        let (_dir, backend) = open();
        let mut txn = backend.begin_write().unwrap();
        txn.create_inode(&Inode::new("tok", 1001, NodeKind::RegularFile, 0o644)).unwrap();
        txn.set_content("tok", 1001, b"hello").unwrap();
        assert_eq!(txn.adjust_ref_count("tok", 1001, 1).unwrap(), 2);
        assert_eq!(txn.adjust_ref_count("tok", 1001, -1).unwrap(), 1);
        txn.update_size("tok", 1001, 5).unwrap();
        txn.commit().unwrap();

        let read = backend.begin_read().unwrap();
        let inode = read.get_inode("tok", 1001).unwrap().unwrap();
        assert_eq!(inode.size, 5);
        assert_eq!(inode.ref_count, 1);
        assert!(read.is_kind("tok", 1001, NodeKind::RegularFile).unwrap());
        assert!(!read.is_kind("tok", 1001, NodeKind::Directory).unwrap());
        assert_eq!(read.get_content_range("tok", 1001, 1, 3).unwrap(), b"ell");
        drop(read);

        let mut txn = backend.begin_write().unwrap();
        txn.delete_inode("tok", 1001).unwrap();
        txn.commit().unwrap();

        let read = backend.begin_read().unwrap();
        assert!(read.get_inode("tok", 1001).unwrap().is_none());
        assert!(read.get_content("tok", 1001).unwrap().is_empty());
    }

    #[test]
    fn test_data_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("vtfs.redb");
        {
            let backend = RedbBackend::open(&path).unwrap();
            let mut txn = backend.begin_write().unwrap();
            txn.create_namespace(&namespace("tok")).unwrap();
            txn.set_content("tok", 1001, b"persisted").unwrap();
            txn.commit().unwrap();
        }

        let backend = RedbBackend::open(&path).unwrap();
        assert_eq!(backend.path(), path.as_path());
        let read = backend.begin_read().unwrap();
        assert!(read.get_namespace("tok").unwrap().is_some());
        assert_eq!(read.get_content("tok", 1001).unwrap(), b"persisted");
    }
}
