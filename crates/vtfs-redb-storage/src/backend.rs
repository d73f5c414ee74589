use std::path::Path;
use std::path::PathBuf;

use redb::Database;
use redb::TableDefinition;
use snafu::ResultExt;
use tracing::info;
use vtfs_core::StorageBackend;
use vtfs_core::StoreError;

use crate::error::BeginReadSnafu;
use crate::error::BeginWriteSnafu;
use crate::error::CommitSnafu;
use crate::error::CreateDirectorySnafu;
use crate::error::OpenDatabaseSnafu;
use crate::error::OpenTableSnafu;
use crate::error::RedbStoreError;
use crate::transaction::RedbTransaction;

/// Key: token, Value: serialized Namespace (bincode)
pub(crate) const NAMESPACES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("namespaces");

/// Key: (token, ino), Value: serialized Inode (bincode)
pub(crate) const INODES_TABLE: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("inodes");

/// Key: (token, parent, name), Value: target ino
pub(crate) const DIR_ENTRIES_TABLE: TableDefinition<(&str, u64, &str), u64> = TableDefinition::new("dir_entries");

/// Key: (token, ino), Value: raw file content
pub(crate) const CONTENTS_TABLE: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("contents");

/// Durable vtfs storage in a single redb file.
pub struct RedbBackend {
    db: Database,
    path: PathBuf,
}

impl RedbBackend {
    /// Create or open a backend at the given path.
    ///
    /// Creates the directory, the database file and all tables if they don't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RedbStoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context(CreateDirectorySnafu { path: parent })?;
        }

        let db = Database::create(&path).context(OpenDatabaseSnafu { path: &path })?;

        let write_txn = db.begin_write().context(BeginWriteSnafu)?;
        {
            write_txn.open_table(NAMESPACES_TABLE).context(OpenTableSnafu)?;
            write_txn.open_table(INODES_TABLE).context(OpenTableSnafu)?;
            write_txn.open_table(DIR_ENTRIES_TABLE).context(OpenTableSnafu)?;
            write_txn.open_table(CONTENTS_TABLE).context(OpenTableSnafu)?;
        }
        write_txn.commit().context(CommitSnafu)?;

        info!(path = %path.display(), "opened vtfs database");

        Ok(Self { db, path })
    }

    /// Get the path to the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for RedbBackend {
    type Transaction<'a> = RedbTransaction;

    fn begin_read(&self) -> Result<RedbTransaction, StoreError> {
        let txn = self.db.begin_read().context(BeginReadSnafu)?;
        Ok(RedbTransaction::read(txn))
    }

    fn begin_write(&self) -> Result<RedbTransaction, StoreError> {
        let txn = self.db.begin_write().context(BeginWriteSnafu)?;
        Ok(RedbTransaction::write(txn))
    }
}
