//! Operation orchestrator.
//!
//! Every call follows the same shape: validate parameters, open one
//! transaction, check preconditions and apply the mutation through the store
//! traits, commit, and translate the outcome. Preconditions are re-checked
//! inside the transaction that mutates, so a failed check never leaves a
//! partial effect behind. Store uniqueness violations on directory entries
//! are reported as `AlreadyExists`, the same as a failed pre-check.

use std::sync::Arc;

use tracing::debug;
use tracing::error;
use tracing::instrument;
use tracing::warn;
use vtfs_core::ContentStore;
use vtfs_core::DirectoryStore;
use vtfs_core::Dirent;
use vtfs_core::FsError;
use vtfs_core::Inode;
use vtfs_core::InodeNumber;
use vtfs_core::InodeStore;
use vtfs_core::MAX_FILE_SIZE;
use vtfs_core::NodeKind;
use vtfs_core::NodeMeta;
use vtfs_core::ROOT_INODE;
use vtfs_core::StorageBackend;
use vtfs_core::StoreError;
use vtfs_core::StoreTransaction;

use crate::namespace::NamespaceManager;
use crate::validation::is_dot_name;
use crate::validation::validate_name;
use crate::validation::validate_new_name;
use crate::validation::validate_token;

/// Filesystem operations over a storage backend.
pub struct FileSystemService<B> {
    backend: Arc<B>,
    namespaces: NamespaceManager<B>,
}

impl<B> Clone for FileSystemService<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            namespaces: self.namespaces.clone(),
        }
    }
}

impl<B: StorageBackend> FileSystemService<B> {
    pub fn new(backend: Arc<B>) -> Self {
        let namespaces = NamespaceManager::new(Arc::clone(&backend));
        Self { backend, namespaces }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Create the namespace for `token` and its root directory.
    #[instrument(level = "debug", skip(self))]
    pub fn init(&self, token: &str) -> Result<(), FsError> {
        report("init", self.try_init(token))
    }

    /// Metadata of the root directory, creating the namespace on first access.
    #[instrument(level = "debug", skip(self))]
    pub fn get_root(&self, token: &str) -> Result<NodeMeta, FsError> {
        report("get_root", self.try_get_root(token))
    }

    /// Resolve `name` under `parent`.
    #[instrument(level = "debug", skip(self))]
    pub fn lookup(&self, token: &str, parent: InodeNumber, name: &str) -> Result<NodeMeta, FsError> {
        report("lookup", self.try_lookup(token, parent, name))
    }

    /// Entry at `offset` in `dir`'s name ordering, plus the cursor for the next call.
    ///
    /// `NotFound` marks the end of the stream. The cursor is not stable across
    /// concurrent inserts or removals in the same directory.
    #[instrument(level = "debug", skip(self))]
    pub fn iterate_dir(&self, token: &str, dir: InodeNumber, offset: u64) -> Result<(Dirent, u64), FsError> {
        report("iterate_dir", self.try_iterate_dir(token, dir, offset))
    }

    /// Create an empty regular file.
    #[instrument(level = "debug", skip(self))]
    pub fn create_file(&self, token: &str, parent: InodeNumber, name: &str, mode: u32) -> Result<NodeMeta, FsError> {
        report("create_file", self.create_node(token, parent, name, mode, NodeKind::RegularFile))
    }

    /// Create an empty directory.
    #[instrument(level = "debug", skip(self))]
    pub fn create_dir(&self, token: &str, parent: InodeNumber, name: &str, mode: u32) -> Result<NodeMeta, FsError> {
        report("create_dir", self.create_node(token, parent, name, mode, NodeKind::Directory))
    }

    /// Remove a file entry, destroying the inode when its last link goes.
    #[instrument(level = "debug", skip(self))]
    pub fn unlink(&self, token: &str, parent: InodeNumber, name: &str) -> Result<(), FsError> {
        report("unlink", self.try_unlink(token, parent, name))
    }

    /// Remove an empty directory.
    ///
    /// The root is addressed as `.` or `..` under itself and is never removable.
    #[instrument(level = "debug", skip(self))]
    pub fn rmdir(&self, token: &str, parent: InodeNumber, name: &str) -> Result<(), FsError> {
        report("rmdir", self.try_rmdir(token, parent, name))
    }

    /// Up to `length` bytes from `offset`. Reading at or past EOF yields no bytes.
    #[instrument(level = "debug", skip(self))]
    pub fn read(&self, token: &str, ino: InodeNumber, length: u64, offset: i64) -> Result<Vec<u8>, FsError> {
        report("read", self.try_read(token, ino, length, offset))
    }

    /// Splice `data[..length]` into the file at `offset`, zero-filling any gap.
    ///
    /// Returns the number of bytes written.
    #[instrument(level = "debug", skip(self, data), fields(data_len = data.len()))]
    pub fn write(&self, token: &str, ino: InodeNumber, data: &[u8], length: u64, offset: i64) -> Result<i64, FsError> {
        report("write", self.try_write(token, ino, data, length, offset))
    }

    /// Bind `name` under `parent` to an existing file.
    #[instrument(level = "debug", skip(self))]
    pub fn link(&self, token: &str, target: InodeNumber, parent: InodeNumber, name: &str) -> Result<(), FsError> {
        report("link", self.try_link(token, target, parent, name))
    }

    /// Number of directory entries targeting `ino`.
    #[instrument(level = "debug", skip(self))]
    pub fn count_links(&self, token: &str, ino: InodeNumber) -> Result<u32, FsError> {
        report("count_links", self.try_count_links(token, ino))
    }

    // ====================================================================================
    // Operation bodies
    // ====================================================================================

    fn try_init(&self, token: &str) -> Result<(), FsError> {
        validate_token(token)?;
        self.namespaces.create(token)?;
        Ok(())
    }

    fn try_get_root(&self, token: &str) -> Result<NodeMeta, FsError> {
        validate_token(token)?;
        let namespace = self.namespaces.get_or_create(token)?;
        let txn = self.backend.begin_read()?;
        let root = txn
            .get_inode(token, namespace.root_ino)?
            .ok_or_else(|| FsError::not_found(format!("root inode {}", namespace.root_ino)))?;
        Ok(NodeMeta::from_inode(&root, namespace.root_ino))
    }

    fn try_lookup(&self, token: &str, parent: InodeNumber, name: &str) -> Result<NodeMeta, FsError> {
        validate_token(token)?;
        validate_name(name)?;
        let txn = self.backend.begin_read()?;
        require_directory(&txn, token, parent)?;
        let ino = txn
            .lookup_entry(token, parent, name)?
            .ok_or_else(|| FsError::not_found(format!("entry '{name}'")))?;
        let inode = require_inode(&txn, token, ino)?;
        Ok(NodeMeta::from_inode(&inode, parent))
    }

    fn try_iterate_dir(&self, token: &str, dir: InodeNumber, offset: u64) -> Result<(Dirent, u64), FsError> {
        validate_token(token)?;
        let txn = self.backend.begin_read()?;
        require_directory(&txn, token, dir)?;
        let entry = txn
            .entry_at(token, dir, offset)?
            .ok_or_else(|| FsError::not_found(format!("entry at offset {offset}")))?;
        let target = require_inode(&txn, token, entry.target)?;
        let dirent = Dirent {
            name: entry.name,
            ino: target.ino,
            kind: target.kind,
        };
        Ok((dirent, offset.saturating_add(1)))
    }

    fn try_unlink(&self, token: &str, parent: InodeNumber, name: &str) -> Result<(), FsError> {
        validate_token(token)?;
        validate_name(name)?;
        let mut txn = self.backend.begin_write()?;
        let ino = txn
            .lookup_entry(token, parent, name)?
            .ok_or_else(|| FsError::not_found(format!("entry '{name}'")))?;
        let inode = require_inode(&txn, token, ino)?;
        if inode.is_dir() {
            return Err(FsError::not_permitted(format!("'{name}' is a directory")));
        }

        txn.delete_entry(token, parent, name)?;
        let remaining = txn.adjust_ref_count(token, ino, -1)?;
        if remaining == 0 {
            txn.delete_content(token, ino)?;
            txn.delete_inode(token, ino)?;
            debug!(token, ino, "last link removed, inode destroyed");
        } else {
            debug!(token, ino, remaining, "link removed");
        }
        txn.commit()?;
        Ok(())
    }

    fn try_rmdir(&self, token: &str, parent: InodeNumber, name: &str) -> Result<(), FsError> {
        validate_token(token)?;
        validate_name(name)?;
        if is_dot_name(name) {
            return Err(if parent == ROOT_INODE {
                FsError::not_permitted("cannot remove the root directory")
            } else {
                FsError::invalid(format!("cannot remove '{name}'"))
            });
        }

        let mut txn = self.backend.begin_write()?;
        let ino = txn
            .lookup_entry(token, parent, name)?
            .ok_or_else(|| FsError::not_found(format!("entry '{name}'")))?;
        if !txn.is_kind(token, ino, NodeKind::Directory)? {
            return Err(FsError::NotADirectory { ino });
        }
        if ino == ROOT_INODE {
            return Err(FsError::not_permitted("cannot remove the root directory"));
        }
        if !txn.is_empty(token, ino)? {
            return Err(FsError::DirectoryNotEmpty { ino });
        }

        txn.delete_entry(token, parent, name)?;
        txn.delete_inode(token, ino)?;
        txn.commit()?;
        Ok(())
    }

    fn try_read(&self, token: &str, ino: InodeNumber, length: u64, offset: i64) -> Result<Vec<u8>, FsError> {
        validate_token(token)?;
        let txn = self.backend.begin_read()?;
        let inode = require_file(&txn, token, ino)?;
        let offset = u64::try_from(offset).map_err(|_| FsError::invalid("negative offset"))?;
        if offset >= inode.size {
            return Ok(Vec::new());
        }
        let available = inode.size - offset;
        Ok(txn.get_content_range(token, ino, offset, length.min(available))?)
    }

    fn try_write(&self, token: &str, ino: InodeNumber, data: &[u8], length: u64, offset: i64) -> Result<i64, FsError> {
        validate_token(token)?;
        if length > data.len() as u64 {
            return Err(FsError::invalid(format!("length {length} exceeds {} supplied bytes", data.len())));
        }
        let offset = u64::try_from(offset).map_err(|_| FsError::invalid("negative offset"))?;
        let end = offset
            .checked_add(length)
            .filter(|end| *end <= MAX_FILE_SIZE)
            .ok_or_else(|| FsError::invalid(format!("write past maximum file size {MAX_FILE_SIZE}")))?;

        let mut txn = self.backend.begin_write()?;
        require_file(&txn, token, ino)?;

        let mut content = txn.get_content(token, ino)?;
        let (start, end) = (offset as usize, end as usize);
        if content.len() < end {
            content.resize(end, 0);
        }
        content[start..end].copy_from_slice(&data[..end - start]);

        txn.set_content(token, ino, &content)?;
        txn.update_size(token, ino, content.len() as u64)?;
        txn.commit()?;
        debug!(token, ino, size = content.len(), "content stored");
        Ok(length as i64)
    }

    fn try_link(&self, token: &str, target: InodeNumber, parent: InodeNumber, name: &str) -> Result<(), FsError> {
        validate_token(token)?;
        validate_new_name(name)?;
        let mut txn = self.backend.begin_write()?;
        let inode = require_inode(&txn, token, target)?;
        if inode.is_dir() {
            return Err(FsError::IsADirectory { ino: target });
        }
        require_directory(&txn, token, parent)?;
        if txn.entry_exists(token, parent, name)? {
            return Err(FsError::AlreadyExists { name: name.to_string() });
        }

        txn.create_entry(token, parent, name, target).map_err(|err| entry_conflict(err, name))?;
        let links = txn.adjust_ref_count(token, target, 1)?;
        txn.commit()?;
        debug!(token, target, links, "hard link created");
        Ok(())
    }

    fn try_count_links(&self, token: &str, ino: InodeNumber) -> Result<u32, FsError> {
        validate_token(token)?;
        let txn = self.backend.begin_read()?;
        Ok(require_inode(&txn, token, ino)?.ref_count)
    }

    fn create_node(
        &self,
        token: &str,
        parent: InodeNumber,
        name: &str,
        mode: u32,
        kind: NodeKind,
    ) -> Result<NodeMeta, FsError> {
        validate_token(token)?;
        validate_new_name(name)?;

        let mut allocated = None;
        let result = self.try_create_node(token, parent, name, mode, kind, &mut allocated);

        // The transaction rolled back after taking a number: burn it so a
        // later create cannot reuse it.
        if let (Err(err), Some(ino)) = (&result, allocated) {
            debug!(token, ino, error = %err, "create rolled back, retiring inode number");
            if let Err(retire_err) = self.namespaces.retire(token, ino) {
                warn!(token, ino, error = ?retire_err, "failed to retire inode number");
            }
        }
        result
    }

    fn try_create_node(
        &self,
        token: &str,
        parent: InodeNumber,
        name: &str,
        mode: u32,
        kind: NodeKind,
        allocated: &mut Option<InodeNumber>,
    ) -> Result<NodeMeta, FsError> {
        let mut txn = self.backend.begin_write()?;
        require_directory(&txn, token, parent)?;
        if txn.entry_exists(token, parent, name)? {
            return Err(FsError::AlreadyExists { name: name.to_string() });
        }

        let ino = NamespaceManager::<B>::allocate_inode(&mut txn, token)?;
        *allocated = Some(ino);

        let inode = Inode::new(token, ino, kind, mode);
        txn.create_inode(&inode)?;
        txn.create_entry(token, parent, name, ino).map_err(|err| entry_conflict(err, name))?;
        if kind == NodeKind::RegularFile {
            txn.set_content(token, ino, &[])?;
        }
        txn.commit()?;

        debug!(token, parent, name, ino, %kind, "node created");
        Ok(NodeMeta::from_inode(&inode, parent))
    }
}

// ====================================================================================
// Precondition helpers
// ====================================================================================

fn require_inode<T: InodeStore>(txn: &T, token: &str, ino: InodeNumber) -> Result<Inode, FsError> {
    txn.get_inode(token, ino)?
        .ok_or_else(|| FsError::not_found(format!("inode {ino}")))
}

/// A missing inode is reported as `NotADirectory`, like any other non-directory.
fn require_directory<T: InodeStore>(txn: &T, token: &str, ino: InodeNumber) -> Result<(), FsError> {
    if txn.is_kind(token, ino, NodeKind::Directory)? {
        Ok(())
    } else {
        Err(FsError::NotADirectory { ino })
    }
}

fn require_file<T: InodeStore>(txn: &T, token: &str, ino: InodeNumber) -> Result<Inode, FsError> {
    let inode = require_inode(txn, token, ino)?;
    if inode.is_dir() {
        return Err(FsError::IsADirectory { ino });
    }
    Ok(inode)
}

fn entry_conflict(err: StoreError, name: &str) -> FsError {
    if err.is_unique_violation() {
        FsError::AlreadyExists { name: name.to_string() }
    } else {
        err.into()
    }
}

/// Log the outcome of an operation. Internal failures are logged with their
/// cause; domain errors are expected traffic.
fn report<T>(op: &'static str, result: Result<T, FsError>) -> Result<T, FsError> {
    match &result {
        Ok(_) => debug!(op, "ok"),
        Err(FsError::OutOfResources { source }) => error!(op, error = %source, "internal failure"),
        Err(err) => debug!(op, errno = err.errno().value(), error = %err, "rejected"),
    }
    result
}

#[cfg(test)]
mod tests {
    use vtfs_core::Errno;
    use vtfs_core::MemoryBackend;

    use super::*;

    fn service() -> FileSystemService<MemoryBackend> {
        let service = FileSystemService::new(MemoryBackend::new());
        service.init("tok").unwrap();
        service
    }

    #[test]
    fn test_create_file_reports_mode_and_parent() {
        let fs = service();
        let meta = fs.create_file("tok", ROOT_INODE, "f", 0o644).unwrap();
        assert_eq!(meta.ino, ROOT_INODE + 1);
        assert_eq!(meta.parent_ino, ROOT_INODE);
        assert_eq!(meta.kind, NodeKind::RegularFile);
        assert_eq!(meta.mode, 0o100644);
        assert_eq!(meta.size, 0);
    }

    #[test]
    fn test_file_gets_empty_content_row() {
        let fs = service();
        let file = fs.create_file("tok", ROOT_INODE, "f", 0o644).unwrap();
        let dir = fs.create_dir("tok", ROOT_INODE, "d", 0o755).unwrap();
        assert!(fs.backend().has_content("tok", file.ino));
        assert!(!fs.backend().has_content("tok", dir.ino));
    }

    #[test]
    fn test_write_overwrites_in_place() {
        let fs = service();
        let ino = fs.create_file("tok", ROOT_INODE, "f", 0o644).unwrap().ino;
        fs.write("tok", ino, b"hello world", 11, 0).unwrap();
        fs.write("tok", ino, b"HELLO", 5, 0).unwrap();
        assert_eq!(fs.read("tok", ino, 100, 0).unwrap(), b"HELLO world");
        assert_eq!(fs.lookup("tok", ROOT_INODE, "f").unwrap().size, 11);
    }

    #[test]
    fn test_write_uses_only_length_prefix() {
        let fs = service();
        let ino = fs.create_file("tok", ROOT_INODE, "f", 0o644).unwrap().ino;
        assert_eq!(fs.write("tok", ino, b"abcdef", 3, 0).unwrap(), 3);
        assert_eq!(fs.read("tok", ino, 10, 0).unwrap(), b"abc");
    }

    #[test]
    fn test_write_bounds() {
        let fs = service();
        let ino = fs.create_file("tok", ROOT_INODE, "f", 0o644).unwrap().ino;
        let err = fs.write("tok", ino, b"x", 1, MAX_FILE_SIZE as i64).unwrap_err();
        assert_eq!(err.errno(), Errno::Einval);
        let err = fs.write("tok", ino, b"x", 1, i64::MAX).unwrap_err();
        assert_eq!(err.errno(), Errno::Einval);
    }

    #[test]
    fn test_validation_runs_before_storage() {
        let fs = service();
        assert_eq!(fs.lookup("", ROOT_INODE, "f").unwrap_err().errno(), Errno::Einval);
        assert_eq!(fs.create_file("tok", ROOT_INODE, "a/b", 0o644).unwrap_err().errno(), Errno::Einval);
        assert_eq!(fs.create_dir("tok", ROOT_INODE, "..", 0o755).unwrap_err().errno(), Errno::Einval);
        assert_eq!(fs.link("tok", ROOT_INODE, ROOT_INODE, "").unwrap_err().errno(), Errno::Einval);
    }

    #[test]
    fn test_rmdir_dot_names() {
        let fs = service();
        let dir = fs.create_dir("tok", ROOT_INODE, "d", 0o755).unwrap();
        assert_eq!(fs.rmdir("tok", ROOT_INODE, ".").unwrap_err().errno(), Errno::Eperm);
        assert_eq!(fs.rmdir("tok", ROOT_INODE, "..").unwrap_err().errno(), Errno::Eperm);
        assert_eq!(fs.rmdir("tok", dir.ino, ".").unwrap_err().errno(), Errno::Einval);
    }

    #[test]
    fn test_link_into_non_directory() {
        let fs = service();
        let file = fs.create_file("tok", ROOT_INODE, "f", 0o644).unwrap();
        let err = fs.link("tok", file.ino, file.ino, "g").unwrap_err();
        assert_eq!(err.errno(), Errno::Enotdir);
        assert_eq!(fs.count_links("tok", file.ino).unwrap(), 1);
    }

    #[test]
    fn test_unknown_namespace() {
        let fs = FileSystemService::new(MemoryBackend::new());
        assert_eq!(fs.lookup("nope", ROOT_INODE, "f").unwrap_err().errno(), Errno::Enotdir);
        assert_eq!(fs.create_file("nope", ROOT_INODE, "f", 0o644).unwrap_err().errno(), Errno::Enotdir);
        assert_eq!(fs.count_links("nope", ROOT_INODE).unwrap_err().errno(), Errno::Enoent);
    }
}
