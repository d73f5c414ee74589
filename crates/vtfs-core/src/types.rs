//! Filesystem data model.

use serde::Deserialize;
use serde::Serialize;

use crate::constants::PERMISSION_MASK;
use crate::constants::S_IFDIR;
use crate::constants::S_IFREG;

/// Namespace-scoped inode number.
pub type InodeNumber = u64;

/// Kind of a filesystem object.
///
/// The discriminants are the values the kernel client expects in the
/// `type` field of `NodeMeta` and `Dirent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum NodeKind {
    /// Directory (owns entries).
    Directory = 0,
    /// Regular file (owns content).
    RegularFile = 1,
}

impl NodeKind {
    /// Wire value of this kind.
    pub fn as_wire(self) -> i16 {
        self as i16
    }

    /// File-type bits ORed into the reported mode.
    pub fn type_bits(self) -> u32 {
        match self {
            NodeKind::Directory => S_IFDIR,
            NodeKind::RegularFile => S_IFREG,
        }
    }

    pub fn is_dir(self) -> bool {
        self == NodeKind::Directory
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Directory => write!(f, "directory"),
            NodeKind::RegularFile => write!(f, "regular file"),
        }
    }
}

/// Per-tenant filesystem instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    /// Opaque tenant token.
    pub token: String,

    /// Inode number of the root directory.
    pub root_ino: InodeNumber,

    /// Next inode number to hand out. Only ever increases.
    pub next_ino: InodeNumber,

    /// Unix timestamp (milliseconds) when the namespace was created.
    pub created_at_ms: u64,
}

/// Metadata record of a filesystem object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inode {
    pub ino: InodeNumber,
    pub token: String,
    pub kind: NodeKind,
    /// Permission bits as passed by the caller, without file-type bits.
    pub mode: u32,
    /// Content length in bytes. Always 0 for directories.
    pub size: u64,
    /// Number of directory entries targeting this inode.
    pub ref_count: u32,
}

impl Inode {
    /// A new inode with a single referencing entry.
    pub fn new(token: &str, ino: InodeNumber, kind: NodeKind, mode: u32) -> Self {
        Self {
            ino,
            token: token.to_string(),
            kind,
            mode: mode & PERMISSION_MASK,
            size: 0,
            ref_count: 1,
        }
    }

    /// Mode as reported to the kernel: type bits plus permission bits.
    pub fn reported_mode(&self) -> u32 {
        self.kind.type_bits() | (self.mode & PERMISSION_MASK)
    }

    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// Name binding from a parent directory to a target inode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub parent: InodeNumber,
    pub name: String,
    pub target: InodeNumber,
}

/// Current Unix timestamp in milliseconds.
pub fn now_unix_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reported_mode_carries_type_bits() {
        let dir = Inode::new("tok", 1001, NodeKind::Directory, 0o755);
        assert_eq!(dir.reported_mode(), 0o040755);

        let file = Inode::new("tok", 1002, NodeKind::RegularFile, 0o644);
        assert_eq!(file.reported_mode(), 0o100644);
    }

    #[test]
    fn test_new_inode_strips_type_bits_from_mode() {
        let file = Inode::new("tok", 1001, NodeKind::RegularFile, 0o100644);
        assert_eq!(file.mode, 0o644);
        assert_eq!(file.ref_count, 1);
        assert_eq!(file.size, 0);
    }

    #[test]
    fn test_kind_wire_values() {
        assert_eq!(NodeKind::Directory.as_wire(), 0);
        assert_eq!(NodeKind::RegularFile.as_wire(), 1);
    }
}
