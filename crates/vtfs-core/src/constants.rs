//! Tiger Style resource bounds and well-known numbers for vtfs.
//!
//! All limits are explicitly defined to prevent unbounded resource use.

/// Inode number of every namespace's root directory.
pub const ROOT_INODE: u64 = 1000;

/// Permission bits of a freshly created root directory.
pub const ROOT_MODE: u32 = 0o777;

/// File-type bits reported for directories.
pub const S_IFDIR: u32 = 0o040000;

/// File-type bits reported for regular files.
pub const S_IFREG: u32 = 0o100000;

/// Permission bits passed through from callers.
pub const PERMISSION_MASK: u32 = 0o777;

/// Maximum length of a single name component in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// Maximum size of a single file's content (64 MB).
///
/// Every write re-materializes the whole blob, so this also bounds the
/// memory a single write can pin.
pub const MAX_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// Maximum namespace token length in bytes.
pub const MAX_TOKEN_LEN: usize = 256;

/// Encoded size of a `NodeMeta`.
pub const NODE_META_SIZE: usize = 30;

/// Size of the zero-padded name field inside a `Dirent`.
pub const DIRENT_NAME_LEN: usize = 256;

/// Encoded size of a `Dirent`.
pub const DIRENT_SIZE: usize = DIRENT_NAME_LEN + 8 + 2;

/// Size of the status code that prefixes every response frame.
pub const RESPONSE_CODE_SIZE: usize = 8;
