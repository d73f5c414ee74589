//! Fixed binary layouts parsed by the kernel client.
//!
//! All integers are little-endian and there is no padding:
//!
//! ```text
//! NodeMeta (30 bytes)   ino:i64 | parent_ino:i64 | type:i16 | mode:u32 | size:i64
//! Dirent   (266 bytes)  name:[u8; 256] zero-padded | ino:i64 | type:i16
//! Response              code:i64 | payload (absent on error or void success)
//! ```
//!
//! Encoding only. Parameters reach the core already typed.

use bytes::BufMut;
use bytes::Bytes;
use bytes::BytesMut;

use crate::constants::DIRENT_NAME_LEN;
use crate::constants::DIRENT_SIZE;
use crate::constants::NODE_META_SIZE;
use crate::constants::RESPONSE_CODE_SIZE;
use crate::error::FsError;
use crate::types::Inode;
use crate::types::InodeNumber;
use crate::types::NodeKind;

/// Metadata of one node as the kernel sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeMeta {
    pub ino: InodeNumber,
    pub parent_ino: InodeNumber,
    pub kind: NodeKind,
    /// Type bits plus permission bits.
    pub mode: u32,
    pub size: u64,
}

impl NodeMeta {
    /// Build from an inode record as seen through `parent_ino`.
    pub fn from_inode(inode: &Inode, parent_ino: InodeNumber) -> Self {
        Self {
            ino: inode.ino,
            parent_ino,
            kind: inode.kind,
            mode: inode.reported_mode(),
            size: if inode.is_dir() { 0 } else { inode.size },
        }
    }

    pub fn encode(&self) -> [u8; NODE_META_SIZE] {
        let mut out = [0u8; NODE_META_SIZE];
        let mut buf = &mut out[..];
        buf.put_i64_le(self.ino as i64);
        buf.put_i64_le(self.parent_ino as i64);
        buf.put_i16_le(self.kind.as_wire());
        buf.put_u32_le(self.mode);
        buf.put_i64_le(self.size as i64);
        out
    }
}

/// One directory entry as the kernel sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dirent {
    pub name: String,
    pub ino: InodeNumber,
    pub kind: NodeKind,
}

impl Dirent {
    /// Encode with the name truncated to leave at least one trailing NUL.
    pub fn encode(&self) -> [u8; DIRENT_SIZE] {
        let mut out = [0u8; DIRENT_SIZE];
        let name = self.name.as_bytes();
        let copied = name.len().min(DIRENT_NAME_LEN - 1);
        out[..copied].copy_from_slice(&name[..copied]);

        let mut buf = &mut out[DIRENT_NAME_LEN..];
        buf.put_i64_le(self.ino as i64);
        buf.put_i16_le(self.kind.as_wire());
        out
    }
}

/// Status code plus payload, the body of every response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseFrame {
    /// Success; the payload may be empty.
    Ok(Bytes),
    /// Failure carrying a negative errno.
    Err(i64),
}

impl ResponseFrame {
    pub fn empty() -> Self {
        ResponseFrame::Ok(Bytes::new())
    }

    pub fn node_meta(meta: &NodeMeta) -> Self {
        ResponseFrame::Ok(Bytes::copy_from_slice(&meta.encode()))
    }

    pub fn dirent(dirent: &Dirent) -> Self {
        ResponseFrame::Ok(Bytes::copy_from_slice(&dirent.encode()))
    }

    pub fn bytes(data: impl Into<Bytes>) -> Self {
        ResponseFrame::Ok(data.into())
    }

    /// 8-byte little-endian signed payload (bytes written).
    pub fn i64_payload(value: i64) -> Self {
        ResponseFrame::Ok(Bytes::copy_from_slice(&value.to_le_bytes()))
    }

    /// 4-byte little-endian unsigned payload (link count).
    pub fn u32_payload(value: u32) -> Self {
        ResponseFrame::Ok(Bytes::copy_from_slice(&value.to_le_bytes()))
    }

    pub fn error(err: &FsError) -> Self {
        ResponseFrame::Err(err.wire_code())
    }

    /// Status code this frame carries.
    pub fn code(&self) -> i64 {
        match self {
            ResponseFrame::Ok(_) => 0,
            ResponseFrame::Err(code) => *code,
        }
    }

    pub fn encode(&self) -> Bytes {
        match self {
            ResponseFrame::Ok(payload) => {
                let mut buf = BytesMut::with_capacity(RESPONSE_CODE_SIZE + payload.len());
                buf.put_i64_le(0);
                buf.put_slice(payload);
                buf.freeze()
            }
            ResponseFrame::Err(code) => {
                let mut buf = BytesMut::with_capacity(RESPONSE_CODE_SIZE);
                buf.put_i64_le(*code);
                buf.freeze()
            }
        }
    }
}

impl From<Result<ResponseFrame, FsError>> for ResponseFrame {
    fn from(result: Result<ResponseFrame, FsError>) -> Self {
        match result {
            Ok(frame) => frame,
            Err(err) => ResponseFrame::error(&err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Errno;

    fn le_i64(bytes: &[u8]) -> i64 {
        i64::from_le_bytes(bytes.try_into().unwrap())
    }

    #[test]
    fn test_node_meta_layout() {
        let meta = NodeMeta {
            ino: 1001,
            parent_ino: 1000,
            kind: NodeKind::RegularFile,
            mode: 0o100644,
            size: 15,
        };
        let bytes = meta.encode();

        assert_eq!(bytes.len(), 30);
        assert_eq!(le_i64(&bytes[0..8]), 1001);
        assert_eq!(le_i64(&bytes[8..16]), 1000);
        assert_eq!(i16::from_le_bytes([bytes[16], bytes[17]]), 1);
        assert_eq!(u32::from_le_bytes(bytes[18..22].try_into().unwrap()), 0o100644);
        assert_eq!(le_i64(&bytes[22..30]), 15);
    }

    #[test]
    fn test_node_meta_from_directory_reports_zero_size() {
        let mut inode = Inode::new("tok", 1001, NodeKind::Directory, 0o755);
        inode.size = 4096;
        let meta = NodeMeta::from_inode(&inode, 1000);
        assert_eq!(meta.size, 0);
        assert_eq!(meta.mode, 0o040755);
        assert_eq!(meta.parent_ino, 1000);
    }

    #[test]
    fn test_dirent_layout() {
        let dirent = Dirent {
            name: "f.txt".to_string(),
            ino: 1002,
            kind: NodeKind::Directory,
        };
        let bytes = dirent.encode();

        assert_eq!(bytes.len(), 266);
        assert_eq!(&bytes[..5], b"f.txt");
        assert!(bytes[5..256].iter().all(|b| *b == 0));
        assert_eq!(le_i64(&bytes[256..264]), 1002);
        assert_eq!(i16::from_le_bytes([bytes[264], bytes[265]]), 0);
    }

    #[test]
    fn test_dirent_truncates_long_name_keeping_terminator() {
        let dirent = Dirent {
            name: "x".repeat(300),
            ino: 1,
            kind: NodeKind::RegularFile,
        };
        let bytes = dirent.encode();
        assert!(bytes[..255].iter().all(|b| *b == b'x'));
        assert_eq!(bytes[255], 0);
    }

    #[test]
    fn test_response_frame_success_with_payload() {
        let frame = ResponseFrame::u32_payload(2).encode();
        assert_eq!(frame.len(), 12);
        assert_eq!(le_i64(&frame[..8]), 0);
        assert_eq!(u32::from_le_bytes(frame[8..12].try_into().unwrap()), 2);
    }

    #[test]
    fn test_response_frame_void_success() {
        let frame = ResponseFrame::empty().encode();
        assert_eq!(frame.as_ref(), &[0u8; 8]);
    }

    #[test]
    fn test_response_frame_error_has_no_payload() {
        let err = FsError::AlreadyExists { name: "a".into() };
        let frame = ResponseFrame::error(&err);
        assert_eq!(frame.code(), Errno::Eexist.wire_code());

        let bytes = frame.encode();
        assert_eq!(bytes.len(), 8);
        assert_eq!(le_i64(&bytes), -17);
    }

    #[test]
    fn test_write_count_payload() {
        let bytes = ResponseFrame::i64_payload(5).encode();
        assert_eq!(bytes.len(), 16);
        assert_eq!(le_i64(&bytes[8..16]), 5);
    }

    proptest::proptest! {
        #[test]
        fn prop_dirent_name_zero_padded(name in "[a-zA-Z0-9._-]{1,300}", ino in 1000u64..u64::MAX / 2) {
            let bytes = Dirent { name: name.clone(), ino, kind: NodeKind::RegularFile }.encode();
            let kept = name.len().min(255);
            proptest::prop_assert_eq!(&bytes[..kept], &name.as_bytes()[..kept]);
            proptest::prop_assert!(bytes[kept..256].iter().all(|b| *b == 0));
            proptest::prop_assert_eq!(le_i64(&bytes[256..264]), ino as i64);
        }
    }
}
