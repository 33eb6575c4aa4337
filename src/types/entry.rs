use std::io::{self, Read, Write};

use crate::error::{Error, Result};

/// filesystem entry classification
///
/// only the first four variants can appear in an archive; the rest are
/// recognized during traversal so the packer can skip them with a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Regular,
    Directory,
    Symlink,
    Fifo,
    Socket,
    CharDevice,
    BlockDevice,
    Unknown,
}

impl FileType {
    /// can this entry type be stored in an archive
    pub fn is_packable(&self) -> bool {
        matches!(
            self,
            FileType::Regular | FileType::Directory | FileType::Symlink | FileType::Fifo
        )
    }

    /// type name for messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FileType::Regular => "regular file",
            FileType::Directory => "directory",
            FileType::Symlink => "symlink",
            FileType::Fifo => "fifo",
            FileType::Socket => "socket",
            FileType::CharDevice => "char device",
            FileType::BlockDevice => "block device",
            FileType::Unknown => "unknown",
        }
    }

    fn wire_value(&self) -> u8 {
        match self {
            FileType::Regular => 0,
            FileType::Directory => 1,
            FileType::Symlink => 2,
            FileType::Fifo => 3,
            FileType::Socket => 4,
            FileType::CharDevice => 5,
            FileType::BlockDevice => 6,
            FileType::Unknown => 7,
        }
    }

    /// decode a type byte; only packable types are valid in an archive
    fn from_wire(value: u8) -> Option<FileType> {
        match value {
            0 => Some(FileType::Regular),
            1 => Some(FileType::Directory),
            2 => Some(FileType::Symlink),
            3 => Some(FileType::Fifo),
            _ => None,
        }
    }
}

/// metadata record for one archive entry
///
/// wire layout, all integers little-endian regardless of host byte order:
///
/// ```text
/// name_len:u16  name  type:u8  mode:u16  uid:u32  gid:u32
/// atime:i64  mtime:i64  size:u64  link_target_len:u16  link_target
/// hardlink_ref:u8
/// ```
///
/// a Regular record with `hardlink_ref` unset is followed by exactly
/// `size` body bytes; every other record carries no body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    /// leaf filename, a single path component; empty only for the pop sentinel
    pub name: String,
    pub file_type: FileType,
    /// permission bits, already masked to 0o7777
    pub mode: u16,
    pub uid: u32,
    pub gid: u32,
    pub atime: i64,
    pub mtime: i64,
    /// body length for regular files, 0 otherwise
    pub size: u64,
    /// symlink target, or the archive path of the first occurrence for a
    /// hardlink back-reference
    pub link_target: String,
    /// true when this Regular entry refers to an earlier inode and has no body
    pub hardlink_ref: bool,
}

/// fixed-width middle section: type..link_target_len
const FIXED_LEN: usize = 1 + 2 + 4 + 4 + 8 + 8 + 8 + 2;

impl EntryMeta {
    /// the sentinel closing the current directory
    pub fn pop() -> Self {
        Self {
            name: String::new(),
            file_type: FileType::Directory,
            mode: 0,
            uid: 0,
            gid: 0,
            atime: 0,
            mtime: 0,
            size: 0,
            link_target: String::new(),
            hardlink_ref: false,
        }
    }

    /// is this the directory-closing sentinel
    pub fn is_pop(&self) -> bool {
        self.file_type == FileType::Directory && self.name.is_empty()
    }

    /// serialize one record
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        let name = self.name.as_bytes();
        let name_len =
            u16::try_from(name.len()).map_err(|_| Error::NameTooLong(self.name.clone()))?;
        let target = self.link_target.as_bytes();
        let target_len =
            u16::try_from(target.len()).map_err(|_| Error::NameTooLong(self.link_target.clone()))?;

        let mut buf = Vec::with_capacity(2 + name.len() + FIXED_LEN + target.len() + 1);
        buf.extend_from_slice(&name_len.to_le_bytes());
        buf.extend_from_slice(name);
        buf.push(self.file_type.wire_value());
        buf.extend_from_slice(&self.mode.to_le_bytes());
        buf.extend_from_slice(&self.uid.to_le_bytes());
        buf.extend_from_slice(&self.gid.to_le_bytes());
        buf.extend_from_slice(&self.atime.to_le_bytes());
        buf.extend_from_slice(&self.mtime.to_le_bytes());
        buf.extend_from_slice(&self.size.to_le_bytes());
        buf.extend_from_slice(&target_len.to_le_bytes());
        buf.extend_from_slice(target);
        buf.push(self.hardlink_ref as u8);

        w.write_all(&buf).map_err(Error::ArchiveWrite)
    }

    /// deserialize one record
    ///
    /// returns Ok(None) at a clean end of stream; running out of bytes
    /// inside a record is a malformed archive.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Option<Self>> {
        let mut len_buf = [0u8; 2];
        match read_fully(r, &mut len_buf).map_err(Error::ArchiveRead)? {
            0 => return Ok(None),
            2 => {}
            _ => return Err(malformed("truncated record header")),
        }
        let name_len = u16::from_le_bytes(len_buf) as usize;

        let mut name = vec![0u8; name_len];
        read_record_bytes(r, &mut name, "entry name")?;

        let mut fixed = [0u8; FIXED_LEN];
        read_record_bytes(r, &mut fixed, "record fields")?;

        let type_byte = fixed[0];
        let mode = u16::from_le_bytes([fixed[1], fixed[2]]);
        let uid = u32::from_le_bytes([fixed[3], fixed[4], fixed[5], fixed[6]]);
        let gid = u32::from_le_bytes([fixed[7], fixed[8], fixed[9], fixed[10]]);
        let atime = i64::from_le_bytes([
            fixed[11], fixed[12], fixed[13], fixed[14], fixed[15], fixed[16], fixed[17], fixed[18],
        ]);
        let mtime = i64::from_le_bytes([
            fixed[19], fixed[20], fixed[21], fixed[22], fixed[23], fixed[24], fixed[25], fixed[26],
        ]);
        let size = u64::from_le_bytes([
            fixed[27], fixed[28], fixed[29], fixed[30], fixed[31], fixed[32], fixed[33], fixed[34],
        ]);
        let target_len = u16::from_le_bytes([fixed[35], fixed[36]]) as usize;

        let mut target = vec![0u8; target_len];
        read_record_bytes(r, &mut target, "link target")?;

        let mut flag = [0u8; 1];
        read_record_bytes(r, &mut flag, "hardlink flag")?;

        let file_type = FileType::from_wire(type_byte)
            .ok_or_else(|| malformed(&format!("unknown entry type {type_byte}")))?;
        let hardlink_ref = match flag[0] {
            0 => false,
            1 => true,
            other => return Err(malformed(&format!("invalid hardlink flag {other}"))),
        };

        let meta = Self {
            name: String::from_utf8_lossy(&name).into_owned(),
            file_type,
            mode,
            uid,
            gid,
            atime,
            mtime,
            size,
            link_target: String::from_utf8_lossy(&target).into_owned(),
            hardlink_ref,
        };
        meta.validate()?;
        Ok(Some(meta))
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            if self.file_type != FileType::Directory {
                return Err(malformed("empty name on a non-directory record"));
            }
        } else {
            if self.name.contains('/') {
                return Err(malformed(&format!("name contains '/': {}", self.name)));
            }
            if self.name.contains('\0') {
                return Err(malformed("name contains NUL"));
            }
            if self.name == "." || self.name == ".." {
                return Err(malformed(&format!("reserved name: {}", self.name)));
            }
        }

        if self.hardlink_ref {
            if self.file_type != FileType::Regular {
                return Err(malformed("hardlink flag on a non-regular record"));
            }
            if self.size != 0 {
                return Err(malformed("hardlink back-reference with nonzero size"));
            }
            if self.link_target.is_empty() {
                return Err(malformed("hardlink back-reference without a target"));
            }
        }

        Ok(())
    }
}

fn malformed(msg: &str) -> Error {
    Error::MalformedArchive(msg.to_string())
}

/// read until the buffer is full or the stream ends; returns bytes read
pub(crate) fn read_fully<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut n = 0;
    while n < buf.len() {
        match r.read(&mut buf[n..]) {
            Ok(0) => break,
            Ok(k) => n += k,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(n)
}

fn read_record_bytes<R: Read>(r: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    let n = read_fully(r, buf).map_err(Error::ArchiveRead)?;
    if n != buf.len() {
        return Err(malformed(&format!("truncated {what}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn sample() -> EntryMeta {
        EntryMeta {
            name: "a".to_string(),
            file_type: FileType::Regular,
            mode: 0o644,
            uid: 1000,
            gid: 1000,
            atime: 1,
            mtime: 2,
            size: 3,
            link_target: String::new(),
            hardlink_ref: false,
        }
    }

    fn encode(meta: &EntryMeta) -> Vec<u8> {
        let mut buf = Vec::new();
        meta.write_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_roundtrip() {
        let meta = EntryMeta {
            name: "config.toml".to_string(),
            file_type: FileType::Symlink,
            mode: 0o777,
            uid: 0,
            gid: 0,
            atime: -100,
            mtime: 1_700_000_000,
            size: 0,
            link_target: "../etc/config.toml".to_string(),
            hardlink_ref: false,
        };

        let buf = encode(&meta);
        let parsed = EntryMeta::read_from(&mut &buf[..]).unwrap().unwrap();
        assert_eq!(meta, parsed);
    }

    #[test]
    fn test_wire_layout_is_little_endian() {
        let buf = encode(&sample());

        let mut expected = vec![1, 0, b'a', 0];
        expected.extend_from_slice(&[0xa4, 0x01]); // mode 0o644
        expected.extend_from_slice(&[0xe8, 0x03, 0, 0]); // uid 1000
        expected.extend_from_slice(&[0xe8, 0x03, 0, 0]); // gid 1000
        expected.extend_from_slice(&[1, 0, 0, 0, 0, 0, 0, 0]); // atime
        expected.extend_from_slice(&[2, 0, 0, 0, 0, 0, 0, 0]); // mtime
        expected.extend_from_slice(&[3, 0, 0, 0, 0, 0, 0, 0]); // size
        expected.extend_from_slice(&[0, 0, 0]); // target_len + flag
        assert_eq!(buf, expected);
    }

    #[test]
    fn test_clean_eof_returns_none() {
        let empty: &[u8] = &[];
        assert!(EntryMeta::read_from(&mut &*empty).unwrap().is_none());
    }

    #[test]
    fn test_truncation_is_malformed() {
        let buf = encode(&sample());

        for cut in 1..buf.len() {
            let err = EntryMeta::read_from(&mut &buf[..cut]).unwrap_err();
            assert_eq!(err.code(), ErrorCode::Malformed, "cut at {cut}");
        }
    }

    #[test]
    fn test_unknown_type_byte_rejected() {
        let mut buf = encode(&sample());
        buf[3] = 9; // type byte follows the one-char name
        let err = EntryMeta::read_from(&mut &buf[..]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Malformed);
    }

    #[test]
    fn test_bad_hardlink_flag_rejected() {
        let mut buf = encode(&sample());
        let last = buf.len() - 1;
        buf[last] = 2;
        let err = EntryMeta::read_from(&mut &buf[..]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Malformed);
    }

    #[test]
    fn test_name_with_slash_rejected() {
        let mut meta = sample();
        meta.name = "a/b".to_string();
        let buf = encode(&meta);
        let err = EntryMeta::read_from(&mut &buf[..]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Malformed);
    }

    #[test]
    fn test_hardlink_flag_on_directory_rejected() {
        let mut meta = sample();
        meta.file_type = FileType::Directory;
        meta.size = 0;
        meta.link_target = "first".to_string();
        meta.hardlink_ref = true;
        let buf = encode(&meta);
        let err = EntryMeta::read_from(&mut &buf[..]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Malformed);
    }

    #[test]
    fn test_hardlink_ref_with_size_rejected() {
        let mut meta = sample();
        meta.size = 10;
        meta.link_target = "first".to_string();
        meta.hardlink_ref = true;
        let buf = encode(&meta);
        let err = EntryMeta::read_from(&mut &buf[..]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Malformed);
    }

    #[test]
    fn test_pop_sentinel_roundtrip() {
        let buf = encode(&EntryMeta::pop());
        let parsed = EntryMeta::read_from(&mut &buf[..]).unwrap().unwrap();
        assert!(parsed.is_pop());
    }

    #[test]
    fn test_two_records_in_sequence() {
        let mut buf = Vec::new();
        sample().write_to(&mut buf).unwrap();
        EntryMeta::pop().write_to(&mut buf).unwrap();

        let mut cursor = &buf[..];
        let first = EntryMeta::read_from(&mut cursor).unwrap().unwrap();
        let second = EntryMeta::read_from(&mut cursor).unwrap().unwrap();
        assert_eq!(first, sample());
        assert!(second.is_pop());
        assert!(EntryMeta::read_from(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn test_packable_types() {
        assert!(FileType::Regular.is_packable());
        assert!(FileType::Fifo.is_packable());
        assert!(!FileType::Socket.is_packable());
        assert!(!FileType::Unknown.is_packable());
    }
}
