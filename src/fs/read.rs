use std::fs::{self, Metadata};
use std::io;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::FileType;

/// lstat snapshot of a filesystem entry
///
/// symlinks are never followed; a symlink's own attributes are reported.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub file_type: FileType,
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
    pub size: u64,
    pub atime: i64,
    pub mtime: i64,
    /// inode number (for hardlink detection)
    pub ino: u64,
    /// device id (for hardlink detection)
    pub dev: u64,
    /// number of hard links
    pub nlink: u64,
}

impl FileInfo {
    /// read entry info from path (does not follow symlinks)
    pub fn from_path(path: &Path) -> Result<Self> {
        let meta = fs::symlink_metadata(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                Error::NotExist(path.to_path_buf())
            } else {
                Error::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Ok(Self::from_std_metadata(&meta))
    }

    /// create from std::fs::Metadata
    pub fn from_std_metadata(meta: &Metadata) -> Self {
        Self {
            file_type: file_type_of(meta),
            uid: meta.uid(),
            gid: meta.gid(),
            mode: meta.mode(),
            size: meta.len(),
            atime: meta.atime(),
            mtime: meta.mtime(),
            ino: meta.ino(),
            dev: meta.dev(),
            nlink: meta.nlink(),
        }
    }

    /// check if this could be a hardlink (nlink > 1 for regular files)
    pub fn could_be_hardlink(&self) -> bool {
        self.file_type == FileType::Regular && self.nlink > 1
    }
}

/// detect file type from metadata
fn file_type_of(meta: &Metadata) -> FileType {
    let ft = meta.file_type();
    if ft.is_file() {
        FileType::Regular
    } else if ft.is_dir() {
        FileType::Directory
    } else if ft.is_symlink() {
        FileType::Symlink
    } else if ft.is_fifo() {
        FileType::Fifo
    } else if ft.is_socket() {
        FileType::Socket
    } else if ft.is_char_device() {
        FileType::CharDevice
    } else if ft.is_block_device() {
        FileType::BlockDevice
    } else {
        FileType::Unknown
    }
}

/// read symlink target
pub fn read_symlink_target(path: &Path) -> Result<String> {
    let target = fs::read_link(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(target.to_string_lossy().into_owned())
}

/// enumerate a directory's children, sorted by byte-wise name order
///
/// `.` and `..` are excluded. sorting makes archives reproducible.
pub fn read_dir_sorted(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let iter = fs::read_dir(dir).map_err(|source| Error::Open {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut entries = Vec::new();
    for entry in iter {
        let entry = entry.map_err(|source| Error::Read {
            path: dir.to_path_buf(),
            source,
        })?;
        entries.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
    }
    entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::{symlink, PermissionsExt};
    use tempfile::tempdir;

    #[test]
    fn test_file_type_regular() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file.txt");
        fs::write(&path, "content").unwrap();

        let info = FileInfo::from_path(&path).unwrap();
        assert_eq!(info.file_type, FileType::Regular);
        assert_eq!(info.size, 7);
    }

    #[test]
    fn test_file_type_directory() {
        let dir = tempdir().unwrap();
        let subdir = dir.path().join("subdir");
        fs::create_dir(&subdir).unwrap();

        let info = FileInfo::from_path(&subdir).unwrap();
        assert_eq!(info.file_type, FileType::Directory);
    }

    #[test]
    fn test_file_type_symlink_not_followed() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("target");
        let link = dir.path().join("link");
        fs::write(&target, "content").unwrap();
        symlink(&target, &link).unwrap();

        let info = FileInfo::from_path(&link).unwrap();
        assert_eq!(info.file_type, FileType::Symlink);
    }

    #[test]
    fn test_missing_path_is_not_exist() {
        let dir = tempdir().unwrap();
        let err = FileInfo::from_path(&dir.path().join("gone")).unwrap_err();
        assert!(matches!(err, Error::NotExist(_)));
    }

    #[test]
    fn test_metadata_mode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file.txt");
        fs::write(&path, "content").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let info = FileInfo::from_path(&path).unwrap();
        assert_eq!(info.mode & 0o777, 0o644);
    }

    #[test]
    fn test_read_symlink_target() {
        let dir = tempdir().unwrap();
        let link = dir.path().join("link");
        symlink("/some/target/path", &link).unwrap();

        let target = read_symlink_target(&link).unwrap();
        assert_eq!(target, "/some/target/path");
    }

    #[test]
    fn test_could_be_hardlink() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file.txt");
        fs::write(&path, "content").unwrap();

        let info = FileInfo::from_path(&path).unwrap();
        assert!(!info.could_be_hardlink());

        let link = dir.path().join("link");
        fs::hard_link(&path, &link).unwrap();

        let info = FileInfo::from_path(&path).unwrap();
        assert!(info.could_be_hardlink());
    }

    #[test]
    fn test_read_dir_sorted() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("zebra"), "").unwrap();
        fs::write(dir.path().join("alpha"), "").unwrap();
        fs::create_dir(dir.path().join("beta")).unwrap();

        let entries = read_dir_sorted(dir.path()).unwrap();
        let names: Vec<_> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "zebra"]);
    }

    #[test]
    fn test_read_dir_missing_is_open_error() {
        let dir = tempdir().unwrap();
        let err = read_dir_sorted(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::Open { .. }));
    }
}
