use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom};

use crate::error::{Error, Result};
use crate::huffman;
use crate::ops::{COMPRESSED_FLAG, DEFAULT_BUFFER_SIZE, RAW_FLAG};
use crate::types::{read_fully, EntryMeta, FileType};

/// archive entry with its full archive-relative path
#[derive(Debug, Clone)]
pub struct EntryDescriptor {
    pub path: String,
    pub meta: EntryMeta,
}

/// iterate an archive's records without touching the filesystem
///
/// bodies are skipped over; framing is validated the same way unpack
/// validates it, so a malformed archive is reported here too.
pub fn list<R: Read>(mut input: R) -> Result<Vec<EntryDescriptor>> {
    let mut flag = [0u8; 1];
    let n = read_fully(&mut input, &mut flag).map_err(Error::ArchiveRead)?;
    if n == 0 {
        return Err(Error::MalformedArchive("empty archive".to_string()));
    }

    match flag[0] {
        RAW_FLAG => walk_records(&mut BufReader::new(input)),
        COMPRESSED_FLAG => {
            let spool = tempfile::tempfile().map_err(Error::ArchiveWrite)?;
            let mut writer = BufWriter::new(spool);
            huffman::decompress(&mut BufReader::new(input), &mut writer)?;

            let mut spool = writer
                .into_inner()
                .map_err(|e| Error::ArchiveWrite(e.into_error()))?;
            spool
                .seek(SeekFrom::Start(0))
                .map_err(Error::ArchiveRead)?;
            walk_records(&mut BufReader::new(spool))
        }
        other => Err(Error::MalformedArchive(format!(
            "unknown compression flag {other}"
        ))),
    }
}

fn walk_records<R: Read>(input: &mut R) -> Result<Vec<EntryDescriptor>> {
    let mut prefixes: Vec<String> = vec![String::new()];
    let mut entries = Vec::new();
    let mut buf = vec![0u8; DEFAULT_BUFFER_SIZE];

    while let Some(meta) = EntryMeta::read_from(input)? {
        if meta.is_pop() {
            if prefixes.len() <= 1 {
                return Err(Error::MalformedArchive(
                    "directory close without an open directory".to_string(),
                ));
            }
            prefixes.pop();
            continue;
        }

        let prefix = prefixes.last().map(String::as_str).unwrap_or("");
        let path = if prefix.is_empty() {
            meta.name.clone()
        } else {
            format!("{}/{}", prefix, meta.name)
        };

        if meta.file_type == FileType::Directory {
            prefixes.push(path.clone());
        }
        if meta.file_type == FileType::Regular && !meta.hardlink_ref {
            skip_body(input, meta.size, &mut buf)?;
        }

        entries.push(EntryDescriptor { path, meta });
    }

    if prefixes.len() != 1 {
        return Err(Error::MalformedArchive(format!(
            "archive truncated with {} open directories",
            prefixes.len() - 1
        )));
    }

    Ok(entries)
}

fn skip_body<R: Read>(input: &mut R, size: u64, buf: &mut [u8]) -> Result<()> {
    let mut remaining = size;
    while remaining > 0 {
        let want = (buf.len() as u64).min(remaining) as usize;
        let n = match input.read(&mut buf[..want]) {
            Ok(0) => {
                return Err(Error::MalformedArchive(
                    "archive ends inside a file body".to_string(),
                ))
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::ArchiveRead(e)),
        };
        remaining -= n as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::ops::{pack, PackOptions};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn sample_tree() -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let root = dir.path().join("d");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("file.txt"), "body bytes").unwrap();
        fs::write(root.join("sub/nested"), "n").unwrap();
        std::os::unix::fs::symlink("file.txt", root.join("link")).unwrap();
        (dir, root)
    }

    #[test]
    fn test_list_paths_in_archive_order() {
        let (_dir, root) = sample_tree();
        let mut archive = Vec::new();
        pack(&[root], &mut archive, &PackOptions::default()).unwrap();

        let entries = list(&archive[..]).unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["d", "d/file.txt", "d/link", "d/sub", "d/sub/nested"]);
    }

    #[test]
    fn test_list_reports_metadata() {
        let (_dir, root) = sample_tree();
        let mut archive = Vec::new();
        pack(&[root], &mut archive, &PackOptions::default()).unwrap();

        let entries = list(&archive[..]).unwrap();
        let file = entries.iter().find(|e| e.path == "d/file.txt").unwrap();
        assert_eq!(file.meta.file_type, FileType::Regular);
        assert_eq!(file.meta.size, 10);

        let link = entries.iter().find(|e| e.path == "d/link").unwrap();
        assert_eq!(link.meta.link_target, "file.txt");
    }

    #[test]
    fn test_list_compressed_archive() {
        let (_dir, root) = sample_tree();
        let mut raw = Vec::new();
        pack(&[root.clone()], &mut raw, &PackOptions::default()).unwrap();
        let mut compressed = Vec::new();
        let opts = PackOptions {
            compress: true,
            ..Default::default()
        };
        pack(&[root], &mut compressed, &opts).unwrap();

        let raw_paths: Vec<String> = list(&raw[..]).unwrap().into_iter().map(|e| e.path).collect();
        let compressed_paths: Vec<String> = list(&compressed[..])
            .unwrap()
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(raw_paths, compressed_paths);
    }

    #[test]
    fn test_list_rejects_empty_input() {
        let err = list(&[][..]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Malformed);
    }

    #[test]
    fn test_list_rejects_unbalanced_directories() {
        let mut archive = vec![0u8];
        let meta = EntryMeta {
            name: "open".to_string(),
            file_type: FileType::Directory,
            mode: 0o755,
            uid: 0,
            gid: 0,
            atime: 0,
            mtime: 0,
            size: 0,
            link_target: String::new(),
            hardlink_ref: false,
        };
        meta.write_to(&mut archive).unwrap();
        // no closing sentinel

        let err = list(&archive[..]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Malformed);
    }
}
