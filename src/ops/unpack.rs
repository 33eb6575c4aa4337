use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, IoResultExt, Result};
use crate::fs::{
    apply_metadata, create_dir, create_fifo, create_hardlink, create_symlink, RestoredPaths,
};
use crate::huffman;
use crate::ops::{CancelToken, COMPRESSED_FLAG, DEFAULT_BUFFER_SIZE, RAW_FLAG};
use crate::types::{read_fully, EntryMeta, FileType};

/// options controlling an unpack run
#[derive(Clone)]
pub struct UnpackOptions {
    /// buffer size for file body copies
    pub buffer_size: usize,
    /// checked between records; cancelling stops the run cleanly
    pub cancel: CancelToken,
}

impl Default for UnpackOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            cancel: CancelToken::new(),
        }
    }
}

/// restore an archive into the destination directory
///
/// failures leave partial state in place for inspection; there is no
/// rollback. restore-side metadata problems (ownership, mode, times)
/// are warnings, not errors.
pub fn unpack<R: Read>(mut input: R, destination: &Path, opts: &UnpackOptions) -> Result<()> {
    let mut flag = [0u8; 1];
    let n = read_fully(&mut input, &mut flag).map_err(Error::ArchiveRead)?;
    if n == 0 {
        return Err(Error::MalformedArchive("empty archive".to_string()));
    }

    match flag[0] {
        RAW_FLAG => restore_stream(&mut BufReader::new(input), destination, opts),
        COMPRESSED_FLAG => {
            // the decoder wants to run to completion, so spool the raw
            // record stream through an unlinked temp file
            let spool = tempfile::tempfile().map_err(Error::ArchiveWrite)?;
            let mut writer = BufWriter::new(spool);
            huffman::decompress(&mut BufReader::new(input), &mut writer)?;

            let mut spool = writer
                .into_inner()
                .map_err(|e| Error::ArchiveWrite(e.into_error()))?;
            spool
                .seek(SeekFrom::Start(0))
                .map_err(Error::ArchiveRead)?;
            restore_stream(&mut BufReader::new(spool), destination, opts)
        }
        other => Err(Error::MalformedArchive(format!(
            "unknown compression flag {other}"
        ))),
    }
}

/// an open directory on the restore stack
struct OpenDir {
    path: PathBuf,
    rel: String,
    /// record to apply when the directory is closed; None for the
    /// destination root, which is not ours
    meta: Option<EntryMeta>,
}

fn restore_stream<R: Read>(input: &mut R, destination: &Path, opts: &UnpackOptions) -> Result<()> {
    std::fs::create_dir_all(destination).with_path(destination)?;

    let mut stack = vec![OpenDir {
        path: destination.to_path_buf(),
        rel: String::new(),
        meta: None,
    }];
    let mut restored = RestoredPaths::new();
    let mut buf = vec![0u8; opts.buffer_size.max(1)];

    while let Some(meta) = EntryMeta::read_from(input)? {
        opts.cancel.check()?;

        if meta.is_pop() {
            if stack.len() <= 1 {
                return Err(Error::MalformedArchive(
                    "directory close without an open directory".to_string(),
                ));
            }
            if let Some(frame) = stack.pop() {
                // children exist now, so the directory's own metadata
                // (mtime included) can no longer be clobbered
                if let Some(dir_meta) = &frame.meta {
                    apply_metadata(&frame.path, dir_meta);
                }
            }
            continue;
        }

        let Some(top) = stack.last() else {
            return Err(Error::MalformedArchive(
                "directory stack underflow".to_string(),
            ));
        };
        let target = top.path.join(&meta.name);
        let rel = if top.rel.is_empty() {
            meta.name.clone()
        } else {
            format!("{}/{}", top.rel, meta.name)
        };

        match meta.file_type {
            FileType::Regular if meta.hardlink_ref => {
                let Some(first) = restored.get(&meta.link_target) else {
                    return Err(Error::MalformedArchive(format!(
                        "hardlink reference to unknown entry {}",
                        meta.link_target
                    )));
                };
                create_hardlink(&target, first)?;
                apply_metadata(&target, &meta);
            }

            FileType::Regular => {
                restore_body(input, &target, meta.size, &mut buf)?;
                restored.record(&rel, target.clone());
                apply_metadata(&target, &meta);
            }

            FileType::Directory => {
                create_dir(&target, meta.mode as u32)?;
                stack.push(OpenDir {
                    path: target,
                    rel,
                    meta: Some(meta),
                });
            }

            FileType::Symlink => {
                create_symlink(&target, &meta.link_target)?;
                apply_metadata(&target, &meta);
            }

            FileType::Fifo => {
                create_fifo(&target, meta.mode as u32)?;
                apply_metadata(&target, &meta);
            }

            other => {
                return Err(Error::MalformedArchive(format!(
                    "unexpected {} record",
                    other.type_name()
                )));
            }
        }
    }

    if stack.len() != 1 {
        return Err(Error::MalformedArchive(format!(
            "archive truncated with {} open directories",
            stack.len() - 1
        )));
    }

    Ok(())
}

/// copy exactly `size` body bytes from the archive into a new file
fn restore_body<R: Read>(input: &mut R, target: &Path, size: u64, buf: &mut [u8]) -> Result<()> {
    let mut file = File::create(target).map_err(|source| Error::Open {
        path: target.to_path_buf(),
        source,
    })?;

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
        file.write_all(&buf[..n]).map_err(|source| Error::Write {
            path: target.to_path_buf(),
            source,
        })?;
        remaining -= n as u64;
    }

    Ok(())
}
