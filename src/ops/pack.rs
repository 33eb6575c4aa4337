use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, IoResultExt, Result};
use crate::fs::{read_dir_sorted, read_symlink_target, FileInfo, HardlinkTracker};
use crate::huffman;
use crate::ops::{CancelToken, COMPRESSED_FLAG, DEFAULT_BUFFER_SIZE, RAW_FLAG};
use crate::types::{EntryMeta, FileType};

/// options controlling a pack run
#[derive(Clone)]
pub struct PackOptions {
    /// huffman-compress the record stream
    pub compress: bool,
    /// buffer size for file body copies
    pub buffer_size: usize,
    /// checked between entries; cancelling stops the run cleanly
    pub cancel: CancelToken,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            compress: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
            cancel: CancelToken::new(),
        }
    }
}

/// counters reported by a pack run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackStats {
    /// records written, pop sentinels excluded
    pub entries: u64,
    /// file body bytes copied into the archive
    pub file_bytes: u64,
    /// entries stored as hardlink back-references
    pub hardlinks: u64,
    /// entries skipped with a warning
    pub skipped: u64,
}

/// pack the given sources into an archive stream
///
/// the archive leads with one flag byte; with compression enabled the
/// record stream is spooled to an unlinked temp file first, because the
/// codec needs two passes over it.
pub fn pack<W: Write>(sources: &[PathBuf], mut output: W, opts: &PackOptions) -> Result<PackStats> {
    let mut stats = PackStats::default();

    if opts.compress {
        output
            .write_all(&[COMPRESSED_FLAG])
            .map_err(Error::ArchiveWrite)?;

        let spool = tempfile::tempfile().map_err(Error::ArchiveWrite)?;
        let mut writer = BufWriter::new(spool);
        pack_stream(sources, &mut writer, opts, &mut stats)?;

        let mut spool = writer
            .into_inner()
            .map_err(|e| Error::ArchiveWrite(e.into_error()))?;
        spool
            .seek(SeekFrom::Start(0))
            .map_err(Error::ArchiveRead)?;
        huffman::compress(&mut spool, &mut output)?;
    } else {
        output.write_all(&[RAW_FLAG]).map_err(Error::ArchiveWrite)?;

        let mut writer = BufWriter::new(&mut output);
        pack_stream(sources, &mut writer, opts, &mut stats)?;
        writer.flush().map_err(Error::ArchiveWrite)?;
    }

    Ok(stats)
}

/// emit the raw record stream for all sources
fn pack_stream<W: Write>(
    sources: &[PathBuf],
    writer: &mut W,
    opts: &PackOptions,
    stats: &mut PackStats,
) -> Result<()> {
    let mut packer = Packer {
        writer,
        links: HardlinkTracker::new(),
        buf: vec![0u8; opts.buffer_size.max(1)],
        cancel: &opts.cancel,
        stats,
    };

    for source in sources {
        let info = match FileInfo::from_path(source) {
            Ok(info) => info,
            Err(Error::NotExist(_)) => {
                eprintln!("warning: {} does not exist, skipping", source.display());
                packer.stats.skipped += 1;
                continue;
            }
            Err(e) => return Err(e),
        };

        let name = match source.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            // "." or a path ending in "..": resolve against the cwd
            None => {
                let canonical = source.canonicalize().with_path(source)?;
                match canonical.file_name() {
                    Some(name) => name.to_string_lossy().into_owned(),
                    None => return Err(Error::InvalidSource(source.clone())),
                }
            }
        };

        // roots are archived as children of an implicit parent
        packer.entry(source, &name, &name, &info)?;
    }

    Ok(())
}

struct Packer<'a, W: Write> {
    writer: &'a mut W,
    links: HardlinkTracker,
    buf: Vec<u8>,
    cancel: &'a CancelToken,
    stats: &'a mut PackStats,
}

impl<W: Write> Packer<'_, W> {
    /// pack one entry; directories recurse over their sorted children
    fn entry(&mut self, path: &Path, name: &str, rel: &str, info: &FileInfo) -> Result<()> {
        self.cancel.check()?;

        let mut meta = EntryMeta {
            name: name.to_string(),
            file_type: info.file_type,
            mode: (info.mode & 0o7777) as u16,
            uid: info.uid,
            gid: info.gid,
            atime: info.atime,
            mtime: info.mtime,
            size: 0,
            link_target: String::new(),
            hardlink_ref: false,
        };

        match info.file_type {
            FileType::Regular => {
                if info.could_be_hardlink() {
                    if let Some(first) = self.links.check(info.dev, info.ino, rel) {
                        meta.link_target = first;
                        meta.hardlink_ref = true;
                        meta.write_to(self.writer)?;
                        self.stats.entries += 1;
                        self.stats.hardlinks += 1;
                        return Ok(());
                    }
                }

                meta.size = info.size;
                meta.write_to(self.writer)?;
                self.copy_body(path, info.size)?;
                self.stats.entries += 1;
                self.stats.file_bytes += info.size;
            }

            FileType::Directory => {
                meta.write_to(self.writer)?;
                self.stats.entries += 1;

                for (child_name, child_path) in read_dir_sorted(path)? {
                    let child_info = match FileInfo::from_path(&child_path) {
                        Ok(info) => info,
                        Err(Error::NotExist(_)) => {
                            // deleted between enumeration and stat
                            eprintln!(
                                "warning: {} vanished, skipping",
                                child_path.display()
                            );
                            self.stats.skipped += 1;
                            continue;
                        }
                        Err(e) => return Err(e),
                    };
                    let child_rel = format!("{rel}/{child_name}");
                    self.entry(&child_path, &child_name, &child_rel, &child_info)?;
                }

                EntryMeta::pop().write_to(self.writer)?;
            }

            FileType::Symlink => {
                meta.link_target = read_symlink_target(path)?;
                meta.write_to(self.writer)?;
                self.stats.entries += 1;
            }

            FileType::Fifo => {
                meta.write_to(self.writer)?;
                self.stats.entries += 1;
            }

            other => {
                eprintln!(
                    "warning: skipping {} ({})",
                    path.display(),
                    other.type_name()
                );
                self.stats.skipped += 1;
            }
        }

        Ok(())
    }

    /// stream exactly `size` body bytes into the archive
    fn copy_body(&mut self, path: &Path, size: u64) -> Result<()> {
        let mut file = File::open(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let mut remaining = size;
        while remaining > 0 {
            let want = (self.buf.len() as u64).min(remaining) as usize;
            let n = file.read(&mut self.buf[..want]).map_err(|source| Error::Read {
                path: path.to_path_buf(),
                source,
            })?;
            if n == 0 {
                return Err(Error::Read {
                    path: path.to_path_buf(),
                    source: io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "file shrank while packing",
                    ),
                });
            }
            self.writer
                .write_all(&self.buf[..n])
                .map_err(Error::ArchiveWrite)?;
            remaining -= n as u64;
        }

        Ok(())
    }
}

/// count filesystem entries under the given sources (for progress reporting)
pub fn count_entries(sources: &[PathBuf]) -> u64 {
    sources
        .iter()
        .map(|source| {
            WalkDir::new(source)
                .into_iter()
                .filter_map(|e| e.ok())
                .count() as u64
        })
        .sum()
}
