//! packrat - POSIX file-tree backup engine
//!
//! packs a user-selected set of files and directories into one archive
//! that preserves filesystem metadata (type, permissions, ownership,
//! timestamps), hardlink identity, symlink targets and FIFOs, and
//! restores them faithfully. archives can optionally be huffman-
//! compressed.
//!
//! # Archive format
//!
//! one flag byte (0 raw, 1 compressed) followed by a linear record
//! stream. a directory record is followed by the records of its sorted
//! children, then a sentinel record with an empty name closing it.
//! regular files carry their body inline; a later path sharing the same
//! inode is stored as a back-reference to the first occurrence instead
//! of a second body.
//!
//! # Example
//!
//! ```no_run
//! use std::fs::File;
//! use std::path::{Path, PathBuf};
//!
//! use packrat::{pack, unpack, PackOptions, UnpackOptions};
//!
//! let archive = File::create("etc.pkr").unwrap();
//! pack(&[PathBuf::from("/etc/hosts")], archive, &PackOptions::default()).unwrap();
//!
//! let archive = File::open("etc.pkr").unwrap();
//! unpack(archive, Path::new("/tmp/restore"), &UnpackOptions::default()).unwrap();
//! ```

mod config;
mod error;

pub mod fs;
pub mod huffman;
pub mod ops;
pub mod types;

pub use config::Config;
pub use error::{Error, ErrorCode, IoResultExt, Result};
pub use ops::{
    count_entries, list, pack, unpack, CancelToken, EntryDescriptor, PackOptions, PackStats,
    UnpackOptions, DEFAULT_BUFFER_SIZE,
};
pub use types::{EntryMeta, FileType};
