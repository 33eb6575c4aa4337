use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// tracker for detecting hardlinks while packing
///
/// files sharing a (dev, ino) pair are hardlinks to each other. the first
/// occurrence's archive-relative path is stored; later occurrences become
/// back-references to it instead of carrying the body again.
pub struct HardlinkTracker {
    /// maps (dev, ino) to the first archive path that carried this inode
    seen: HashMap<(u64, u64), String>,
}

impl HardlinkTracker {
    pub fn new() -> Self {
        Self {
            seen: HashMap::new(),
        }
    }

    /// check if this inode was packed before
    ///
    /// the first call for a (dev, ino) records the path and returns None;
    /// later calls return the original archive-relative path.
    pub fn check(&mut self, dev: u64, ino: u64, path: &str) -> Option<String> {
        let key = (dev, ino);
        if let Some(existing) = self.seen.get(&key) {
            Some(existing.clone())
        } else {
            self.seen.insert(key, path.to_string());
            None
        }
    }

    /// number of unique inodes tracked
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// is the tracker empty
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for HardlinkTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// map from archive-relative paths to restored filesystem paths
///
/// a hardlink back-reference names the archive path of the entry that
/// carried the body; by the nesting convention that entry was restored
/// earlier, so the map can hand link(2) its on-disk location.
pub struct RestoredPaths {
    paths: HashMap<String, PathBuf>,
}

impl RestoredPaths {
    pub fn new() -> Self {
        Self {
            paths: HashMap::new(),
        }
    }

    /// record that the entry at archive path was restored to fs_path
    pub fn record(&mut self, archive_path: &str, fs_path: PathBuf) {
        self.paths.insert(archive_path.to_string(), fs_path);
    }

    /// filesystem path a back-reference should link against
    pub fn get(&self, archive_path: &str) -> Option<&Path> {
        self.paths.get(archive_path).map(|p| p.as_path())
    }
}

impl Default for RestoredPaths {
    fn default() -> Self {
        Self::new()
    }
}
