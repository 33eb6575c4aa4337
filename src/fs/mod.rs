pub mod hardlink;
pub mod read;
pub mod write;

pub use hardlink::{HardlinkTracker, RestoredPaths};
pub use read::{read_dir_sorted, read_symlink_target, FileInfo};
pub use write::{
    apply_metadata, create_dir, create_fifo, create_hardlink, create_symlink, remove, remove_all,
};
