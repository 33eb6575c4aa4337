//! high-level archive operations: pack, unpack, list

mod list;
mod pack;
mod unpack;

pub use list::{list, EntryDescriptor};
pub use pack::{count_entries, pack, PackOptions, PackStats};
pub use unpack::{unpack, UnpackOptions};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// default buffer size for file body copies
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// leading archive byte: raw record stream
pub(crate) const RAW_FLAG: u8 = 0;
/// leading archive byte: huffman-compressed record stream
pub(crate) const COMPRESSED_FLAG: u8 = 1;

/// cooperative cancellation flag
///
/// clone the token and hand one copy to the engine; calling cancel() on
/// any clone makes the running operation stop at the next record
/// boundary and return a cancelled error.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_propagates_to_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());
        assert!(clone.check().is_err());
    }
}
