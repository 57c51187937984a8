//! Build- and read-time configuration.

use std::sync::Arc;

use bloom::FilterPolicy;

use crate::cache::BlockCache;
use crate::compare::{BytewiseComparator, Comparator};
use crate::format::CompressionType;

/// Options governing how tables are built and opened.
///
/// The same `Options` value (same comparator, same filter policy) must be
/// used to build a table and to read it back.
#[derive(Clone)]
pub struct Options {
    /// Key ordering. Defaults to plain byte order.
    pub comparator: Arc<dyn Comparator>,

    /// Uncompressed size at which a data block is cut. Default 4 KiB.
    pub block_size: usize,

    /// Entries between prefix-compression restart points. Default 16.
    /// Index blocks always use 1 so every separator is directly comparable.
    pub block_restart_interval: usize,

    /// Block compression. Snappy output that saves less than 12.5% is
    /// stored uncompressed.
    pub compression: CompressionType,

    /// Membership filter policy; `None` disables the filter block.
    pub filter_policy: Option<Arc<dyn FilterPolicy>>,

    /// Shared cache for decoded data blocks.
    pub block_cache: Option<Arc<BlockCache>>,

    /// Verify checksums on every internal read (index, meta, filter).
    pub paranoid_checks: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            comparator: Arc::new(BytewiseComparator),
            block_size: 4096,
            block_restart_interval: 16,
            compression: CompressionType::Snappy,
            filter_policy: None,
            block_cache: None,
            paranoid_checks: false,
        }
    }
}

/// Per-read knobs.
#[derive(Clone)]
pub struct ReadOptions {
    /// Verify the stored checksum of every block read.
    pub verify_checksums: bool,

    /// Insert blocks read for this operation into the block cache.
    pub fill_cache: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            verify_checksums: false,
            fill_cache: true,
        }
    }
}
