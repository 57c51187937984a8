//! # SSTable - Sorted String Table
//!
//! Immutable, block-structured on-disk tables for the UndertowKV storage
//! engine, plus the iterator stack that merges many of them into one ordered
//! view.
//!
//! Tables are *write-once, read-many*: a [`TableBuilder`] streams sorted
//! entries into a file, and a [`Table`] serves point lookups and range scans
//! from it forever after.
//!
//! ## File layout
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ DATA BLOCKS (prefix-compressed sorted entries)                 │
//! │                                                               │
//! │ each block: entries | restart array | restart count            │
//! │ each followed by: type (u8) | masked crc32 (u32 LE)            │
//! ├───────────────────────────────────────────────────────────────┤
//! │ FILTER BLOCK (bitmaps | offsets | array offset | base_lg)      │
//! ├───────────────────────────────────────────────────────────────┤
//! │ META-INDEX BLOCK ("filter.<policy>" -> filter handle)          │
//! ├───────────────────────────────────────────────────────────────┤
//! │ INDEX BLOCK (separator key -> data block handle)               │
//! ├───────────────────────────────────────────────────────────────┤
//! │ FOOTER (always last 48 bytes)                                  │
//! │                                                               │
//! │ metaindex handle | index handle | padding                     │
//! │ magic (u64 LE) = 0xdb4775248b80fb57                            │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! All fixed-width integers are little-endian; handles and block-entry
//! headers are varints.
//!
//! ## Iterator stack
//!
//! | Layer | Purpose |
//! |-------|---------|
//! | [`BlockIter`] | one block: binary search over restart points |
//! | [`TwoLevelIterator`] | one table: index cursor + lazy data cursors |
//! | [`MergingIterator`] | many sources: n-way bidirectional merge |
//!
//! All three speak the same [`Iter`] trait, as does the multi-version DB
//! view built on top of them in the `engine` crate.

mod block;
mod cache;
mod compare;
mod error;
mod file;
mod filter;
mod format;
mod iter;
mod key;
mod merge;
mod options;
mod reader;
mod two_level;
mod writer;

pub use block::{Block, BlockBuilder, BlockIter};
pub use cache::BlockCache;
pub use compare::{BytewiseComparator, Comparator, InternalKeyComparator};
pub use error::{Error, Result};
pub use file::{FsRandomAccessFile, FsWritableFile, RandomAccessFile, WritableFile};
pub use filter::{FilterBlockBuilder, FilterBlockReader, FILTER_BASE_LG};
pub use format::{
    mask_crc, read_block, unmask_crc, BlockContents, BlockHandle, CompressionType, Footer,
    BLOCK_TRAILER_SIZE, FOOTER_ENCODED_LENGTH, TABLE_MAGIC_NUMBER,
};
pub use iter::Iter;
pub use key::{
    append_internal_key, extract_user_key, pack_sequence_and_type, parse_internal_key,
    ParsedInternalKey, SequenceNumber, ValueType, MAX_SEQUENCE_NUMBER, TYPE_FOR_SEEK,
};
pub use merge::{new_merging_iterator, MergingIterator};
pub use options::{Options, ReadOptions};
pub use reader::Table;
pub use two_level::TwoLevelIterator;
pub use writer::TableBuilder;

#[cfg(test)]
mod tests;
