//! The table builder: turns an ordered stream of entries into a table file.
//!
//! Data blocks are cut at [`Options::block_size`] and written with a
//! compression-type + checksum trailer. The index entry for a finished data
//! block is deferred until the first key of the *next* block arrives, so the
//! index can use a short separator key (for a boundary between
//! `"the quick brown fox"` and `"the who"`, the index only needs `"the r"`).
//!
//! File layout produced by [`finish`](TableBuilder::finish):
//!
//! ```text
//! ┌─────────────────────────────┐
//! │ data block 0 .. data block n│
//! │ filter block (uncompressed) │
//! │ meta-index block            │
//! │ index block                 │
//! │ footer (48 bytes)           │
//! └─────────────────────────────┘
//! ```

use std::cmp::Ordering;

use byteorder::{ByteOrder, LittleEndian};
use crc32fast::Hasher as Crc32;

use crate::block::BlockBuilder;
use crate::error::{Error, Result};
use crate::file::WritableFile;
use crate::filter::FilterBlockBuilder;
use crate::format::{mask_crc, BlockHandle, CompressionType, Footer, BLOCK_TRAILER_SIZE};
use crate::options::Options;

/// Streams sorted entries into an on-disk table.
///
/// Keys must arrive in strictly increasing order per the configured
/// comparator. The first failed file write latches into the builder's
/// status; later calls become no-ops and the error resurfaces from
/// [`finish`](TableBuilder::finish) or [`status`](TableBuilder::status).
pub struct TableBuilder {
    options: Options,
    file: Box<dyn WritableFile>,
    offset: u64,
    status: Option<Error>,
    data_block: BlockBuilder,
    /// Index entries are separators; restart interval 1 keeps each one
    /// binary-searchable without prefix replay.
    index_block: BlockBuilder,
    last_key: Vec<u8>,
    num_entries: u64,
    closed: bool,
    filter_block: Option<FilterBlockBuilder>,
    /// True once a data block is written and its index entry is still owed.
    pending_index_entry: bool,
    pending_handle: BlockHandle,
}

impl TableBuilder {
    pub fn new(options: Options, file: Box<dyn WritableFile>) -> Self {
        let mut filter_block = options
            .filter_policy
            .clone()
            .map(FilterBlockBuilder::new);
        if let Some(fb) = &mut filter_block {
            fb.start_block(0);
        }
        let data_restart_interval = options.block_restart_interval;
        Self {
            options,
            file,
            offset: 0,
            status: None,
            data_block: BlockBuilder::new(data_restart_interval),
            index_block: BlockBuilder::new(1),
            last_key: Vec::new(),
            num_entries: 0,
            closed: false,
            filter_block,
            pending_index_entry: false,
            pending_handle: BlockHandle::default(),
        }
    }

    /// Replaces the build options mid-stream, e.g. to switch compression
    /// for a hotter key range. The comparator must not change: entries
    /// already written are ordered under it.
    pub fn change_options(&mut self, options: Options) -> Result<()> {
        if options.comparator.name() != self.options.comparator.name() {
            return Err(Error::InvalidArgument(
                "changing comparator while building table".to_string(),
            ));
        }
        if self.data_block.is_empty() {
            self.data_block = BlockBuilder::new(options.block_restart_interval);
        }
        self.options = options;
        Ok(())
    }

    fn ok(&self) -> bool {
        self.status.is_none()
    }

    fn latch(&mut self, e: Error) {
        if self.status.is_none() {
            self.status = Some(e);
        }
    }

    /// Appends an entry. The key must sort strictly after every key added so
    /// far; adding out of order is a contract violation and panics.
    pub fn add(&mut self, key: &[u8], value: &[u8]) {
        assert!(!self.closed, "add() after finish() or abandon()");
        if !self.ok() {
            return;
        }
        if self.num_entries > 0 {
            assert_eq!(
                self.options.comparator.compare(key, &self.last_key),
                Ordering::Greater,
                "keys must be added in strictly increasing order"
            );
        }

        if self.pending_index_entry {
            debug_assert!(self.data_block.is_empty());
            self.options
                .comparator
                .find_shortest_separator(&mut self.last_key, key);
            let mut handle_encoding = Vec::new();
            self.pending_handle.encode_to(&mut handle_encoding);
            self.index_block.add(&self.last_key, &handle_encoding);
            self.pending_index_entry = false;
        }

        if let Some(fb) = &mut self.filter_block {
            fb.add_key(key);
        }

        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        self.num_entries += 1;
        self.data_block.add(key, value);

        if self.data_block.current_size_estimate() >= self.options.block_size {
            self.flush();
        }
    }

    /// Cuts the current data block and writes it out.
    pub fn flush(&mut self) {
        assert!(!self.closed, "flush() after finish() or abandon()");
        if !self.ok() || self.data_block.is_empty() {
            return;
        }
        debug_assert!(!self.pending_index_entry);

        let raw = self.data_block.finish();
        self.data_block.reset();
        let handle = self.write_block(raw, self.options.compression);
        if self.ok() {
            self.pending_handle = handle;
            self.pending_index_entry = true;
            if let Err(e) = self.file.flush() {
                self.latch(e);
            }
        }
        if let Some(fb) = &mut self.filter_block {
            fb.start_block(self.offset);
        }
    }

    /// Compresses (when configured and profitable) and appends one block.
    fn write_block(&mut self, raw: Vec<u8>, compression: CompressionType) -> BlockHandle {
        let (contents, block_type) = match compression {
            CompressionType::None => (raw, CompressionType::None),
            CompressionType::Snappy => {
                match snap::raw::Encoder::new().compress_vec(&raw) {
                    // Keep the compressed form only when it saves >= 12.5%.
                    Ok(compressed) if compressed.len() < raw.len() - raw.len() / 8 => {
                        (compressed, CompressionType::Snappy)
                    }
                    _ => (raw, CompressionType::None),
                }
            }
        };
        self.write_raw_block(&contents, block_type)
    }

    /// Appends `contents` plus the type/checksum trailer, returning the
    /// handle of the written block. I/O failures latch.
    fn write_raw_block(&mut self, contents: &[u8], block_type: CompressionType) -> BlockHandle {
        let handle = BlockHandle::new(self.offset, contents.len() as u64);
        let result = (|| -> Result<()> {
            self.file.append(contents)?;
            let mut trailer = [0u8; BLOCK_TRAILER_SIZE];
            trailer[0] = block_type as u8;
            let mut hasher = Crc32::new();
            hasher.update(contents);
            hasher.update(&trailer[..1]); // checksum covers the type byte too
            LittleEndian::write_u32(&mut trailer[1..], mask_crc(hasher.finalize()));
            self.file.append(&trailer)?;
            Ok(())
        })();
        match result {
            Ok(()) => self.offset += contents.len() as u64 + BLOCK_TRAILER_SIZE as u64,
            Err(e) => self.latch(e),
        }
        handle
    }

    /// Writes the filter, meta-index and index blocks plus the footer, and
    /// closes the builder.
    pub fn finish(&mut self) -> Result<()> {
        self.flush();
        assert!(!self.closed, "finish() called twice");
        self.closed = true;

        // Filter block, always stored uncompressed so the reader can slice
        // into it directly.
        let mut filter_handle = None;
        if self.ok() {
            let filter_contents = self.filter_block.as_mut().map(|fb| fb.finish());
            if let Some(contents) = filter_contents {
                filter_handle = Some(self.write_raw_block(&contents, CompressionType::None));
            }
        }

        // Meta-index block: maps "filter.<policy>" to the filter handle.
        let mut metaindex_handle = BlockHandle::default();
        if self.ok() {
            let mut meta_index_block = BlockBuilder::new(self.options.block_restart_interval);
            if let (Some(policy), Some(handle)) = (&self.options.filter_policy, &filter_handle) {
                let key = format!("filter.{}", policy.name());
                let mut handle_encoding = Vec::new();
                handle.encode_to(&mut handle_encoding);
                meta_index_block.add(key.as_bytes(), &handle_encoding);
            }
            let raw = meta_index_block.finish();
            metaindex_handle = self.write_block(raw, self.options.compression);
        }

        // Index block, including the entry owed for the final data block.
        let mut index_handle = BlockHandle::default();
        if self.ok() {
            if self.pending_index_entry {
                self.options.comparator.find_short_successor(&mut self.last_key);
                let mut handle_encoding = Vec::new();
                self.pending_handle.encode_to(&mut handle_encoding);
                self.index_block.add(&self.last_key, &handle_encoding);
                self.pending_index_entry = false;
            }
            let raw = self.index_block.finish();
            index_handle = self.write_block(raw, self.options.compression);
        }

        if self.ok() {
            let footer = Footer {
                metaindex_handle,
                index_handle,
            };
            let mut footer_encoding = Vec::new();
            footer.encode_to(&mut footer_encoding);
            match self.file.append(&footer_encoding) {
                Ok(()) => self.offset += footer_encoding.len() as u64,
                Err(e) => self.latch(e),
            }
        }
        self.status()
    }

    /// Closes the builder without writing anything further. The file
    /// contents are unspecified afterwards.
    pub fn abandon(&mut self) {
        assert!(!self.closed, "abandon() after finish() or abandon()");
        self.closed = true;
    }

    /// First error this builder ran into, if any.
    pub fn status(&self) -> Result<()> {
        match &self.status {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    /// Entries added so far.
    pub fn num_entries(&self) -> u64 {
        self.num_entries
    }

    /// Bytes written so far; after `finish()`, the final file size.
    pub fn file_size(&self) -> u64 {
        self.offset
    }
}

impl Drop for TableBuilder {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            debug_assert!(
                self.closed,
                "TableBuilder dropped without finish() or abandon()"
            );
        }
    }
}
