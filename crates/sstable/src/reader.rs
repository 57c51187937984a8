//! The table reader: opens a built file and serves lookups and scans.
//!
//! `open` validates the footer, loads the index block, and tries to load the
//! filter named in the meta-index block. Filter-metadata failures are logged
//! and swallowed: a table without its filter is slower, not broken.
//!
//! Data blocks are fetched lazily through the optional shared
//! [`BlockCache`](crate::BlockCache); a cursor over a block holds an
//! `Arc<Block>` clone, so eviction never invalidates a live cursor.

use std::sync::Arc;

use log::{debug, warn};

use crate::block::{Block, BlockIter};
use crate::compare::BytewiseComparator;
use crate::error::{Error, Result};
use crate::file::RandomAccessFile;
use crate::filter::FilterBlockReader;
use crate::format::{read_block, BlockHandle, Footer, FOOTER_ENCODED_LENGTH};
use crate::iter::Iter;
use crate::options::{Options, ReadOptions};
use crate::two_level::TwoLevelIterator;

/// An open, immutable table file.
pub struct Table {
    options: Options,
    file: Box<dyn RandomAccessFile>,
    cache_id: u64,
    filter: Option<FilterBlockReader>,
    metaindex_handle: BlockHandle,
    index_block: Arc<Block>,
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("cache_id", &self.cache_id)
            .field("metaindex_handle", &self.metaindex_handle)
            .finish_non_exhaustive()
    }
}

impl Table {
    /// Opens a table file of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns `Corruption` if the file is shorter than a footer, the magic
    /// is wrong, or the index block fails to decode; `Io` on read failures.
    pub fn open(options: Options, file: Box<dyn RandomAccessFile>, size: u64) -> Result<Table> {
        if size < FOOTER_ENCODED_LENGTH as u64 {
            return Err(Error::corruption("file is too short to be an sstable"));
        }
        let footer_input = file.read(size - FOOTER_ENCODED_LENGTH as u64, FOOTER_ENCODED_LENGTH)?;
        let footer = Footer::decode_from(&footer_input)?;

        let mut opt = ReadOptions::default();
        if options.paranoid_checks {
            opt.verify_checksums = true;
        }
        let index_contents = read_block(file.as_ref(), &opt, &footer.index_handle)?;
        let index_block = Arc::new(Block::new(index_contents)?);

        let cache_id = options
            .block_cache
            .as_ref()
            .map_or(0, |cache| cache.new_id());

        let mut table = Table {
            options,
            file,
            cache_id,
            filter: None,
            metaindex_handle: footer.metaindex_handle,
            index_block,
        };
        table.read_meta();
        debug!("opened sstable of {} bytes", size);
        Ok(table)
    }

    /// Loads the filter block named in the meta-index. Failures here only
    /// cost performance, so they are logged and swallowed.
    fn read_meta(&mut self) {
        let Some(policy) = self.options.filter_policy.clone() else {
            return;
        };
        let mut opt = ReadOptions::default();
        if self.options.paranoid_checks {
            opt.verify_checksums = true;
        }
        let meta = match read_block(self.file.as_ref(), &opt, &self.metaindex_handle)
            .and_then(Block::new)
        {
            Ok(block) => Arc::new(block),
            Err(e) => {
                warn!("proceeding without filter: cannot read meta-index block: {e}");
                return;
            }
        };

        let mut iter = BlockIter::new(meta, Arc::new(BytewiseComparator));
        let key = format!("filter.{}", policy.name());
        iter.seek(key.as_bytes());
        if iter.valid() && iter.key() == key.as_bytes() {
            let handle_value = iter.value().to_vec();
            self.read_filter(policy, &handle_value);
        }
    }

    fn read_filter(&mut self, policy: Arc<dyn bloom::FilterPolicy>, filter_handle_value: &[u8]) {
        let Ok((handle, _)) = BlockHandle::decode_from(filter_handle_value) else {
            return;
        };
        let mut opt = ReadOptions::default();
        if self.options.paranoid_checks {
            opt.verify_checksums = true;
        }
        match read_block(self.file.as_ref(), &opt, &handle) {
            Ok(contents) => {
                self.filter = Some(FilterBlockReader::new(policy, contents.data));
            }
            Err(e) => warn!("proceeding without filter: cannot read filter block: {e}"),
        }
    }

    pub(crate) fn index_block(&self) -> &Arc<Block> {
        &self.index_block
    }

    pub(crate) fn options(&self) -> &Options {
        &self.options
    }

    /// Resolves an encoded block handle (an index-block value) into a cursor
    /// over that data block, going through the block cache when configured.
    pub(crate) fn block_reader(
        &self,
        options: &ReadOptions,
        index_value: &[u8],
    ) -> Result<BlockIter> {
        // Extra bytes after the handle are tolerated so the index value
        // encoding can grow.
        let (handle, _) = BlockHandle::decode_from(index_value)?;

        let block = match &self.options.block_cache {
            Some(cache) => match cache.lookup(self.cache_id, handle.offset) {
                Some(block) => block,
                None => {
                    let contents = read_block(self.file.as_ref(), options, &handle)?;
                    let cachable = contents.cachable;
                    let block = Arc::new(Block::new(contents)?);
                    if cachable && options.fill_cache {
                        cache.insert(self.cache_id, handle.offset, Arc::clone(&block));
                    }
                    block
                }
            },
            None => {
                let contents = read_block(self.file.as_ref(), options, &handle)?;
                Arc::new(Block::new(contents)?)
            }
        };
        Ok(BlockIter::new(block, self.options.comparator.clone()))
    }

    /// Returns a cursor over the whole table.
    pub fn new_iterator(self: Arc<Self>, options: ReadOptions) -> TwoLevelIterator {
        TwoLevelIterator::new(self, options)
    }

    /// Point lookup. Seeks to the first entry with key >= `key`; if the
    /// filter rules the key out the block is never read. When an entry is
    /// found, `handler` receives the stored key and value; deciding whether
    /// the found key actually matches is the caller's business.
    pub fn internal_get(
        &self,
        options: &ReadOptions,
        key: &[u8],
        handler: impl FnOnce(&[u8], &[u8]),
    ) -> Result<()> {
        let mut index_iter =
            BlockIter::new(Arc::clone(&self.index_block), self.options.comparator.clone());
        index_iter.seek(key);
        if index_iter.valid() {
            let handle_value = index_iter.value().to_vec();
            let filtered_out = match (&self.filter, BlockHandle::decode_from(&handle_value)) {
                (Some(filter), Ok((handle, _))) => !filter.key_may_match(handle.offset, key),
                _ => false,
            };
            if !filtered_out {
                let mut block_iter = self.block_reader(options, &handle_value)?;
                block_iter.seek(key);
                if block_iter.valid() {
                    handler(block_iter.key(), block_iter.value());
                }
                block_iter.status()?;
            }
        }
        index_iter.status()
    }

    /// Approximate file offset where the data for `key` begins. Keys past
    /// the last entry map to the meta-index offset, which sits near the end
    /// of the file.
    pub fn approximate_offset_of(&self, key: &[u8]) -> u64 {
        let mut index_iter =
            BlockIter::new(Arc::clone(&self.index_block), self.options.comparator.clone());
        index_iter.seek(key);
        if index_iter.valid() {
            if let Ok((handle, _)) = BlockHandle::decode_from(index_iter.value()) {
                return handle.offset;
            }
        }
        self.metaindex_handle.offset
    }
}
