//! The two-level iterator: index cursor plus lazily-loaded data cursors.
//!
//! The index block maps separator keys to data-block handles. This cursor
//! walks the index and materializes a data-block cursor on demand, memoizing
//! the handle bytes that produced it so repeated seeks into the same block
//! reuse the loaded cursor instead of hitting the cache again.

use std::sync::Arc;

use crate::block::BlockIter;
use crate::error::{Error, Result};
use crate::iter::Iter;
use crate::options::ReadOptions;
use crate::reader::Table;

/// Cursor over a whole table. Obtained from
/// [`Table::new_iterator`](crate::Table::new_iterator).
pub struct TwoLevelIterator {
    table: Arc<Table>,
    options: ReadOptions,
    index_iter: BlockIter,
    data_iter: Option<BlockIter>,
    /// The encoded handle that produced `data_iter`, for reuse detection.
    data_block_handle: Vec<u8>,
    status: Option<Error>,
}

impl TwoLevelIterator {
    pub(crate) fn new(table: Arc<Table>, options: ReadOptions) -> Self {
        let index_iter = BlockIter::new(
            Arc::clone(table.index_block()),
            table.options().comparator.clone(),
        );
        Self {
            table,
            options,
            index_iter,
            data_iter: None,
            data_block_handle: Vec::new(),
            status: None,
        }
    }

    fn save_error(&mut self, e: Error) {
        if self.status.is_none() {
            self.status = Some(e);
        }
    }

    fn set_data_iter(&mut self, iter: Option<BlockIter>) {
        if let Some(old) = &self.data_iter {
            if let Err(e) = old.status() {
                self.save_error(e);
            }
        }
        self.data_iter = iter;
    }

    /// Points `data_iter` at the block the index cursor currently names.
    fn init_data_block(&mut self) {
        if !self.index_iter.valid() {
            self.set_data_iter(None);
            return;
        }
        let handle = self.index_iter.value();
        if self.data_iter.is_some() && handle == self.data_block_handle.as_slice() {
            // Already positioned on this block.
            return;
        }
        let handle = handle.to_vec();
        match self.table.block_reader(&self.options, &handle) {
            Ok(iter) => {
                self.data_block_handle = handle;
                self.set_data_iter(Some(iter));
            }
            Err(e) => {
                self.save_error(e);
                self.data_block_handle = handle;
                self.set_data_iter(None);
            }
        }
    }

    fn skip_empty_data_blocks_forward(&mut self) {
        while self.data_iter.as_ref().map_or(true, |it| !it.valid()) {
            if !self.index_iter.valid() {
                self.set_data_iter(None);
                return;
            }
            self.index_iter.next();
            self.init_data_block();
            if let Some(it) = &mut self.data_iter {
                it.seek_to_first();
            }
        }
    }

    fn skip_empty_data_blocks_backward(&mut self) {
        while self.data_iter.as_ref().map_or(true, |it| !it.valid()) {
            if !self.index_iter.valid() {
                self.set_data_iter(None);
                return;
            }
            self.index_iter.prev();
            self.init_data_block();
            if let Some(it) = &mut self.data_iter {
                it.seek_to_last();
            }
        }
    }
}

impl Iter for TwoLevelIterator {
    fn valid(&self) -> bool {
        self.data_iter.as_ref().map_or(false, |it| it.valid())
    }

    fn seek(&mut self, target: &[u8]) {
        self.index_iter.seek(target);
        self.init_data_block();
        if let Some(it) = &mut self.data_iter {
            it.seek(target);
        }
        self.skip_empty_data_blocks_forward();
    }

    fn seek_to_first(&mut self) {
        self.index_iter.seek_to_first();
        self.init_data_block();
        if let Some(it) = &mut self.data_iter {
            it.seek_to_first();
        }
        self.skip_empty_data_blocks_forward();
    }

    fn seek_to_last(&mut self) {
        self.index_iter.seek_to_last();
        self.init_data_block();
        if let Some(it) = &mut self.data_iter {
            it.seek_to_last();
        }
        self.skip_empty_data_blocks_backward();
    }

    fn next(&mut self) {
        debug_assert!(self.valid());
        if let Some(it) = &mut self.data_iter {
            it.next();
        }
        self.skip_empty_data_blocks_forward();
    }

    fn prev(&mut self) {
        debug_assert!(self.valid());
        if let Some(it) = &mut self.data_iter {
            it.prev();
        }
        self.skip_empty_data_blocks_backward();
    }

    fn key(&self) -> &[u8] {
        self.data_iter
            .as_ref()
            .expect("key() on invalid iterator")
            .key()
    }

    fn value(&self) -> &[u8] {
        self.data_iter
            .as_ref()
            .expect("value() on invalid iterator")
            .value()
    }

    fn status(&self) -> Result<()> {
        self.index_iter.status()?;
        if let Some(it) = &self.data_iter {
            it.status()?;
        }
        match &self.status {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}
