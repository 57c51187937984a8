//! The filter block: per-range approximate-membership filters.
//!
//! One filter is generated for every 2 KiB window of data-block *offset*
//! space (`base_lg = 11`), so a reader can map a data block's file offset to
//! the filter covering the keys written while that block was current.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ filter 0 bytes | filter 1 bytes | ...        │
//! ├──────────────────────────────────────────────┤
//! │ offsets: u32 LE per filter                   │
//! │ array_offset: u32 LE                         │
//! │ base_lg: u8                                  │
//! └──────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use bloom::FilterPolicy;
use byteorder::{ByteOrder, LittleEndian};

/// Data-block offset space covered per filter: 1 << FILTER_BASE_LG bytes.
pub const FILTER_BASE_LG: usize = 11;
const FILTER_BASE: u64 = 1 << FILTER_BASE_LG;

/// Builds the filter block as the table builder streams keys through it.
///
/// Call sequence: `(start_block add_key*)* finish`.
pub struct FilterBlockBuilder {
    policy: Arc<dyn FilterPolicy>,
    /// Flattened bytes of the keys pending in the current filter.
    keys: Vec<u8>,
    /// Start offset of each pending key within `keys`.
    start: Vec<usize>,
    result: Vec<u8>,
    filter_offsets: Vec<u32>,
}

impl FilterBlockBuilder {
    pub fn new(policy: Arc<dyn FilterPolicy>) -> Self {
        Self {
            policy,
            keys: Vec::new(),
            start: Vec::new(),
            result: Vec::new(),
            filter_offsets: Vec::new(),
        }
    }

    /// Announces that the data block starting at `block_offset` is now
    /// current. Synthesizes (possibly empty) filters for every filter window
    /// between the previous block and this one.
    pub fn start_block(&mut self, block_offset: u64) {
        let filter_index = block_offset / FILTER_BASE;
        debug_assert!(filter_index >= self.filter_offsets.len() as u64);
        while filter_index > self.filter_offsets.len() as u64 {
            self.generate_filter();
        }
    }

    /// Adds a key to the filter for the current block window.
    pub fn add_key(&mut self, key: &[u8]) {
        self.start.push(self.keys.len());
        self.keys.extend_from_slice(key);
    }

    /// Emits the finished filter block.
    pub fn finish(&mut self) -> Vec<u8> {
        if !self.start.is_empty() {
            self.generate_filter();
        }
        let array_offset = self.result.len() as u32;
        let mut buf = [0u8; 4];
        for i in 0..self.filter_offsets.len() {
            LittleEndian::write_u32(&mut buf, self.filter_offsets[i]);
            self.result.extend_from_slice(&buf);
        }
        LittleEndian::write_u32(&mut buf, array_offset);
        self.result.extend_from_slice(&buf);
        self.result.push(FILTER_BASE_LG as u8);
        std::mem::take(&mut self.result)
    }

    fn generate_filter(&mut self) {
        let num_keys = self.start.len();
        self.filter_offsets.push(self.result.len() as u32);
        if num_keys == 0 {
            // No keys for this window: an empty filter, offset only.
            return;
        }

        // Rebuild the key list from the flattened layout.
        self.start.push(self.keys.len());
        let tmp_keys: Vec<&[u8]> = (0..num_keys)
            .map(|i| &self.keys[self.start[i]..self.start[i + 1]])
            .collect();
        self.policy.create_filter(&tmp_keys, &mut self.result);

        self.keys.clear();
        self.start.clear();
    }
}

/// Queries a filter block read back from a table.
///
/// Malformed contents degrade to "might match" rather than failing: a table
/// without a usable filter is still fully functional.
pub struct FilterBlockReader {
    policy: Arc<dyn FilterPolicy>,
    data: Vec<u8>,
    /// Byte offset of the offset array within `data`.
    offsets_start: usize,
    num_filters: usize,
    base_lg: u8,
}

impl FilterBlockReader {
    pub fn new(policy: Arc<dyn FilterPolicy>, contents: Vec<u8>) -> Self {
        let mut reader = Self {
            policy,
            data: Vec::new(),
            offsets_start: 0,
            num_filters: 0,
            base_lg: 0,
        };
        let n = contents.len();
        if n < 5 {
            // Need at least the array offset and base_lg.
            return reader;
        }
        let base_lg = contents[n - 1];
        let last_word = LittleEndian::read_u32(&contents[n - 5..]) as usize;
        if last_word > n - 5 {
            return reader;
        }
        reader.num_filters = (n - 5 - last_word) / 4;
        reader.offsets_start = last_word;
        reader.base_lg = base_lg;
        reader.data = contents;
        reader
    }

    /// Whether the key may be present in the data block starting at
    /// `block_offset`. `false` is definitive; `true` means "check the block".
    pub fn key_may_match(&self, block_offset: u64, key: &[u8]) -> bool {
        let index = (block_offset >> self.base_lg) as usize;
        if index >= self.num_filters {
            // No filter covers this block; must check.
            return true;
        }
        let at = self.offsets_start + index * 4;
        let start = LittleEndian::read_u32(&self.data[at..at + 4]) as usize;
        let limit = LittleEndian::read_u32(&self.data[at + 4..at + 8]) as usize;
        if start <= limit && limit <= self.offsets_start {
            if start == limit {
                // An empty filter matches no keys at all.
                return false;
            }
            return self.policy.key_may_match(key, &self.data[start..limit]);
        }
        // Inconsistent offsets; treat as a potential match.
        true
    }
}
