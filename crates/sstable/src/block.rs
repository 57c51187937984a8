//! The block codec: sorted, prefix-compressed runs of key-value entries.
//!
//! Keys inside a block share prefixes with their predecessor. Every
//! `restart_interval` entries the compression resets and the full key is
//! stored; the offsets of these *restart points* are appended to the block so
//! a seek can binary-search them and only scan linearly inside one interval.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │ entry: shared (varint32) | unshared (varint32)        │
//! │        value_len (varint32) | key delta | value       │
//! │ ... repeated ...                                      │
//! ├───────────────────────────────────────────────────────┤
//! │ restarts: u32 LE per restart point                    │
//! │ num_restarts: u32 LE                                  │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! `shared == 0` at every restart point.

use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use integer_encoding::VarInt;

use crate::compare::Comparator;
use crate::error::{Error, Result};
use crate::format::BlockContents;
use crate::iter::Iter;

/// Accumulates sorted entries and serializes them into one block.
///
/// Callers must add keys in increasing order; the table builder enforces
/// that before delegating here.
pub struct BlockBuilder {
    restart_interval: usize,
    buffer: Vec<u8>,
    restarts: Vec<u32>,
    counter: usize,
    finished: bool,
    last_key: Vec<u8>,
}

impl BlockBuilder {
    pub fn new(restart_interval: usize) -> Self {
        assert!(restart_interval >= 1);
        Self {
            restart_interval,
            buffer: Vec::new(),
            restarts: vec![0],
            counter: 0,
            finished: false,
            last_key: Vec::new(),
        }
    }

    /// Appends an entry. The key must sort after every key added so far.
    pub fn add(&mut self, key: &[u8], value: &[u8]) {
        debug_assert!(!self.finished);
        debug_assert!(self.counter <= self.restart_interval);

        let mut shared = 0;
        if self.counter < self.restart_interval {
            // Share a prefix with the previous key.
            let min_len = self.last_key.len().min(key.len());
            while shared < min_len && self.last_key[shared] == key[shared] {
                shared += 1;
            }
        } else {
            // Restart prefix compression here.
            self.restarts.push(self.buffer.len() as u32);
            self.counter = 0;
        }
        let unshared = key.len() - shared;

        self.buffer.extend_from_slice(&(shared as u32).encode_var_vec());
        self.buffer.extend_from_slice(&(unshared as u32).encode_var_vec());
        self.buffer.extend_from_slice(&(value.len() as u32).encode_var_vec());
        self.buffer.extend_from_slice(&key[shared..]);
        self.buffer.extend_from_slice(value);

        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        self.counter += 1;
    }

    /// Appends the restart array and count, returning the finished block
    /// body. The builder keeps its allocations; call [`reset`](Self::reset)
    /// before reuse.
    pub fn finish(&mut self) -> Vec<u8> {
        let mut buf = [0u8; 4];
        for i in 0..self.restarts.len() {
            LittleEndian::write_u32(&mut buf, self.restarts[i]);
            self.buffer.extend_from_slice(&buf);
        }
        LittleEndian::write_u32(&mut buf, self.restarts.len() as u32);
        self.buffer.extend_from_slice(&buf);
        self.finished = true;
        std::mem::take(&mut self.buffer)
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.restarts.clear();
        self.restarts.push(0);
        self.counter = 0;
        self.finished = false;
        self.last_key.clear();
    }

    /// Size of the block if finished now.
    pub fn current_size_estimate(&self) -> usize {
        self.buffer.len() + self.restarts.len() * 4 + 4
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// A parsed, immutable block. Shared between iterators via `Arc`, which is
/// also what keeps cached blocks alive while a cursor points into them.
pub struct Block {
    data: Vec<u8>,
    restart_offset: usize,
    num_restarts: u32,
}

impl Block {
    pub fn new(contents: BlockContents) -> Result<Self> {
        let data = contents.data;
        if data.len() < 4 {
            return Err(Error::corruption("bad block contents"));
        }
        let num_restarts = LittleEndian::read_u32(&data[data.len() - 4..]);
        let max_restarts = ((data.len() - 4) / 4) as u32;
        if num_restarts > max_restarts {
            return Err(Error::corruption("bad block contents"));
        }
        let restart_offset = data.len() - 4 - num_restarts as usize * 4;
        Ok(Self {
            data,
            restart_offset,
            num_restarts,
        })
    }

    /// In-memory size; used as the cache charge.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Decodes the entry header at `offset`: `(shared, unshared, value_len,
/// key_delta_offset)`. `None` on any truncation or overflow.
fn decode_entry(data: &[u8], offset: usize, limit: usize) -> Option<(usize, usize, usize, usize)> {
    if offset >= limit {
        return None;
    }
    let (shared, n1) = u32::decode_var(&data[offset..limit])?;
    let (unshared, n2) = u32::decode_var(&data[offset + n1..limit])?;
    let (value_len, n3) = u32::decode_var(&data[offset + n1 + n2..limit])?;
    let key_off = offset + n1 + n2 + n3;
    if key_off + unshared as usize + value_len as usize > limit {
        return None;
    }
    Some((shared as usize, unshared as usize, value_len as usize, key_off))
}

/// Cursor over one block.
pub struct BlockIter {
    block: Arc<Block>,
    cmp: Arc<dyn Comparator>,
    /// Offset of the current entry; `== restart_offset` when invalid.
    current: usize,
    /// Index of the restart interval containing `current`.
    restart_index: usize,
    key: Vec<u8>,
    value_start: usize,
    value_len: usize,
    status: Option<Error>,
}

impl BlockIter {
    pub fn new(block: Arc<Block>, cmp: Arc<dyn Comparator>) -> Self {
        let restart_offset = block.restart_offset;
        let num_restarts = block.num_restarts as usize;
        Self {
            block,
            cmp,
            current: restart_offset,
            restart_index: num_restarts,
            key: Vec::new(),
            value_start: 0,
            value_len: 0,
            status: None,
        }
    }

    fn num_restarts(&self) -> usize {
        self.block.num_restarts as usize
    }

    fn restart_point(&self, index: usize) -> usize {
        debug_assert!(index < self.num_restarts());
        let at = self.block.restart_offset + index * 4;
        LittleEndian::read_u32(&self.block.data[at..at + 4]) as usize
    }

    fn next_entry_offset(&self) -> usize {
        self.value_start + self.value_len
    }

    fn seek_to_restart_point(&mut self, index: usize) {
        self.key.clear();
        self.restart_index = index;
        // Leave the value region pointing just before the restart entry so
        // that next_entry_offset() lands on it.
        self.value_start = self.restart_point(index);
        self.value_len = 0;
    }

    fn mark_corrupt(&mut self) {
        self.current = self.block.restart_offset;
        self.restart_index = self.num_restarts();
        self.key.clear();
        self.value_start = 0;
        self.value_len = 0;
        if self.status.is_none() {
            self.status = Some(Error::corruption("bad entry in block"));
        }
    }

    /// Decodes the entry at `next_entry_offset()` into `key`/`value`.
    /// Returns false at end-of-block or on corruption.
    fn parse_next_key(&mut self) -> bool {
        self.current = self.next_entry_offset();
        if self.current >= self.block.restart_offset {
            // No more entries; mark invalid.
            self.current = self.block.restart_offset;
            self.restart_index = self.num_restarts();
            return false;
        }
        match decode_entry(&self.block.data, self.current, self.block.restart_offset) {
            Some((shared, unshared, value_len, key_off)) if shared <= self.key.len() => {
                self.key.truncate(shared);
                self.key
                    .extend_from_slice(&self.block.data[key_off..key_off + unshared]);
                self.value_start = key_off + unshared;
                self.value_len = value_len;
                while self.restart_index + 1 < self.num_restarts()
                    && self.restart_point(self.restart_index + 1) < self.current
                {
                    self.restart_index += 1;
                }
                true
            }
            _ => {
                self.mark_corrupt();
                false
            }
        }
    }
}

impl Iter for BlockIter {
    fn valid(&self) -> bool {
        self.current < self.block.restart_offset
    }

    fn seek_to_first(&mut self) {
        if self.num_restarts() == 0 {
            self.mark_corrupt();
            return;
        }
        self.seek_to_restart_point(0);
        self.parse_next_key();
    }

    fn seek_to_last(&mut self) {
        if self.num_restarts() == 0 {
            self.mark_corrupt();
            return;
        }
        self.seek_to_restart_point(self.num_restarts() - 1);
        // Scan forward to the last entry in the block.
        while self.parse_next_key() && self.next_entry_offset() < self.block.restart_offset {}
    }

    fn seek(&mut self, target: &[u8]) {
        if self.num_restarts() == 0 {
            self.mark_corrupt();
            return;
        }
        // Binary search over restart points for the last restart whose key
        // is < target. Restart entries always store the full key.
        let mut left = 0usize;
        let mut right = self.num_restarts() - 1;
        while left < right {
            let mid = (left + right + 1) / 2;
            let region_offset = self.restart_point(mid);
            match decode_entry(&self.block.data, region_offset, self.block.restart_offset) {
                Some((0, unshared, _, key_off)) => {
                    let mid_key = &self.block.data[key_off..key_off + unshared];
                    if self.cmp.compare(mid_key, target) == std::cmp::Ordering::Less {
                        left = mid;
                    } else {
                        right = mid - 1;
                    }
                }
                _ => {
                    self.mark_corrupt();
                    return;
                }
            }
        }
        // Linear scan inside the bracketing interval.
        self.seek_to_restart_point(left);
        loop {
            if !self.parse_next_key() {
                return;
            }
            if self.cmp.compare(&self.key, target) != std::cmp::Ordering::Less {
                return;
            }
        }
    }

    fn next(&mut self) {
        debug_assert!(self.valid());
        self.parse_next_key();
    }

    fn prev(&mut self) {
        debug_assert!(self.valid());

        // Find the restart point strictly before the current entry.
        let original = self.current;
        while self.restart_point(self.restart_index) >= original {
            if self.restart_index == 0 {
                // No entries before the first one.
                self.current = self.block.restart_offset;
                self.restart_index = self.num_restarts();
                return;
            }
            self.restart_index -= 1;
        }

        // Replay forward until we stand on the entry just before `original`.
        self.seek_to_restart_point(self.restart_index);
        while self.parse_next_key() && self.next_entry_offset() < original {}
    }

    fn key(&self) -> &[u8] {
        debug_assert!(self.valid());
        &self.key
    }

    fn value(&self) -> &[u8] {
        debug_assert!(self.valid());
        &self.block.data[self.value_start..self.value_start + self.value_len]
    }

    fn status(&self) -> Result<()> {
        match &self.status {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}
