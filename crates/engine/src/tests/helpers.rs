//! Fixtures for the read-view tests: internal-entry streams built in memory.

use std::cmp::Ordering;
use std::sync::Arc;

use sstable::{
    append_internal_key, BytewiseComparator, Comparator, InternalKeyComparator, Iter, Result,
    SequenceNumber, ValueType,
};

/// Builds one internal entry: `(user_key || seq/type suffix, value)`.
pub fn entry(
    user_key: &[u8],
    seq: SequenceNumber,
    value_type: ValueType,
    value: &[u8],
) -> (Vec<u8>, Vec<u8>) {
    let mut internal_key = Vec::new();
    append_internal_key(&mut internal_key, user_key, seq, value_type);
    (internal_key, value.to_vec())
}

pub fn internal_cmp() -> Arc<dyn Comparator> {
    Arc::new(InternalKeyComparator::new(Arc::new(BytewiseComparator)))
}

pub fn user_cmp() -> Arc<dyn Comparator> {
    Arc::new(BytewiseComparator)
}

/// Sorts internal entries into internal-key order (user key ascending,
/// sequence descending).
pub fn sort_internal(entries: &mut [(Vec<u8>, Vec<u8>)]) {
    let cmp = internal_cmp();
    entries.sort_by(|(a, _), (b, _)| cmp.compare(a, b));
}

/// In-memory internal-entry stream; stands in for a merging iterator over
/// memtables and tables.
pub struct StreamIter {
    cmp: Arc<dyn Comparator>,
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pos: Option<usize>,
}

impl StreamIter {
    /// `entries` must already be in internal-key order.
    pub fn new(entries: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        Self {
            cmp: internal_cmp(),
            entries,
            pos: None,
        }
    }
}

impl Iter for StreamIter {
    fn valid(&self) -> bool {
        self.pos.is_some()
    }

    fn seek_to_first(&mut self) {
        self.pos = if self.entries.is_empty() { None } else { Some(0) };
    }

    fn seek_to_last(&mut self) {
        self.pos = self.entries.len().checked_sub(1);
    }

    fn seek(&mut self, target: &[u8]) {
        self.pos = self
            .entries
            .iter()
            .position(|(key, _)| self.cmp.compare(key, target) != Ordering::Less);
    }

    fn next(&mut self) {
        let pos = self.pos.expect("next() on invalid iterator");
        self.pos = if pos + 1 < self.entries.len() {
            Some(pos + 1)
        } else {
            None
        };
    }

    fn prev(&mut self) {
        let pos = self.pos.expect("prev() on invalid iterator");
        self.pos = pos.checked_sub(1);
    }

    fn key(&self) -> &[u8] {
        &self.entries[self.pos.expect("key() on invalid iterator")].0
    }

    fn value(&self) -> &[u8] {
        &self.entries[self.pos.expect("value() on invalid iterator")].1
    }

    fn status(&self) -> Result<()> {
        Ok(())
    }
}

/// Collects the user-visible entries front to back.
pub fn collect_forward(iter: &mut dyn Iter) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut out = Vec::new();
    iter.seek_to_first();
    while iter.valid() {
        out.push((iter.key().to_vec(), iter.value().to_vec()));
        iter.next();
    }
    out
}

/// Collects the user-visible entries back to front.
pub fn collect_backward(iter: &mut dyn Iter) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut out = Vec::new();
    iter.seek_to_last();
    while iter.valid() {
        out.push((iter.key().to_vec(), iter.value().to_vec()));
        iter.prev();
    }
    out
}
