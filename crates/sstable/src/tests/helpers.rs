//! Shared fixtures for the table-layer tests.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::{
    Comparator, FsRandomAccessFile, FsWritableFile, Iter, Options, Table, TableBuilder,
};

/// Builds a table at `path` from pre-sorted `(key, value)` pairs and returns
/// the file size.
pub fn build_table(path: &Path, options: &Options, entries: &[(Vec<u8>, Vec<u8>)]) -> Result<u64> {
    let file = FsWritableFile::create(path)?;
    let mut builder = TableBuilder::new(options.clone(), Box::new(file));
    for (key, value) in entries {
        builder.add(key, value);
    }
    builder.finish()?;
    Ok(builder.file_size())
}

/// Opens the table previously built at `path`.
pub fn open_table(path: &Path, options: &Options) -> Result<Arc<Table>> {
    let size = std::fs::metadata(path)?.len();
    let file = FsRandomAccessFile::open(path)?;
    Ok(Arc::new(Table::open(options.clone(), Box::new(file), size)?))
}

/// Collects every entry of `iter` front to back.
pub fn collect_forward(iter: &mut dyn Iter) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut out = Vec::new();
    iter.seek_to_first();
    while iter.valid() {
        out.push((iter.key().to_vec(), iter.value().to_vec()));
        iter.next();
    }
    out
}

/// Collects every entry of `iter` back to front.
pub fn collect_backward(iter: &mut dyn Iter) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut out = Vec::new();
    iter.seek_to_last();
    while iter.valid() {
        out.push((iter.key().to_vec(), iter.value().to_vec()));
        iter.prev();
    }
    out
}

/// In-memory sorted source implementing the cursor trait; stands in for
/// memtable iterators when exercising the merge layer.
pub struct VecIter {
    cmp: Arc<dyn Comparator>,
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pos: Option<usize>,
}

impl VecIter {
    /// `entries` must already be sorted under `cmp`.
    pub fn new(cmp: Arc<dyn Comparator>, entries: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        Self {
            cmp,
            entries,
            pos: None,
        }
    }
}

impl Iter for VecIter {
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

    fn status(&self) -> crate::Result<()> {
        Ok(())
    }
}
