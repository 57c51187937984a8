//! The shared block cache.
//!
//! One cache instance serves every open table; each table tags its entries
//! with a unique id so offsets from different files never collide. Entries
//! are `Arc<Block>`s, so a cursor holding a clone keeps its block alive even
//! after eviction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use lru::LruCache;

use crate::block::Block;

struct Inner {
    blocks: LruCache<(u64, u64), Arc<Block>>,
    usage: usize,
}

/// LRU cache of decoded blocks, bounded by total block bytes.
pub struct BlockCache {
    inner: Mutex<Inner>,
    next_id: AtomicU64,
    capacity: usize,
}

impl BlockCache {
    /// Creates a cache holding at most `capacity` bytes of block data.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                blocks: LruCache::unbounded(),
                usage: 0,
            }),
            next_id: AtomicU64::new(1),
            capacity,
        }
    }

    /// Hands out a fresh id to prefix the cache keys of one table.
    pub fn new_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn lookup(&self, cache_id: u64, offset: u64) -> Option<Arc<Block>> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.blocks.get(&(cache_id, offset)).cloned()
    }

    pub fn insert(&self, cache_id: u64, offset: u64, block: Arc<Block>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let charge = block.size();
        if let Some(old) = inner.blocks.push((cache_id, offset), block) {
            inner.usage -= old.1.size();
        }
        inner.usage += charge;
        while inner.usage > self.capacity {
            match inner.blocks.pop_lru() {
                Some((_, evicted)) => inner.usage -= evicted.size(),
                None => break,
            }
        }
    }

    /// Bytes currently charged against the capacity.
    pub fn usage(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).usage
    }

    /// Number of cached blocks.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
