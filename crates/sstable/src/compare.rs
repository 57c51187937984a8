//! Key ordering.
//!
//! The table layer never interprets key bytes itself; everything goes through
//! a [`Comparator`]. Besides ordering, comparators supply the two key
//! shortening hooks the builder uses to keep index blocks small: a *separator*
//! between two keys and a *successor* of the final key.

use std::cmp::Ordering;
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};

use crate::key::{
    extract_user_key, pack_sequence_and_type, MAX_SEQUENCE_NUMBER, TYPE_FOR_SEEK,
};

/// Total order over keys, plus key-shortening hooks for index separators.
pub trait Comparator: Send + Sync {
    /// Name of the ordering. Tables built with one ordering must not be read
    /// with another.
    fn name(&self) -> &str;

    /// Three-way comparison.
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// Shortens `start` in place to some key `k` with `start <= k < limit`,
    /// if a shorter such key exists. Requires `start < limit`.
    fn find_shortest_separator(&self, start: &mut Vec<u8>, limit: &[u8]);

    /// Shortens `key` in place to some key `k >= key`, if a shorter such key
    /// exists.
    fn find_short_successor(&self, key: &mut Vec<u8>);
}

/// Plain lexicographic byte ordering.
pub struct BytewiseComparator;

impl Comparator for BytewiseComparator {
    fn name(&self) -> &str {
        "undertow.BytewiseComparator"
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }

    fn find_shortest_separator(&self, start: &mut Vec<u8>, limit: &[u8]) {
        let min_len = start.len().min(limit.len());
        let mut diff_index = 0;
        while diff_index < min_len && start[diff_index] == limit[diff_index] {
            diff_index += 1;
        }
        if diff_index >= min_len {
            // One key is a prefix of the other; no shortening possible.
            return;
        }
        let byte = start[diff_index];
        if byte < 0xff && byte + 1 < limit[diff_index] {
            start[diff_index] += 1;
            start.truncate(diff_index + 1);
            debug_assert_eq!(self.compare(start, limit), Ordering::Less);
        }
    }

    fn find_short_successor(&self, key: &mut Vec<u8>) {
        // Bump the first byte that can be bumped and drop the rest.
        for i in 0..key.len() {
            if key[i] != 0xff {
                key[i] += 1;
                key.truncate(i + 1);
                return;
            }
        }
        // Key is a run of 0xff; leave it as is.
    }
}

/// Orders internal keys: user key ascending (per the wrapped comparator),
/// then the packed (sequence, type) suffix **descending**, so the newest
/// version of a user key sorts first.
pub struct InternalKeyComparator {
    user: Arc<dyn Comparator>,
}

impl InternalKeyComparator {
    pub fn new(user: Arc<dyn Comparator>) -> Self {
        Self { user }
    }

    pub fn user_comparator(&self) -> Arc<dyn Comparator> {
        Arc::clone(&self.user)
    }
}

impl Comparator for InternalKeyComparator {
    fn name(&self) -> &str {
        "undertow.InternalKeyComparator"
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        match self.user.compare(extract_user_key(a), extract_user_key(b)) {
            Ordering::Equal => {
                let anum = LittleEndian::read_u64(&a[a.len() - 8..]);
                let bnum = LittleEndian::read_u64(&b[b.len() - 8..]);
                // Larger (sequence, type) sorts first.
                bnum.cmp(&anum)
            }
            ord => ord,
        }
    }

    fn find_shortest_separator(&self, start: &mut Vec<u8>, limit: &[u8]) {
        let user_start = extract_user_key(start).to_vec();
        let user_limit = extract_user_key(limit);
        let mut tmp = user_start.clone();
        self.user.find_shortest_separator(&mut tmp, user_limit);
        if tmp.len() < user_start.len() && self.user.compare(&user_start, &tmp) == Ordering::Less {
            // The user key became shorter physically but larger logically.
            // Tack on the earliest possible suffix of the new shortest key.
            let mut buf = [0u8; 8];
            LittleEndian::write_u64(
                &mut buf,
                pack_sequence_and_type(MAX_SEQUENCE_NUMBER, TYPE_FOR_SEEK),
            );
            tmp.extend_from_slice(&buf);
            debug_assert_eq!(self.compare(start, &tmp), Ordering::Less);
            debug_assert_eq!(self.compare(&tmp, limit), Ordering::Less);
            *start = tmp;
        }
    }

    fn find_short_successor(&self, key: &mut Vec<u8>) {
        let user_key = extract_user_key(key).to_vec();
        let mut tmp = user_key.clone();
        self.user.find_short_successor(&mut tmp);
        if tmp.len() < user_key.len() && self.user.compare(&user_key, &tmp) == Ordering::Less {
            let mut buf = [0u8; 8];
            LittleEndian::write_u64(
                &mut buf,
                pack_sequence_and_type(MAX_SEQUENCE_NUMBER, TYPE_FOR_SEEK),
            );
            tmp.extend_from_slice(&buf);
            debug_assert_eq!(self.compare(key, &tmp), Ordering::Less);
            *key = tmp;
        }
    }
}
