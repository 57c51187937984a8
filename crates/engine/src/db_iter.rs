//! Multi-version collapse over an internal-entry stream.
//!
//! The wrapped cursor yields `(user key, sequence, type)` entries sorted by
//! user key ascending, then sequence descending. This cursor hides everything
//! a reader at snapshot `sequence` must not see: entries newer than the
//! snapshot, older versions shadowed by a newer one, and keys whose newest
//! visible entry is a deletion.
//!
//! Direction matters for where the answer lives:
//!
//! - moving **forward**, the inner cursor stands exactly on the entry that
//!   produces `key()`/`value()`;
//! - moving **backward**, the inner cursor has already walked past the
//!   answer (it stands just before all entries for the current user key) and
//!   `saved_key`/`saved_value` hold it.

use std::cmp::Ordering;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use sstable::{
    append_internal_key, extract_user_key, parse_internal_key, Comparator, Error, Iter, Result,
    SequenceNumber, ValueType, TYPE_FOR_SEEK,
};

/// Approximate bytes of key/value data read between compaction samples.
pub const READ_BYTES_PERIOD: usize = 1_048_576;

/// Hook notified as iteration reads bytes, so the owning database can steer
/// compaction toward heavily-read ranges.
pub trait ReadSampler: Send + Sync {
    fn record_read_sample(&self, internal_key: &[u8]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Reverse,
}

/// The user-visible cursor: one entry per live user key, snapshot-filtered.
pub struct DbIterator {
    sampler: Option<Arc<dyn ReadSampler>>,
    user_comparator: Arc<dyn Comparator>,
    inner: Box<dyn Iter>,
    sequence: SequenceNumber,
    status: Option<Error>,
    /// Skip buffer while moving forward; the answer key while in reverse.
    saved_key: Vec<u8>,
    /// The answer value while in reverse.
    saved_value: Vec<u8>,
    direction: Direction,
    valid: bool,
    rng: StdRng,
    bytes_until_read_sampling: usize,
}

/// Wraps an internal-entry cursor into the user-visible view at snapshot
/// `sequence`. `seed` randomizes the read-sampling cadence per iterator.
pub fn new_db_iterator(
    user_comparator: Arc<dyn Comparator>,
    inner: Box<dyn Iter>,
    sequence: SequenceNumber,
    seed: u64,
    sampler: Option<Arc<dyn ReadSampler>>,
) -> DbIterator {
    let mut rng = StdRng::seed_from_u64(seed);
    let initial_allowance = rng.gen_range(0..2 * READ_BYTES_PERIOD);
    DbIterator {
        sampler,
        user_comparator,
        inner,
        sequence,
        status: None,
        saved_key: Vec::new(),
        saved_value: Vec::new(),
        direction: Direction::Forward,
        valid: false,
        rng,
        bytes_until_read_sampling: initial_allowance,
    }
}

struct ParsedEntry {
    sequence: SequenceNumber,
    value_type: ValueType,
}

impl DbIterator {
    fn random_compaction_period(&mut self) -> usize {
        self.rng.gen_range(0..2 * READ_BYTES_PERIOD)
    }

    /// Splits the inner cursor's current key, charging its bytes against the
    /// sampling allowance. A malformed key latches `Corruption` and returns
    /// `None`; iteration skips over it.
    fn parse_key(&mut self) -> Option<ParsedEntry> {
        let bytes_read = self.inner.key().len() + self.inner.value().len();
        while self.bytes_until_read_sampling < bytes_read {
            self.bytes_until_read_sampling += self.random_compaction_period();
            if let Some(sampler) = &self.sampler {
                sampler.record_read_sample(self.inner.key());
            }
        }
        self.bytes_until_read_sampling -= bytes_read;

        match parse_internal_key(self.inner.key()) {
            Some(parsed) => Some(ParsedEntry {
                sequence: parsed.sequence,
                value_type: parsed.value_type,
            }),
            None => {
                if self.status.is_none() {
                    self.status = Some(Error::Corruption(
                        "corrupted internal key in DbIterator".to_string(),
                    ));
                }
                None
            }
        }
    }

    /// Advances the inner cursor to the next entry this view should expose.
    /// With `skipping` set, entries for user keys <= `saved_key` are hidden
    /// (they are older versions of a key already emitted or deleted).
    fn find_next_user_entry(&mut self, mut skipping: bool) {
        debug_assert!(self.inner.valid());
        debug_assert_eq!(self.direction, Direction::Forward);

        loop {
            if let Some(parsed) = self.parse_key() {
                if parsed.sequence <= self.sequence {
                    match parsed.value_type {
                        ValueType::Deletion => {
                            // Everything older for this user key is hidden
                            // by this tombstone.
                            let user_key = extract_user_key(self.inner.key()).to_vec();
                            self.saved_key = user_key;
                            skipping = true;
                        }
                        ValueType::Value => {
                            let hidden = skipping
                                && self
                                    .user_comparator
                                    .compare(extract_user_key(self.inner.key()), &self.saved_key)
                                    != Ordering::Greater;
                            if !hidden {
                                self.valid = true;
                                self.saved_key.clear();
                                return;
                            }
                        }
                    }
                }
            }
            self.inner.next();
            if !self.inner.valid() {
                break;
            }
        }
        self.saved_key.clear();
        self.valid = false;
    }

    /// Walks the inner cursor backward to the previous visible user key,
    /// leaving the cursor just before all of that key's entries and the
    /// answer in `saved_key`/`saved_value`.
    fn find_prev_user_entry(&mut self) {
        debug_assert_eq!(self.direction, Direction::Reverse);

        // Within one user key the newest visible entry is seen first in
        // reverse order; it decides whether the key is live or deleted.
        let mut value_type = ValueType::Deletion;
        if self.inner.valid() {
            loop {
                if let Some(parsed) = self.parse_key() {
                    if parsed.sequence <= self.sequence {
                        if value_type != ValueType::Deletion
                            && self
                                .user_comparator
                                .compare(extract_user_key(self.inner.key()), &self.saved_key)
                                == Ordering::Less
                        {
                            // Crossed into the entries of an earlier user
                            // key while holding a live answer.
                            break;
                        }
                        value_type = parsed.value_type;
                        if value_type == ValueType::Deletion {
                            self.saved_key.clear();
                            self.saved_value.clear();
                        } else {
                            self.saved_key = extract_user_key(self.inner.key()).to_vec();
                            self.saved_value.clear();
                            self.saved_value.extend_from_slice(self.inner.value());
                        }
                    }
                }
                self.inner.prev();
                if !self.inner.valid() {
                    break;
                }
            }
        }

        if value_type == ValueType::Deletion {
            // Ran off the front of the stream.
            self.valid = false;
            self.saved_key.clear();
            self.saved_value.clear();
            self.direction = Direction::Forward;
        } else {
            self.valid = true;
        }
    }
}

impl Iter for DbIterator {
    fn valid(&self) -> bool {
        self.valid
    }

    fn seek(&mut self, target: &[u8]) {
        self.direction = Direction::Forward;
        self.saved_value.clear();
        self.saved_key.clear();
        append_internal_key(&mut self.saved_key, target, self.sequence, TYPE_FOR_SEEK);
        self.inner.seek(&self.saved_key);
        if self.inner.valid() {
            self.find_next_user_entry(false);
        } else {
            self.valid = false;
        }
    }

    fn seek_to_first(&mut self) {
        self.direction = Direction::Forward;
        self.saved_value.clear();
        self.inner.seek_to_first();
        if self.inner.valid() {
            self.find_next_user_entry(false);
        } else {
            self.valid = false;
        }
    }

    fn seek_to_last(&mut self) {
        self.direction = Direction::Reverse;
        self.saved_value.clear();
        self.inner.seek_to_last();
        self.find_prev_user_entry();
    }

    fn next(&mut self) {
        debug_assert!(self.valid);

        if self.direction == Direction::Reverse {
            self.direction = Direction::Forward;
            // The inner cursor sits just before the entries for key();
            // step into them so the skipping loop below starts inside.
            if !self.inner.valid() {
                self.inner.seek_to_first();
            } else {
                self.inner.next();
            }
            if !self.inner.valid() {
                self.valid = false;
                self.saved_key.clear();
                return;
            }
            // saved_key already holds the user key to skip past.
        } else {
            // Remember the current user key so its older versions are
            // skipped.
            self.saved_key = extract_user_key(self.inner.key()).to_vec();
            self.inner.next();
            if !self.inner.valid() {
                self.valid = false;
                self.saved_key.clear();
                return;
            }
        }

        self.find_next_user_entry(true);
    }

    fn prev(&mut self) {
        debug_assert!(self.valid);

        if self.direction == Direction::Forward {
            // The inner cursor stands on the entry for key(). Back it off
            // until the user key changes, then run the reverse scan.
            debug_assert!(self.inner.valid());
            self.saved_key = extract_user_key(self.inner.key()).to_vec();
            loop {
                self.inner.prev();
                if !self.inner.valid() {
                    self.valid = false;
                    self.saved_key.clear();
                    self.saved_value.clear();
                    return;
                }
                if self
                    .user_comparator
                    .compare(extract_user_key(self.inner.key()), &self.saved_key)
                    == Ordering::Less
                {
                    break;
                }
            }
            self.direction = Direction::Reverse;
        }

        self.find_prev_user_entry();
    }

    fn key(&self) -> &[u8] {
        debug_assert!(self.valid);
        match self.direction {
            Direction::Forward => extract_user_key(self.inner.key()),
            Direction::Reverse => &self.saved_key,
        }
    }

    fn value(&self) -> &[u8] {
        debug_assert!(self.valid);
        match self.direction {
            Direction::Forward => self.inner.value(),
            Direction::Reverse => &self.saved_value,
        }
    }

    fn status(&self) -> Result<()> {
        match &self.status {
            Some(e) => Err(e.clone()),
            None => self.inner.status(),
        }
    }
}
