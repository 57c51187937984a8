//! Merge iterator over any number of sorted child cursors.
//!
//! Produces the multiset union of its children in comparator order, in both
//! directions. When two children sit on equal keys, the child with the
//! smaller index wins going forward and the larger index wins going
//! backward; equal entries are never silently collapsed.
//!
//! Reversing direction is the delicate part: after a run of `prev` calls
//! every non-current child rests at its last key *before* the current one.
//! Before a `next` can run, each of those children is re-anchored at its
//! first key *after* the current one (a seek, plus one step when the seek
//! lands exactly on the current key). The symmetric dance happens when
//! flipping from forward to reverse.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::compare::Comparator;
use crate::error::Result;
use crate::iter::Iter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Reverse,
}

/// N-way bidirectional ordered merge. Children are scanned linearly to find
/// the minimum or maximum; the engine's fan-in is small enough that a heap
/// would cost more than it saves.
pub struct MergingIterator {
    cmp: Arc<dyn Comparator>,
    children: Vec<Box<dyn Iter>>,
    /// Index of the child the cursor currently stands on.
    current: Option<usize>,
    direction: Direction,
}

/// Merges `children` under the ordering of `cmp`. An empty child list yields
/// a permanently invalid cursor.
pub fn new_merging_iterator(
    cmp: Arc<dyn Comparator>,
    children: Vec<Box<dyn Iter>>,
) -> MergingIterator {
    MergingIterator {
        cmp,
        children,
        current: None,
        direction: Direction::Forward,
    }
}

impl MergingIterator {
    fn find_smallest(&mut self) {
        let mut smallest: Option<usize> = None;
        for i in 0..self.children.len() {
            if !self.children[i].valid() {
                continue;
            }
            smallest = match smallest {
                None => Some(i),
                // Strict less-than keeps the smaller index on ties.
                Some(s)
                    if self.cmp.compare(self.children[i].key(), self.children[s].key())
                        == Ordering::Less =>
                {
                    Some(i)
                }
                keep => keep,
            };
        }
        self.current = smallest;
    }

    fn find_largest(&mut self) {
        let mut largest: Option<usize> = None;
        for i in (0..self.children.len()).rev() {
            if !self.children[i].valid() {
                continue;
            }
            largest = match largest {
                None => Some(i),
                // Strict greater-than keeps the larger index on ties.
                Some(l)
                    if self.cmp.compare(self.children[i].key(), self.children[l].key())
                        == Ordering::Greater =>
                {
                    Some(i)
                }
                keep => keep,
            };
        }
        self.current = largest;
    }
}

impl Iter for MergingIterator {
    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn seek_to_first(&mut self) {
        for child in &mut self.children {
            child.seek_to_first();
        }
        self.find_smallest();
        self.direction = Direction::Forward;
    }

    fn seek_to_last(&mut self) {
        for child in &mut self.children {
            child.seek_to_last();
        }
        self.find_largest();
        self.direction = Direction::Reverse;
    }

    fn seek(&mut self, target: &[u8]) {
        for child in &mut self.children {
            child.seek(target);
        }
        self.find_smallest();
        self.direction = Direction::Forward;
    }

    fn next(&mut self) {
        debug_assert!(self.valid());

        // After reverse traversal the non-current children sit before
        // key(); re-anchor each at its first entry after key().
        if self.direction != Direction::Forward {
            let key = self.key().to_vec();
            let current = self.current.expect("valid() checked above");
            for (i, child) in self.children.iter_mut().enumerate() {
                if i == current {
                    continue;
                }
                child.seek(&key);
                if child.valid() && self.cmp.compare(&key, child.key()) == Ordering::Equal {
                    child.next();
                }
            }
            self.direction = Direction::Forward;
        }

        let current = self.current.expect("valid() checked above");
        self.children[current].next();
        self.find_smallest();
    }

    fn prev(&mut self) {
        debug_assert!(self.valid());

        // Mirror image of next(): re-anchor every non-current child at its
        // last entry before key().
        if self.direction != Direction::Reverse {
            let key = self.key().to_vec();
            let current = self.current.expect("valid() checked above");
            for (i, child) in self.children.iter_mut().enumerate() {
                if i == current {
                    continue;
                }
                child.seek(&key);
                if child.valid() {
                    // Child sits at the first entry >= key(); step before it.
                    child.prev();
                } else {
                    // Every entry in this child is < key().
                    child.seek_to_last();
                }
            }
            self.direction = Direction::Reverse;
        }

        let current = self.current.expect("valid() checked above");
        self.children[current].prev();
        self.find_largest();
    }

    fn key(&self) -> &[u8] {
        let current = self.current.expect("key() on invalid iterator");
        self.children[current].key()
    }

    fn value(&self) -> &[u8] {
        let current = self.current.expect("value() on invalid iterator");
        self.children[current].value()
    }

    fn status(&self) -> Result<()> {
        for child in &self.children {
            child.status()?;
        }
        Ok(())
    }
}
