//! # Engine - the user-visible read view
//!
//! The table layer deals in *internal* entries: `(user key, sequence, type)`
//! triples, many per user key. This crate collapses that stream into what a
//! reader actually wants to see: each user key once, at its newest version
//! visible under a snapshot, with deletions hidden.
//!
//! ```text
//! internal stream (from a MergingIterator over tables + memtables)
//!   ("x", seq=5, Value, "v5")
//!   ("x", seq=4, Deletion)
//!   ("x", seq=3, Value, "v3")
//!   ("y", seq=1, Value, "vy")
//!           |
//!           v  DbIterator at snapshot S=10
//!   ("x", "v5"), ("y", "vy")
//! ```
//!
//! Construction: [`new_db_iterator`] over any [`sstable::Iter`] producing
//! internal keys in internal-key order.

mod db_iter;

pub use db_iter::{new_db_iterator, DbIterator, ReadSampler, READ_BYTES_PERIOD};

#[cfg(test)]
mod tests;
