//! The cursor abstraction shared by every sorted data source.
//!
//! Blocks, whole tables, merged views and the user-visible DB view all expose
//! the same bidirectional cursor, which is what lets
//! [`MergingIterator`](crate::MergingIterator) compose them freely.

use crate::error::Result;

/// A bidirectional cursor over a sorted sequence of key-value entries.
///
/// A cursor is either *valid* (positioned at an entry) or invalid (before the
/// first entry, after the last, or failed). `key`/`value`/`next`/`prev`
/// require a valid cursor; violating that is a programming error, not an I/O
/// error, and implementations are free to panic.
///
/// Errors encountered while positioning are latched and reported through
/// [`status`](Iter::status); the cursor becomes invalid but stays safe to
/// use.
pub trait Iter {
    /// Whether the cursor is positioned at an entry.
    fn valid(&self) -> bool;

    /// Positions at the first entry. The cursor is valid afterwards iff the
    /// source is non-empty.
    fn seek_to_first(&mut self);

    /// Positions at the last entry.
    fn seek_to_last(&mut self);

    /// Positions at the first entry with key >= `target`.
    fn seek(&mut self, target: &[u8]);

    /// Advances to the next entry. Requires `valid()`.
    fn next(&mut self);

    /// Steps back to the previous entry. Requires `valid()`.
    fn prev(&mut self);

    /// Current key. Requires `valid()`.
    fn key(&self) -> &[u8];

    /// Current value. Requires `valid()`.
    fn value(&self) -> &[u8];

    /// First error this cursor ran into, if any.
    fn status(&self) -> Result<()>;
}
