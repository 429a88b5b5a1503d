//! The sorted storage the spatial index and join run on.
//!
//! An [`Index`] keeps records ordered by z-value, ties in an order of its choosing
//! that stays stable while the index is not modified. A [`Cursor`] walks that order
//! in both directions and can be repositioned at any z-value.

use crate::error::Result;
use crate::record::Record;

/// Sorted record storage keyed by z-value.
pub trait Index<R: Record> {
    /// Cursor type borrowing the index.
    type Cursor<'a>: Cursor<R>
    where
        Self: 'a;

    /// Inserts a record under its z-value.
    ///
    /// Fails with [`crate::SpatialError::DuplicateRecord`] if an identical record is
    /// already stored.
    fn add(&mut self, record: R) -> Result<()>;

    /// Removes the first record stored at exactly `z` that `filter` accepts.
    /// Returns whether a record was removed.
    fn remove<F>(&mut self, z: i64, filter: F) -> Result<bool>
    where
        F: FnMut(&R) -> bool;

    /// Opens a cursor positioned at `z`.
    fn cursor(&self, z: i64) -> Result<Self::Cursor<'_>>;

    /// Reads the persisted surrogate id marker: the first id not yet reserved.
    fn first_unreserved_soid(&self) -> Result<u64>;

    /// Persists the surrogate id marker.
    fn set_first_unreserved_soid(&mut self, soid: u64) -> Result<()>;
}

/// Bidirectional scan over an [`Index`].
///
/// A fresh or repositioned cursor returns from [`Cursor::next`] the first record with
/// z-value `>= z`, and from [`Cursor::previous`] the last record with z-value `< z`.
/// After returning a record the cursor sits on it: `next` moves to the record after,
/// `previous` to the record before. Running off either end leaves the cursor done
/// until the next [`Cursor::go_to`].
pub trait Cursor<R> {
    /// Moves forward and returns the record reached.
    fn next(&mut self) -> Result<Option<R>>;

    /// Moves backward and returns the record reached.
    fn previous(&mut self) -> Result<Option<R>>;

    /// Repositions the cursor at `z`.
    fn go_to(&mut self, z: i64) -> Result<()>;

    /// Releases the scan. The cursor is done until the next `go_to`.
    fn close(&mut self);
}

/// Position of a reference cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Position<K> {
    /// Positioned at a z-value, nothing returned yet.
    NeverUsed(i64),
    /// Sitting on the record with this key.
    InUse(K),
    /// Ran off an end, or closed.
    Done,
}
