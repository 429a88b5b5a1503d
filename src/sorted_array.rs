//! An [`Index`] over a sorted vector shared with its cursors.

use std::rc::Rc;

use crate::error::{Result, SpatialError};
use crate::index::{Cursor, Index, Position};
use crate::record::Record;

/// Records in a sorted `Vec`, ties in insertion order.
///
/// Cursors hold their own reference to the records, so a cursor stays valid after the
/// array is dropped. Adding or removing while cursors are open copies the records
/// and leaves the open cursors on the old contents.
#[derive(Clone, Debug)]
pub struct SortedArray<R> {
    records: Rc<Vec<R>>,
    first_unreserved_soid: u64,
}

impl<R: Record> SortedArray<R> {
    /// Creates an empty array.
    pub fn new() -> Self {
        SortedArray {
            records: Rc::new(Vec::new()),
            first_unreserved_soid: 0,
        }
    }

    /// Builds an array from records in any order, without duplicate checks.
    pub fn from_records(mut records: Vec<R>) -> Self {
        records.sort_by_key(Record::z);
        SortedArray {
            records: Rc::new(records),
            first_unreserved_soid: 0,
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if the array holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Opens a cursor positioned at `z` that owns a reference to the records.
    pub fn owned_cursor(&self, z: i64) -> SortedArrayCursor<R> {
        SortedArrayCursor {
            records: Rc::clone(&self.records),
            position: Position::NeverUsed(z),
        }
    }

    /// Index range of the records stored at exactly `z`.
    fn at(&self, z: i64) -> std::ops::Range<usize> {
        let start = self.records.partition_point(|r| r.z() < z);
        let end = self.records.partition_point(|r| r.z() <= z);
        start..end
    }
}

impl<R: Record> Default for SortedArray<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record + PartialEq> Index<R> for SortedArray<R> {
    type Cursor<'a>
        = SortedArrayCursor<R>
    where
        Self: 'a;

    fn add(&mut self, record: R) -> Result<()> {
        let z = record.z();
        let at = self.at(z);
        if self.records[at.clone()].contains(&record) {
            return Err(SpatialError::DuplicateRecord { z });
        }
        Rc::make_mut(&mut self.records).insert(at.end, record);
        Ok(())
    }

    fn remove<F>(&mut self, z: i64, mut filter: F) -> Result<bool>
    where
        F: FnMut(&R) -> bool,
    {
        let at = self.at(z);
        let found = self.records[at.clone()].iter().position(&mut filter);
        Ok(match found {
            Some(offset) => {
                drop(Rc::make_mut(&mut self.records).remove(at.start + offset));
                true
            }
            None => false,
        })
    }

    fn cursor(&self, z: i64) -> Result<SortedArrayCursor<R>> {
        Ok(self.owned_cursor(z))
    }

    fn first_unreserved_soid(&self) -> Result<u64> {
        Ok(self.first_unreserved_soid)
    }

    fn set_first_unreserved_soid(&mut self, soid: u64) -> Result<()> {
        self.first_unreserved_soid = soid;
        Ok(())
    }
}

/// Cursor over a [`SortedArray`].
#[derive(Debug)]
pub struct SortedArrayCursor<R> {
    records: Rc<Vec<R>>,
    position: Position<usize>,
}

impl<R: Record> SortedArrayCursor<R> {
    fn land(&mut self, i: Option<usize>) -> Option<R> {
        match i.and_then(|i| self.records.get(i).map(|r| (i, r.clone()))) {
            Some((i, record)) => {
                self.position = Position::InUse(i);
                Some(record)
            }
            None => {
                self.position = Position::Done;
                None
            }
        }
    }
}

impl<R: Record> Cursor<R> for SortedArrayCursor<R> {
    fn next(&mut self) -> Result<Option<R>> {
        let i = match self.position {
            Position::NeverUsed(z) => self.records.partition_point(|r| r.z() < z),
            Position::InUse(i) => i + 1,
            Position::Done => return Ok(None),
        };
        Ok(self.land(Some(i)))
    }

    fn previous(&mut self) -> Result<Option<R>> {
        let i = match self.position {
            Position::NeverUsed(z) => self.records.partition_point(|r| r.z() < z),
            Position::InUse(i) => i,
            Position::Done => return Ok(None),
        };
        Ok(self.land(i.checked_sub(1)))
    }

    fn go_to(&mut self, z: i64) -> Result<()> {
        self.position = Position::NeverUsed(z);
        Ok(())
    }

    fn close(&mut self) {
        self.position = Position::Done;
    }
}
