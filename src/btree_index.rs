//! An in-memory [`Index`] over a `BTreeMap`.

use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

use crate::error::{Result, SpatialError};
use crate::index::{Cursor, Index, Position};
use crate::record::Record;

type Key = (i64, u64);

/// Records keyed by `(z, insertion sequence)`, so records sharing a z-value come
/// back in insertion order.
///
/// # Example
/// ```
/// use zjoin::{BTreeIndex, BasicRecord, Cursor, Index, Record};
/// let mut index = BTreeIndex::new();
/// let mut record = BasicRecord::without_soid('a');
/// record.set_z(0x41);
/// index.add(record.clone()).unwrap();
/// let mut cursor = index.cursor(0).unwrap();
/// assert_eq!(cursor.next().unwrap(), Some(record));
/// assert_eq!(cursor.next().unwrap(), None);
/// ```
#[derive(Clone, Debug)]
pub struct BTreeIndex<R> {
    records: BTreeMap<Key, R>,
    sequence: u64,
    first_unreserved_soid: u64,
}

impl<R> BTreeIndex<R> {
    /// Creates an empty index.
    pub fn new() -> Self {
        BTreeIndex {
            records: BTreeMap::new(),
            sequence: 0,
            first_unreserved_soid: 0,
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if the index holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in index order.
    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.records.values()
    }

    fn at(&self, z: i64) -> impl Iterator<Item = (&Key, &R)> {
        self.records.range((z, 0)..=(z, u64::MAX))
    }
}

impl<R> Default for BTreeIndex<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record + PartialEq> Index<R> for BTreeIndex<R> {
    type Cursor<'a>
        = BTreeCursor<'a, R>
    where
        Self: 'a;

    fn add(&mut self, record: R) -> Result<()> {
        let z = record.z();
        if self.at(z).any(|(_, r)| *r == record) {
            return Err(SpatialError::DuplicateRecord { z });
        }
        let key = (z, self.sequence);
        self.sequence += 1;
        let previous = self.records.insert(key, record);
        debug_assert!(previous.is_none());
        Ok(())
    }

    fn remove<F>(&mut self, z: i64, mut filter: F) -> Result<bool>
    where
        F: FnMut(&R) -> bool,
    {
        let key = self.at(z).find(|(_, r)| filter(r)).map(|(key, _)| *key);
        Ok(match key {
            Some(key) => self.records.remove(&key).is_some(),
            None => false,
        })
    }

    fn cursor(&self, z: i64) -> Result<BTreeCursor<'_, R>> {
        Ok(BTreeCursor {
            records: &self.records,
            position: Position::NeverUsed(z),
        })
    }

    fn first_unreserved_soid(&self) -> Result<u64> {
        Ok(self.first_unreserved_soid)
    }

    fn set_first_unreserved_soid(&mut self, soid: u64) -> Result<()> {
        self.first_unreserved_soid = soid;
        Ok(())
    }
}

/// Cursor over a [`BTreeIndex`].
#[derive(Debug)]
pub struct BTreeCursor<'a, R> {
    records: &'a BTreeMap<Key, R>,
    position: Position<Key>,
}

impl<R: Clone> BTreeCursor<'_, R> {
    fn land(&mut self, found: Option<(&Key, &R)>) -> Option<R> {
        match found {
            Some((key, record)) => {
                self.position = Position::InUse(*key);
                Some(record.clone())
            }
            None => {
                self.position = Position::Done;
                None
            }
        }
    }
}

impl<R: Clone> Cursor<R> for BTreeCursor<'_, R> {
    fn next(&mut self) -> Result<Option<R>> {
        let records = self.records;
        let found = match self.position {
            Position::NeverUsed(z) => records.range((z, 0)..).next(),
            Position::InUse(key) => records.range((Excluded(key), Unbounded)).next(),
            Position::Done => return Ok(None),
        };
        Ok(self.land(found))
    }

    fn previous(&mut self) -> Result<Option<R>> {
        let records = self.records;
        let found = match self.position {
            Position::NeverUsed(z) => records.range(..(z, 0)).next_back(),
            Position::InUse(key) => records.range((Unbounded, Excluded(key))).next_back(),
            Position::Done => return Ok(None),
        };
        Ok(self.land(found))
    }

    fn go_to(&mut self, z: i64) -> Result<()> {
        self.position = Position::NeverUsed(z);
        Ok(())
    }

    fn close(&mut self) {
        self.position = Position::Done;
    }
}
