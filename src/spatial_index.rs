//! A spatial index: objects decomposed into cells, one record per cell.

use std::marker::PhantomData;

use tracing::{debug, trace};

use crate::config::Tunables;
use crate::error::{Result, SpatialError};
use crate::index::Index;
use crate::record::Record;
use crate::space::Space;
use crate::spatial_object::SpatialObject;

/// How objects are decomposed on the way into the index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum IndexOptions {
    /// Each object decomposes into up to its own `max_z` cells.
    #[default]
    Default,
    /// Each object is stored under its minimal enclosing cell only. Fewer records,
    /// more false positives in joins. Suited to points.
    SingleCell,
}

/// Surrogate ids handed out of memory, backed by a persisted marker in the index.
#[derive(Clone, Copy, Debug)]
struct SoidReservation {
    next: u64,
    limit: u64,
    block_size: u64,
}

/// Organizes records of spatial objects in an [`Index`] for spatial joins.
///
/// # Example
/// ```
/// use zjoin::{Aabb, BTreeIndex, BasicRecord, IndexOptions, Space, SpatialIndex};
/// let space = Space::new(&[0.0, 0.0], &[1000.0, 1000.0], &[10, 10]).unwrap();
/// let mut index = SpatialIndex::new(space, BTreeIndex::new(), IndexOptions::Default).unwrap();
/// let object = Aabb::new(&[100.0, 100.0], &[150.0, 120.0]).unwrap();
/// let soid = index.add(&object, BasicRecord::new(1_u32)).unwrap();
/// assert_eq!(soid, Some(0));
/// assert!(index.remove(&object, |r| r.payload() == &1).unwrap());
/// assert!(index.index().is_empty());
/// ```
#[derive(Debug)]
pub struct SpatialIndex<R, I> {
    space: Space,
    index: I,
    options: IndexOptions,
    soids: SoidReservation,
    _record: PhantomData<fn() -> R>,
}

impl<R, I> SpatialIndex<R, I>
where
    R: Record,
    I: Index<R>,
{
    /// Creates a spatial index, reading tunables from the environment.
    pub fn new(space: Space, index: I, options: IndexOptions) -> Result<Self> {
        Self::with_tunables(space, index, options, &Tunables::from_env()?)
    }

    /// Creates a spatial index with explicit tunables. Reserves the first block of
    /// surrogate ids.
    pub fn with_tunables(space: Space, mut index: I, options: IndexOptions, tunables: &Tunables) -> Result<Self> {
        tunables.validate()?;
        let soids = reserve::<R, I>(&mut index, tunables.soid_reservation_block_size)?;
        Ok(SpatialIndex {
            space,
            index,
            options,
            soids,
            _record: PhantomData,
        })
    }

    /// The space of the indexed objects.
    pub fn space(&self) -> &Space {
        &self.space
    }

    /// The underlying index.
    pub fn index(&self) -> &I {
        &self.index
    }

    /// Decomposition options.
    pub fn options(&self) -> IndexOptions {
        self.options
    }

    /// Releases the underlying index. Surrogate ids reserved but not handed out
    /// are not returned; a spatial index reopened over it starts at the next block.
    pub fn into_index(self) -> I {
        self.index
    }

    /// Adds `record` under every cell of `object`'s decomposition.
    ///
    /// A record that requires a surrogate id and has none gets a fresh one. Returns
    /// the record's surrogate id. Nothing is rolled back if an insert fails partway.
    ///
    /// An object outside the space has no cells: nothing is stored and no surrogate
    /// id is used up. Under [`IndexOptions::SingleCell`] that is an error instead.
    pub fn add<O>(&mut self, object: &O, mut record: R) -> Result<Option<u64>>
    where
        O: SpatialObject + ?Sized,
    {
        let zs = self.decompose(object);
        if self.options == IndexOptions::SingleCell && zs.len() != 1 {
            return Err(SpatialError::SingleCell { cells: zs.len() });
        }
        if zs.is_empty() {
            trace!("object outside the space, nothing added");
            return Ok(record.soid());
        }
        if record.requires_soid() && record.soid().is_none() {
            let soid = self.next_soid()?;
            record.set_soid(soid);
        }
        for &z in &zs {
            let mut copy = record.clone();
            copy.set_z(z);
            self.index.add(copy)?;
        }
        trace!(cells = zs.len(), soid = ?record.soid(), "added record");
        Ok(record.soid())
    }

    /// Removes the record of `object` selected by `filter`.
    ///
    /// Cells of the decomposition are visited in ascending order, and in each one the
    /// first record `filter` accepts is removed. Returns whether anything was removed;
    /// an object outside the space removes nothing.
    pub fn remove<O, F>(&mut self, object: &O, mut filter: F) -> Result<bool>
    where
        O: SpatialObject + ?Sized,
        F: FnMut(&R) -> bool,
    {
        let mut removed = false;
        for z in self.decompose(object) {
            removed |= self.index.remove(z, &mut filter)?;
        }
        trace!(removed, "removed record");
        Ok(removed)
    }

    fn decompose<O>(&self, object: &O) -> Vec<i64>
    where
        O: SpatialObject + ?Sized,
    {
        let max_z = match self.options {
            IndexOptions::Default => object.max_z(),
            IndexOptions::SingleCell => 1,
        };
        self.space.decompose(object, max_z)
    }

    fn next_soid(&mut self) -> Result<u64> {
        if self.soids.next == self.soids.limit {
            self.soids = reserve::<R, I>(&mut self.index, self.soids.block_size)?;
        }
        let soid = self.soids.next;
        self.soids.next += 1;
        Ok(soid)
    }
}

/// Reserves the next block of surrogate ids, persisting the new marker first.
fn reserve<R, I>(index: &mut I, block_size: u64) -> Result<SoidReservation>
where
    R: Record,
    I: Index<R>,
{
    let first = index.first_unreserved_soid()?;
    let limit = first
        .checked_add(block_size)
        .ok_or_else(|| SpatialError::Configuration(format!("surrogate ids exhausted at {first}")))?;
    index.set_first_unreserved_soid(limit)?;
    debug!(first, limit, "reserved surrogate ids");
    Ok(SoidReservation {
        next: first,
        limit,
        block_size,
    })
}
