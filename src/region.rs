//! The box of grid coordinates covered by a cell.

use crate::Space;
use crate::space::MAX_DIMENSIONS;

/// Region of space covered by one z-value, in grid coordinates.
///
/// `lo(d)` and `hi(d)` are inclusive. A region at full resolution covers a single
/// grid point in every dimension.
#[derive(Clone, Copy, Debug)]
pub struct Region<'s> {
    space: &'s Space,
    z: i64,
    lo: [u64; MAX_DIMENSIONS],
    hi: [u64; MAX_DIMENSIONS],
}

impl<'s> Region<'s> {
    pub(crate) fn new(
        space: &'s Space,
        z: i64,
        lo: [u64; MAX_DIMENSIONS],
        hi: [u64; MAX_DIMENSIONS],
    ) -> Self {
        Region { space, z, lo, hi }
    }

    /// The space this region belongs to.
    pub fn space(&self) -> &'s Space {
        self.space
    }

    /// The z-value whose cell this region is.
    pub fn z(&self) -> i64 {
        self.z
    }

    /// Number of significant bits of the cell.
    pub fn level(&self) -> u32 {
        crate::z::length(self.z)
    }

    /// True if the region is a single grid point.
    pub fn is_full_resolution(&self) -> bool {
        self.level() == self.space.z_bits()
    }

    /// Lowest grid coordinate of dimension `d`, inclusive.
    pub fn lo(&self, d: usize) -> u64 {
        self.lo[d]
    }

    /// Highest grid coordinate of dimension `d`, inclusive.
    pub fn hi(&self, d: usize) -> u64 {
        self.hi[d]
    }

    /// Lowest application coordinate of dimension `d`, inclusive.
    pub fn app_lo(&self, d: usize) -> f64 {
        self.space.z_to_app(d, self.lo[d])
    }

    /// Highest application coordinate of dimension `d`, exclusive.
    pub fn app_hi(&self, d: usize) -> f64 {
        self.space.z_to_app(d, self.hi[d] + 1)
    }
}
