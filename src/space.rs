//! The space in which spatial objects reside, and its z-order encoding.
//!
//! A `Space` is a grid of `2^x_bits[d]` cells along each dimension `d`, laid over
//! application coordinates `[lo[d], hi[d])`. Grid coordinates are interleaved into
//! z-values (see [`crate::z`]) according to the space's interleave.

use std::cmp::Reverse;
use std::collections::VecDeque;

use crate::error::{Result, SpatialError};
use crate::region::Region;
use crate::spatial_object::{Containment, SpatialObject};
use crate::z::{self, MAX_Z_BITS, ROOT, Z_UNUSED};

/// Maximum number of dimensions of a space.
pub const MAX_DIMENSIONS: usize = 6;

/// A multi-dimensional grid and the z-order encoding of its cells.
#[derive(Clone, Debug, PartialEq)]
pub struct Space {
    lo: Vec<f64>,
    hi: Vec<f64>,
    x_bits: Vec<u32>,
    /// Dimension supplying each encoded bit, most significant first
    interleave: Vec<usize>,
    /// (dimension, significance) for each encoded bit
    positions: Vec<(usize, u32)>,
    z_bits: u32,
}

impl Space {
    /// Creates a space with the default round-robin interleave.
    ///
    /// # Arguments
    /// * `lo` - Inclusive lower bound of each dimension
    /// * `hi` - Exclusive upper bound of each dimension
    /// * `x_bits` - Bits of resolution of each dimension; the sum must not exceed 57
    ///
    /// # Example
    /// ```
    /// use zjoin::Space;
    /// let space = Space::new(&[0.0, 0.0], &[1000.0, 1000.0], &[10, 10]).unwrap();
    /// assert_eq!(space.z_bits(), 20);
    /// ```
    pub fn new(lo: &[f64], hi: &[f64], x_bits: &[u32]) -> Result<Self> {
        Self::validate(lo, hi, x_bits)?;
        Self::with_interleave(lo, hi, x_bits, &default_interleave(x_bits))
    }

    /// Creates a space with an explicit interleave.
    ///
    /// `interleave[i]` is the dimension supplying encoded bit `i`. Each dimension `d`
    /// must appear exactly `x_bits[d]` times; its first appearance supplies its most
    /// significant bit. Dimensions appearing early are favoured for selectivity.
    pub fn with_interleave(lo: &[f64], hi: &[f64], x_bits: &[u32], interleave: &[usize]) -> Result<Self> {
        Self::validate(lo, hi, x_bits)?;
        let z_bits: u32 = x_bits.iter().sum();
        if interleave.len() != z_bits as usize {
            return Err(SpatialError::Configuration(format!(
                "interleave has {} positions, x_bits sum to {}",
                interleave.len(),
                z_bits
            )));
        }
        let mut remaining = x_bits.to_vec();
        let mut positions = Vec::with_capacity(interleave.len());
        for &d in interleave {
            match remaining.get_mut(d) {
                Some(bits) if *bits > 0 => {
                    *bits -= 1;
                    positions.push((d, *bits));
                }
                Some(_) => {
                    return Err(SpatialError::Configuration(format!(
                        "interleave uses dimension {d} more than {} times",
                        x_bits[d]
                    )));
                }
                None => {
                    return Err(SpatialError::Configuration(format!(
                        "interleave names dimension {d} of a {}-dimensional space",
                        x_bits.len()
                    )));
                }
            }
        }
        // Lengths agree, so no dimension can be short once none is over-used.
        debug_assert!(remaining.iter().all(|&bits| bits == 0));
        Ok(Space {
            lo: lo.to_vec(),
            hi: hi.to_vec(),
            x_bits: x_bits.to_vec(),
            interleave: interleave.to_vec(),
            positions,
            z_bits,
        })
    }

    fn validate(lo: &[f64], hi: &[f64], x_bits: &[u32]) -> Result<()> {
        let dimensions = x_bits.len();
        if dimensions == 0 || dimensions > MAX_DIMENSIONS {
            return Err(SpatialError::Configuration(format!(
                "dimensions must be between 1 and {MAX_DIMENSIONS}, got {dimensions}"
            )));
        }
        if lo.len() != dimensions || hi.len() != dimensions {
            return Err(SpatialError::Configuration(format!(
                "{} lo bounds and {} hi bounds for {dimensions} dimensions",
                lo.len(),
                hi.len()
            )));
        }
        for d in 0..dimensions {
            if !(lo[d].is_finite() && hi[d].is_finite() && lo[d] < hi[d]) {
                return Err(SpatialError::Configuration(format!(
                    "dimension {d} has invalid bounds [{}, {})",
                    lo[d], hi[d]
                )));
            }
            if x_bits[d] == 0 {
                return Err(SpatialError::Configuration(format!("dimension {d} has no bits")));
            }
        }
        let z_bits: u32 = x_bits.iter().sum();
        if z_bits > MAX_Z_BITS {
            return Err(SpatialError::Configuration(format!(
                "x_bits sum to {z_bits}, at most {MAX_Z_BITS} allowed"
            )));
        }
        Ok(())
    }

    /// Number of dimensions.
    pub fn dimensions(&self) -> usize {
        self.x_bits.len()
    }

    /// Inclusive lower bound of dimension `d`.
    pub fn lo(&self, d: usize) -> f64 {
        self.lo[d]
    }

    /// Exclusive upper bound of dimension `d`.
    pub fn hi(&self, d: usize) -> f64 {
        self.hi[d]
    }

    /// Bits of resolution of dimension `d`.
    pub fn x_bits(&self, d: usize) -> u32 {
        self.x_bits[d]
    }

    /// Total bits of a full resolution z-value.
    pub fn z_bits(&self) -> u32 {
        self.z_bits
    }

    /// Dimension supplying each encoded bit, most significant first.
    pub fn interleave(&self) -> &[usize] {
        &self.interleave
    }

    /// Converts an application coordinate of dimension `d` to a grid coordinate.
    ///
    /// Fails with [`SpatialError::Range`] if the coordinate is outside `[lo(d), hi(d))`.
    pub fn app_to_z(&self, d: usize, coordinate: f64) -> Result<u64> {
        if d >= self.dimensions() {
            return Err(SpatialError::Configuration(format!(
                "dimension {d} of a {}-dimensional space",
                self.dimensions()
            )));
        }
        if !(self.lo[d] <= coordinate && coordinate < self.hi[d]) {
            return Err(SpatialError::Range {
                dimension: d,
                coordinate,
                lo: self.lo[d],
                hi: self.hi[d],
            });
        }
        Ok(self.scale(d, coordinate))
    }

    /// Like [`Space::app_to_z`], but clamps coordinates outside the space onto its edge.
    /// NaN maps to 0.
    pub fn app_to_z_saturating(&self, d: usize, coordinate: f64) -> u64 {
        if coordinate >= self.hi[d] {
            self.grid_max(d)
        } else if coordinate >= self.lo[d] {
            self.scale(d, coordinate)
        } else {
            0
        }
    }

    /// Application coordinate of the low edge of grid coordinate `z` in dimension `d`.
    pub fn z_to_app(&self, d: usize, z: u64) -> f64 {
        let cells = (1_u64 << self.x_bits[d]) as f64;
        self.lo[d] + z as f64 * (self.hi[d] - self.lo[d]) / cells
    }

    #[inline]
    fn scale(&self, d: usize, coordinate: f64) -> u64 {
        let cells = (1_u64 << self.x_bits[d]) as f64;
        let scaled = ((coordinate - self.lo[d]) / (self.hi[d] - self.lo[d]) * cells).floor();
        // Rounding can push a coordinate just below hi onto the upper edge.
        (scaled as u64).min(self.grid_max(d))
    }

    #[inline]
    fn grid_max(&self, d: usize) -> u64 {
        (1_u64 << self.x_bits[d]) - 1
    }

    /// Returns the full resolution z-value of a point given in grid coordinates.
    ///
    /// # Example
    /// ```
    /// use zjoin::Space;
    /// let space = Space::new(&[0.0, 0.0], &[1024.0, 1024.0], &[10, 10]).unwrap();
    /// let z = space.shuffle(&[0x3ff, 0x000]).unwrap();
    /// assert_eq!(zjoin::z::length(z), 20);
    /// ```
    pub fn shuffle(&self, point: &[u64]) -> Result<i64> {
        if point.len() != self.dimensions() {
            return Err(SpatialError::Configuration(format!(
                "{}-dimensional point in a {}-dimensional space",
                point.len(),
                self.dimensions()
            )));
        }
        for (d, &x) in point.iter().enumerate() {
            if x > self.grid_max(d) {
                return Err(SpatialError::Range {
                    dimension: d,
                    coordinate: x as f64,
                    lo: 0.0,
                    hi: (1_u64 << self.x_bits[d]) as f64,
                });
            }
        }
        let mut bits = 0_i64;
        for (position, &(d, significance)) in self.positions.iter().enumerate() {
            if (point[d] >> significance) & 1 == 1 {
                bits |= z::position_bit(position as u32);
            }
        }
        Ok(z::z_value(bits, self.z_bits))
    }

    /// Returns the full resolution z-value of a point given in application coordinates.
    pub fn shuffle_app(&self, coordinates: &[f64]) -> Result<i64> {
        if coordinates.len() != self.dimensions() {
            return Err(SpatialError::Configuration(format!(
                "{}-dimensional point in a {}-dimensional space",
                coordinates.len(),
                self.dimensions()
            )));
        }
        let mut point = [0_u64; MAX_DIMENSIONS];
        for (d, &coordinate) in coordinates.iter().enumerate() {
            point[d] = self.app_to_z(d, coordinate)?;
        }
        self.shuffle(&point[..self.dimensions()])
    }

    /// The region of grid coordinates covered by `z`.
    pub fn region(&self, z: i64) -> Region<'_> {
        let length = z::length(z) as usize;
        let mut lo = [0_u64; MAX_DIMENSIONS];
        let mut hi = [0_u64; MAX_DIMENSIONS];
        for (position, &(d, significance)) in self.positions.iter().enumerate() {
            let bit = 1_u64 << significance;
            if position >= length {
                hi[d] |= bit;
            } else if z & z::position_bit(position as u32) != 0 {
                lo[d] |= bit;
                hi[d] |= bit;
            }
        }
        Region::new(self, z, lo, hi)
    }

    /// Lowest z-value in the subtree of `z`.
    pub fn z_lo(&self, z: i64) -> i64 {
        z::z_lo(z)
    }

    /// Highest z-value in the subtree of `z`: its last full resolution descendant.
    pub fn z_hi(&self, z: i64) -> i64 {
        z::z_hi(z, self.z_bits)
    }

    /// Decomposes `object` into at most `max_z` z-values, ascending.
    ///
    /// The cells cover everything the object's containment test does not report as
    /// disjoint. An object disjoint from the whole space yields no cells.
    ///
    /// Refinement is breadth first from the root. A cell is kept as is when the object
    /// contains it or it is at full resolution. Otherwise it is split; a split leaving
    /// one non-disjoint child is always taken, a split into two children only while the
    /// frontier, counting the cell being split, fits the budget. The frontier can thus
    /// overshoot by one cell, and is then coarsened back by merging: the deepest pair of
    /// siblings into their parent first, otherwise the adjacent pair with the deepest
    /// common ancestor. Ties go to the leftmost pair.
    pub fn decompose<O>(&self, object: &O, max_z: usize) -> Vec<i64>
    where
        O: SpatialObject + ?Sized,
    {
        if max_z == 0 {
            return Vec::new();
        }
        let root = object.containment(&self.region(ROOT));
        if root == Containment::Disjoint {
            return Vec::new();
        }
        let mut done = Vec::new();
        let mut pending = VecDeque::from([(ROOT, root)]);
        while let Some((z, containment)) = pending.pop_front() {
            if containment == Containment::CellInsideObject || z::length(z) == self.z_bits {
                done.push(z);
                continue;
            }
            let mut children = [(ROOT, Containment::Disjoint); 2];
            let mut count = 0;
            for bit in 0..2 {
                let child = z::child(z, bit);
                let containment = object.containment(&self.region(child));
                if containment != Containment::Disjoint {
                    children[count] = (child, containment);
                    count += 1;
                }
            }
            let frontier = done.len() + pending.len() + 1;
            match count {
                1 => pending.push_back(children[0]),
                2 if frontier <= max_z => pending.extend(children),
                // Both children disjoint means the object's test is inconsistent;
                // keeping the parent stays conservative.
                _ => done.push(z),
            }
        }
        done.sort_unstable();
        if done.len() > max_z {
            coarsen(&mut done, max_z);
        }
        done
    }

    /// Decomposes `object` into `zs`, using `zs.len()` as the budget. Unused trailing
    /// slots are set to [`Z_UNUSED`].
    pub fn decompose_into<O>(&self, object: &O, zs: &mut [i64])
    where
        O: SpatialObject + ?Sized,
    {
        let cells = self.decompose(object, zs.len());
        zs[..cells.len()].copy_from_slice(&cells);
        zs[cells.len()..].fill(Z_UNUSED);
    }
}

/// Round robin over the dimensions, skipping dimensions whose bits are used up.
fn default_interleave(x_bits: &[u32]) -> Vec<usize> {
    let mut remaining = x_bits.to_vec();
    let mut interleave = Vec::with_capacity(x_bits.iter().sum::<u32>() as usize);
    while remaining.iter().any(|&bits| bits > 0) {
        for (d, bits) in remaining.iter_mut().enumerate() {
            if *bits > 0 {
                interleave.push(d);
                *bits -= 1;
            }
        }
    }
    interleave
}

/// Merges sorted, disjoint cells until at most `budget` remain.
fn coarsen(cells: &mut Vec<i64>, budget: usize) {
    let before = cells.len();
    while cells.len() > budget.max(1) {
        let sibling_pair = (0..cells.len() - 1)
            .filter(|&i| z::siblings(cells[i], cells[i + 1]))
            .max_by_key(|&i| (z::length(cells[i]), Reverse(i)));
        let (i, merged) = match sibling_pair {
            Some(i) => (i, z::ancestor(cells[i], z::length(cells[i]) - 1)),
            None => {
                let i = (0..cells.len() - 1)
                    .max_by_key(|&i| (z::length(z::common_ancestor(cells[i], cells[i + 1])), Reverse(i)))
                    .unwrap_or(0);
                (i, z::common_ancestor(cells[i], cells[i + 1]))
            }
        };
        // The pair's second cell lies inside `merged`, so the retain drops it too.
        cells[i] = merged;
        cells.retain(|&c| c == merged || !z::contains(merged, c));
    }
    tracing::trace!(before, after = cells.len(), "coarsened decomposition");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_interleave() {
        assert_eq!(default_interleave(&[3, 5]), vec![0, 1, 0, 1, 0, 1, 1, 1]);
        assert_eq!(default_interleave(&[2, 1, 2]), vec![0, 1, 2, 0, 2]);
    }

    #[test]
    fn test_coarsen_prefers_siblings() {
        let a = z::child(z::child(ROOT, 0), 0);
        let b = z::child(z::child(ROOT, 0), 1);
        let c = z::child(z::child(z::child(ROOT, 1), 1), 0);
        let mut cells = vec![a, b, c];
        coarsen(&mut cells, 2);
        assert_eq!(cells, vec![z::child(ROOT, 0), c]);
    }

    #[test]
    fn test_coarsen_merges_closest_neighbours() {
        // Three cousins: no siblings, the first two share a deeper ancestor.
        let a = z::child(z::child(z::child(ROOT, 0), 0), 0);
        let b = z::child(z::child(z::child(ROOT, 0), 1), 1);
        let c = z::child(z::child(z::child(ROOT, 1), 0), 0);
        let mut cells = vec![a, b, c];
        coarsen(&mut cells, 2);
        assert_eq!(cells, vec![z::child(ROOT, 0), c]);
        coarsen(&mut cells, 1);
        assert_eq!(cells, vec![ROOT]);
    }
}
