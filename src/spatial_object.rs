//! The containment capability the decomposition needs from a spatial object, and
//! two reference shapes.

use std::fmt;

use crate::error::{Result, SpatialError};
use crate::region::Region;
use crate::space::MAX_DIMENSIONS;

/// How a cell's region relates to an object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Containment {
    /// No common point.
    Disjoint,
    /// Some common points, neither contains the other.
    Overlaps,
    /// The object covers the whole region.
    CellInsideObject,
    /// The region covers the whole object.
    ObjectInsideCell,
}

/// Anything that can be decomposed into z-values.
pub trait SpatialObject {
    /// Maximum number of z-values this object should decompose into.
    fn max_z(&self) -> usize;

    /// Compares the object with the region of a cell.
    fn containment(&self, region: &Region<'_>) -> Containment;
}

impl<T: SpatialObject + ?Sized> SpatialObject for &T {
    fn max_z(&self) -> usize {
        (**self).max_z()
    }

    fn containment(&self, region: &Region<'_>) -> Containment {
        (**self).containment(region)
    }
}

/// A point in application coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    coordinates: Vec<f64>,
}

impl Point {
    /// Creates a point. Fails on NaN or on more than 6 coordinates.
    ///
    /// # Example
    /// ```
    /// use zjoin::Point;
    /// let point = Point::new(&[10.0, 20.0]).unwrap();
    /// assert_eq!(point.coordinate(1), 20.0);
    /// ```
    pub fn new(coordinates: &[f64]) -> Result<Self> {
        check_dimensions(coordinates.len())?;
        if coordinates.iter().any(|c| c.is_nan()) {
            return Err(SpatialError::InvalidObject(format!("NaN in point {coordinates:?}")));
        }
        Ok(Point {
            coordinates: coordinates.to_vec(),
        })
    }

    /// Number of coordinates.
    pub fn dimensions(&self) -> usize {
        self.coordinates.len()
    }

    /// Coordinate of dimension `d`.
    pub fn coordinate(&self, d: usize) -> f64 {
        self.coordinates[d]
    }

    /// All coordinates.
    pub fn coordinates(&self) -> &[f64] {
        &self.coordinates
    }
}

impl SpatialObject for Point {
    fn max_z(&self) -> usize {
        1
    }

    fn containment(&self, region: &Region<'_>) -> Containment {
        let space = region.space();
        if space.dimensions() != self.dimensions() {
            return Containment::Disjoint;
        }
        for (d, &c) in self.coordinates.iter().enumerate() {
            if c < space.lo(d) || c >= space.hi(d) {
                return Containment::Disjoint;
            }
            let g = space.app_to_z_saturating(d, c);
            if g < region.lo(d) || g > region.hi(d) {
                return Containment::Disjoint;
            }
        }
        Containment::ObjectInsideCell
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (d, c) in self.coordinates.iter().enumerate() {
            if d > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{c}")?;
        }
        write!(f, ")")
    }
}

/// Default decomposition budget of an [`Aabb`].
pub const AABB_DEFAULT_MAX_Z: usize = 4;

/// An axis-aligned box with inclusive bounds in application coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Aabb {
    lo: Vec<f64>,
    hi: Vec<f64>,
    max_z: usize,
}

impl Aabb {
    /// Creates a box from its inclusive corners.
    ///
    /// # Example
    /// ```
    /// use zjoin::Aabb;
    /// let b = Aabb::new(&[0.0, 0.0], &[10.0, 5.0]).unwrap();
    /// assert!(b.contains_point(&[10.0, 5.0]));
    /// assert!(Aabb::new(&[1.0], &[0.0]).is_err());
    /// ```
    pub fn new(lo: &[f64], hi: &[f64]) -> Result<Self> {
        Self::with_max_z(lo, hi, AABB_DEFAULT_MAX_Z)
    }

    /// Creates a box decomposing into at most `max_z` cells.
    pub fn with_max_z(lo: &[f64], hi: &[f64], max_z: usize) -> Result<Self> {
        check_dimensions(lo.len())?;
        if lo.len() != hi.len() {
            return Err(SpatialError::InvalidObject(format!(
                "box corners have {} and {} coordinates",
                lo.len(),
                hi.len()
            )));
        }
        if lo.iter().zip(hi).any(|(l, h)| !(l <= h)) {
            return Err(SpatialError::InvalidObject(format!("box {lo:?} .. {hi:?} is inverted or NaN")));
        }
        if max_z == 0 {
            return Err(SpatialError::InvalidObject("max_z must be at least 1".into()));
        }
        Ok(Aabb {
            lo: lo.to_vec(),
            hi: hi.to_vec(),
            max_z,
        })
    }

    /// Number of dimensions.
    pub fn dimensions(&self) -> usize {
        self.lo.len()
    }

    /// Low corner coordinate of dimension `d`.
    pub fn lo(&self, d: usize) -> f64 {
        self.lo[d]
    }

    /// High corner coordinate of dimension `d`.
    pub fn hi(&self, d: usize) -> f64 {
        self.hi[d]
    }

    /// True if the boxes share at least one point.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.dimensions() == other.dimensions()
            && (0..self.dimensions()).all(|d| self.lo[d] <= other.hi[d] && other.lo[d] <= self.hi[d])
    }

    /// True if the point lies inside the box, boundary included.
    pub fn contains_point(&self, coordinates: &[f64]) -> bool {
        coordinates.len() == self.dimensions()
            && coordinates
                .iter()
                .enumerate()
                .all(|(d, &c)| self.lo[d] <= c && c <= self.hi[d])
    }
}

impl SpatialObject for Aabb {
    fn max_z(&self) -> usize {
        self.max_z
    }

    fn containment(&self, region: &Region<'_>) -> Containment {
        let space = region.space();
        if space.dimensions() != self.dimensions() {
            return Containment::Disjoint;
        }
        let mut cell_inside = true;
        let mut object_inside = true;
        for d in 0..self.dimensions() {
            if self.hi[d] < space.lo(d) || self.lo[d] >= space.hi(d) {
                return Containment::Disjoint;
            }
            let lo = space.app_to_z_saturating(d, self.lo[d]);
            let hi = space.app_to_z_saturating(d, self.hi[d]);
            if hi < region.lo(d) || lo > region.hi(d) {
                return Containment::Disjoint;
            }
            cell_inside &= lo <= region.lo(d) && region.hi(d) <= hi;
            object_inside &= region.lo(d) <= lo && hi <= region.hi(d);
        }
        if cell_inside {
            Containment::CellInsideObject
        } else if object_inside {
            Containment::ObjectInsideCell
        } else {
            Containment::Overlaps
        }
    }
}

impl fmt::Display for Aabb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for d in 0..self.dimensions() {
            if d > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", self.lo[d], self.hi[d])?;
        }
        write!(f, "]")
    }
}

fn check_dimensions(dimensions: usize) -> Result<()> {
    if dimensions == 0 || dimensions > MAX_DIMENSIONS {
        return Err(SpatialError::InvalidObject(format!(
            "objects have 1 to {MAX_DIMENSIONS} dimensions, got {dimensions}"
        )));
    }
    Ok(())
}
