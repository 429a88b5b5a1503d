//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types from the crate.
//! Users can import everything they need with:
//!
//! ```
//! use zjoin::prelude::*;
//! ```

pub use crate::{
    Aabb, BTreeIndex, BasicRecord, Containment, Cursor, Duplicates, Index, IndexOptions, Point, Record, Result,
    SortedArray, Space, SpatialError, SpatialIndex, SpatialJoin, SpatialObject, Tunables,
};
