//! # zjoin - Z-order spatial index and spatial join
//!
//! A Rust library for indexing 1 to 6 dimensional spatial objects by z-order and
//! joining two such indexes, or one object and an index, without a full scan.
//!
//! ## Features
//!
//! - **Z-order encoding**: Fixed precision coordinates interleaved into one `i64`
//!   per cell, ordered as a pre-order walk of the cell tree
//! - **Decomposition**: Any object approximated by a bounded set of cells
//! - **Merge join**: Two z-ordered streams merged with ENTER/EXIT events, skipping
//!   ahead with cursor repositioning where one side has nothing to offer
//! - **Pluggable storage**: Anything implementing [`Index`] and [`Cursor`]; an
//!   in-memory [`BTreeIndex`] and [`SortedArray`] are included
//!
//! ## Quick Start
//!
//! ```rust
//! use zjoin::prelude::*;
//!
//! let space = Space::new(&[0.0, 0.0], &[1000.0, 1000.0], &[10, 10]).unwrap();
//! let mut boxes = SpatialIndex::new(space, BTreeIndex::new(), IndexOptions::Default).unwrap();
//!
//! let shapes = [
//!     Aabb::new(&[0.0, 0.0], &[200.0, 200.0]).unwrap(),     // 0: large box
//!     Aabb::new(&[100.0, 100.0], &[300.0, 300.0]).unwrap(), // 1: overlapping box
//!     Aabb::new(&[500.0, 500.0], &[600.0, 600.0]).unwrap(), // 2: distant box
//! ];
//! for (i, shape) in shapes.iter().enumerate() {
//!     boxes.add(shape, BasicRecord::new(i)).unwrap();
//! }
//!
//! // Pairs of overlapping boxes, each reported once
//! let join = SpatialJoin::new(Duplicates::Exclude).unwrap();
//! let mut pairs: Vec<(usize, usize)> = join
//!     .pairs(&boxes, &boxes, |a, b| {
//!         a.payload() < b.payload() && shapes[*a.payload()].overlaps(&shapes[*b.payload()])
//!     })
//!     .unwrap()
//!     .map(|pair| pair.map(|(a, b)| (*a.payload(), *b.payload())).unwrap())
//!     .collect();
//! pairs.sort();
//! assert_eq!(pairs, vec![(0, 1)]);
//! ```
//!
//! ## How It Works
//!
//! A [`Space`] lays a grid of `2^x_bits[d]` cells over each dimension and interleaves
//! the bits of grid coordinates into a z-value (see [`z`]). A prefix of those bits
//! names a box of the space, so every z-value is a node of a binary tree whose root
//! is the whole space. Sorting z-values as integers visits that tree in pre-order:
//! each cell comes right before its descendants.
//!
//! A [`SpatialIndex`] decomposes each object into a few cells covering it and stores
//! one record per cell. Two records can only overlap if one cell contains the other,
//! and in pre-order the container always comes first. [`SpatialJoin`] exploits this by
//! reading both indexes in order and pairing each new record with the still open
//! cells of the other index. The pairs are candidates; the caller's filter makes the
//! exact geometric decision.
//!
//! Diagnostics are emitted with `tracing`; the library installs no subscriber.

pub mod btree_index;
pub mod config;
pub mod error;
pub mod index;
pub mod prelude;
pub mod record;
pub mod region;
pub mod sorted_array;
pub mod space;
pub mod spatial_index;
pub mod spatial_join;
pub mod spatial_object;
pub mod z;

mod spatial_join_tests;

pub use btree_index::{BTreeCursor, BTreeIndex};
pub use config::Tunables;
pub use error::{Result, SpatialError};
pub use index::{Cursor, Index};
pub use record::{BasicRecord, Record};
pub use region::Region;
pub use sorted_array::{SortedArray, SortedArrayCursor};
pub use space::Space;
pub use spatial_index::{IndexOptions, SpatialIndex};
pub use spatial_join::{Duplicates, JoinIter, SpatialJoin};
pub use spatial_object::{Aabb, Containment, Point, SpatialObject};
