//! Spatial join by merging z-ordered record streams.
//!
//! Both inputs are read in z order. Reading a record ENTERs its cell; reaching the
//! `z_hi` of an entered cell EXITs it. Each input keeps a stack of entered cells, all
//! nested, so that when a record enters, everything on the other input's stack is an
//! ancestor of (or equal to) its cell, and those are exactly the records it can
//! overlap among the ones already seen. An ENTER is processed before an EXIT at the
//! same z-value, otherwise a cell could leave the stack just before its last
//! descendant arrives.
//!
//! While one input has nothing entered, the other skips records that end before the
//! first record of the first, using its cursor's `go_to` rather than a scan.

use std::collections::VecDeque;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use rustc_hash::FxHashSet;

use crate::config::Tunables;
use crate::error::{Result, SpatialError};
use crate::index::{Cursor, Index};
use crate::record::Record;
use crate::sorted_array::SortedArray;
use crate::spatial_index::SpatialIndex;
use crate::spatial_object::SpatialObject;
use crate::z::{self, ROOT, Z_EOF, Z_UNUSED};

/// Whether a join reports the same pair more than once.
///
/// An object stored under several cells can meet another object in several cell
/// pairs, and each meeting produces the pair again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Duplicates {
    /// Report every meeting.
    #[default]
    Include,
    /// Report each distinct pair once. Records equal apart from their z-value
    /// count as the same object. Remembers every pair reported so far.
    Exclude,
}

/// Runs spatial joins.
///
/// # Example
/// ```
/// use zjoin::{Aabb, BTreeIndex, BasicRecord, Duplicates, IndexOptions, Point, Space, SpatialIndex, SpatialJoin};
/// let space = Space::new(&[0.0, 0.0], &[100.0, 100.0], &[8, 8]).unwrap();
/// let mut points = SpatialIndex::new(space, BTreeIndex::new(), IndexOptions::Default).unwrap();
/// let inside = Point::new(&[15.0, 15.0]).unwrap();
/// let outside = Point::new(&[80.0, 15.0]).unwrap();
/// points.add(&inside, BasicRecord::new(1_u32)).unwrap();
/// points.add(&outside, BasicRecord::new(2_u32)).unwrap();
///
/// let query = Aabb::new(&[10.0, 10.0], &[20.0, 20.0]).unwrap();
/// let join = SpatialJoin::new(Duplicates::Exclude).unwrap();
/// let found: Vec<u32> = join
///     .matches(&query, &points, |_, _| true)
///     .unwrap()
///     .map(|record| *record.unwrap().payload())
///     .collect();
/// assert_eq!(found, vec![1]);
/// ```
#[derive(Clone, Debug)]
pub struct SpatialJoin {
    duplicates: Duplicates,
    single_cell_optimization: bool,
}

impl SpatialJoin {
    /// Creates a join, reading tunables from the environment.
    pub fn new(duplicates: Duplicates) -> Result<Self> {
        Ok(Self::with_tunables(duplicates, &Tunables::from_env()?))
    }

    /// Creates a join with explicit tunables.
    pub fn with_tunables(duplicates: Duplicates, tunables: &Tunables) -> Self {
        SpatialJoin {
            duplicates,
            single_cell_optimization: tunables.single_cell_optimization,
        }
    }

    /// The duplicate policy.
    pub fn duplicates(&self) -> Duplicates {
        self.duplicates
    }

    /// Pairs of records from `left` and `right` whose cells overlap and that
    /// `filter` accepts. `filter` is the exact overlap test and always sees the left
    /// record first.
    ///
    /// Fails with [`SpatialError::IncompatibleSpace`] unless both indexes use the same
    /// space. `left` and `right` may be the same index.
    pub fn pairs<'a, L, R, IL, IR, F>(
        &self,
        left: &'a SpatialIndex<L, IL>,
        right: &'a SpatialIndex<R, IR>,
        filter: F,
    ) -> Result<JoinIter<'a, (L, R)>>
    where
        L: Record + Eq + Hash + 'a,
        R: Record + Eq + Hash + 'a,
        IL: Index<L> + 'a,
        IR: Index<R> + 'a,
        F: FnMut(&L, &R) -> bool + 'a,
    {
        if left.space() != right.space() {
            return Err(SpatialError::IncompatibleSpace);
        }
        let z_bits = left.space().z_bits();
        tracing::debug!(duplicates = ?self.duplicates, z_bits, "starting index join");
        let iterator = SpatialJoinIterator::new(
            Input::new("left", left.index().cursor(ROOT)?, z_bits),
            Input::new("right", right.index().cursor(ROOT)?, z_bits),
            filter,
        );
        Ok(self.output(iterator, |(l, r): &(L, R)| (object_key(l), object_key(r))))
    }

    /// Records of `data` whose cells overlap the cells of `query` and that `filter`
    /// accepts. `filter` sees the query object first.
    pub fn matches<'a, O, R, I, F>(
        &self,
        query: &'a O,
        data: &'a SpatialIndex<R, I>,
        mut filter: F,
    ) -> Result<JoinIter<'a, R>>
    where
        O: SpatialObject + ?Sized + 'a,
        R: Record + Eq + Hash + 'a,
        I: Index<R> + 'a,
        F: FnMut(&O, &R) -> bool + 'a,
    {
        let space = data.space();
        let zs = space.decompose(query, query.max_z());
        let fast_path = zs.len() == 1 && self.single_cell_optimization;
        tracing::debug!(
            duplicates = ?self.duplicates,
            cells = zs.len(),
            fast_path,
            "starting object join"
        );
        if zs.is_empty() {
            return Ok(JoinIter::empty());
        }
        if fast_path {
            let cell = zs[0];
            let scan = SingleCellScan {
                query,
                cursor: data.index().cursor(cell)?,
                cell,
                hi: space.z_hi(cell),
                level: 0,
                positioned: false,
                done: false,
                filter,
                _record: PhantomData,
            };
            return Ok(self.output(scan, object_key::<R>));
        }
        let cells = zs.into_iter().map(|z| ObjectRecord { z, object: query }).collect();
        let query_side = SortedArray::from_records(cells);
        let iterator = SpatialJoinIterator::new(
            Input::new("query", query_side.owned_cursor(ROOT), space.z_bits()),
            Input::new("data", data.index().cursor(ROOT)?, space.z_bits()),
            move |cell: &ObjectRecord<'a, O>, record: &R| filter(cell.object, record),
        )
        .map(|pair| pair.map(|(_, record)| record));
        Ok(self.output(iterator, object_key::<R>))
    }

    fn output<'a, T, K, I, F>(&self, iterator: I, key: F) -> JoinIter<'a, T>
    where
        T: 'a,
        K: Eq + Hash + 'a,
        I: Iterator<Item = Result<T>> + 'a,
        F: FnMut(&T) -> K + 'a,
    {
        match self.duplicates {
            Duplicates::Include => JoinIter::new(iterator),
            Duplicates::Exclude => JoinIter::new(DuplicateEliminating {
                inner: iterator,
                key,
                seen: FxHashSet::default(),
            }),
        }
    }
}

/// A record's identity as an object: the record with its z-value cleared.
fn object_key<R: Record>(record: &R) -> R {
    let mut key = record.clone();
    key.set_z(Z_UNUSED);
    key
}

/// Lazy join output. Yields an error at most once, then ends.
pub struct JoinIter<'a, T> {
    inner: Box<dyn Iterator<Item = Result<T>> + 'a>,
}

impl<'a, T: 'a> JoinIter<'a, T> {
    fn new<I>(inner: I) -> Self
    where
        I: Iterator<Item = Result<T>> + 'a,
    {
        JoinIter { inner: Box::new(inner) }
    }

    fn empty() -> Self {
        Self::new(std::iter::empty())
    }
}

impl<T> Iterator for JoinIter<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl<T> fmt::Debug for JoinIter<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinIter").finish_non_exhaustive()
    }
}

/// Drops items whose key was already produced.
struct DuplicateEliminating<I, K, F> {
    inner: I,
    key: F,
    seen: FxHashSet<K>,
}

impl<I, T, K, F> Iterator for DuplicateEliminating<I, K, F>
where
    I: Iterator<Item = Result<T>>,
    K: Eq + Hash,
    F: FnMut(&T) -> K,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok(item) => {
                    if self.seen.insert((self.key)(&item)) {
                        return Some(Ok(item));
                    }
                }
                Err(error) => return Some(Err(error)),
            }
        }
    }
}

/// One cell of a query object, stored in the synthesized query index.
struct ObjectRecord<'o, O: ?Sized> {
    z: i64,
    object: &'o O,
}

impl<O: ?Sized> Clone for ObjectRecord<'_, O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<O: ?Sized> Copy for ObjectRecord<'_, O> {}

impl<O: ?Sized> Record for ObjectRecord<'_, O> {
    fn z(&self) -> i64 {
        self.z
    }

    fn set_z(&mut self, z: i64) {
        self.z = z;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InputState {
    Before,
    Active,
    Done,
}

/// One side of the merge.
struct Input<R, C>
where
    R: Record,
    C: Cursor<R>,
{
    name: &'static str,
    cursor: C,
    state: InputState,
    /// Records read but not yet entered, ascending
    lookahead: VecDeque<R>,
    /// Entered records and their `z_hi`, innermost last
    stack: Vec<(R, i64)>,
    z_bits: u32,
}

impl<R, C> Input<R, C>
where
    R: Record,
    C: Cursor<R>,
{
    fn new(name: &'static str, cursor: C, z_bits: u32) -> Self {
        Input {
            name,
            cursor,
            state: InputState::Before,
            lookahead: VecDeque::new(),
            stack: Vec::new(),
            z_bits,
        }
    }

    /// Z-value of the next record to enter, or `Z_EOF`.
    fn next_entry(&mut self) -> Result<i64> {
        if let Some(record) = self.lookahead.front() {
            return Ok(record.z());
        }
        if self.state == InputState::Done {
            return Ok(Z_EOF);
        }
        self.state = InputState::Active;
        match self.cursor.next()? {
            Some(record) => {
                let z = record.z();
                self.lookahead.push_back(record);
                Ok(z)
            }
            None => {
                self.close();
                Ok(Z_EOF)
            }
        }
    }

    /// `z_hi` of the innermost entered record, or `Z_EOF`.
    fn next_exit(&self) -> i64 {
        self.stack.last().map_or(Z_EOF, |&(_, hi)| hi)
    }

    fn enter(&mut self, record: R) {
        let z = record.z();
        let hi = z::z_hi(z, self.z_bits);
        debug_assert!(self.stack.last().is_none_or(|&(_, top)| hi <= top));
        tracing::trace!(input = self.name, z, hi, "enter");
        self.stack.push((record, hi));
    }

    fn exit(&mut self) {
        if let Some((record, hi)) = self.stack.pop() {
            tracing::trace!(input = self.name, z = record.z(), hi, "exit");
        }
    }

    /// Moves past records that can't overlap anything at or after `target` on the
    /// other input, given nothing is entered there.
    ///
    /// A record before `target` that is not its ancestor ends before `target`. One
    /// such record is discarded by reading past it; if the next is no better the
    /// cursor jumps: records at the ancestors of `target` are fetched by exact probes
    /// and the scan resumes at `target`.
    fn skip_to(&mut self, target: i64) -> Result<()> {
        if target == Z_EOF {
            self.lookahead.clear();
            self.close();
            return Ok(());
        }
        let z = self.next_entry()?;
        if keeps(z, target) {
            return Ok(());
        }
        drop(self.lookahead.pop_front());
        let from = self.next_entry()?;
        if keeps(from, target) {
            return Ok(());
        }
        self.lookahead.clear();
        for length in 0..z::length(target) {
            let ancestor = z::ancestor(target, length);
            if ancestor <= from {
                continue;
            }
            self.cursor.go_to(ancestor)?;
            while let Some(record) = self.cursor.next()? {
                if record.z() != ancestor {
                    break;
                }
                self.lookahead.push_back(record);
            }
        }
        self.cursor.go_to(target)?;
        tracing::trace!(
            input = self.name,
            from,
            target,
            ancestors = self.lookahead.len(),
            "skip ahead"
        );
        Ok(())
    }

    fn close(&mut self) {
        if self.state != InputState::Done {
            self.cursor.close();
            self.state = InputState::Done;
            tracing::trace!(input = self.name, "input done");
        }
    }
}

impl<R, C> Drop for Input<R, C>
where
    R: Record,
    C: Cursor<R>,
{
    fn drop(&mut self) {
        self.close();
    }
}

/// True if a record at `z` may overlap a record at or after `target`.
fn keeps(z: i64, target: i64) -> bool {
    z >= target || z::contains(z, target)
}

/// The ENTER/EXIT merge of two inputs.
struct SpatialJoinIterator<L, R, CL, CR, F>
where
    L: Record,
    R: Record,
    CL: Cursor<L>,
    CR: Cursor<R>,
{
    left: Input<L, CL>,
    right: Input<R, CR>,
    filter: F,
    pending: VecDeque<(L, R)>,
    finished: bool,
}

impl<L, R, CL, CR, F> SpatialJoinIterator<L, R, CL, CR, F>
where
    L: Record,
    R: Record,
    CL: Cursor<L>,
    CR: Cursor<R>,
    F: FnMut(&L, &R) -> bool,
{
    fn new(left: Input<L, CL>, right: Input<R, CR>, filter: F) -> Self {
        SpatialJoinIterator {
            left,
            right,
            filter,
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// Processes events until a pair is pending or both inputs are exhausted.
    fn advance(&mut self) -> Result<()> {
        while self.pending.is_empty() {
            let mut left_entry = self.left.next_entry()?;
            let mut right_entry = self.right.next_entry()?;
            if left_entry < right_entry && self.right.stack.is_empty() {
                self.left.skip_to(right_entry)?;
                left_entry = self.left.next_entry()?;
            } else if right_entry < left_entry && self.left.stack.is_empty() {
                self.right.skip_to(left_entry)?;
                right_entry = self.right.next_entry()?;
            }
            let left_exit = self.left.next_exit();
            let right_exit = self.right.next_exit();
            let z_min = left_entry.min(right_entry).min(left_exit).min(right_exit);
            if z_min == Z_EOF {
                self.finished = true;
                break;
            }
            if left_entry == z_min {
                self.enter_left();
            } else if right_entry == z_min {
                self.enter_right();
            } else if left_exit == z_min {
                self.left.exit();
            } else {
                self.right.exit();
            }
        }
        Ok(())
    }

    fn enter_left(&mut self) {
        let Some(record) = self.left.lookahead.pop_front() else {
            return;
        };
        for (other, _) in &self.right.stack {
            if (self.filter)(&record, other) {
                self.pending.push_back((record.clone(), other.clone()));
            }
        }
        self.left.enter(record);
    }

    fn enter_right(&mut self) {
        let Some(record) = self.right.lookahead.pop_front() else {
            return;
        };
        for (other, _) in &self.left.stack {
            if (self.filter)(other, &record) {
                self.pending.push_back((other.clone(), record.clone()));
            }
        }
        self.right.enter(record);
    }
}

impl<L, R, CL, CR, F> Iterator for SpatialJoinIterator<L, R, CL, CR, F>
where
    L: Record,
    R: Record,
    CL: Cursor<L>,
    CR: Cursor<R>,
    F: FnMut(&L, &R) -> bool,
{
    type Item = Result<(L, R)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pending.is_empty() && !self.finished {
            if let Err(error) = self.advance() {
                self.finished = true;
                self.left.close();
                self.right.close();
                return Some(Err(error));
            }
        }
        self.pending.pop_front().map(Ok)
    }
}

/// Answers a query object that decomposes into one cell straight from the data
/// index: records at each proper ancestor of the cell, then every record in the
/// cell's subtree.
struct SingleCellScan<'o, O: ?Sized, R, C, F> {
    query: &'o O,
    cursor: C,
    cell: i64,
    hi: i64,
    /// Length of the ancestor being probed; the cell's own length once scanning
    /// its subtree
    level: u32,
    positioned: bool,
    done: bool,
    filter: F,
    _record: PhantomData<fn() -> R>,
}

impl<O, R, C, F> SingleCellScan<'_, O, R, C, F>
where
    O: ?Sized,
    R: Record,
    C: Cursor<R>,
    F: FnMut(&O, &R) -> bool,
{
    fn step(&mut self) -> Result<Option<R>> {
        loop {
            let subtree = self.level == z::length(self.cell);
            let z = z::ancestor(self.cell, self.level);
            if !self.positioned {
                self.cursor.go_to(z)?;
                self.positioned = true;
            }
            match self.cursor.next()? {
                Some(record) if record.z() == z || (subtree && record.z() <= self.hi) => {
                    if (self.filter)(self.query, &record) {
                        return Ok(Some(record));
                    }
                }
                _ if subtree => return Ok(None),
                _ => {
                    self.level += 1;
                    self.positioned = false;
                }
            }
        }
    }
}

impl<O, R, C, F> Iterator for SingleCellScan<'_, O, R, C, F>
where
    O: ?Sized,
    R: Record,
    C: Cursor<R>,
    F: FnMut(&O, &R) -> bool,
{
    type Item = Result<R>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let step = self.step();
        if !matches!(step, Ok(Some(_))) {
            self.done = true;
            self.cursor.close();
        }
        step.transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree_index::BTreeIndex;
    use crate::record::BasicRecord;

    fn record(z: i64, payload: u32) -> BasicRecord<u32> {
        let mut record = BasicRecord::without_soid(payload);
        record.set_z(z);
        record
    }

    fn input(index: &BTreeIndex<BasicRecord<u32>>) -> Input<BasicRecord<u32>, crate::btree_index::BTreeCursor<'_, BasicRecord<u32>>> {
        Input::new("test", index.cursor(ROOT).unwrap(), 12)
    }

    fn cell(path: &[u32]) -> i64 {
        path.iter().fold(ROOT, |z, &bit| z::child(z, bit))
    }

    #[test]
    fn test_skip_keeps_ancestors_of_target() {
        let target = cell(&[1, 0, 1, 1]);
        let ancestor = cell(&[1, 0]);
        let mut index = BTreeIndex::new();
        for (i, z) in [cell(&[0, 0]), cell(&[0, 1]), cell(&[0, 1, 1]), ancestor, cell(&[1, 0, 0]), target, cell(&[1, 1])]
            .into_iter()
            .enumerate()
        {
            index.add(record(z, i as u32)).unwrap();
        }
        let mut input = input(&index);
        input.skip_to(target).unwrap();
        let mut entered = Vec::new();
        loop {
            let z = input.next_entry().unwrap();
            if z == Z_EOF {
                break;
            }
            entered.push(z);
            drop(input.lookahead.pop_front());
        }
        assert_eq!(entered, vec![ancestor, target, cell(&[1, 1])]);
    }

    #[test]
    fn test_skip_to_eof_drains() {
        let mut index = BTreeIndex::new();
        index.add(record(cell(&[0]), 1)).unwrap();
        let mut input = input(&index);
        input.skip_to(Z_EOF).unwrap();
        assert_eq!(input.next_entry().unwrap(), Z_EOF);
        assert_eq!(input.state, InputState::Done);
    }

    #[test]
    fn test_enter_before_exit_on_ties() {
        // The right record is the last full resolution descendant of the left one,
        // so its ENTER ties with the left EXIT.
        let outer = cell(&[0, 1]);
        let last = z::z_hi(outer, 12);
        let mut left = BTreeIndex::new();
        left.add(record(outer, 1)).unwrap();
        let mut right = BTreeIndex::new();
        right.add(record(last, 2)).unwrap();
        let join = SpatialJoinIterator::new(input(&left), input(&right), |_: &BasicRecord<u32>, _: &BasicRecord<u32>| true);
        let pairs: Vec<(u32, u32)> = join
            .map(|pair| pair.map(|(l, r)| (*l.payload(), *r.payload())).unwrap())
            .collect();
        assert_eq!(pairs, vec![(1, 2)]);
    }

    #[test]
    fn test_pairs_nested_cells_once() {
        let mut left = BTreeIndex::new();
        let mut right = BTreeIndex::new();
        left.add(record(cell(&[0]), 1)).unwrap();
        left.add(record(cell(&[0, 1, 1]), 2)).unwrap();
        left.add(record(cell(&[1, 1]), 3)).unwrap();
        right.add(record(cell(&[0, 1]), 10)).unwrap();
        right.add(record(cell(&[0, 1, 1]), 11)).unwrap();
        right.add(record(cell(&[1, 0]), 12)).unwrap();
        let join = SpatialJoinIterator::new(input(&left), input(&right), |_: &BasicRecord<u32>, _: &BasicRecord<u32>| true);
        let mut pairs: Vec<(u32, u32)> = join
            .map(|pair| pair.map(|(l, r)| (*l.payload(), *r.payload())).unwrap())
            .collect();
        pairs.sort_unstable();
        assert_eq!(pairs, vec![(1, 10), (1, 11), (2, 10), (2, 11)]);
    }

    #[test]
    fn test_duplicate_elimination() {
        let items = vec![Ok(1), Ok(2), Ok(1), Ok(3), Ok(2)];
        let unique: Vec<i32> = DuplicateEliminating {
            inner: items.into_iter(),
            key: |item: &i32| *item,
            seen: FxHashSet::default(),
        }
        .map(|item: Result<i32>| item.unwrap())
        .collect();
        assert_eq!(unique, vec![1, 2, 3]);
    }
}
