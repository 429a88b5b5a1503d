//! Component tests for SpatialJoin - index/index and object/index joins checked
//! against brute force, duplicate policies, the single-cell fast path and errors

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::btree_index::BTreeCursor;
    use crate::{
        Aabb, BTreeIndex, BasicRecord, Cursor, Duplicates, Index, IndexOptions, Point, Result, SortedArray, Space,
        SpatialError, SpatialIndex, SpatialJoin, Tunables,
    };

    type Item = BasicRecord<usize>;

    fn space() -> Space {
        Space::new(&[0.0, 0.0], &[1000.0, 1000.0], &[10, 10]).unwrap()
    }

    fn random_box(rng: &mut StdRng, max_size: f64) -> Aabb {
        let x = rng.random_range(0.0..1000.0 - max_size);
        let y = rng.random_range(0.0..1000.0 - max_size);
        let w = rng.random_range(0.0..max_size);
        let h = rng.random_range(0.0..max_size);
        Aabb::new(&[x, y], &[x + w, y + h]).unwrap()
    }

    fn load<I: Index<Item>>(index: I, boxes: &[Aabb]) -> SpatialIndex<Item, I> {
        let mut index = SpatialIndex::with_tunables(space(), index, IndexOptions::Default, &Tunables::default()).unwrap();
        for (i, b) in boxes.iter().enumerate() {
            let _soid = index.add(b, BasicRecord::new(i)).unwrap();
        }
        index
    }

    fn join(duplicates: Duplicates) -> SpatialJoin {
        SpatialJoin::with_tunables(duplicates, &Tunables::default())
    }

    fn overlapping_pairs(left: &[Aabb], right: &[Aabb]) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for (i, l) in left.iter().enumerate() {
            for (j, r) in right.iter().enumerate() {
                if l.overlaps(r) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    fn join_pairs<IL, IR>(
        duplicates: Duplicates,
        left: &SpatialIndex<Item, IL>,
        right: &SpatialIndex<Item, IR>,
        left_boxes: &[Aabb],
        right_boxes: &[Aabb],
    ) -> Vec<(usize, usize)>
    where
        IL: Index<Item>,
        IR: Index<Item>,
    {
        join(duplicates)
            .pairs(left, right, |l: &Item, r: &Item| {
                left_boxes[*l.payload()].overlaps(&right_boxes[*r.payload()])
            })
            .unwrap()
            .map(|pair| pair.map(|(l, r)| (*l.payload(), *r.payload())).unwrap())
            .collect()
    }

    // ============================================================================
    // INDEX JOIN TESTS
    // ============================================================================

    #[test]
    fn test_pairs_match_brute_force() {
        let mut rng = StdRng::seed_from_u64(1);
        for max_size in [5.0, 40.0, 250.0] {
            let left_boxes: Vec<Aabb> = (0..400).map(|_| random_box(&mut rng, max_size)).collect();
            let right_boxes: Vec<Aabb> = (0..400).map(|_| random_box(&mut rng, max_size)).collect();
            let left = load(BTreeIndex::new(), &left_boxes);
            let right = load(SortedArray::new(), &right_boxes);
            let expected = overlapping_pairs(&left_boxes, &right_boxes);

            let mut excluded = join_pairs(Duplicates::Exclude, &left, &right, &left_boxes, &right_boxes);
            let emitted = excluded.len();
            excluded.sort_unstable();
            excluded.dedup();
            assert_eq!(excluded.len(), emitted, "duplicates with Exclude, max size {max_size}");
            assert_eq!(excluded, expected, "max size {max_size}");

            let mut included = join_pairs(Duplicates::Include, &left, &right, &left_boxes, &right_boxes);
            assert!(included.len() >= expected.len());
            included.sort_unstable();
            included.dedup();
            assert_eq!(included, expected, "max size {max_size}");
        }
    }

    #[test]
    fn test_pairs_commute() {
        let mut rng = StdRng::seed_from_u64(2);
        let a_boxes: Vec<Aabb> = (0..300).map(|_| random_box(&mut rng, 60.0)).collect();
        let b_boxes: Vec<Aabb> = (0..300).map(|_| random_box(&mut rng, 60.0)).collect();
        let a = load(BTreeIndex::new(), &a_boxes);
        let b = load(BTreeIndex::new(), &b_boxes);
        let mut forward = join_pairs(Duplicates::Exclude, &a, &b, &a_boxes, &b_boxes);
        let mut backward: Vec<(usize, usize)> = join_pairs(Duplicates::Exclude, &b, &a, &b_boxes, &a_boxes)
            .into_iter()
            .map(|(j, i)| (i, j))
            .collect();
        forward.sort_unstable();
        backward.sort_unstable();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_self_join() {
        let mut rng = StdRng::seed_from_u64(3);
        let boxes: Vec<Aabb> = (0..500).map(|_| random_box(&mut rng, 50.0)).collect();
        let index = load(BTreeIndex::new(), &boxes);
        let mut pairs: Vec<(usize, usize)> = join(Duplicates::Exclude)
            .pairs(&index, &index, |a: &Item, b: &Item| {
                a.payload() < b.payload() && boxes[*a.payload()].overlaps(&boxes[*b.payload()])
            })
            .unwrap()
            .map(|pair| pair.map(|(a, b)| (*a.payload(), *b.payload())).unwrap())
            .collect();
        pairs.sort_unstable();
        let expected: Vec<(usize, usize)> = overlapping_pairs(&boxes, &boxes)
            .into_iter()
            .filter(|(i, j)| i < j)
            .collect();
        assert_eq!(pairs, expected);
    }

    #[test]
    fn test_empty_inputs() {
        let mut rng = StdRng::seed_from_u64(4);
        let boxes: Vec<Aabb> = (0..50).map(|_| random_box(&mut rng, 100.0)).collect();
        let full = load(BTreeIndex::new(), &boxes);
        let empty = load(BTreeIndex::new(), &[]);
        assert!(join_pairs(Duplicates::Include, &full, &empty, &boxes, &[]).is_empty());
        assert!(join_pairs(Duplicates::Include, &empty, &full, &[], &boxes).is_empty());
        assert!(join_pairs(Duplicates::Include, &empty, &empty, &[], &[]).is_empty());
    }

    #[test]
    fn test_filter_sees_left_first() {
        let left_boxes = [Aabb::new(&[0.0, 0.0], &[10.0, 10.0]).unwrap()];
        let right_boxes = [
            Aabb::new(&[5.0, 5.0], &[6.0, 6.0]).unwrap(),
            Aabb::new(&[7.0, 7.0], &[8.0, 8.0]).unwrap(),
        ];
        let left = load(BTreeIndex::new(), &left_boxes);
        let mut right =
            SpatialIndex::with_tunables(space(), BTreeIndex::new(), IndexOptions::Default, &Tunables::default())
                .unwrap();
        for (i, b) in right_boxes.iter().enumerate() {
            let _soid = right.add(b, BasicRecord::new(100 + i)).unwrap();
        }
        let mut seen = Vec::new();
        let pairs = join(Duplicates::Exclude)
            .pairs(&left, &right, |l: &Item, r: &Item| {
                seen.push((*l.payload(), *r.payload()));
                true
            })
            .unwrap()
            .count();
        assert_eq!(pairs, 2);
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|&(l, r)| l == 0 && r >= 100), "{seen:?}");
    }

    #[test]
    fn test_incompatible_spaces() {
        let boxes = [Aabb::new(&[0.0, 0.0], &[1.0, 1.0]).unwrap()];
        let left = load(BTreeIndex::new(), &boxes);
        let coarser = Space::new(&[0.0, 0.0], &[1000.0, 1000.0], &[9, 10]).unwrap();
        let shifted = Space::new(&[0.0, 0.0], &[1000.0, 2000.0], &[10, 10]).unwrap();
        for other in [coarser, shifted] {
            let right: SpatialIndex<Item, _> =
                SpatialIndex::with_tunables(other, BTreeIndex::new(), IndexOptions::Default, &Tunables::default())
                    .unwrap();
            assert!(matches!(
                join(Duplicates::Include).pairs(&left, &right, |_, _| true),
                Err(SpatialError::IncompatibleSpace)
            ));
        }
    }

    // ============================================================================
    // OBJECT JOIN TESTS
    // ============================================================================

    fn matches_with<I: Index<Item>>(
        tunables: &Tunables,
        query: &Aabb,
        data: &SpatialIndex<Item, I>,
        boxes: &[Aabb],
    ) -> Vec<usize> {
        let mut found: Vec<usize> = SpatialJoin::with_tunables(Duplicates::Exclude, tunables)
            .matches(query, data, |q: &Aabb, r: &Item| q.overlaps(&boxes[*r.payload()]))
            .unwrap()
            .map(|record| *record.unwrap().payload())
            .collect();
        found.sort_unstable();
        found
    }

    #[test]
    fn test_fast_path_agrees_with_merge() {
        let mut rng = StdRng::seed_from_u64(6);
        let boxes: Vec<Aabb> = (0..2000).map(|_| random_box(&mut rng, 30.0)).collect();
        let data = load(BTreeIndex::new(), &boxes);
        let fast = Tunables::default().with_single_cell_optimization(true);
        let merge = Tunables::default().with_single_cell_optimization(false);
        for _ in 0..200 {
            let b = random_box(&mut rng, 150.0);
            let query = Aabb::with_max_z(&[b.lo(0), b.lo(1)], &[b.hi(0), b.hi(1)], 1).unwrap();
            let expected: Vec<usize> = (0..boxes.len()).filter(|&i| query.overlaps(&boxes[i])).collect();
            assert_eq!(matches_with(&fast, &query, &data, &boxes), expected, "fast path {query}");
            assert_eq!(matches_with(&merge, &query, &data, &boxes), expected, "merge {query}");
        }
    }

    #[test]
    fn test_multi_cell_queries() {
        let mut rng = StdRng::seed_from_u64(7);
        let boxes: Vec<Aabb> = (0..2000).map(|_| random_box(&mut rng, 30.0)).collect();
        let data = load(SortedArray::new(), &boxes);
        for max_z in [2, 4, 8, 16] {
            for _ in 0..50 {
                let b = random_box(&mut rng, 300.0);
                let query = Aabb::with_max_z(&[b.lo(0), b.lo(1)], &[b.hi(0), b.hi(1)], max_z).unwrap();
                let expected: Vec<usize> = (0..boxes.len()).filter(|&i| query.overlaps(&boxes[i])).collect();
                assert_eq!(matches_with(&Tunables::default(), &query, &data, &boxes), expected, "{query}");
            }
        }
    }

    #[test]
    fn test_point_query() {
        let mut rng = StdRng::seed_from_u64(8);
        let boxes: Vec<Aabb> = (0..1000).map(|_| random_box(&mut rng, 100.0)).collect();
        let data = load(BTreeIndex::new(), &boxes);
        for _ in 0..200 {
            let point = Point::new(&[rng.random_range(0.0..1000.0), rng.random_range(0.0..1000.0)]).unwrap();
            let mut found: Vec<usize> = join(Duplicates::Include)
                .matches(&point, &data, |p: &Point, r: &Item| boxes[*r.payload()].contains_point(p.coordinates()))
                .unwrap()
                .map(|record| *record.unwrap().payload())
                .collect();
            found.sort_unstable();
            let expected: Vec<usize> = (0..boxes.len())
                .filter(|&i| boxes[i].contains_point(point.coordinates()))
                .collect();
            assert_eq!(found, expected, "{point}");
        }
    }

    #[test]
    fn test_query_outside_space() {
        let boxes = [Aabb::new(&[0.0, 0.0], &[999.0, 999.0]).unwrap()];
        let data = load(BTreeIndex::new(), &boxes);
        let query = Aabb::new(&[-50.0, -50.0], &[-10.0, -10.0]).unwrap();
        assert!(matches_with(&Tunables::default(), &query, &data, &boxes).is_empty());
    }

    // ============================================================================
    // STORAGE ERROR TESTS
    // ============================================================================

    /// A [`BTreeIndex`] whose cursors fail after a fixed number of moves.
    struct Flaky {
        inner: BTreeIndex<Item>,
        moves: usize,
    }

    struct FlakyCursor<'a> {
        inner: BTreeCursor<'a, Item>,
        moves: usize,
    }

    impl FlakyCursor<'_> {
        fn spend(&mut self) -> Result<()> {
            if self.moves == 0 {
                return Err(SpatialError::Storage("read failed".into()));
            }
            self.moves -= 1;
            Ok(())
        }
    }

    impl Cursor<Item> for FlakyCursor<'_> {
        fn next(&mut self) -> Result<Option<Item>> {
            self.spend()?;
            self.inner.next()
        }

        fn previous(&mut self) -> Result<Option<Item>> {
            self.spend()?;
            self.inner.previous()
        }

        fn go_to(&mut self, z: i64) -> Result<()> {
            self.inner.go_to(z)
        }

        fn close(&mut self) {
            self.inner.close();
        }
    }

    impl Index<Item> for Flaky {
        type Cursor<'a>
            = FlakyCursor<'a>
        where
            Self: 'a;

        fn add(&mut self, record: Item) -> Result<()> {
            self.inner.add(record)
        }

        fn remove<F>(&mut self, z: i64, filter: F) -> Result<bool>
        where
            F: FnMut(&Item) -> bool,
        {
            self.inner.remove(z, filter)
        }

        fn cursor(&self, z: i64) -> Result<FlakyCursor<'_>> {
            Ok(FlakyCursor {
                inner: self.inner.cursor(z)?,
                moves: self.moves,
            })
        }

        fn first_unreserved_soid(&self) -> Result<u64> {
            self.inner.first_unreserved_soid()
        }

        fn set_first_unreserved_soid(&mut self, soid: u64) -> Result<()> {
            self.inner.set_first_unreserved_soid(soid)
        }
    }

    #[test]
    fn test_storage_error_ends_join() {
        let mut rng = StdRng::seed_from_u64(9);
        let boxes: Vec<Aabb> = (0..200).map(|_| random_box(&mut rng, 200.0)).collect();
        let left = load(
            Flaky {
                inner: BTreeIndex::new(),
                moves: 20,
            },
            &boxes,
        );
        let right = load(BTreeIndex::new(), &boxes);
        let results: Vec<Result<(Item, Item)>> = join(Duplicates::Include)
            .pairs(&left, &right, |_, _| true)
            .unwrap()
            .collect();
        let errors = results.iter().filter(|r| r.is_err()).count();
        assert_eq!(errors, 1);
        assert!(matches!(results.last(), Some(Err(SpatialError::Storage(_)))));
    }

    #[test]
    fn test_storage_error_in_fast_path() {
        let boxes = [Aabb::new(&[10.0, 10.0], &[20.0, 20.0]).unwrap()];
        let data = load(
            Flaky {
                inner: BTreeIndex::new(),
                moves: 0,
            },
            &boxes,
        );
        let query = Aabb::with_max_z(&[12.0, 12.0], &[13.0, 13.0], 1).unwrap();
        let results: Vec<Result<Item>> = join(Duplicates::Include)
            .matches(&query, &data, |_, _| true)
            .unwrap()
            .collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }
}
