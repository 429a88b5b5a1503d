//! Find the points inside a few query boxes.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use zjoin::prelude::*;

const SIZE: f64 = 1_000_000.0;
const N_POINTS: usize = 100_000;
const N_QUERIES: usize = 5;
const BOX_SIDE: f64 = 20_000.0;

fn main() -> Result<()> {
    let space = Space::new(&[0.0, 0.0], &[SIZE, SIZE], &[20, 20])?;
    let mut rng = StdRng::seed_from_u64(2024);

    // Points decompose into one cell each, so the single-cell layout loses nothing
    let mut points = SpatialIndex::new(space, BTreeIndex::new(), IndexOptions::SingleCell)?;
    let mut coordinates = Vec::with_capacity(N_POINTS);
    for i in 0..N_POINTS {
        let point = Point::new(&[rng.random_range(0.0..SIZE), rng.random_range(0.0..SIZE)])?;
        let _soid = points.add(&point, BasicRecord::without_soid(i))?;
        coordinates.push(point);
    }

    let join = SpatialJoin::new(Duplicates::Exclude)?;
    for _ in 0..N_QUERIES {
        let x = rng.random_range(0.0..SIZE - BOX_SIDE);
        let y = rng.random_range(0.0..SIZE - BOX_SIDE);
        let query = Aabb::new(&[x, y], &[x + BOX_SIDE, y + BOX_SIDE])?;

        let mut inside = Vec::new();
        for record in join.matches(&query, &points, |q, r| q.contains_point(coordinates[*r.payload()].coordinates()))? {
            inside.push(*record?.payload());
        }
        println!("Points inside {query}: {}", inside.len());
        for i in inside.iter().take(5) {
            println!("    {}", coordinates[*i]);
        }

        let expected = coordinates.iter().filter(|p| query.contains_point(p.coordinates())).count();
        assert_eq!(inside.len(), expected, "Join should agree with a full scan");
    }
    Ok(())
}
