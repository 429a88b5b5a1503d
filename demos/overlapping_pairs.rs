//! Find overlapping pairs between two sets of boxes.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use zjoin::prelude::*;

const SIZE: f64 = 1_000_000.0;
const N_BOXES: usize = 50_000;
const BOX_SIDE: f64 = 2_000.0;

fn random_box(rng: &mut StdRng) -> Result<Aabb> {
    let x = rng.random_range(0.0..SIZE - BOX_SIDE);
    let y = rng.random_range(0.0..SIZE - BOX_SIDE);
    Aabb::new(&[x, y], &[x + BOX_SIDE, y + BOX_SIDE])
}

fn main() -> Result<()> {
    let space = Space::new(&[0.0, 0.0], &[SIZE, SIZE], &[20, 20])?;
    let mut rng = StdRng::seed_from_u64(7);

    let mut left = SpatialIndex::new(space.clone(), BTreeIndex::new(), IndexOptions::Default)?;
    let mut right = SpatialIndex::new(space, BTreeIndex::new(), IndexOptions::Default)?;
    let mut left_boxes = Vec::with_capacity(N_BOXES);
    let mut right_boxes = Vec::with_capacity(N_BOXES);
    for i in 0..N_BOXES {
        let l = random_box(&mut rng)?;
        let r = random_box(&mut rng)?;
        let _soid = left.add(&l, BasicRecord::new(i))?;
        let _soid = right.add(&r, BasicRecord::new(i))?;
        left_boxes.push(l);
        right_boxes.push(r);
    }

    let join = SpatialJoin::new(Duplicates::Exclude)?;
    let overlap = |l: &BasicRecord<usize>, r: &BasicRecord<usize>| {
        left_boxes[*l.payload()].overlaps(&right_boxes[*r.payload()])
    };
    println!("Overlapping pairs");
    let mut count = 0;
    for pair in join.pairs(&left, &right, overlap)? {
        let (l, r) = pair?;
        if count < 10 {
            println!("    {} {}", left_boxes[*l.payload()], right_boxes[*r.payload()]);
        }
        count += 1;
    }
    println!("{count} pairs");

    let sample = &left_boxes[..100];
    let expected = sample
        .iter()
        .map(|l| right_boxes.iter().filter(|r| l.overlaps(r)).count())
        .sum::<usize>();
    let found = join
        .pairs(&left, &right, |l, r| *l.payload() < 100 && overlap(l, r))?
        .count();
    assert_eq!(found, expected, "Join should agree with a full scan of the first 100 boxes");
    Ok(())
}
