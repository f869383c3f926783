//! Random field generation.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::compute::Cell;

/// Interior cell mix: 1 part wall, 3 parts water, 7 parts gas.
const KIND_WEIGHTS: [u32; 3] = [1, 3, 7];
const KIND_CHOICES: [Cell; 3] = [Cell::Wall, Cell::Water, Cell::Gas];

/// Generate the text form of a random field with walls on all four borders.
pub fn random_field(rows: usize, cols: usize, seed: u64) -> String {
    assert!(rows >= 3 && cols >= 3, "a field needs room inside its wall ring");
    let mut rng = StdRng::seed_from_u64(seed);
    let mix = WeightedIndex::new(KIND_WEIGHTS).expect("weights are static and non-zero");

    let mut out = String::with_capacity((cols + 1) * rows);
    for x in 0..rows {
        for y in 0..cols {
            let border = x == 0 || x == rows - 1 || y == 0 || y == cols - 1;
            let kind = if border {
                Cell::Wall
            } else {
                KIND_CHOICES[mix.sample(&mut rng)]
            };
            out.push(kind.as_char());
        }
        out.push('\n');
    }
    out
}
