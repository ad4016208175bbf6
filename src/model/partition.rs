use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Share of the rows used for fitting, the rest is held out
pub const TRAIN_FRACTION: f64 = 0.8;

/// Row indices of the training and holdout subsets of a dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub training: Vec<usize>,
    pub holdout: Vec<usize>,
}

impl Partition {
    /// Shuffle `0..num_rows` with a `StdRng` seeded from `seed` and cut it after
    /// `round(train_fraction * num_rows)` rows.
    pub fn new(num_rows: usize, train_fraction: f64, seed: u64) -> Partition {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut rows: Vec<usize> = (0..num_rows).collect();
        rows.shuffle(&mut rng);

        let training_len = ((train_fraction * num_rows as f64).round() as usize).min(num_rows);
        let holdout = rows.split_off(training_len);

        Partition {
            training: rows,
            holdout,
        }
    }
}
