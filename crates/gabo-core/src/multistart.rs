//! Parallel multi-start execution.
//!
//! Both the acquisition optimizer and the hyperparameter search run several
//! independent local searches and keep the best one. `MultiStart` runs these
//! trials on rayon's pool. Each trial receives its own RNG seeded from the
//! master seed and the trial index, so results do not depend on scheduling.
//! The reduction is a pure max-score fold with ties going to the lowest index.

use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;

/// A trial result with the score used for the reduction (higher is better).
#[derive(Debug, Clone, PartialEq)]
pub struct Scored<T> {
    /// Index of the trial that produced this result
    pub index: usize,
    /// Score of the result, higher is better
    pub score: f64,
    /// The result itself
    pub value: T,
}

/// Outcome of a multi-start run.
#[derive(Debug)]
pub struct MultiStartReport<T, E> {
    /// Best scoring successful trial, if any
    pub best: Option<Scored<T>>,
    /// Failed trials with their index, in index order
    pub failures: Vec<(usize, E)>,
    /// Number of trials that were run
    pub trials: usize,
}

impl<T, E> MultiStartReport<T, E> {
    /// Number of trials that returned a result.
    pub fn successes(&self) -> usize {
        self.trials - self.failures.len()
    }
}

/// Runs independent trials in parallel and reduces them to the best one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiStart {
    num_starts: usize,
    seed: u64,
}

impl MultiStart {
    /// Creates a runner for `num_starts` trials under a master seed.
    pub fn new(num_starts: usize, seed: u64) -> Self {
        Self { num_starts, seed }
    }

    /// Number of trials.
    pub fn num_starts(&self) -> usize {
        self.num_starts
    }

    /// Master seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Seed of the RNG handed to trial `index`.
    ///
    /// SplitMix64 finalizer over the master seed and index, so neighbouring
    /// indices get unrelated streams.
    pub fn derive_seed(&self, index: usize) -> u64 {
        let mut z = self
            .seed
            .wrapping_add((index as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Runs every trial and keeps the best scoring success.
    ///
    /// `trial` returns `(score, value)`; results with a non-finite score are
    /// never selected as best.
    pub fn run<T, E, F>(&self, trial: F) -> MultiStartReport<T, E>
    where
        T: Send,
        E: Send,
        F: Fn(usize, &mut StdRng) -> Result<(f64, T), E> + Sync,
    {
        let outcomes: Vec<(usize, Result<(f64, T), E>)> = (0..self.num_starts)
            .into_par_iter()
            .map(|index| {
                let mut rng = StdRng::seed_from_u64(self.derive_seed(index));
                (index, trial(index, &mut rng))
            })
            .collect();

        let mut best: Option<Scored<T>> = None;
        let mut failures = Vec::new();
        for (index, outcome) in outcomes {
            match outcome {
                Ok((score, value)) => {
                    let better = score.is_finite()
                        && best.as_ref().map_or(true, |current| score > current.score);
                    if better {
                        best = Some(Scored {
                            index,
                            score,
                            value,
                        });
                    }
                }
                Err(err) => failures.push((index, err)),
            }
        }

        MultiStartReport {
            best,
            failures,
            trials: self.num_starts,
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn best_is_first_maximum(scores in prop::collection::vec(-1e3f64..1e3, 1..16), seed in any::<u64>()) {
            let runner = MultiStart::new(scores.len(), seed);
            let report = runner.run(|index, _rng| -> Result<(f64, usize), ()> { Ok((scores[index], index)) });
            let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let first = scores.iter().position(|&s| s == max).unwrap();
            let best = report.best.unwrap();
            prop_assert_eq!(best.index, first);
            prop_assert_eq!(best.value, first);
            prop_assert_eq!(report.trials, scores.len());
        }
    }
}
