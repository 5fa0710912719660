use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use super::error::EngineError;

/// Source of the next pair to show the judge.
pub trait PairSelector {
    fn next_pair(&mut self, candidates: &[String]) -> Result<(String, String), EngineError>;
}

/// Draws two distinct candidates uniformly at random, ignoring comparison history.
#[derive(Debug)]
pub struct RandomPairSelector<R> {
    rng: R,
}

impl RandomPairSelector<StdRng> {
    pub fn from_os_rng() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RandomPairSelector<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> PairSelector for RandomPairSelector<R> {
    fn next_pair(&mut self, candidates: &[String]) -> Result<(String, String), EngineError> {
        if candidates.len() < 2 {
            return Err(EngineError::InsufficientItems {
                found: candidates.len(),
            });
        }

        let picked = index::sample(&mut self.rng, candidates.len(), 2);
        Ok((
            candidates[picked.index(0)].clone(),
            candidates[picked.index(1)].clone(),
        ))
    }
}
