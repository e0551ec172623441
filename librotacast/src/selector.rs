//! Uniform random choice among candidates

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::content::ContentItem;

/// Picks the next item to publish
///
/// Every candidate is equally likely and draws are independent across
/// cycles. The generator is not cryptographically secure and does not need
/// to be.
#[derive(Debug)]
pub struct Selector {
    rng: StdRng,
}

impl Selector {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible selector for tests
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Choose one candidate
    ///
    /// Callers pass a non-empty slice and skip the cycle otherwise. An empty
    /// slice still returns `None` rather than panicking.
    pub fn choose<'a>(&mut self, candidates: &'a [ContentItem]) -> Option<&'a ContentItem> {
        candidates.choose(&mut self.rng)
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self::new()
    }
}
