use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::recency::RecencyIndex;

/// A generic trait for implementing new replacement policies. Can be used to parameterise a
/// SetCache.
///
/// The cache keeps the recency ordering itself, on hits and on insertions, so a policy only has to
/// pick the victim when a line needs replaced
pub trait ReplacementPolicy {
    /// Used by the cache to get the slot to overwrite when a new line is inserted into a full set
    ///
    /// Every slot of the set is resident when this is called, and the tag being inserted is not
    ///
    /// # Arguments
    ///
    /// * `recency`: The recency ordering of the set the line is inserted into
    ///
    /// returns: usize, the victim's slot
    fn select_victim(&mut self, recency: &RecencyIndex) -> usize;

    /// A short name for logging
    fn name(&self) -> &'static str;
}

/// Strict least recently used replacement. The victim is always the tail of the recency ordering
#[derive(Debug, Default)]
pub struct LeastRecentlyUsed;

impl ReplacementPolicy for LeastRecentlyUsed {
    fn select_victim(&mut self, recency: &RecencyIndex) -> usize {
        recency.lru_slot()
    }

    fn name(&self) -> &'static str {
        "lru"
    }
}

/// Uniform random replacement
///
/// Every line resident before the insertion is equally likely to be evicted, regardless of its
/// position in the recency ordering. The generator is owned by the policy, so a seeded cache
/// always makes the same choices
#[derive(Debug)]
pub struct Random {
    rng: StdRng,
}

impl Random {
    /// Creates a policy seeded from the operating system's entropy source
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for Random {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplacementPolicy for Random {
    fn select_victim(&mut self, recency: &RecencyIndex) -> usize {
        // Every slot is resident, so drawing a slot is drawing one of the resident tags
        self.rng.gen_range(0..recency.len())
    }

    fn name(&self) -> &'static str {
        "random"
    }
}
