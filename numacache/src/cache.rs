use tracing::{debug, trace};
use crate::coherence::{CacheLine, CoherenceState, Residency};
use crate::error::CacheError;
use crate::recency::RecencyIndex;
use crate::replacement_policies::{LeastRecentlyUsed, Random, ReplacementPolicy};
use crate::set::Set;

/// A generic trait for coherent set-associative caches
///
/// Technically not required as we're using static dispatch instead of dyn Cache, but it lets the
/// system drive either policy through one interface with no overhead
///
/// The caller is responsible for splitting addresses into a set index and a tag, and for deciding
/// coherence state transitions. Set indices must be below [`num_sets`](CoherentCache::num_sets)
pub trait CoherentCache {
    /// Residency test. Returns `Owned` if `tag` occupies `set`, and `Invalid` otherwise
    ///
    /// This doesn't read the line's recorded state, so a resident line whose state is `Invalid`
    /// is reported as `Owned`. Use [`probe`](CoherentCache::probe) to tell the two apart
    ///
    /// # Arguments
    ///
    /// * `set`: The set index
    /// * `tag`: The tag to look for
    ///
    /// returns: CoherenceState
    fn find_tag(&self, set: u64, tag: u64) -> CoherenceState;

    /// Returns whether `tag` occupies `set`, and if so its recorded state
    fn probe(&self, set: u64, tag: u64) -> Residency;

    /// Overwrites the state of a resident line. Does nothing if `tag` isn't resident
    fn change_state(&mut self, set: u64, tag: u64, state: CoherenceState);

    /// Makes a resident line the most recently used in its set
    ///
    /// `tag` must be resident, this is meant to be called after a hit. This is checked in debug
    /// builds, release builds ignore a non-resident tag
    fn update_lru(&mut self, set: u64, tag: u64);

    /// Reports which tag is least recently used in `set`, and whether evicting it owes a
    /// writeback. Doesn't modify the cache
    ///
    /// Under LRU replacement this is exactly the line the next [`insert_line`] evicts. Under
    /// random replacement it generally isn't, so callers should account writebacks from the line
    /// `insert_line` returns
    ///
    /// [`insert_line`]: CoherentCache::insert_line
    ///
    /// returns: (u64, bool), the tag and whether its state is Modified or Owned
    fn check_writeback(&self, set: u64) -> (u64, bool);

    /// Installs `(tag, state)` in `set` as its most recently used line, evicting the line chosen
    /// by the replacement policy
    ///
    /// `tag` must not already be resident. This is checked in debug builds, release builds
    /// refresh the resident line in place instead
    ///
    /// returns: CacheLine, the evicted line
    fn insert_line(&mut self, set: u64, tag: u64, state: CoherenceState) -> CacheLine;

    fn num_sets(&self) -> u64;

    fn associativity(&self) -> u64;

    /// Gets the number of lines in the `Invalid` state, placeholders included. Useful for
    /// analysing cache utilisation or debugging
    fn invalid_line_count(&self) -> usize;
}

/// A set-associative cache, parameterised by a replacement policy
///
/// Each set pairs a line store, holding each slot's tag and state, with a recency index over the
/// same slots. Both are updated together on every insertion, whatever the policy, so a slot's tag
/// in the line store always matches its tag in the index
///
/// The geometry is fixed at construction. Every set starts full of invalid placeholder lines
/// tagged `0..associativity`
pub struct SetCache<R: ReplacementPolicy> {
    sets: Vec<Set>,
    recency: Vec<RecencyIndex>,
    associativity: usize,
    policy: R,
}

impl<R: ReplacementPolicy> SetCache<R> {
    /// Creates a cache of `num_lines` lines split into sets of `associativity` lines
    ///
    /// # Arguments
    ///
    /// * `num_lines`: Total number of lines, must be a multiple of `associativity`
    /// * `associativity`: Lines per set, must be at least 1
    /// * `policy`: The replacement policy, fixed for the life of the cache
    ///
    /// returns: Result<SetCache<R>, CacheError>
    pub fn new(num_lines: u64, associativity: u64, policy: R) -> Result<Self, CacheError> {
        if associativity == 0 {
            return Err(CacheError::ZeroAssociativity);
        }
        if num_lines % associativity != 0 {
            return Err(CacheError::Geometry { num_lines, associativity });
        }
        let num_sets = (num_lines / associativity) as usize;
        let ways = associativity as usize;
        debug!(num_sets, associativity, policy = policy.name(), "creating set cache");
        Ok(Self {
            sets: (0..num_sets).map(|_| Set::with_placeholders(ways)).collect(),
            recency: (0..num_sets).map(|_| RecencyIndex::with_placeholders(ways)).collect(),
            associativity: ways,
            policy,
        })
    }

    /// The lines of a set, in slot order
    pub fn lines(&self, set: u64) -> &[CacheLine] {
        self.sets[set as usize].lines()
    }

    /// The resident tags of a set, from most to least recently used
    pub fn recency_order(&self, set: u64) -> Vec<u64> {
        let lines = &self.sets[set as usize];
        self.recency[set as usize]
            .order()
            .map(|slot| lines.line(slot).tag)
            .collect()
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }
}

impl<R: ReplacementPolicy> CoherentCache for SetCache<R> {
    fn find_tag(&self, set: u64, tag: u64) -> CoherenceState {
        if self.recency[set as usize].contains(tag) {
            CoherenceState::Owned
        } else {
            CoherenceState::Invalid
        }
    }

    fn probe(&self, set: u64, tag: u64) -> Residency {
        let set = set as usize;
        match self.recency[set].slot_of(tag) {
            Some(slot) => Residency::Present(self.sets[set].line(slot).state),
            None => Residency::Absent,
        }
    }

    fn change_state(&mut self, set: u64, tag: u64, state: CoherenceState) {
        let lines = &mut self.sets[set as usize];
        if let Some(slot) = lines.position(tag) {
            lines.set_state(slot, state);
        }
    }

    fn update_lru(&mut self, set: u64, tag: u64) {
        let recency = &mut self.recency[set as usize];
        let slot = recency.slot_of(tag);
        debug_assert!(slot.is_some(), "update_lru on tag {tag:#x} which isn't resident in set {set}");
        if let Some(slot) = slot {
            recency.touch(slot);
        }
    }

    fn check_writeback(&self, set: u64) -> (u64, bool) {
        let set = set as usize;
        let line = self.sets[set].line(self.recency[set].lru_slot());
        (line.tag, line.state.needs_writeback())
    }

    fn insert_line(&mut self, set: u64, tag: u64, state: CoherenceState) -> CacheLine {
        let index = set as usize;
        let recency = &mut self.recency[index];
        let lines = &mut self.sets[index];
        let resident = recency.slot_of(tag);
        debug_assert!(resident.is_none(), "insert_line on tag {tag:#x} which is already resident in set {set}");
        if let Some(slot) = resident {
            recency.touch(slot);
            return lines.replace(slot, CacheLine::new(tag, state));
        }
        let slot = self.policy.select_victim(recency);
        let evicted = lines.replace(slot, CacheLine::new(tag, state));
        recency.retag(evicted.tag, tag, slot);
        recency.touch(slot);
        trace!(set, slot, victim = evicted.tag, victim_state = ?evicted.state, tag, "replaced line");
        evicted
    }

    fn num_sets(&self) -> u64 {
        self.sets.len() as u64
    }

    fn associativity(&self) -> u64 {
        self.associativity as u64
    }

    fn invalid_line_count(&self) -> usize {
        self.sets
            .iter()
            .flat_map(|set| set.lines())
            .filter(|line| !line.state.is_valid())
            .count()
    }
}

/// Enum for both replacement policies provided by the library
///
/// Using trait objects reduces boilerplate, but every access would go through a vtable which is
/// opaque to the compiler. Explicitly branching on the implementations lets it reason about the
/// concrete types and inline the policy
pub enum GenericSetCache {
    LeastRecentlyUsed(SetCache<LeastRecentlyUsed>),
    Random(SetCache<Random>),
}

impl From<SetCache<LeastRecentlyUsed>> for GenericSetCache {
    fn from(value: SetCache<LeastRecentlyUsed>) -> Self {
        Self::LeastRecentlyUsed(value)
    }
}

impl From<SetCache<Random>> for GenericSetCache {
    fn from(value: SetCache<Random>) -> Self {
        Self::Random(value)
    }
}

impl GenericSetCache {
    pub fn policy_name(&self) -> &'static str {
        match self {
            GenericSetCache::LeastRecentlyUsed(c) => c.policy_name(),
            GenericSetCache::Random(c) => c.policy_name(),
        }
    }

    pub fn recency_order(&self, set: u64) -> Vec<u64> {
        match self {
            GenericSetCache::LeastRecentlyUsed(c) => c.recency_order(set),
            GenericSetCache::Random(c) => c.recency_order(set),
        }
    }
}

impl CoherentCache for GenericSetCache {
    fn find_tag(&self, set: u64, tag: u64) -> CoherenceState {
        match self {
            GenericSetCache::LeastRecentlyUsed(c) => c.find_tag(set, tag),
            GenericSetCache::Random(c) => c.find_tag(set, tag),
        }
    }

    fn probe(&self, set: u64, tag: u64) -> Residency {
        match self {
            GenericSetCache::LeastRecentlyUsed(c) => c.probe(set, tag),
            GenericSetCache::Random(c) => c.probe(set, tag),
        }
    }

    fn change_state(&mut self, set: u64, tag: u64, state: CoherenceState) {
        match self {
            GenericSetCache::LeastRecentlyUsed(c) => c.change_state(set, tag, state),
            GenericSetCache::Random(c) => c.change_state(set, tag, state),
        }
    }

    fn update_lru(&mut self, set: u64, tag: u64) {
        match self {
            GenericSetCache::LeastRecentlyUsed(c) => c.update_lru(set, tag),
            GenericSetCache::Random(c) => c.update_lru(set, tag),
        }
    }

    fn check_writeback(&self, set: u64) -> (u64, bool) {
        match self {
            GenericSetCache::LeastRecentlyUsed(c) => c.check_writeback(set),
            GenericSetCache::Random(c) => c.check_writeback(set),
        }
    }

    fn insert_line(&mut self, set: u64, tag: u64, state: CoherenceState) -> CacheLine {
        match self {
            GenericSetCache::LeastRecentlyUsed(c) => c.insert_line(set, tag, state),
            GenericSetCache::Random(c) => c.insert_line(set, tag, state),
        }
    }

    fn num_sets(&self) -> u64 {
        match self {
            GenericSetCache::LeastRecentlyUsed(c) => c.num_sets(),
            GenericSetCache::Random(c) => c.num_sets(),
        }
    }

    fn associativity(&self) -> u64 {
        match self {
            GenericSetCache::LeastRecentlyUsed(c) => c.associativity(),
            GenericSetCache::Random(c) => c.associativity(),
        }
    }

    fn invalid_line_count(&self) -> usize {
        match self {
            GenericSetCache::LeastRecentlyUsed(c) => c.invalid_line_count(),
            GenericSetCache::Random(c) => c.invalid_line_count(),
        }
    }
}
