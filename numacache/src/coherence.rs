/// MOESI coherence state of a cache line
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CoherenceState {
    /// Dirty, exclusively held
    Modified,
    /// Holds the authoritative copy, which may also be shared
    Owned,
    /// Clean, exclusively held
    Exclusive,
    /// Clean, possibly shared
    Shared,
    /// Unused slot, or data that is no longer valid
    Invalid,
}

impl CoherenceState {
    /// Whether evicting a line in this state owes a writeback
    pub fn needs_writeback(self) -> bool {
        matches!(self, CoherenceState::Modified | CoherenceState::Owned)
    }

    pub fn is_valid(self) -> bool {
        self != CoherenceState::Invalid
    }
}

/// A single resident line: the tag identifying the block within its set, and its state
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CacheLine {
    pub tag: u64,
    pub state: CoherenceState,
}

impl CacheLine {
    pub fn new(tag: u64, state: CoherenceState) -> Self {
        Self { tag, state }
    }
}

/// Result of probing a set for a tag
///
/// Unlike [`find_tag`](crate::cache::CoherentCache::find_tag), this keeps "not resident" and
/// "resident but invalid" apart
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Residency {
    Absent,
    Present(CoherenceState),
}

impl Residency {
    /// The state of the line if it is resident and holds valid data
    pub fn valid_state(self) -> Option<CoherenceState> {
        match self {
            Residency::Present(state) if state.is_valid() => Some(state),
            _ => None,
        }
    }
}
