use crate::coherence::{CacheLine, CoherenceState};

/// The line store for one set: exactly `associativity` slots, each holding a tag and its state
///
/// Slots are never added or removed, a replacement overwrites the slot in place. Lookups by tag
/// scan the slots, which is fine as associativity is small and fixed
#[derive(Debug, Clone)]
pub struct Set {
    lines: Box<[CacheLine]>,
}

impl Set {
    /// Creates a set whose slot `i` holds an invalid placeholder tagged `i`
    pub fn with_placeholders(associativity: usize) -> Self {
        Self {
            lines: (0..associativity as u64)
                .map(|tag| CacheLine::new(tag, CoherenceState::Invalid))
                .collect(),
        }
    }

    /// Finds the slot holding `tag`, if any
    pub fn position(&self, tag: u64) -> Option<usize> {
        self.lines.iter().position(|line| line.tag == tag)
    }

    pub fn line(&self, slot: usize) -> CacheLine {
        self.lines[slot]
    }

    pub fn set_state(&mut self, slot: usize, state: CoherenceState) {
        self.lines[slot].state = state;
    }

    /// Overwrites a slot, returning the line it held
    pub fn replace(&mut self, slot: usize, line: CacheLine) -> CacheLine {
        std::mem::replace(&mut self.lines[slot], line)
    }

    pub fn lines(&self) -> &[CacheLine] {
        &self.lines
    }
}
