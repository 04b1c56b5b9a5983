use std::collections::HashMap;

const NIL: usize = usize::MAX;

/// Recency ordering for one set, from most recently used to least recently used
///
/// The ordering is an intrusive doubly linked list over the set's slot numbers, so moving a slot
/// to the front or reading the back is O(1). A reverse map from tag to slot lets callers find a
/// tag's position without touching the line store
///
/// The index always holds exactly one entry per slot, and the tags in the reverse map are always
/// the tags resident in the matching [`Set`](crate::set::Set)
#[derive(Debug, Clone)]
pub struct RecencyIndex {
    positions: HashMap<u64, usize>,
    prev: Vec<usize>,
    next: Vec<usize>,
    // Most recently used
    head: usize,
    // Least recently used
    tail: usize,
}

impl RecencyIndex {
    /// Creates the index for a freshly constructed set, where slot `i` holds tag `i`
    ///
    /// The placeholders are ordered as though they were inserted in tag order, so the highest tag
    /// is the most recently used and tag 0 is the first to go
    pub fn with_placeholders(associativity: usize) -> Self {
        let mut index = Self {
            positions: HashMap::with_capacity(associativity),
            prev: vec![NIL; associativity],
            next: vec![NIL; associativity],
            head: NIL,
            tail: NIL,
        };
        for slot in 0..associativity {
            index.positions.insert(slot as u64, slot);
            index.push_front(slot);
        }
        index
    }

    pub fn contains(&self, tag: u64) -> bool {
        self.positions.contains_key(&tag)
    }

    /// The slot holding `tag`, if it is resident
    pub fn slot_of(&self, tag: u64) -> Option<usize> {
        self.positions.get(&tag).copied()
    }

    /// The least recently used slot
    pub fn lru_slot(&self) -> usize {
        self.tail
    }

    /// Number of slots in the set
    pub fn len(&self) -> usize {
        self.prev.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prev.is_empty()
    }

    /// Makes `slot` the most recently used
    pub fn touch(&mut self, slot: usize) {
        if self.head == slot {
            return;
        }
        self.detach(slot);
        self.push_front(slot);
    }

    /// Records that `slot` now holds `new_tag` instead of `old_tag`
    pub fn retag(&mut self, old_tag: u64, new_tag: u64, slot: usize) {
        debug_assert_eq!(self.positions.get(&old_tag), Some(&slot));
        self.positions.remove(&old_tag);
        self.positions.insert(new_tag, slot);
    }

    /// Iterates over the slots from most to least recently used
    pub fn order(&self) -> impl Iterator<Item = usize> + '_ {
        let mut current = self.head;
        std::iter::from_fn(move || {
            if current == NIL {
                return None;
            }
            let slot = current;
            current = self.next[slot];
            Some(slot)
        })
    }

    fn detach(&mut self, slot: usize) {
        let (prev, next) = (self.prev[slot], self.next[slot]);
        if prev == NIL {
            self.head = next;
        } else {
            self.next[prev] = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.prev[next] = prev;
        }
        self.prev[slot] = NIL;
        self.next[slot] = NIL;
    }

    fn push_front(&mut self, slot: usize) {
        self.prev[slot] = NIL;
        self.next[slot] = self.head;
        if self.head == NIL {
            self.tail = slot;
        } else {
            self.prev[self.head] = slot;
        }
        self.head = slot;
    }
}
