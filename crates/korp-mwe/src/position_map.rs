use bitvec::prelude::*;

use korp_types::Candidate;

type BitSet = BitVec<usize, Lsb0>;

/// Per-sentence map from original word position to its resolved value.
///
/// Slots are indexed by position and never reindexed: a position absorbed into
/// a preceding multi-word unit is tombstoned in the presence set rather than
/// spliced out, so back-references stay valid throughout resolution. Output
/// iteration walks positions in ascending order, skipping tombstones.
#[derive(Debug, Clone)]
pub struct PositionMap {
    slots: Vec<Option<Candidate>>,
    present: BitSet,
}

impl PositionMap {
    /// A map with every position present and unresolved.
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![None; len],
            present: bitvec![usize, Lsb0; 1; len],
        }
    }

    /// Number of original positions, tombstoned ones included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether the position still survives (has not been contracted away).
    pub fn is_present(&self, pos: usize) -> bool {
        self.present.get(pos).map(|b| *b).unwrap_or(false)
    }

    /// Whether the position survives but has no value yet.
    pub fn is_unresolved(&self, pos: usize) -> bool {
        self.is_present(pos) && self.slots[pos].is_none()
    }

    /// The resolved value at a surviving position, if any.
    pub fn value(&self, pos: usize) -> Option<&Candidate> {
        if self.is_present(pos) {
            self.slots[pos].as_ref()
        } else {
            None
        }
    }

    pub fn set(&mut self, pos: usize, value: Candidate) {
        self.slots[pos] = Some(value);
    }

    /// Tombstone a position: it is absorbed into an earlier unit and will not
    /// appear in the output.
    pub fn remove(&mut self, pos: usize) {
        self.present.set(pos, false);
        self.slots[pos] = None;
    }

    /// Lowest surviving position without a value.
    pub fn first_unresolved(&self) -> Option<usize> {
        (0..self.len()).find(|&pos| self.is_unresolved(pos))
    }

    pub fn has_unresolved(&self) -> bool {
        self.first_unresolved().is_some()
    }

    /// Assign `values` to the first unresolved positions in ascending order.
    pub fn fill_prefix(&mut self, values: Vec<Candidate>) {
        let mut queue = values.into_iter();
        let mut next = queue.next();
        for pos in 0..self.len() {
            if next.is_none() {
                break;
            }
            if self.is_unresolved(pos) {
                self.slots[pos] = next.take();
                next = queue.next();
            }
        }
    }

    /// Record one resolved multi-word unit: the anchor value lands at the
    /// first unresolved position, and the unresolved positions at the given
    /// offsets (counted over unresolved slots, anchor = offset 0) are deleted.
    pub fn commit_unit(&mut self, anchor: Candidate, member_offsets: &[usize]) {
        let mut offsets = member_offsets.iter().copied().peekable();
        let mut seen_unresolved = 0usize;
        let mut anchor = Some(anchor);
        for pos in 0..self.len() {
            if offsets.peek().is_none() {
                break;
            }
            if !self.is_unresolved(pos) {
                continue;
            }
            if seen_unresolved == 0 {
                self.slots[pos] = anchor.take();
                offsets.next();
            } else if offsets.peek() == Some(&seen_unresolved) {
                self.remove(pos);
                offsets.next();
            }
            seen_unresolved += 1;
        }
    }

    /// View of the map with unresolved slots filled from `combination` in
    /// position order. `None` marks tombstoned positions. Used by the
    /// reference validator; the map itself is untouched.
    pub fn filled_with<'a>(&'a self, combination: &'a [Candidate]) -> Vec<Option<&'a Candidate>> {
        let mut queue = combination.iter();
        (0..self.len())
            .map(|pos| {
                if !self.is_present(pos) {
                    None
                } else {
                    match self.slots[pos].as_ref() {
                        Some(value) => Some(value),
                        None => queue.next(),
                    }
                }
            })
            .collect()
    }

    /// Final output: surviving values in ascending position order, trailing
    /// `:REF` suffixes stripped. An unresolved slot (reachable only through
    /// the give-up fallback) emits the empty string.
    pub fn into_output(self) -> Vec<String> {
        (0..self.len())
            .filter(|&pos| self.is_present(pos))
            .map(|pos| {
                self.slots[pos]
                    .as_ref()
                    .map(|c| c.without_ref().to_string())
                    .unwrap_or_default()
            })
            .collect()
    }
}
