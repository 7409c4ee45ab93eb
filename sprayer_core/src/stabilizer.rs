//! Temporal stabilizer over recent detection sets.
//!
//! Keeps a bounded FIFO of the last N filtered sets and reports the largest
//! one, so a leaf the detector misses for a single frame does not vanish from
//! the reading. Ties go to the most recent set. Boxes are not associated
//! across frames; only set sizes are compared.
use std::collections::VecDeque;

use sprayer_traits::Detection;

#[derive(Debug, Clone)]
pub struct TemporalStabilizer {
    history: VecDeque<Vec<Detection>>,
    capacity: usize,
}

impl TemporalStabilizer {
    /// `capacity` is clamped to at least one set.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Push this cycle's set, evict the oldest over capacity, return the stable set.
    pub fn update(&mut self, set: Vec<Detection>) -> &[Detection] {
        self.history.push_back(set);
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }
        debug_assert!(!self.history.is_empty());
        let (idx, chosen) = self
            .history
            .iter()
            .enumerate()
            .max_by_key(|(i, s)| (s.len(), *i))
            .map(|(i, s)| (i, s.len()))
            .unwrap_or((0, 0));
        tracing::trace!(window = self.history.len(), idx, chosen, "stable set selected");
        self.history.get(idx).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn history(&self) -> impl Iterator<Item = &[Detection]> {
        self.history.iter().map(Vec::as_slice)
    }
}
