//! Smoothing of per-frame predictions over a short window.

use std::collections::{HashMap, VecDeque};

use crate::types::Label;

pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Keeps the most recent predictions and reports the one seen most often.
///
/// When several labels share the highest count, the label whose latest
/// occurrence is newest wins.
#[derive(Clone, Debug)]
pub struct StabilityFilter {
    history: VecDeque<Label>,
    capacity: usize,
}

impl StabilityFilter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn observe(&mut self, label: Label) -> Label {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(label.clone());

        let mut counts: HashMap<&Label, usize> = HashMap::with_capacity(self.history.len());
        for entry in &self.history {
            *counts.entry(entry).or_insert(0) += 1;
        }

        // max_by_key keeps the last of equal maxima, which is the newest entry.
        self.history
            .iter()
            .max_by_key(|entry| counts[entry])
            .cloned()
            .unwrap_or(label)
    }

    /// Predictions in arrival order, oldest first.
    #[cfg(test)]
    pub fn history(&self) -> impl Iterator<Item = &Label> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for StabilityFilter {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
