use std::cmp::Ordering;
use std::collections::HashSet;
use std::hash::Hash;

/// How a `MergedView` collapses and orders records from several sources.
pub trait MergePolicy {
    type Item: Clone;
    type Key: Eq + Hash;

    /// De-duplication key; the first occurrence in slot order wins.
    fn key(&self, item: &Self::Item) -> Self::Key;

    /// Display order of the merged sequence.
    fn compare(&self, a: &Self::Item, b: &Self::Item) -> Ordering;
}

/// Keeps the latest snapshot of each of N sources and the merged result.
///
/// Every update recomputes the whole view from the current snapshots, so the
/// result depends only on those snapshots and never on arrival order.
pub struct MergedView<P: MergePolicy> {
    policy: P,
    slots: Vec<Vec<P::Item>>,
    merged: Vec<P::Item>,
}

impl<P: MergePolicy> MergedView<P> {
    pub fn new(policy: P, sources: usize) -> Self {
        Self {
            policy,
            slots: vec![Vec::new(); sources],
            merged: Vec::new(),
        }
    }

    /// Replace the snapshot of `slot` and return the recomputed view.
    pub fn update(&mut self, slot: usize, items: Vec<P::Item>) -> &[P::Item] {
        match self.slots.get_mut(slot) {
            Some(current) => {
                *current = items;
                self.recompute();
            }
            None => log::warn!("Ignoring update for unknown merge slot {slot}"),
        }
        &self.merged
    }

    /// A source failed: its last snapshot is kept as is.
    pub fn fail(&mut self, slot: usize) -> &[P::Item] {
        log::debug!(
            "Merge slot {slot} failed; keeping {} stale item(s)",
            self.slots.get(slot).map_or(0, Vec::len)
        );
        &self.merged
    }

    pub fn view(&self) -> &[P::Item] {
        &self.merged
    }

    pub fn slot(&self, slot: usize) -> &[P::Item] {
        self.slots.get(slot).map(Vec::as_slice).unwrap_or_default()
    }

    fn recompute(&mut self) {
        let mut seen = HashSet::new();
        let mut merged: Vec<P::Item> = self
            .slots
            .iter()
            .flatten()
            .filter(|item| seen.insert(self.policy.key(item)))
            .cloned()
            .collect();
        merged.sort_by(|a, b| self.policy.compare(a, b));
        self.merged = merged;
    }
}
