use std::collections::BTreeSet;

/// A set with separately staged additions and removals.
///
/// The visible set changes immediately so reads see their own writes. The
/// staged sets record what a commit must write and delete. Staging is
/// last-operation-wins: adding an item cancels a staged removal of it and
/// removing cancels a staged addition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeltaSet<T: Ord + Clone> {
    items: BTreeSet<T>,
    added: BTreeSet<T>,
    removed: BTreeSet<T>,
}

impl<T: Ord + Clone> Default for DeltaSet<T> {
    fn default() -> Self {
        Self {
            items: BTreeSet::new(),
            added: BTreeSet::new(),
            removed: BTreeSet::new(),
        }
    }
}

impl<T: Ord + Clone> DeltaSet<T> {
    /// Replace the visible set with committed state and drop all deltas.
    pub fn load(&mut self, items: impl IntoIterator<Item = T>) {
        self.items = items.into_iter().collect();
        self.added.clear();
        self.removed.clear();
    }

    pub fn insert(&mut self, item: T) {
        self.removed.remove(&item);
        self.items.insert(item.clone());
        self.added.insert(item);
    }

    pub fn remove(&mut self, item: &T) {
        self.items.remove(item);
        self.added.remove(item);
        self.removed.insert(item.clone());
    }

    /// Stage removal of every visible item.
    pub fn clear(&mut self) {
        let items = std::mem::take(&mut self.items);
        for item in items {
            self.added.remove(&item);
            self.removed.insert(item);
        }
    }

    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    pub fn items(&self) -> &BTreeSet<T> {
        &self.items
    }

    pub fn added(&self) -> &BTreeSet<T> {
        &self.added
    }

    pub fn removed(&self) -> &BTreeSet<T> {
        &self.removed
    }

    pub fn modified(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }

    /// Forget staged deltas, keeping the visible set as committed state.
    pub fn settle(&mut self) {
        self.added.clear();
        self.removed.clear();
    }
}
