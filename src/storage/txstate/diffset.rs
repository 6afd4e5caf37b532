use std::hash::Hash;

use rustc_hash::FxHashSet;

/// Added and removed elements of one transaction against a committed base set.
///
/// Removing an element that was added in the same transaction leaves it
/// resolved as removed; an element is never reported as both.
#[derive(Debug, Clone)]
pub struct DiffSet<T: Eq + Hash> {
    added: FxHashSet<T>,
    removed: FxHashSet<T>,
    // Removed elements that were added in this transaction, absent from the base.
    transient: FxHashSet<T>,
}

impl<T: Eq + Hash> Default for DiffSet<T> {
    fn default() -> Self {
        Self {
            added: FxHashSet::default(),
            removed: FxHashSet::default(),
            transient: FxHashSet::default(),
        }
    }
}

impl<T: Copy + Eq + Hash + Ord> DiffSet<T> {
    /// Creates an empty diff.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `elem`. Returns false, leaving the set untouched, when `elem` was
    /// already removed in this transaction.
    pub fn add(&mut self, elem: T) -> bool {
        if self.removed.contains(&elem) {
            return false;
        }
        self.added.insert(elem);
        true
    }

    /// Removes `elem`, cancelling a pending add.
    pub fn remove(&mut self, elem: T) {
        if self.added.remove(&elem) {
            self.transient.insert(elem);
        }
        self.removed.insert(elem);
    }

    /// Undoes a pending removal, restoring `elem` to the state it had before:
    /// unchanged for a base element, added for one added in this transaction.
    /// Returns false when `elem` was not removed.
    pub fn cancel_removal(&mut self, elem: T) -> bool {
        if !self.removed.remove(&elem) {
            return false;
        }
        if self.transient.remove(&elem) {
            self.added.insert(elem);
        }
        true
    }

    /// Whether `elem` is added and not removed again.
    pub fn is_added(&self, elem: T) -> bool {
        self.added.contains(&elem) && !self.removed.contains(&elem)
    }

    /// Whether `elem` is removed in this transaction.
    pub fn is_removed(&self, elem: T) -> bool {
        self.removed.contains(&elem)
    }

    /// Added elements in ascending order.
    pub fn added(&self) -> Vec<T> {
        let mut out: Vec<T> = self
            .added
            .iter()
            .copied()
            .filter(|elem| !self.removed.contains(elem))
            .collect();
        out.sort_unstable();
        out
    }

    /// Removed elements in ascending order.
    pub fn removed(&self) -> Vec<T> {
        let mut out: Vec<T> = self.removed.iter().copied().collect();
        out.sort_unstable();
        out
    }

    /// Whether nothing was added or removed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Net change in element count against the base. Elements created and
    /// removed within the transaction do not count.
    pub fn delta(&self) -> isize {
        let removed_from_base = self.removed.len() - self.transient.len();
        self.added.len() as isize - removed_from_base as isize
    }

    /// Committed elements minus removals, followed by additions.
    pub fn augment<'a, I>(&'a self, committed: I) -> impl Iterator<Item = T> + 'a
    where
        T: 'a,
        I: IntoIterator<Item = T>,
        I::IntoIter: 'a,
    {
        committed
            .into_iter()
            .filter(move |elem| !self.removed.contains(elem))
            .chain(self.added())
    }
}
