//! Provider-wide row selection

use indexmap::IndexSet;

/// Set of selected row keys in selection order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    keys: IndexSet<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Returns whether the key was newly selected
    pub fn insert(&mut self, key: String) -> bool {
        self.keys.insert(key)
    }

    /// Returns whether anything was added
    pub fn extend(&mut self, keys: impl IntoIterator<Item = String>) -> bool {
        let before = self.keys.len();
        self.keys.extend(keys);
        self.keys.len() != before
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.keys.shift_remove(key)
    }

    /// Replace the selection; returns whether it changed
    pub fn replace(&mut self, keys: impl IntoIterator<Item = String>) -> bool {
        let next: IndexSet<String> = keys.into_iter().collect();
        let changed = next.len() != self.keys.len() || next.iter().any(|k| !self.keys.contains(k));
        self.keys = next;
        changed
    }

    pub fn clear(&mut self) -> bool {
        let changed = !self.keys.is_empty();
        self.keys.clear();
        changed
    }
}
