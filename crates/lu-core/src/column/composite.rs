//! Composite columns
//!
//! Composites only hold the ids of their children; the children themselves
//! live in the ranking arena, which also evaluates the combined values.

use crate::column::ColumnId;

/// Weighted combination of numeric children
#[derive(Debug, Clone, Default)]
pub struct StackColumn {
    pub(crate) children: Vec<ColumnId>,
    /// Parallel to `children`, always summing to 1 when non-empty
    weights: Vec<f64>,
    collapsed: bool,
}

impl StackColumn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Weight of the child at `index`
    pub fn weight(&self, index: usize) -> f64 {
        self.weights.get(index).copied().unwrap_or(0.0)
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    pub(crate) fn set_collapsed(&mut self, collapsed: bool) {
        self.collapsed = collapsed;
    }

    /// Insert a child at `index` taking `share` of the total weight
    ///
    /// A non-finite share gives the new child an equal share. The weights of
    /// the existing children are scaled down to make room.
    pub(crate) fn insert_child(&mut self, index: usize, id: ColumnId, share: f64) {
        let index = index.min(self.children.len());
        let share = if share.is_finite() {
            share.clamp(0.0, 1.0)
        } else {
            1.0 / (self.children.len() + 1) as f64
        };
        for w in &mut self.weights {
            *w *= 1.0 - share;
        }
        self.children.insert(index, id);
        self.weights.insert(index, share);
        self.weights = normalize(&self.weights);
    }

    /// Remove a child, renormalizing the remaining weights
    pub(crate) fn remove_child(&mut self, id: &ColumnId) -> bool {
        let Some(index) = self.children.iter().position(|c| c == id) else {
            return false;
        };
        self.children.remove(index);
        self.weights.remove(index);
        self.weights = normalize(&self.weights);
        true
    }

    pub(crate) fn restore_weights(&mut self, weights: Vec<f64>) {
        self.weights = weights;
    }

    /// Replace all weights; they are normalized to sum 1
    pub(crate) fn set_weights(&mut self, weights: &[f64]) -> bool {
        let normalized = normalize(weights);
        if normalized == self.weights {
            return false;
        }
        self.weights = normalized;
        true
    }
}

/// Normalize non-negative weights to sum 1; all-zero input gets equal shares
pub fn normalize(weights: &[f64]) -> Vec<f64> {
    let clean: Vec<f64> = weights
        .iter()
        .map(|w| if w.is_finite() { w.max(0.0) } else { 0.0 })
        .collect();
    let sum: f64 = clean.iter().sum();
    if sum <= 0.0 {
        let n = clean.len() as f64;
        return clean.iter().map(|_| 1.0 / n).collect();
    }
    clean.iter().map(|w| w / sum).collect()
}

/// Ordered children without a combined value; compares lexicographically
#[derive(Debug, Clone, Default)]
pub struct CompositeColumn {
    pub(crate) children: Vec<ColumnId>,
}

impl CompositeColumn {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(&[1.0, 3.0]), vec![0.25, 0.75]);
        assert_eq!(normalize(&[0.0, 0.0]), vec![0.5, 0.5]);
        assert_eq!(normalize(&[-1.0, 2.0]), vec![0.0, 1.0]);
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn test_stack_children() {
        let mut stack = StackColumn::new();
        stack.insert_child(0, ColumnId::new("a"), f64::NAN);
        stack.insert_child(1, ColumnId::new("b"), f64::NAN);
        assert_eq!(stack.weights(), &[0.5, 0.5]);

        stack.insert_child(0, ColumnId::new("c"), 0.5);
        assert_eq!(stack.weights(), &[0.5, 0.25, 0.25]);
        assert!(stack.remove_child(&ColumnId::new("c")));

        assert!(stack.set_weights(&[3.0, 1.0]));
        assert!(!stack.set_weights(&[0.75, 0.25]));

        assert!(stack.remove_child(&ColumnId::new("a")));
        assert!(!stack.remove_child(&ColumnId::new("a")));
        assert_eq!(stack.weights(), &[1.0]);
    }
}
