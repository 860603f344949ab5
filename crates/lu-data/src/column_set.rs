//! Known column descriptors of a provider
//!
//! Providers built over a known set of descriptors reference them in dumps
//! and sort descriptions by their column key instead of embedding them.

use std::sync::Arc;

use lu_core::{ColumnDesc, DescRef};

/// The descriptors a provider was constructed with
#[derive(Debug, Clone, Default)]
pub struct ColumnSet {
    descs: Vec<Arc<ColumnDesc>>,
}

impl ColumnSet {
    pub fn new(descs: impl IntoIterator<Item = ColumnDesc>) -> Self {
        Self {
            descs: descs.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn descs(&self) -> &[Arc<ColumnDesc>] {
        &self.descs
    }

    pub fn len(&self) -> usize {
        self.descs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descs.is_empty()
    }

    /// Descriptor reading the given row field
    pub fn get(&self, column: &str) -> Option<&Arc<ColumnDesc>> {
        self.descs
            .iter()
            .find(|d| d.column.as_deref() == Some(column))
    }

    /// Short reference for known descriptors, the full descriptor otherwise
    pub fn to_desc_ref(&self, desc: &ColumnDesc) -> DescRef {
        match desc.column.as_deref() {
            Some(column) if self.get(column).is_some_and(|known| **known == *desc) => {
                DescRef::Key(column.to_string())
            }
            _ => DescRef::Inline(Box::new(desc.clone())),
        }
    }

    /// Resolve a reference, `None` for unknown keys
    pub fn from_desc_ref(&self, desc: &DescRef) -> Option<Arc<ColumnDesc>> {
        match desc {
            DescRef::Key(column) => self.get(column).cloned(),
            DescRef::Inline(desc) => Some(Arc::new((**desc).clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_descs_use_keys() {
        let set = ColumnSet::new([ColumnDesc::number("score"), ColumnDesc::string("name")]);
        let key = set.to_desc_ref(&ColumnDesc::number("score"));
        assert_eq!(key, DescRef::Key("score".to_string()));
        assert_eq!(set.from_desc_ref(&key).unwrap().kind, "number");

        let stack = set.to_desc_ref(&ColumnDesc::stack("Sum"));
        assert!(matches!(stack, DescRef::Inline(_)));

        // same field, different descriptor
        let changed = set.to_desc_ref(&ColumnDesc::number("score").with_domain(0.0, 1.0));
        assert!(matches!(changed, DescRef::Inline(_)));

        assert!(set.from_desc_ref(&DescRef::Key("missing".to_string())).is_none());
    }
}
