//! Serializable snapshots of providers, rankings and column trees
//!
//! Dumps only carry what differs from the descriptor a column was created
//! from. Descriptors themselves are referenced through [`DescRef`], whose form
//! is chosen by the provider writing the dump.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::column::composite::normalize;
use crate::column::{Column, ColumnId, ColumnKind, ColumnTree};
use crate::desc::{ColumnDesc, DescRef, MappingDesc};
use crate::mapping::MappingFunction;
use crate::ranking::RankingId;
use crate::registry::ColumnRegistry;
use crate::stats::SortMethod;

/// Snapshot of a whole provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDump {
    /// Id counter at the time of the dump
    pub uid: usize,
    pub rankings: Vec<RankingDump>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingDump {
    pub id: RankingId,
    /// State of the rank column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<ColumnDump>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort_criteria: Vec<SortCriterionDump>,
    pub children: Vec<ColumnDump>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortCriterionDump {
    pub column: ColumnId,
    pub asc: bool,
}

/// Snapshot of one column and its descendants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDump {
    pub id: ColumnId,
    pub desc: DescRef,
    pub width: f32,
    /// Only present when renamed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    /// Only present when it differs from the descriptor's mapping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<MappingDesc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ColumnDump>,
    /// Stack weights, parallel to `children`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weights: Vec<f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub collapsed: bool,
    /// Only present when it differs from the descriptor's link pattern
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_method: Option<SortMethod>,
    /// State of extension columns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl Column {
    /// Snapshot of this column without its children
    pub fn dump_own(&self, to_ref: &dyn Fn(&ColumnDesc) -> DescRef) -> ColumnDump {
        let desc = self.desc();
        let mut dump = ColumnDump {
            id: self.id().clone(),
            desc: to_ref(desc),
            width: self.width(),
            label: (self.label() != desc.label).then(|| self.label().to_string()),
            color: match self.color() {
                Some(color) if Some(color) != desc.color.as_deref() => Some(color.to_string()),
                _ => None,
            },
            hidden: !self.is_visible(),
            map: None,
            filter: None,
            children: Vec::new(),
            weights: Vec::new(),
            collapsed: false,
            link: None,
            sort_method: None,
            extra: None,
        };
        if let (Some(mapping), Some(original)) = (self.mapping(), self.original_mapping()) {
            if mapping != original {
                dump.map = Some(mapping.to_desc());
            }
        }
        if self.is_filtered() {
            dump.filter = self.filter().map(|f| f.to_value());
        }
        if let Some(method) = self.sort_method() {
            if method != desc.sort.unwrap_or_default() {
                dump.sort_method = Some(method);
            }
        }
        match self.kind() {
            ColumnKind::Stack(stack) => {
                dump.weights = stack.weights().to_vec();
                dump.collapsed = stack.is_collapsed();
            }
            ColumnKind::Link(link) if link.link_pattern() != desc.link.as_deref() => {
                dump.link = Some(link.link().to_string());
            }
            ColumnKind::Extension(ext) => dump.extra = ext.dump(),
            _ => {}
        }
        dump
    }

    /// Apply the non-structural state of a dump
    ///
    /// Invalid filters are skipped with a warning.
    pub(crate) fn restore_state(&mut self, dump: &ColumnDump, registry: &ColumnRegistry) {
        self.set_width(dump.width);
        if let Some(label) = &dump.label {
            self.set_label(label.clone());
        }
        if dump.color.is_some() {
            self.set_color(dump.color.clone());
        }
        self.set_visible(!dump.hidden);
        if let Some(map) = &dump.map {
            let fallback = self.mapping().map(MappingFunction::domain);
            let mapping =
                MappingFunction::from_mapping_desc(map, fallback, &|code| registry.script(code));
            let _ = self.set_mapping(mapping);
        }
        if let Some(method) = dump.sort_method {
            let _ = self.set_sort_method(method);
        }
        if let Some(value) = &dump.filter {
            let result = self
                .parse_filter(value.clone())
                .and_then(|filter| self.set_filter(Some(filter)));
            if let Err(e) = result {
                tracing::warn!(column = %self.id(), error = %e, "skipping filter while restoring");
            }
        }
        match self.kind_mut() {
            ColumnKind::Stack(stack) => stack.set_collapsed(dump.collapsed),
            ColumnKind::Link(link) => {
                if let Some(pattern) = &dump.link {
                    link.set_link(Some(pattern.clone()).filter(|p| !p.is_empty()));
                }
            }
            ColumnKind::Extension(ext) => {
                if let Some(extra) = &dump.extra {
                    ext.restore(extra);
                }
            }
            _ => {}
        }
    }
}

impl ColumnTree {
    /// Rebuild a detached tree from a dump
    ///
    /// `resolve` turns descriptor references into descriptors and `mint`
    /// chooses the id of each rebuilt column from its dumped id. Columns whose
    /// descriptor cannot be resolved or whose type is unknown are skipped
    /// together with their subtree; a stack drops the weights of skipped
    /// children.
    pub fn restore(
        dump: &ColumnDump,
        resolve: &dyn Fn(&DescRef) -> Option<Arc<ColumnDesc>>,
        registry: &ColumnRegistry,
        mint: &mut dyn FnMut(&ColumnId) -> ColumnId,
    ) -> Option<ColumnTree> {
        let Some(desc) = resolve(&dump.desc) else {
            tracing::warn!(column = %dump.id, "skipping column with unresolved descriptor");
            return None;
        };
        let tag = desc.kind.clone();
        let Some(mut column) = registry.instantiate(mint(&dump.id), desc) else {
            tracing::warn!(column = %dump.id, kind = %tag, "skipping column of unknown type");
            return None;
        };
        column.restore_state(dump, registry);

        let mut children = Vec::new();
        let mut weights = Vec::new();
        for (i, child) in dump.children.iter().enumerate() {
            if let Some(mut tree) = ColumnTree::restore(child, resolve, registry, mint) {
                tree.column.set_parent(Some(column.id().clone()));
                weights.push(dump.weights.get(i).copied().unwrap_or(f64::NAN));
                children.push(tree);
            }
        }
        if let Some(ids) = column.kind_mut().children_mut() {
            *ids = children.iter().map(|c| c.id().clone()).collect();
        }
        if let ColumnKind::Stack(stack) = column.kind_mut() {
            let weights = if weights.iter().all(|w| w.is_finite()) {
                weights
            } else {
                vec![1.0; children.len()]
            };
            stack.restore_weights(normalize(&weights));
        }
        Some(ColumnTree { column, children })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inline(desc: &ColumnDesc) -> DescRef {
        DescRef::Inline(Box::new(desc.clone()))
    }

    fn resolve(desc: &DescRef) -> Option<Arc<ColumnDesc>> {
        match desc {
            DescRef::Inline(desc) => Some(Arc::new((**desc).clone())),
            DescRef::Key(_) => None,
        }
    }

    #[test]
    fn test_dump_only_differences() {
        let registry = ColumnRegistry::new();
        let desc = Arc::new(ColumnDesc::number("v").with_domain(0.0, 10.0));
        let mut col = registry.instantiate(ColumnId::nth(3), desc).unwrap();

        let dump = col.dump_own(&inline);
        assert_eq!(dump.label, None);
        assert_eq!(dump.map, None);
        assert_eq!(dump.filter, None);

        col.set_label("Value".to_string());
        col.set_mapping(MappingFunction::linear(0.0, 20.0)).unwrap();
        let dump = col.dump_own(&inline);
        assert_eq!(dump.label.as_deref(), Some("Value"));
        assert_eq!(dump.map.unwrap().domain, Some([0.0, 20.0]));
    }

    #[test]
    fn test_unknown_domain_dumps_stably() {
        let registry = ColumnRegistry::new();
        let col = registry
            .instantiate(ColumnId::nth(0), Arc::new(ColumnDesc::number("v")))
            .unwrap();

        let first = col.dump_own(&inline);
        assert_eq!(first.map, None);
        assert_eq!(first, col.dump_own(&inline));

        let mut keep = |id: &ColumnId| id.clone();
        let tree = ColumnTree::restore(&first, &resolve, &registry, &mut keep).unwrap();
        assert_eq!(tree.column.dump_own(&inline), first);
    }

    #[test]
    fn test_restore_skips_unknown_children() {
        let registry = ColumnRegistry::new();
        let dump: ColumnDump = serde_json::from_value(json!({
            "id": "col0",
            "desc": {"type": "stack", "label": "Sum"},
            "width": 150.0,
            "weights": [0.2, 0.3, 0.5],
            "children": [
                {"id": "col1", "desc": {"type": "number", "column": "a", "domain": [0, 1]}, "width": 50.0},
                {"id": "col2", "desc": {"type": "doesNotExist"}, "width": 50.0},
                {"id": "col3", "desc": {"type": "number", "column": "b", "domain": [0, 1]}, "width": 50.0,
                 "filter": {"min": 0.5}}
            ]
        }))
        .unwrap();

        let mut keep = |id: &ColumnId| id.clone();
        let tree = ColumnTree::restore(&dump, &resolve, &registry, &mut keep).unwrap();
        assert_eq!(tree.ids(), vec![ColumnId::new("col0"), ColumnId::new("col1"), ColumnId::new("col3")]);
        assert_eq!(tree.children[1].column.parent(), Some(&ColumnId::new("col0")));
        assert!(tree.children[1].column.is_filtered());

        let ColumnKind::Stack(stack) = tree.column.kind() else {
            panic!("expected a stack");
        };
        assert!((stack.weights()[0] - 0.2 / 0.7).abs() < 1e-12);
        assert!((stack.weights()[1] - 0.5 / 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_restore_with_fresh_ids() {
        let registry = ColumnRegistry::new();
        let desc = Arc::new(ColumnDesc::string("s"));
        let col = registry.instantiate(ColumnId::nth(0), desc).unwrap();
        let dump = col.dump_own(&inline);

        let mut next = 10;
        let mut fresh = |_: &ColumnId| {
            next += 1;
            ColumnId::nth(next)
        };
        let tree = ColumnTree::restore(&dump, &resolve, &registry, &mut fresh).unwrap();
        assert_eq!(tree.id().as_str(), "col11");
    }
}
