//! JSON ranking configuration
//!
//! ```json
//! {
//!   "columns": ["name", {"type": "stack", "label": "Score",
//!                        "children": ["math", "physics"], "weights": [0.7, 0.3]}],
//!   "sort": [{"column": "Score", "asc": false}],
//!   "filters": [{"column": "team", "filter": {"filter": ["red"]}}]
//! }
//! ```
//!
//! Columns are either a field name of the loaded data or an inline
//! descriptor. Sort and filter entries name a column by field or label.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use lu_core::{
    ColumnDesc, ColumnId, ColumnKind, ColumnTree, Ranking, RankingId, SortCriterion,
};
use lu_data::{DataProvider, LocalDataProvider};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub columns: Vec<ColumnEntry>,
    pub sort: Vec<SortEntry>,
    pub filters: Vec<FilterEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ColumnEntry {
    Field(String),
    Inline(InlineColumn),
}

#[derive(Debug, Clone, Deserialize)]
pub struct InlineColumn {
    #[serde(flatten)]
    pub desc: ColumnDesc,
    #[serde(default)]
    pub children: Vec<ColumnEntry>,
    /// Stack shares, parallel to `children`
    #[serde(default)]
    pub weights: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SortEntry {
    pub column: String,
    #[serde(default)]
    pub asc: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterEntry {
    pub column: String,
    pub filter: Value,
}

impl RankingConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading ranking configuration {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing ranking configuration {}", path.display()))
    }

    /// Create a ranking on `provider` as configured
    ///
    /// Without columns every known descriptor becomes a column. Columns of
    /// unknown type are skipped with a warning.
    pub fn apply(&self, provider: &LocalDataProvider) -> Result<RankingId> {
        if self.columns.is_empty() {
            let ranking = provider.derive_default()?;
            self.apply_criteria(provider, &ranking)?;
            return Ok(ranking);
        }

        let ranking = provider.push_ranking(None)?;
        for entry in &self.columns {
            let Some(tree) = build(provider, entry)? else {
                continue;
            };
            provider.core().with_ranking_mut(&ranking, |r| r.push(tree));
        }
        self.apply_criteria(provider, &ranking)?;
        Ok(ranking)
    }

    fn apply_criteria(&self, provider: &LocalDataProvider, ranking: &RankingId) -> Result<()> {
        let criteria = self
            .sort
            .iter()
            .map(|s| Ok(SortCriterion::new(lookup(provider, ranking, &s.column)?, s.asc)))
            .collect::<Result<Vec<_>>>()?;
        let filters = self
            .filters
            .iter()
            .map(|f| Ok((lookup(provider, ranking, &f.column)?, f.filter.clone())))
            .collect::<Result<Vec<_>>>()?;

        provider
            .core()
            .with_ranking_mut(ranking, |r| {
                for (id, filter) in filters {
                    r.set_filter_value(&id, filter)?;
                }
                r.set_sort_criteria(criteria)
            })
            .context("ranking vanished")??;
        Ok(())
    }
}

/// Detached column tree for an entry, `None` when its type is unknown
fn build(provider: &LocalDataProvider, entry: &ColumnEntry) -> Result<Option<ColumnTree>> {
    let (desc, children, weights) = match entry {
        ColumnEntry::Field(field) => match provider.columns().get(field) {
            Some(desc) => ((**desc).clone(), &[][..], &[][..]),
            None => bail!("no column {field:?} in the data"),
        },
        ColumnEntry::Inline(inline) => {
            let mut desc = inline.desc.clone();
            if desc.label.is_empty() {
                desc.label = desc.column.clone().unwrap_or_else(|| desc.kind.clone());
            }
            (desc, &inline.children[..], &inline.weights[..])
        }
    };

    let Some(mut tree) = provider.create(&desc) else {
        warn!(kind = %desc.kind, label = %desc.label, "skipping column of unknown type");
        return Ok(None);
    };
    if children.is_empty() {
        return Ok(Some(tree));
    }
    if !tree.column.is_composite() {
        bail!("column {:?} of type {} cannot have children", desc.label, desc.kind);
    }

    // assemble in a scratch ranking so weights and parents are handled there
    let scratch = RankingId::new("scratch");
    let mut ranking = Ranking::new(scratch);
    let parent = ranking.push(tree);
    let mut kept = Vec::new();
    for (i, child) in children.iter().enumerate() {
        if let Some(child) = build(provider, child)? {
            ranking.push_child(&parent, child, f64::NAN)?;
            kept.push(weights.get(i).copied().unwrap_or(f64::NAN));
        }
    }
    let is_stack = matches!(
        ranking.column(&parent).map(|c| c.kind()),
        Some(ColumnKind::Stack(_))
    );
    if is_stack && !weights.is_empty() {
        ranking.set_weights(&parent, &kept)?;
    }
    tree = ranking
        .remove(&parent)
        .context("composite column lost while assembling")?;
    Ok(Some(tree))
}

/// Column of a ranking by field name or label
fn lookup(provider: &LocalDataProvider, ranking: &RankingId, name: &str) -> Result<ColumnId> {
    provider
        .core()
        .with_ranking(ranking, |r| {
            r.find(|c| c.desc().column.as_deref() == Some(name))
                .or_else(|| r.find(|c| c.label() == name))
                .map(|c| c.id().clone())
        })
        .flatten()
        .with_context(|| format!("no column named {name:?} in the ranking"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> LocalDataProvider {
        LocalDataProvider::new(
            vec![
                json!({"name": "a", "math": 2, "physics": 9, "team": "red"}),
                json!({"name": "b", "math": 8, "physics": 1, "team": "blue"}),
                json!({"name": "c", "math": 5, "physics": 5, "team": "red"}),
            ],
            vec![
                ColumnDesc::string("name"),
                ColumnDesc::number("math"),
                ColumnDesc::number("physics"),
                ColumnDesc::categorical("team", &["red", "blue"]),
            ],
        )
    }

    #[test]
    fn test_stack_config() {
        let config: RankingConfig = serde_json::from_value(json!({
            "columns": ["name", {"type": "stack", "label": "Score",
                                 "children": ["math", "physics"], "weights": [3, 1]},
                        "team", {"type": "doesNotExist"}],
            "sort": [{"column": "Score"}],
            "filters": [{"column": "team", "filter": {"filter": ["red"]}}]
        }))
        .unwrap();

        let provider = provider();
        let ranking = config.apply(&provider).unwrap();
        provider
            .core()
            .with_ranking(&ranking, |r| {
                assert_eq!(r.children().len(), 3);
                let stack = r.column(&r.children()[1]).unwrap();
                let ColumnKind::Stack(stack) = stack.kind() else {
                    panic!("expected a stack");
                };
                assert_eq!(stack.weights(), &[0.75, 0.25]);
                assert!(!r.sort_criteria()[0].asc);
                assert!(r.is_filtered());
            })
            .unwrap();
    }

    #[test]
    fn test_unknown_sort_column() {
        let config: RankingConfig =
            serde_json::from_value(json!({"sort": [{"column": "nope"}]})).unwrap();
        assert!(config.apply(&provider()).is_err());
    }
}
