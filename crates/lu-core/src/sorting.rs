//! Backend-agnostic sort descriptions
//!
//! A remote backend never sees column instances. A ranking serializes its
//! sort criteria and active filters into a [`SortDescription`] that refers to
//! columns through their descriptors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::desc::{DescRef, MappingDesc};
use crate::ranking::RankingId;
use crate::stats::SortMethod;

/// Everything a backend needs to order one ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortDescription {
    pub ranking: RankingId,
    /// Primary criterion first
    pub criteria: Vec<SortTerm>,
    /// Filters of every filtered column in the ranking
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterTerm>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortTerm {
    pub column: SortColumn,
    pub asc: bool,
}

/// A sort key, composites expanded into their children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SortColumn {
    #[serde(rename_all = "camelCase")]
    Column {
        desc: DescRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        map: Option<MappingDesc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sort_method: Option<SortMethod>,
    },
    /// Weighted sum of the children's normalized values
    Stack { children: Vec<WeightedSortColumn> },
    /// Lexicographic over the children
    Composite { children: Vec<SortColumn> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedSortColumn {
    pub column: SortColumn,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterTerm {
    pub desc: DescRef,
    pub filter: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sort_description_json() {
        let description = SortDescription {
            ranking: RankingId::nth(0),
            criteria: vec![SortTerm {
                column: SortColumn::Stack {
                    children: vec![WeightedSortColumn {
                        column: SortColumn::Column {
                            desc: DescRef::Key("score".to_string()),
                            map: None,
                            sort_method: Some(SortMethod::Max),
                        },
                        weight: 1.0,
                    }],
                },
                asc: false,
            }],
            filters: Vec::new(),
        };

        let value = serde_json::to_value(&description).unwrap();
        assert_eq!(
            value,
            json!({
                "ranking": "rank0",
                "criteria": [{
                    "column": {
                        "type": "stack",
                        "children": [{
                            "column": {"type": "column", "desc": "score", "sortMethod": "max"},
                            "weight": 1.0
                        }]
                    },
                    "asc": false
                }]
            })
        );
        let back: SortDescription = serde_json::from_value(value).unwrap();
        assert_eq!(back, description);
    }
}
