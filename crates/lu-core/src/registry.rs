//! Column type registry
//!
//! Maps descriptor type tags to column constructors. The registry is built
//! once when a provider is constructed and is read-only afterwards.

use std::sync::Arc;

use ahash::AHashMap;

use crate::column::{
    BoxPlotColumn, CategoricalColumn, Column, ColumnExtensionFactory, ColumnId, ColumnKind,
    CompositeColumn, LinkColumn, NumberColumn, StackColumn, StringColumn, DEFAULT_WIDTH,
};
use crate::desc::ColumnDesc;
use crate::mapping::ScriptFn;

/// The built-in column kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinKind {
    Number,
    BoxPlot,
    Categorical,
    String,
    Link,
    Stack,
    Composite,
}

impl BuiltinKind {
    pub const ALL: [BuiltinKind; 7] = [
        BuiltinKind::Number,
        BuiltinKind::BoxPlot,
        BuiltinKind::Categorical,
        BuiltinKind::String,
        BuiltinKind::Link,
        BuiltinKind::Stack,
        BuiltinKind::Composite,
    ];

    /// Descriptor type tag
    pub fn tag(self) -> &'static str {
        match self {
            BuiltinKind::Number => "number",
            BuiltinKind::BoxPlot => "boxplot",
            BuiltinKind::Categorical => "categorical",
            BuiltinKind::String => "string",
            BuiltinKind::Link => "link",
            BuiltinKind::Stack => "stack",
            BuiltinKind::Composite => "composite",
        }
    }
}

/// How a registered type tag is instantiated
#[derive(Clone)]
pub enum ColumnFactory {
    Builtin(BuiltinKind),
    Extension(Arc<dyn ColumnExtensionFactory>),
}

impl std::fmt::Debug for ColumnFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnFactory::Builtin(kind) => f.debug_tuple("Builtin").field(kind).finish(),
            ColumnFactory::Extension(_) => f.write_str("Extension"),
        }
    }
}

/// Registry of column constructors and scripted mapping evaluators
pub struct ColumnRegistry {
    factories: AHashMap<String, ColumnFactory>,
    scripts: AHashMap<String, ScriptFn>,
    default_width: f32,
}

impl ColumnRegistry {
    /// A registry knowing the built-in kinds
    pub fn new() -> Self {
        let factories = BuiltinKind::ALL
            .iter()
            .map(|kind| (kind.tag().to_string(), ColumnFactory::Builtin(*kind)))
            .collect();
        Self {
            factories,
            scripts: AHashMap::new(),
            default_width: DEFAULT_WIDTH,
        }
    }

    /// Register an extension type under `tag`, replacing any earlier entry
    pub fn with_extension(
        mut self,
        tag: impl Into<String>,
        factory: impl ColumnExtensionFactory + 'static,
    ) -> Self {
        self.factories
            .insert(tag.into(), ColumnFactory::Extension(Arc::new(factory)));
        self
    }

    /// Register the evaluator of a scripted mapping, keyed by its source
    pub fn with_script(mut self, code: impl Into<String>, script: ScriptFn) -> Self {
        self.scripts.insert(code.into(), script);
        self
    }

    pub fn with_default_width(mut self, width: f32) -> Self {
        self.default_width = width;
        self
    }

    pub fn default_width(&self) -> f32 {
        self.default_width
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    pub fn factory(&self, tag: &str) -> Option<&ColumnFactory> {
        self.factories.get(tag)
    }

    pub fn script(&self, code: &str) -> Option<ScriptFn> {
        self.scripts.get(code).cloned()
    }

    /// Registered type tags, sorted
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Create a detached column, `None` for unregistered type tags
    pub fn instantiate(&self, id: ColumnId, desc: Arc<ColumnDesc>) -> Option<Column> {
        let scripts = |code: &str| self.script(code);
        let kind = match self.factories.get(&desc.kind)? {
            ColumnFactory::Builtin(builtin) => match builtin {
                BuiltinKind::Number => ColumnKind::Number(NumberColumn::from_desc(&desc, &scripts)),
                BuiltinKind::BoxPlot => {
                    ColumnKind::BoxPlot(BoxPlotColumn::from_desc(&desc, &scripts))
                }
                BuiltinKind::Categorical => {
                    ColumnKind::Categorical(CategoricalColumn::from_desc(&desc))
                }
                BuiltinKind::String => ColumnKind::String(StringColumn::from_desc(&desc)),
                BuiltinKind::Link => ColumnKind::Link(LinkColumn::from_desc(&desc)),
                BuiltinKind::Stack => ColumnKind::Stack(StackColumn::new()),
                BuiltinKind::Composite => ColumnKind::Composite(CompositeColumn::new()),
            },
            ColumnFactory::Extension(factory) => ColumnKind::Extension(factory.create(&desc)),
        };
        Some(Column::new(id, desc, kind, self.default_width))
    }
}

impl Default for ColumnRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ColumnRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnRegistry")
            .field("tags", &self.tags())
            .field("scripts", &self.scripts.len())
            .field("default_width", &self.default_width)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingFunction;
    use crate::desc::MappingDesc;

    #[test]
    fn test_builtin_tags() {
        let registry = ColumnRegistry::new();
        for kind in BuiltinKind::ALL {
            assert!(registry.contains(kind.tag()));
        }
        assert!(registry.factory("doesNotExist").is_none());
    }

    #[test]
    fn test_instantiate() {
        let registry = ColumnRegistry::new().with_default_width(80.0);
        let col = registry
            .instantiate(ColumnId::nth(1), Arc::new(ColumnDesc::number("v")))
            .unwrap();
        assert_eq!(col.id().as_str(), "col1");
        assert_eq!(col.width(), 80.0);
        assert!(matches!(col.kind(), ColumnKind::Number(_)));

        let unknown = ColumnDesc::new("doesNotExist", "x");
        assert!(registry.instantiate(ColumnId::nth(2), Arc::new(unknown)).is_none());
    }

    #[test]
    fn test_scripted_mapping_lookup() {
        let double: ScriptFn = Arc::new(|v, ctx| ctx.normalized(v) / 2.0);
        let registry = ColumnRegistry::new().with_script("half", double);

        let desc = ColumnDesc::number("v").with_map(MappingDesc {
            kind: "script".to_string(),
            domain: Some([0.0, 10.0]),
            range: None,
            code: Some("half".to_string()),
        });
        let col = registry.instantiate(ColumnId::nth(0), Arc::new(desc)).unwrap();
        let ColumnKind::Number(number) = col.kind() else {
            panic!("expected a number column");
        };
        assert!(matches!(number.mapping(), MappingFunction::Script { evaluator: Some(_), .. }));
        assert_eq!(number.mapping().apply(10.0), 0.5);
    }
}
