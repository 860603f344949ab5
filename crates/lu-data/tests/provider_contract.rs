use std::cmp;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use lu_core::{
    ColumnDesc, ColumnExtension, ColumnId, ColumnRegistry, DataRow, EventKind, EventKinds,
    ProviderEvent, SortDescription, SortState,
};
use lu_data::{
    DataProvider, LocalDataProvider, ProviderConfig, ProviderError, RemoteDataProvider,
    RemoteService,
};

fn people() -> Vec<Value> {
    vec![
        json!({"id": "p0", "name": "Ada", "age": 36, "team": "core"}),
        json!({"id": "p1", "name": "Brendan", "age": 52, "team": "web"}),
        json!({"id": "p2", "name": "Grace", "age": 85, "team": "core"}),
        json!({"id": "p3", "name": "Linus", "age": "-", "team": "kernel"}),
        json!({"id": "p4", "name": "Barbara", "age": 28, "team": "web"}),
    ]
}

fn columns() -> Vec<ColumnDesc> {
    vec![
        ColumnDesc::string("name"),
        ColumnDesc::number("age"),
        ColumnDesc::categorical("team", &["core", "web", "kernel"]),
    ]
}

fn local() -> LocalDataProvider {
    LocalDataProvider::with_options(
        people(),
        columns(),
        ProviderConfig::default().with_identity("id"),
        ColumnRegistry::new(),
    )
}

/// Scripted backend that counts calls
#[derive(Default)]
struct Backend {
    sorts: AtomicUsize,
    views: AtomicUsize,
    fail: AtomicBool,
    /// Holds the first sort call until notified
    gate: Option<Notify>,
}

impl Backend {
    fn gated() -> Self {
        Self {
            gate: Some(Notify::new()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl RemoteService for Backend {
    async fn sort(&self, _desc: &SortDescription) -> anyhow::Result<Vec<usize>> {
        let call = self.sorts.fetch_add(1, Ordering::SeqCst);
        if let (Some(gate), 0) = (&self.gate, call) {
            gate.notified().await;
            return Ok(vec![0, 1, 2]);
        }
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("backend unavailable");
        }
        Ok(vec![2, 1, 0])
    }

    async fn view(&self, indices: &[usize]) -> anyhow::Result<Vec<Value>> {
        self.views.fetch_add(1, Ordering::SeqCst);
        Ok(indices.iter().map(|i| json!({ "row": i })).collect())
    }
}

/// Length of a text field
#[derive(Debug)]
struct TextLength;

impl ColumnExtension for TextLength {
    fn raw(&self, desc: &ColumnDesc, row: &DataRow) -> Value {
        let field = desc.column.as_deref().unwrap_or_default();
        match row.field(field) {
            Some(Value::String(s)) => json!(s.chars().count()),
            _ => Value::Null,
        }
    }

    fn compare(&self, desc: &ColumnDesc, a: &DataRow, b: &DataRow) -> cmp::Ordering {
        self.raw(desc, a).as_u64().cmp(&self.raw(desc, b).as_u64())
    }
}

fn with_lengths() -> LocalDataProvider {
    let registry = ColumnRegistry::new()
        .with_extension("length", |_: &ColumnDesc| -> Box<dyn ColumnExtension> {
            Box::new(TextLength)
        });
    LocalDataProvider::with_options(
        people(),
        columns(),
        ProviderConfig::default().with_identity("id"),
        registry,
    )
}

fn remote(backend: Arc<Backend>) -> RemoteDataProvider {
    RemoteDataProvider::new(backend, vec![ColumnDesc::number("v").with_domain(0.0, 1.0)])
}

#[tokio::test]
async fn test_local_sort_filter_view() {
    let provider = local();
    let ranking = provider.derive_default().unwrap();
    let age = ColumnId::nth(1);
    let team = ColumnId::nth(2);

    provider
        .core()
        .with_ranking_mut(&ranking, |r| {
            r.sort_by(&age, false)?;
            r.set_filter_value(&team, json!({"filter": ["core", "web"]}))
        })
        .unwrap()
        .unwrap();

    let order = provider.sort(&ranking).await.unwrap();
    assert_eq!(order, vec![2, 1, 0, 4]);

    let state = provider.core().with_ranking(&ranking, |r| r.sort_state());
    assert_eq!(state, Some(SortState::Sorted));

    let rows = provider.view(&order).await.unwrap();
    let names: Vec<&str> = rows.iter().map(|r| r.value["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Grace", "Brendan", "Ada", "Barbara"]);

    // clearing the filter brings the missing age back, last
    provider
        .core()
        .with_ranking_mut(&ranking, |r| r.set_filter_value(&team, Value::Null))
        .unwrap()
        .unwrap();
    assert_eq!(provider.sort(&ranking).await.unwrap(), vec![2, 1, 0, 4, 3]);
}

#[tokio::test]
async fn test_local_stack_ranking() {
    let provider = LocalDataProvider::new(
        vec![
            json!({"a": 0.0, "b": 10.0}),
            json!({"a": 10.0, "b": 0.0}),
            json!({"a": 6.0, "b": 6.0}),
        ],
        vec![ColumnDesc::number("a"), ColumnDesc::number("b")],
    );
    let ranking = provider.push_ranking(None).unwrap();
    let stack = provider.push(&ranking, &ColumnDesc::stack("Total")).unwrap();
    for field in ["a", "b"] {
        let desc = provider.columns().get(field).unwrap().clone();
        let child = provider.create(&desc).unwrap();
        provider
            .core()
            .with_ranking_mut(&ranking, |r| r.push_child(&stack, child, f64::NAN))
            .unwrap()
            .unwrap();
    }
    provider
        .core()
        .with_ranking_mut(&ranking, |r| {
            r.set_weights(&stack, &[0.75, 0.25])?;
            r.sort_by(&stack, false)
        })
        .unwrap()
        .unwrap();

    assert_eq!(provider.sort(&ranking).await.unwrap(), vec![1, 2, 0]);
}

#[tokio::test]
async fn test_selection_round_trip() {
    let provider = local();
    let changes = Arc::new(AtomicUsize::new(0));
    let counter = changes.clone();
    provider
        .core()
        .events()
        .on(EventKind::SelectionChanged, "test", move |_: &ProviderEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    provider.select(4);
    provider.select(1);
    provider.select(1);
    assert_eq!(provider.selection(), vec![1, 4]);
    let rows = provider.selected_rows().await.unwrap();
    assert_eq!(rows.iter().map(|r| r.index).collect::<Vec<_>>(), vec![1, 4]);

    provider.deselect(1);
    provider.deselect(4);
    assert!(provider.selection().is_empty());
    assert_eq!(changes.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_empty_selection_does_not_call_view() {
    let backend = Arc::new(Backend::default());
    let provider = remote(backend.clone());

    provider.select(2);
    provider.clear_selection();
    assert!(provider.selected_rows().await.unwrap().is_empty());
    assert_eq!(backend.views.load(Ordering::SeqCst), 0);

    provider.set_selection(&[5, 3]);
    let rows = provider.selected_rows().await.unwrap();
    assert_eq!(rows[0].index, 3);
    assert_eq!(rows[0].value, json!({"row": 3}));
    assert_eq!(backend.views.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_remote_failure_keeps_previous_order() {
    let backend = Arc::new(Backend::default());
    let provider = remote(backend.clone());
    let ranking = provider.push_ranking(None).unwrap();
    let desc = provider.columns().get("v").unwrap().clone();
    let v = provider.push(&ranking, &desc).unwrap();
    provider
        .core()
        .with_ranking_mut(&ranking, |r| r.sort_by(&v, true))
        .unwrap()
        .unwrap();

    assert_eq!(provider.sort(&ranking).await.unwrap(), vec![2, 1, 0]);

    backend.fail.store(true, Ordering::SeqCst);
    let err = provider.sort(&ranking).await.unwrap_err();
    assert!(matches!(&err, ProviderError::Remote(e) if e.to_string() == "backend unavailable"));

    let (order, state) = provider
        .core()
        .with_ranking(&ranking, |r| (r.order().to_vec(), r.sort_state()))
        .unwrap();
    assert_eq!(order, vec![2, 1, 0]);
    assert_eq!(state, SortState::Sorted);
    assert_eq!(provider.cached_order(&ranking), Some(vec![2, 1, 0]));
}

#[tokio::test]
async fn test_newer_sort_supersedes_older() {
    let backend = Arc::new(Backend::gated());
    let provider = remote(backend.clone());
    let ranking = provider.push_ranking(None).unwrap();

    let (first, second) = tokio::join!(provider.sort(&ranking), async {
        let result = provider.sort(&ranking).await;
        if let Some(gate) = &backend.gate {
            gate.notify_one();
        }
        result
    });

    assert!(first.unwrap_err().is_superseded());
    assert_eq!(second.unwrap(), vec![2, 1, 0]);
    assert_eq!(provider.cached_order(&ranking), Some(vec![2, 1, 0]));
    assert_eq!(provider.rank_of(&ranking, 2), Some(0));
    assert_eq!(backend.sorts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failed_sort_after_superseded_one_settles() {
    let backend = Arc::new(Backend::gated());
    let provider = remote(backend.clone());
    let ranking = provider.push_ranking(None).unwrap();

    let (first, second) = tokio::join!(provider.sort(&ranking), async {
        backend.fail.store(true, Ordering::SeqCst);
        let result = provider.sort(&ranking).await;
        if let Some(gate) = &backend.gate {
            gate.notify_one();
        }
        result
    });

    assert!(first.unwrap_err().is_superseded());
    assert!(matches!(second, Err(ProviderError::Remote(_))));
    let (order, state) = provider
        .core()
        .with_ranking(&ranking, |r| (r.order().to_vec(), r.sort_state()))
        .unwrap();
    assert_ne!(state, SortState::Sorting);
    assert_eq!(state, SortState::Unsorted);
    assert!(order.is_empty());
    assert_eq!(provider.cached_order(&ranking), None);
    assert_eq!(backend.sorts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_sort_of_removed_ranking() {
    let provider = local();
    let ranking = provider.push_ranking(None).unwrap();
    assert!(provider.remove_ranking(&ranking));
    assert!(matches!(
        provider.sort(&ranking).await,
        Err(ProviderError::UnknownRanking(_))
    ));
}

#[test]
fn test_dump_restore_is_stable() {
    let provider = local();
    let ranking = provider.derive_default().unwrap();
    let age = ColumnId::nth(1);
    provider
        .core()
        .with_ranking_mut(&ranking, |r| {
            r.set_filter_value(&age, json!({"min": 30.0}))?;
            r.set_label(&age, "Age (years)")?;
            r.sort_by(&age, true)
        })
        .unwrap()
        .unwrap();
    let stack = provider.push(&ranking, &ColumnDesc::stack("Mixed")).unwrap();
    let child = provider.create(&ColumnDesc::number("age").with_domain(0.0, 100.0)).unwrap();
    provider
        .core()
        .with_ranking_mut(&ranking, |r| r.push_child(&stack, child, f64::NAN))
        .unwrap()
        .unwrap();

    let dump = provider.dump();
    let json = serde_json::to_string(&dump).unwrap();
    let parsed = serde_json::from_str(&json).unwrap();

    let restored = local();
    restored.restore(&parsed);
    assert_eq!(restored.dump(), dump);
    assert_eq!(restored.find_by_id(&stack), Some(ranking));

    // ids continue after the restored counter
    let next = restored.create(&ColumnDesc::string("name")).unwrap();
    assert_eq!(next.id(), &ColumnId::nth(dump.uid));
}

#[test]
fn test_unknown_type_and_ranking() {
    let provider = local();
    let ranking = provider.derive_default().unwrap();
    let events = Arc::new(AtomicUsize::new(0));
    let counter = events.clone();
    provider
        .core()
        .events()
        .on(EventKinds::ALL, "test", move |_: &ProviderEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    let uid = provider.core().uid();
    assert!(provider.create(&ColumnDesc::new("doesNotExist", "?")).is_none());
    assert!(provider.push(&ranking, &ColumnDesc::new("doesNotExist", "?")).is_none());
    assert_eq!(provider.core().uid(), uid);

    assert!(!provider.remove_ranking(&lu_core::RankingId::nth(9)));
    assert_eq!(provider.rankings(), vec![ranking]);
    assert_eq!(events.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_extension_column_sorts_and_dumps() {
    let provider = with_lengths();
    let ranking = provider.push_ranking(None).unwrap();
    let length = provider
        .push(&ranking, &ColumnDesc::for_field("length", "name"))
        .unwrap();
    provider
        .core()
        .with_ranking_mut(&ranking, |r| r.sort_by(&length, true))
        .unwrap()
        .unwrap();
    assert_eq!(provider.sort(&ranking).await.unwrap(), vec![0, 2, 3, 1, 4]);

    let dump = provider.dump();
    let restored = with_lengths();
    restored.restore(&dump);
    assert_eq!(restored.dump(), dump);
    assert_eq!(restored.find_by_id(&length), Some(ranking.clone()));
    assert_eq!(restored.sort(&ranking).await.unwrap(), vec![0, 2, 3, 1, 4]);

    // without the extension the column is dropped
    let plain = local();
    plain.restore(&dump);
    assert_eq!(plain.find_by_id(&length), None);
    assert_eq!(plain.rankings(), vec![ranking]);
}

#[test]
fn test_box_plot_over_multi_valued_cells() {
    let provider = LocalDataProvider::new(
        vec![
            json!({"v": [1, 3]}),
            json!({"v": [5]}),
            json!({"v": [10, 2]}),
            json!({"v": []}),
        ],
        vec![ColumnDesc::number("v")],
    );
    let ranking = provider.derive_default().unwrap();
    let v = ColumnId::nth(0);
    let rows = provider.rows();
    let group: Vec<DataRow> = rows.iter().enumerate().map(|(i, r)| DataRow::new(i, r)).collect();

    let (raw, normalized) = provider
        .core()
        .with_ranking(&ranking, |r| {
            let raw = r.group_box_plot(&v, &group, true).unwrap();
            let normalized = r.group_box_plot(&v, &group, false).unwrap();
            (
                (raw.len(), raw.min(), raw.median(), raw.max()),
                (normalized.min(), normalized.max()),
            )
        })
        .unwrap();
    assert_eq!(raw, (5, 1.0, 3.0, 10.0));
    assert_eq!(normalized, (0.0, 1.0));
}

#[tokio::test]
async fn test_json_round_trip_without_domains() {
    let provider = local();
    let ranking = provider.derive_default().unwrap();
    let age = ColumnId::nth(1);
    let extra = provider.push(&ranking, &ColumnDesc::number("age")).unwrap();
    provider
        .core()
        .with_ranking_mut(&ranking, |r| r.sort_by(&extra, false))
        .unwrap()
        .unwrap();
    let order = provider.sort(&ranking).await.unwrap();

    let dump = provider.dump();
    let json = serde_json::to_value(&dump).unwrap();
    let children = &json["rankings"][0]["children"];
    assert_eq!(children[1]["desc"], json!("age"));
    assert_eq!(children[3]["desc"], json!("age"));
    assert!(children[3].get("map").is_none());

    let restored = local();
    restored.restore(&serde_json::from_value(json).unwrap());
    assert_eq!(restored.dump(), dump);
    assert_eq!(restored.sort(&ranking).await.unwrap(), order);

    let domain = restored
        .core()
        .with_ranking(&ranking, |r| r.column(&age).map(|c| c.desc().domain))
        .flatten();
    assert_eq!(domain, Some(Some([28.0, 85.0])));
}
