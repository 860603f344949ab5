//! Synchronous change notification
//!
//! Every mutable entity owns an [`Emitter`]. Listeners subscribe to an
//! explicit set of event kinds under a scope name; re-subscribing with the same
//! scope replaces the previous listener and [`Emitter::off`] removes every
//! listener of a scope. Events are delivered in the same call that caused them.

use parking_lot::Mutex;

use crate::column::ColumnId;
use crate::ranking::RankingId;

/// Kinds of change events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ValueChanged,
    WidthChanged,
    FilterChanged,
    LabelChanged,
    VisibilityChanged,
    MappingChanged,
    WeightsChanged,
    LinkChanged,
    SortCriteriaChanged,
    Dirty,
    DirtyHeader,
    DirtyValues,
    AddColumn,
    RemoveColumn,
    AddRanking,
    RemoveRanking,
    SelectionChanged,
}

impl EventKind {
    fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

/// A set of event kinds covered by one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventKinds(u32);

impl EventKinds {
    pub const ALL: EventKinds = EventKinds(u32::MAX);

    pub fn of(kinds: &[EventKind]) -> Self {
        Self(kinds.iter().fold(0, |acc, k| acc | k.bit()))
    }

    pub fn contains(self, kind: EventKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn with(self, kind: EventKind) -> Self {
        Self(self.0 | kind.bit())
    }
}

impl From<EventKind> for EventKinds {
    fn from(kind: EventKind) -> Self {
        Self(kind.bit())
    }
}

/// Event trait that all events must implement
pub trait Event: Send + Sync + 'static {
    fn kind(&self) -> EventKind;
}

/// A change inside one ranking's column tree
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnEvent {
    pub kind: EventKind,
    pub ranking: RankingId,
    /// Column the event fired on; for add/remove this is the parent
    pub column: ColumnId,
    /// The added or removed column
    pub subject: Option<ColumnId>,
}

impl Event for ColumnEvent {
    fn kind(&self) -> EventKind {
        self.kind
    }
}

/// Provider-level events
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    AddRanking(RankingId),
    RemoveRanking(RankingId),
    AddColumn {
        ranking: RankingId,
        parent: ColumnId,
        column: ColumnId,
    },
    RemoveColumn {
        ranking: RankingId,
        parent: ColumnId,
        column: ColumnId,
    },
    Dirty,
    SelectionChanged,
}

impl Event for ProviderEvent {
    fn kind(&self) -> EventKind {
        match self {
            ProviderEvent::AddRanking(_) => EventKind::AddRanking,
            ProviderEvent::RemoveRanking(_) => EventKind::RemoveRanking,
            ProviderEvent::AddColumn { .. } => EventKind::AddColumn,
            ProviderEvent::RemoveColumn { .. } => EventKind::RemoveColumn,
            ProviderEvent::Dirty => EventKind::Dirty,
            ProviderEvent::SelectionChanged => EventKind::SelectionChanged,
        }
    }
}

type Handler<E> = Box<dyn FnMut(&E) + Send>;

struct Listener<E> {
    scope: String,
    kinds: EventKinds,
    handler: Handler<E>,
}

/// Multi-listener synchronous dispatcher
///
/// Handlers run while the emitter's listener list is locked and must not
/// subscribe to or fire on the same emitter.
pub struct Emitter<E> {
    listeners: Mutex<Vec<Listener<E>>>,
}

impl<E: Event> Emitter<E> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe `handler` to `kinds` under `scope`, replacing an earlier
    /// listener of the same scope
    pub fn on<F>(&self, kinds: impl Into<EventKinds>, scope: &str, handler: F)
    where
        F: FnMut(&E) + Send + 'static,
    {
        let mut listeners = self.listeners.lock();
        listeners.retain(|l| l.scope != scope);
        listeners.push(Listener {
            scope: scope.to_string(),
            kinds: kinds.into(),
            handler: Box::new(handler),
        });
    }

    /// Remove every listener registered under `scope`
    pub fn off(&self, scope: &str) {
        self.listeners.lock().retain(|l| l.scope != scope);
    }

    /// Deliver an event to every listener covering its kind
    pub fn fire(&self, event: &E) {
        let kind = event.kind();
        let mut listeners = self.listeners.lock();
        for listener in listeners.iter_mut() {
            if listener.kinds.contains(kind) {
                (listener.handler)(event);
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl<E: Event> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn event(kind: EventKind) -> ColumnEvent {
        ColumnEvent {
            kind,
            ranking: RankingId::new("rank0"),
            column: ColumnId::new("col0"),
            subject: None,
        }
    }

    #[test]
    fn test_group_subscription() {
        let emitter = Emitter::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        emitter.on(
            EventKinds::of(&[EventKind::WidthChanged, EventKind::Dirty]),
            "test",
            move |e: &ColumnEvent| sink.lock().push(e.kind),
        );

        emitter.fire(&event(EventKind::WidthChanged));
        emitter.fire(&event(EventKind::FilterChanged));
        emitter.fire(&event(EventKind::Dirty));

        assert_eq!(*seen.lock(), vec![EventKind::WidthChanged, EventKind::Dirty]);
    }

    #[test]
    fn test_scope_replace_and_off() {
        let emitter = Emitter::new();
        let count = Arc::new(Mutex::new(0));
        for _ in 0..2 {
            let c = count.clone();
            emitter.on(EventKind::Dirty, "ui", move |_: &ColumnEvent| *c.lock() += 1);
        }
        assert_eq!(emitter.listener_count(), 1);

        emitter.fire(&event(EventKind::Dirty));
        assert_eq!(*count.lock(), 1);

        emitter.off("ui");
        emitter.fire(&event(EventKind::Dirty));
        assert_eq!(*count.lock(), 1);
    }
}
