//! Route entries: one conditional update rule each, plus their ordering.

use std::sync::{Arc, RwLock};

use fluxgate_events::{ChangeSink, FieldWriter, RoutedEvent, ValueCoercer, ValueExpression};

/// Mutual exclusion around a rule's value evaluation, shared with whatever
/// other engine state those expressions read. Not owned by the
/// preprocessor; the RAII write guard guarantees release on every exit
/// path.
pub type ExclusiveLock = Arc<RwLock<()>>;

/// One computed value destined for a field, with its optional type
/// coercion.
pub(crate) struct Assignment<E: RoutedEvent> {
    pub(crate) expression: Box<dyn ValueExpression<E>>,
    pub(crate) coercer: Option<Box<dyn ValueCoercer>>,
}

/// One update rule: priority, optional guard, drop flag, ordered
/// assignments, writer, optional evaluation lock, optional change sink.
///
/// Immutable after construction; the engine never mutates an entry while
/// processing. Drop-vs-mutate, guarded-vs-unguarded, and locked-vs-unlocked
/// are all data on this one record, so the engine branches instead of
/// dispatching through a type hierarchy.
pub struct RouteEntry<E: RoutedEvent> {
    pub(crate) priority: i32,
    pub(crate) is_drop: bool,
    pub(crate) guard: Option<Box<dyn ValueExpression<E>>>,
    pub(crate) assignments: Vec<Assignment<E>>,
    pub(crate) writer: Option<Box<dyn FieldWriter<E>>>,
    pub(crate) lock: Option<ExclusiveLock>,
    pub(crate) sink: Option<Arc<dyn ChangeSink<E>>>,
}

impl<E: RoutedEvent> RouteEntry<E> {
    /// An update rule that writes computed values through `writer`.
    pub fn update(priority: i32, writer: impl FieldWriter<E> + 'static) -> Self {
        Self {
            priority,
            is_drop: false,
            guard: None,
            assignments: Vec::new(),
            writer: Some(Box::new(writer)),
            lock: None,
            sink: None,
        }
    }

    /// A rule that suppresses the event entirely when its guard matches.
    pub fn drop_rule(priority: i32) -> Self {
        Self {
            priority,
            is_drop: true,
            guard: None,
            assignments: Vec::new(),
            writer: None,
            lock: None,
            sink: None,
        }
    }

    /// Gate this rule on a predicate. Absent guard means "always applies".
    pub fn with_guard(mut self, guard: impl ValueExpression<E> + 'static) -> Self {
        self.guard = Some(Box::new(guard));
        self
    }

    /// Append an assignment, evaluated after those already added.
    pub fn with_assignment(mut self, expression: impl ValueExpression<E> + 'static) -> Self {
        self.assignments.push(Assignment {
            expression: Box::new(expression),
            coercer: None,
        });
        self
    }

    /// Append an assignment whose non-null results pass through `coercer`.
    pub fn with_coerced_assignment(
        mut self,
        expression: impl ValueExpression<E> + 'static,
        coercer: impl ValueCoercer + 'static,
    ) -> Self {
        self.assignments.push(Assignment {
            expression: Box::new(expression),
            coercer: Some(Box::new(coercer)),
        });
        self
    }

    /// Require `lock` around value evaluation, for rules whose expressions
    /// read shared mutable state outside the current event.
    pub fn with_exclusive_lock(mut self, lock: ExclusiveLock) -> Self {
        self.lock = Some(lock);
        self
    }

    /// Attach a change sink receiving before/after snapshots.
    pub fn with_sink(mut self, sink: Arc<dyn ChangeSink<E>>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn is_drop(&self) -> bool {
        self.is_drop
    }

    /// Whether the attached sink, if any, currently wants snapshots.
    /// Checked at every delivery point; a sink may be attached but dormant.
    pub(crate) fn wants_notification(&self) -> bool {
        self.sink.as_ref().is_some_and(|s| s.wants_notification())
    }

    pub(crate) fn notify(&self, after: &E, before: &E) {
        if let Some(sink) = &self.sink {
            sink.notify(after, before);
        }
    }
}

/// Sorts entries ascending by priority; at equal priority, drop entries go
/// before non-drop entries.
///
/// The sort is stable, so equal-priority non-drop entries keep their
/// insertion order. The relative order of multiple drop entries at one
/// priority is unspecified: the contract this reproduces never resolved a
/// drop-vs-drop tie, and callers must not rely on one.
pub(crate) fn sort_entries<E: RoutedEvent>(entries: &mut [RouteEntry<E>]) {
    entries.sort_by_key(|e| (e.priority, !e.is_drop));
}
