//! Collaborator seams consumed by the preprocessing engine.
//!
//! Each trait is one narrow contract: expression evaluation, value
//! coercion, event cloning, field write-back, and change notification.
//! All of them are synchronous; the engine runs to completion on the
//! caller's thread.

use anyhow::Result;

use crate::types::{EvalContext, RoutedEvent, Value};

/// A compiled expression: a guard predicate or an assignment value source.
///
/// `scope` holds the events visible to the expression; the preprocessor
/// always passes exactly one, the current working event. Guard results are
/// interpreted as boolean, with `Null` and `false` both meaning "not
/// satisfied". Evaluation errors propagate unmodified to the `process`
/// caller.
pub trait ValueExpression<E: RoutedEvent>: Send + Sync {
    fn evaluate(&self, scope: &[&E], ctx: &EvalContext) -> Result<Value>;
}

/// Closures work as expressions; tests and simple rules use this directly.
impl<E, F> ValueExpression<E> for F
where
    E: RoutedEvent,
    F: Fn(&[&E], &EvalContext) -> Result<Value> + Send + Sync,
{
    fn evaluate(&self, scope: &[&E], ctx: &EvalContext) -> Result<Value> {
        self(scope, ctx)
    }
}

/// Narrows or widens a computed value to the target field's type.
///
/// Only ever invoked on non-null values.
pub trait ValueCoercer: Send + Sync {
    fn widen(&self, value: Value) -> Value;
}

impl<F> ValueCoercer for F
where
    F: Fn(Value) -> Value + Send + Sync,
{
    fn widen(&self, value: Value) -> Value {
        self(value)
    }
}

/// Produces an independent logical copy of an event.
///
/// `None` signals that the event could not be copied; the engine treats
/// that as a per-event suppression, not a fatal error.
pub trait EventCloner<E: RoutedEvent>: Send + Sync {
    fn clone_event(&self, event: &E) -> Option<E>;
}

/// Writes a vector of computed values into an event's mutable fields.
///
/// Positional: `values[i]` goes to the writer's i-th target field. Assumed
/// to never fail for well-typed input.
pub trait FieldWriter<E: RoutedEvent>: Send + Sync {
    fn write(&self, values: Vec<Value>, target: &mut E);
}

/// Receives before/after snapshot pairs as rules mutate an event.
///
/// `wants_notification` is consulted at every delivery point: a sink can
/// be attached but dormant, and may become active between calls. Both
/// methods are called synchronously, in entry order, on the processing
/// thread.
pub trait ChangeSink<E: RoutedEvent>: Send + Sync {
    fn wants_notification(&self) -> bool;

    fn notify(&self, after: &E, before: &E);
}
