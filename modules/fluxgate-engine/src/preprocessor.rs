//! The preprocessing loop.

use std::sync::Arc;

use anyhow::Result;

use fluxgate_events::{EvalContext, EventCloner, RoutedEvent, Value};

use crate::diagnostics::{DiagnosticSink, EngineError, TracingDiagnostics};
use crate::entry::{sort_entries, RouteEntry};

/// Applies a priority-sorted rule set to one event at a time.
///
/// Constructed once per compiled rule set and shared across callers: the
/// entry order is fixed at construction and all per-call state lives inside
/// [`process`](Self::process), so concurrent calls on one instance are
/// safe.
pub struct Preprocessor<E: RoutedEvent, C: EventCloner<E>> {
    entries: Vec<RouteEntry<E>>,
    cloner: C,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl<E: RoutedEvent, C: EventCloner<E>> Preprocessor<E, C> {
    pub fn new(cloner: C, mut entries: Vec<RouteEntry<E>>) -> Self {
        sort_entries(&mut entries);
        Self {
            entries,
            cloner,
            diagnostics: Arc::new(TracingDiagnostics),
        }
    }

    /// Replace the tracing-backed diagnostics with an injected sink.
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Run every applicable rule against `event`.
    ///
    /// Returns the input `Arc` untouched when no rule applies, a mutated
    /// copy when any rule applies, or `None` when the event is suppressed
    /// (a drop rule matched, or the event could not be copied). Guard and
    /// assignment evaluation errors propagate unmodified; the caller's
    /// event is never mutated.
    ///
    /// Copy-on-write: at most one working clone is made per call, on the
    /// first rule that applies. Change sinks see one `(after, before)`
    /// snapshot pair per applied rule with an active sink, each delivered
    /// with a one-step lag: when the next applying rule begins, or at call
    /// end for the last one. A matching drop rule discards pending
    /// mutations and notifications alike.
    pub fn process(&self, event: Arc<E>, ctx: &EvalContext) -> Result<Option<Arc<E>>> {
        if self.entries.is_empty() {
            return Ok(Some(event));
        }

        // Per-call state. `working` is the mutable clone, made lazily;
        // `baseline` is the notification snapshot, `None` meaning "the
        // untouched input"; `last_applied` drives the one-step-lag flush.
        let mut working: Option<E> = None;
        let mut baseline: Option<E> = None;
        let mut last_applied: Option<usize> = None;

        for (i, entry) in self.entries.iter().enumerate() {
            if let Some(guard) = &entry.guard {
                let current: &E = working.as_ref().unwrap_or(&event);
                let verdict = guard.evaluate(&[current], ctx)?;
                if verdict.as_bool() != Some(true) {
                    continue;
                }
            }

            if entry.is_drop {
                return Ok(None);
            }

            // Flush the previous applied entry's notification before this
            // entry mutates the event.
            if let Some(prev_idx) = last_applied {
                let prev = &self.entries[prev_idx];
                if prev.wants_notification() {
                    let Some(snapshot) = self.snapshot(working.as_ref().unwrap_or(&event))
                    else {
                        return Ok(None);
                    };
                    prev.notify(&snapshot, baseline.as_ref().unwrap_or(&event));
                    baseline = Some(snapshot);
                } else if entry.wants_notification() {
                    // No delivery owed, but this entry's own notification
                    // will need an accurate pre-mutation baseline.
                    let Some(snapshot) = self.snapshot(working.as_ref().unwrap_or(&event))
                    else {
                        return Ok(None);
                    };
                    baseline = Some(snapshot);
                }
            }

            // Copy-on-write: clone once, on the first entry that applies.
            if working.is_none() {
                match self.snapshot(&event) {
                    Some(copy) => working = Some(copy),
                    None => return Ok(None),
                }
            }
            if let Some(target) = working.as_mut() {
                self.apply(entry, target, ctx)?;
            }
            last_applied = Some(i);
        }

        if let Some(last_idx) = last_applied {
            let last = &self.entries[last_idx];
            if last.wants_notification() {
                let after: &E = working.as_ref().unwrap_or(&event);
                last.notify(after, baseline.as_ref().unwrap_or(&event));
            }
        }

        Ok(Some(match working {
            Some(mutated) => Arc::new(mutated),
            None => event,
        }))
    }

    /// Clone for mutation or notification. A failed clone is a per-event
    /// condition, reported once and answered with suppression.
    fn snapshot(&self, event: &E) -> Option<E> {
        let copy = self.cloner.clone_event(event);
        if copy.is_none() {
            self.diagnostics.clone_failed(event.type_name());
        }
        copy
    }

    fn apply(&self, entry: &RouteEntry<E>, target: &mut E, ctx: &EvalContext) -> Result<()> {
        let values = match &entry.lock {
            Some(lock) => {
                // Exclusion covers evaluation and coercion only; the write
                // below touches the call-local clone and needs no lock. The
                // guard releases on every exit path, including an
                // evaluation error.
                let _guard = lock.write().map_err(|_| EngineError::PoisonedLock)?;
                Self::obtain_values(entry, target, ctx)?
            }
            None => Self::obtain_values(entry, target, ctx)?,
        };
        if let Some(writer) = &entry.writer {
            writer.write(values, target);
        }
        Ok(())
    }

    fn obtain_values(entry: &RouteEntry<E>, current: &E, ctx: &EvalContext) -> Result<Vec<Value>> {
        let scope = [current];
        let mut values = Vec::with_capacity(entry.assignments.len());
        for assignment in &entry.assignments {
            let mut value = assignment.expression.evaluate(&scope, ctx)?;
            if !value.is_null() {
                if let Some(coercer) = &assignment.coercer {
                    value = coercer.widen(value);
                }
            }
            values.push(value);
        }
        Ok(values)
    }
}
