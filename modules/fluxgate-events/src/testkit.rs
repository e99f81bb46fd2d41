//! Instrumented collaborator doubles for testing. No infrastructure
//! required; shipped in the library so downstream crates can assert on
//! engine behavior the same way.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::traits::{ChangeSink, EventCloner};
use crate::types::RoutedEvent;

/// Wraps any cloner, counting clones and optionally failing after a
/// configured number of successes. Cheap to clone; all clones share state,
/// so tests can keep a handle for assertions after handing one to the
/// engine.
#[derive(Debug)]
pub struct CountingCloner<C> {
    inner: C,
    clones: Arc<AtomicUsize>,
    fail_after: Option<usize>,
}

impl<C: Clone> Clone for CountingCloner<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            clones: Arc::clone(&self.clones),
            fail_after: self.fail_after,
        }
    }
}

impl<C> CountingCloner<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            clones: Arc::new(AtomicUsize::new(0)),
            fail_after: None,
        }
    }

    /// Succeed for the first `n` clones, then report failure.
    /// `fail_after(0)` fails every clone.
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Clones attempted so far (successful or not).
    pub fn clone_count(&self) -> usize {
        self.clones.load(Ordering::SeqCst)
    }
}

impl<E: RoutedEvent, C: EventCloner<E>> EventCloner<E> for CountingCloner<C> {
    fn clone_event(&self, event: &E) -> Option<E> {
        let n = self.clones.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.fail_after {
            if n >= limit {
                return None;
            }
        }
        self.inner.clone_event(event)
    }
}

/// Change sink that records every `(after, before)` snapshot pair.
/// Thread-safe; the active flag can be flipped mid-test to model a sink
/// that is attached but has no subscribers.
pub struct RecordingSink<E> {
    active: AtomicBool,
    pairs: Mutex<Vec<(E, E)>>,
}

impl<E> RecordingSink<E> {
    pub fn new() -> Self {
        Self {
            active: AtomicBool::new(true),
            pairs: Mutex::new(Vec::new()),
        }
    }

    pub fn inactive() -> Self {
        Self {
            active: AtomicBool::new(false),
            pairs: Mutex::new(Vec::new()),
        }
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub fn notification_count(&self) -> usize {
        self.pairs.lock().unwrap().len()
    }
}

impl<E: Clone> RecordingSink<E> {
    /// Recorded `(after, before)` pairs, in delivery order.
    pub fn pairs(&self) -> Vec<(E, E)> {
        self.pairs.lock().unwrap().clone()
    }
}

impl<E> Default for RecordingSink<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: RoutedEvent + Clone> ChangeSink<E> for RecordingSink<E> {
    fn wants_notification(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn notify(&self, after: &E, before: &E) {
        self.pairs
            .lock()
            .unwrap()
            .push((after.clone(), before.clone()));
    }
}
