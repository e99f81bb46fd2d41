//! Engine diagnostics. Injected at construction instead of a process-wide
//! logger, so callers and tests can observe per-event conditions.

use std::sync::Mutex;

use thiserror::Error;
use tracing::warn;

/// Receives the engine's per-event diagnostic conditions.
///
/// The only condition today is a failed event copy, which suppresses the
/// event rather than failing the call.
pub trait DiagnosticSink: Send + Sync {
    fn clone_failed(&self, event_type: &str);
}

/// Default diagnostics: structured tracing warnings.
#[derive(Debug, Clone, Default)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn clone_failed(&self, event_type: &str) {
        warn!(event_type, "event could not be copied, suppressing");
    }
}

/// In-memory diagnostics for tests. Records the event type of every failed
/// clone. Thread-safe.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    clone_failures: Mutex<Vec<String>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Event types reported through `clone_failed`, in order.
    pub fn clone_failures(&self) -> Vec<String> {
        self.clone_failures.lock().unwrap().clone()
    }
}

impl DiagnosticSink for MemoryDiagnostics {
    fn clone_failed(&self, event_type: &str) {
        self.clone_failures
            .lock()
            .unwrap()
            .push(event_type.to_string());
    }
}

/// Failures raised by the engine itself (as opposed to errors propagated
/// from guard or assignment expressions).
#[derive(Error, Debug)]
pub enum EngineError {
    /// The exclusive lock guarding a rule's value evaluation was poisoned
    /// by a panic on another thread.
    #[error("exclusive lock poisoned during value evaluation")]
    PoisonedLock,
}
