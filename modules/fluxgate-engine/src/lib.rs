//! Event-routing preprocessor.
//!
//! Applies an ordered set of conditional update rules to one inbound event
//! at a time: guard → drop check → deferred change notification → lazy
//! copy-on-write clone → locked value evaluation → field write. Returns the
//! untouched input when no rule fires, a mutated clone when any rule fires,
//! or a suppression signal for drop rules.
//!
//! Rule compilation, expression evaluation, and event internals live behind
//! the trait seams in `fluxgate-events`; this crate is only the runtime.

pub mod diagnostics;
pub mod entry;
pub mod preprocessor;

pub use diagnostics::{DiagnosticSink, EngineError, MemoryDiagnostics, TracingDiagnostics};
pub use entry::{ExclusiveLock, RouteEntry};
pub use preprocessor::Preprocessor;
