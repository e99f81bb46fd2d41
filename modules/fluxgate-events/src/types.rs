//! Core currency types. Domain-agnostic.

/// Runtime value passed between expressions, coercers, and field writers.
///
/// `Value::Null` doubles as "undefined": a guard evaluating to `Null` does
/// not pass, and a `Null` assignment value bypasses coercion.
pub type Value = serde_json::Value;

/// Per-call evaluation context handed to every expression evaluation.
///
/// Carries identification for diagnostics only; the engine itself never
/// reads it. One instance can serve many `process` calls.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    /// Name of the statement (compiled rule set) this call runs under.
    pub statement_name: Option<String>,
}

impl EvalContext {
    pub fn named(statement_name: impl Into<String>) -> Self {
        Self {
            statement_name: Some(statement_name.into()),
        }
    }
}

/// Events the preprocessor can route.
///
/// The engine treats events as opaque: it clones them through an
/// `EventCloner` and writes fields through a `FieldWriter`. The only thing
/// it asks of the event itself is a type name for diagnostics.
pub trait RoutedEvent: Send + Sync + 'static {
    /// Declared event type name, used when reporting a failed clone.
    fn type_name(&self) -> &str;
}
