//! Event abstraction and collaborator seams for the routing preprocessor.
//!
//! Domain-agnostic: events are opaque to the engine, which reads and writes
//! them only through the traits in [`traits`]. Values are `serde_json::Value`.
//!
//! Consumers provide their own event types; [`MapEvent`] is the bundled
//! named-field implementation.

pub mod map_event;
pub mod testkit;
pub mod traits;
pub mod types;

pub use map_event::{MapEvent, MapEventCloner, MapFieldWriter};
pub use testkit::{CountingCloner, RecordingSink};
pub use traits::{ChangeSink, EventCloner, FieldWriter, ValueCoercer, ValueExpression};
pub use types::{EvalContext, RoutedEvent, Value};
