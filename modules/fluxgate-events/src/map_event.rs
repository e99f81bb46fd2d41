//! Named-field event backed by a map. The bundled `RoutedEvent`
//! implementation, used in production for schemaless streams and as the
//! default fixture in tests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::traits::{EventCloner, FieldWriter};
use crate::types::{RoutedEvent, Value};

/// An event whose fields live in a name → value map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapEvent {
    type_name: String,
    fields: BTreeMap<String, Value>,
}

impl MapEvent {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field initialization.
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Field lookup by name. Absent fields read as `Null`.
    pub fn get(&self, name: &str) -> &Value {
        self.fields.get(name).unwrap_or(&Value::Null)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }
}

impl RoutedEvent for MapEvent {
    fn type_name(&self) -> &str {
        &self.type_name
    }
}

/// Deep copy for map events. Infallible: `MapEvent` owns all its data.
#[derive(Debug, Clone, Default)]
pub struct MapEventCloner;

impl EventCloner<MapEvent> for MapEventCloner {
    fn clone_event(&self, event: &MapEvent) -> Option<MapEvent> {
        Some(event.clone())
    }
}

/// Positional writer for map events: `values[i]` lands in the i-th
/// configured field name.
#[derive(Debug, Clone)]
pub struct MapFieldWriter {
    field_names: Vec<String>,
}

impl MapFieldWriter {
    pub fn new(field_names: Vec<String>) -> Self {
        Self { field_names }
    }

    /// Convenience for the common single-assignment rule.
    pub fn single(field_name: impl Into<String>) -> Self {
        Self {
            field_names: vec![field_name.into()],
        }
    }
}

impl FieldWriter<MapEvent> for MapFieldWriter {
    fn write(&self, values: Vec<Value>, target: &mut MapEvent) {
        for (name, value) in self.field_names.iter().zip(values) {
            target.set(name.clone(), value);
        }
    }
}
