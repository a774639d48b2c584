//! Ordered field builder for stage bodies.

use cube_api::{document_to_value, Document};
use indexmap::map::Entry;
use serde_json::Value;

/// Collects `(field, expression)` pairs in insertion order.
#[derive(Debug, Clone, Default)]
pub struct FieldBuilder {
    fields: Document,
}

impl FieldBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `field`, replacing any earlier expression in place.
    pub fn insert(&mut self, field: impl Into<String>, expr: impl Into<Value>) -> &mut Self {
        self.fields.insert(field.into(), expr.into());
        self
    }

    /// Set `field` unless it is already present. Returns whether it was added.
    pub fn insert_once(&mut self, field: impl Into<String>, expr: impl Into<Value>) -> bool {
        match self.fields.entry(field.into()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(expr.into());
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_document(self) -> Document {
        self.fields
    }

    pub fn into_value(self) -> Value {
        document_to_value(self.fields)
    }
}
