#![allow(clippy::result_large_err)] // Row construction returns AppError so provider failures keep their diagnostics.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use indexmap::IndexMap;
use serde_json::Value;

/// Value of the destination field under construction. `None` means no value.
pub type FieldValue = Option<Value>;

/// One record read from the source system.
///
/// Field values are kept as `serde_json::Value` so a row can carry strings,
/// numbers, nested objects and multi-value arrays without a fixed schema.
/// Stages only ever see a shared reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRow {
    fields: IndexMap<String, Value>,
    id_keys: Vec<String>,
}

impl SourceRow {
    pub fn new(fields: IndexMap<String, Value>) -> Self {
        Self {
            fields,
            id_keys: Vec::new(),
        }
    }

    /// Build a row from a JSON object.
    pub fn from_json(value: Value) -> Result<Self, AppError> {
        match value {
            Value::Object(map) => Ok(Self::new(map.into_iter().collect())),
            other => Err(AppError::new(
                ErrorCategory::SourceError,
                format!("source row must be a JSON object, got {}", type_name(&other)),
            )
            .with_code("MIG-SRC-002")),
        }
    }

    /// Name the fields that identify this row in messages and errors.
    pub fn with_id_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.id_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// True when the field exists and holds something other than null.
    pub fn has_value(&self, field: &str) -> bool {
        matches!(self.fields.get(field), Some(value) if !value.is_null())
    }

    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Values of the configured id keys, null when the row lacks one.
    pub fn source_ids(&self) -> IndexMap<String, Value> {
        self.id_keys
            .iter()
            .map(|key| {
                (
                    key.clone(),
                    self.fields.get(key).cloned().unwrap_or(Value::Null),
                )
            })
            .collect()
    }

    /// Human readable row identity, e.g. `contact_id=17`.
    pub fn id_label(&self) -> String {
        if self.id_keys.is_empty() {
            return "<no source ids>".to_string();
        }
        self.source_ids()
            .iter()
            .map(|(key, value)| format!("{}={}", key, scalar_text(value)))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl FromIterator<(String, Value)> for SourceRow {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Text form of a scalar value; strings are not quoted.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Loose scalar comparison matching how a SQL-backed store compares a
/// condition value: `42` and `"42"` are the same key.
pub fn values_match(left: &Value, right: &Value) -> bool {
    if left == right {
        return true;
    }
    match (left, right) {
        (Value::Number(number), Value::String(text))
        | (Value::String(text), Value::Number(number)) => number.to_string() == *text,
        _ => false,
    }
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
