//! Lightweight structured hints attached to a request.
//!
//! Hints are free-form JSON. Every accessor is tolerant: a missing key,
//! a wrong type or an out-of-range value reads as `None` and callers fall
//! back to their defaults. A non-object payload deserializes as empty hints.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Hints(Map<String, Value>);

impl<'de> Deserialize<'de> for Hints {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(value))
    }
}

impl Hints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build hints from any JSON value; non-objects become empty hints
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    /// Builder-style insert, mainly for tests and the CLI
    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.0.insert(key.to_string(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Non-empty trimmed string value
    pub fn str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Finite number, accepting numeric strings
    pub fn f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(value_as_f64)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn object(&self, key: &str) -> Option<&Map<String, Value>> {
        self.0.get(key).and_then(Value::as_object)
    }

    pub fn array(&self, key: &str) -> Option<&Vec<Value>> {
        self.0.get(key).and_then(Value::as_array)
    }

    /// Nested hint object (e.g. `risk`, `cfl`) as its own hint set
    pub fn section(&self, key: &str) -> Hints {
        self.object(key).cloned().map(Hints).unwrap_or_default()
    }

    /// String list, skipping non-string entries
    pub fn strings(&self, key: &str) -> Vec<String> {
        self.array(key)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Notes the caller asked us to store: `note` plus any `notes` entries
    pub fn notes_to_store(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if let Some(note) = self.str("note") {
            out.push(("note".to_string(), note.to_string()));
        }
        if let Some(map) = self.object("notes") {
            for (key, value) in map {
                let key = key.trim();
                if key.is_empty() {
                    continue;
                }
                if let Some(text) = value.as_str().map(str::trim).filter(|s| !s.is_empty()) {
                    out.push((key.to_string(), text.to_string()));
                }
            }
        }
        out
    }
}

/// Lenient numeric read shared by hint consumers
pub fn value_as_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}
