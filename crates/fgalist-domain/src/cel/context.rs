//! CEL execution context for variable bindings

use std::collections::HashMap;

use cel_interpreter::objects::Key;
use cel_interpreter::{Context, Value};

/// Variable bindings for a CEL evaluation.
#[derive(Debug, Default, Clone)]
pub struct CelContext {
    variables: HashMap<String, CelValue>,
}

/// A value that can be bound in a CEL context.
#[derive(Debug, Clone, PartialEq)]
pub enum CelValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    List(Vec<CelValue>),
    Map(HashMap<String, CelValue>),
    /// An RFC3339 timestamp; falls back to a string if it does not parse.
    Timestamp(String),
    Null,
}

impl CelValue {
    /// Converts a JSON value, using the declared CEL parameter type as a hint.
    ///
    /// A `timestamp` parameter given as a string becomes a timestamp; every
    /// other value maps structurally.
    pub fn from_json(value: &serde_json::Value, type_hint: Option<&str>) -> Self {
        match value {
            serde_json::Value::String(s) if type_hint == Some("timestamp") => {
                CelValue::Timestamp(s.clone())
            }
            serde_json::Value::Null => CelValue::Null,
            serde_json::Value::Bool(b) => CelValue::Bool(*b),
            serde_json::Value::Number(n) => {
                if type_hint == Some("double") {
                    return CelValue::Float(n.as_f64().unwrap_or_default());
                }
                if let Some(i) = n.as_i64() {
                    CelValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    CelValue::UInt(u)
                } else {
                    CelValue::Float(n.as_f64().unwrap_or_default())
                }
            }
            serde_json::Value::String(s) => CelValue::String(s.clone()),
            serde_json::Value::Array(items) => {
                CelValue::List(items.iter().map(|v| CelValue::from_json(v, None)).collect())
            }
            serde_json::Value::Object(map) => CelValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), CelValue::from_json(v, None)))
                    .collect(),
            ),
        }
    }
}

impl CelContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a variable, replacing any previous binding.
    pub fn set(&mut self, name: impl Into<String>, value: CelValue) {
        self.variables.insert(name.into(), value);
    }

    pub fn set_int(&mut self, name: impl Into<String>, value: i64) {
        self.set(name, CelValue::Int(value));
    }

    pub fn set_string(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.set(name, CelValue::String(value.into()));
    }

    pub fn set_timestamp(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.set(name, CelValue::Timestamp(value.into()));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub(crate) fn to_cel_context(&self) -> Context<'_> {
        let mut ctx = Context::default();
        for (name, value) in &self.variables {
            ctx.add_variable_from_value(name.as_str(), cel_value_to_value(value));
        }
        ctx
    }
}

fn cel_value_to_value(v: &CelValue) -> Value {
    match v {
        CelValue::Bool(b) => Value::Bool(*b),
        CelValue::Int(i) => Value::Int(*i),
        CelValue::UInt(u) => Value::UInt(*u),
        CelValue::Float(f) => Value::Float(*f),
        CelValue::String(s) => Value::String(s.clone().into()),
        CelValue::List(list) => Value::List(
            list.iter()
                .map(cel_value_to_value)
                .collect::<Vec<_>>()
                .into(),
        ),
        CelValue::Map(map) => {
            let converted: HashMap<Key, Value> = map
                .iter()
                .map(|(k, v)| (Key::String(k.clone().into()), cel_value_to_value(v)))
                .collect();
            Value::Map(converted.into())
        }
        CelValue::Timestamp(ts) => match chrono::DateTime::parse_from_rfc3339(ts) {
            Ok(dt) => Value::Timestamp(dt),
            Err(_) => Value::String(ts.clone().into()),
        },
        CelValue::Null => Value::Null,
    }
}
