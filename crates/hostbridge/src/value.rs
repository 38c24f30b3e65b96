//! Interpreter-level values and their mapping to the host model

use crate::foreign::{ForeignValue, HostRef};

/// A value as the interpreter sees it
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// A host object wrapped for the interpreter
    Foreign(HostRef),
}

impl Value {
    /// Short kind name used in argument errors
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Foreign(_) => "foreign object",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_foreign(&self) -> Option<&HostRef> {
        match self {
            Value::Foreign(obj) => Some(obj),
            _ => None,
        }
    }

    /// Unwrap into the host representation
    pub fn to_foreign(&self) -> ForeignValue {
        match self {
            Value::Unit => ForeignValue::Null,
            Value::Bool(b) => ForeignValue::Bool(*b),
            Value::Int(i) => ForeignValue::Int(*i),
            Value::Float(x) => ForeignValue::Float(*x),
            Value::Text(s) => ForeignValue::string(s),
            Value::Foreign(obj) => ForeignValue::Object(obj.clone()),
        }
    }
}

impl From<ForeignValue> for Value {
    fn from(value: ForeignValue) -> Self {
        match value {
            ForeignValue::Null => Value::Unit,
            ForeignValue::Bool(b) => Value::Bool(b),
            ForeignValue::Int(i) => Value::Int(i),
            ForeignValue::Float(x) => Value::Float(x),
            ForeignValue::Str(s) => Value::Text(s.to_string()),
            ForeignValue::Object(obj) => Value::Foreign(obj),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}
