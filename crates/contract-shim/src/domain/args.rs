//! # Invocation Arguments
//!
//! Arguments arrive from the host as plain strings, each optionally carrying
//! JSON. An argument that fails to parse stays a raw string — never an error.

use serde::{Serialize, Serializer};
use serde_json::Value;

/// A handler argument: parsed JSON, or the raw string when parsing failed.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// The argument parsed as JSON.
    Json(Value),
    /// The argument kept verbatim.
    Raw(String),
}

impl ArgValue {
    /// Parses a raw argument, falling back to the verbatim string.
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str(raw) {
            Ok(value) => ArgValue::Json(value),
            Err(_) => ArgValue::Raw(raw.to_string()),
        }
    }

    /// The parsed JSON value, if this argument carried JSON.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ArgValue::Json(value) => Some(value),
            ArgValue::Raw(_) => None,
        }
    }

    /// String view: the raw text, or the inner text of a JSON string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Json(Value::String(s)) => Some(s),
            ArgValue::Json(_) => None,
            ArgValue::Raw(s) => Some(s),
        }
    }

    /// Converts into a JSON value; raw text becomes a JSON string.
    pub fn into_value(self) -> Value {
        match self {
            ArgValue::Json(value) => value,
            ArgValue::Raw(s) => Value::String(s),
        }
    }
}

impl Serialize for ArgValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ArgValue::Json(value) => value.serialize(serializer),
            ArgValue::Raw(s) => serializer.serialize_str(s),
        }
    }
}
