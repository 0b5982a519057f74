//! # State Value Codec
//!
//! Serialization contract for ledger state entries. Strings and dates are
//! stored as their raw textual form (dates as decimal epoch milliseconds);
//! anything else is JSON-encoded. Reads are typed: a stored value decodes as
//! an object, a string, or a date depending on the accessor — absent and
//! empty entries decode to `None`.

use crate::errors::ContractError;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// A value headed for the ledger, tagged with its storage encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
    /// Stored as raw UTF-8 text.
    String(String),
    /// Stored as decimal epoch milliseconds.
    Date(DateTime<Utc>),
    /// Stored as JSON text.
    Json(Value),
    /// Stored verbatim.
    Bytes(Vec<u8>),
}

impl From<&str> for StateValue {
    fn from(s: &str) -> Self {
        StateValue::String(s.to_string())
    }
}

impl From<String> for StateValue {
    fn from(s: String) -> Self {
        StateValue::String(s)
    }
}

impl From<DateTime<Utc>> for StateValue {
    fn from(d: DateTime<Utc>) -> Self {
        StateValue::Date(d)
    }
}

impl From<Value> for StateValue {
    fn from(v: Value) -> Self {
        StateValue::Json(v)
    }
}

impl From<Vec<u8>> for StateValue {
    fn from(b: Vec<u8>) -> Self {
        StateValue::Bytes(b)
    }
}

/// Encodes a value for storage.
pub fn serialize(value: &StateValue) -> Result<Vec<u8>, ContractError> {
    match value {
        StateValue::String(s) => Ok(s.clone().into_bytes()),
        StateValue::Date(d) => Ok(d.timestamp_millis().to_string().into_bytes()),
        StateValue::Json(v) => serde_json::to_vec(v).map_err(Into::into),
        StateValue::Bytes(b) => Ok(b.clone()),
    }
}

/// Decodes a stored entry as JSON. Absent or empty entries are `None`.
pub fn to_object(raw: Option<&[u8]>) -> Result<Option<Value>, ContractError> {
    let text = match non_empty_text(raw) {
        Some(text) => text,
        None => return Ok(None),
    };
    serde_json::from_str(&text).map(Some).map_err(Into::into)
}

/// Decodes a stored entry as text. Absent entries are `None`.
pub fn to_text(raw: Option<&[u8]>) -> Option<String> {
    raw.map(|bytes| String::from_utf8_lossy(bytes).into_owned())
}

/// Decodes a stored entry as a date.
///
/// Only purely numeric text is accepted (epoch milliseconds); anything else
/// is `None` — there is no implicit ISO-string parsing.
pub fn to_date(raw: Option<&[u8]>) -> Option<DateTime<Utc>> {
    let text = non_empty_text(raw)?;
    if !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let millis: i64 = text.parse().ok()?;
    DateTime::<Utc>::from_timestamp_millis(millis)
}

fn non_empty_text(raw: Option<&[u8]>) -> Option<String> {
    let bytes = raw?;
    if bytes.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(bytes).into_owned())
}
