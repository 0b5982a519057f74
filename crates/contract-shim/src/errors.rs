//! # Error Types
//!
//! The structured error that crosses the invocation boundary, plus the error
//! surface of the host collaborator.
//!
//! Expected failures carry a stable key from [`keys`] so callers can branch
//! on the key without parsing free text; unexpected faults are wrapped under
//! [`keys::UNKNOWN_ERROR`] with the original message preserved in `data`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// Stable error keys understood across the invocation boundary.
pub mod keys {
    /// A required argument was missing or had the wrong shape.
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    /// The invoked function name is not bound on the contract.
    pub const UNKNOWN_FUNCTION: &str = "UNKNOWN_FUNCTION";
    /// An unexpected fault, wrapped generically.
    pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";
    /// A cross-contract invocation failed (non-200 or transport failure).
    pub const CROSS_INVOKE_ERROR: &str = "CROSS_INVOKE_ERROR";
    /// The submitter identity bytes are not a well-formed PEM certificate.
    pub const INVALID_CERTIFICATE: &str = "INVALID_CERTIFICATE";
    /// `runMigrations` was invoked on a contract without a migration setup.
    pub const MIGRATIONS_NOT_CONFIGURED: &str = "MIGRATIONS_NOT_CONFIGURED";
}

// =============================================================================
// STRUCTURED ERROR
// =============================================================================

/// Structured, serializable failure returned through the host's error channel.
///
/// Field order is fixed and `data` is a sorted map, so the serialized form is
/// deterministic for a given error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{key}")]
pub struct ContractError {
    /// Stable error code (one of [`keys`], or a remote contract's own key).
    pub key: String,
    /// Contextual data for the failure.
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Optional trace carried over from the failure site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ContractError {
    /// Creates an error with the given key and empty data.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            data: Map::new(),
            stack: None,
        }
    }

    /// Attaches one context field.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.data.insert(field.to_string(), value.into());
        self
    }

    /// Attaches a stack trace.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// A required-argument violation, raised before any side effect.
    pub fn validation(arg: &str, value: impl Into<Value>, expected: &str) -> Self {
        Self::new(keys::VALIDATION_ERROR)
            .with("arg", arg)
            .with("value", value)
            .with("expected", expected)
    }

    /// Dispatch miss for the given function name.
    pub fn unknown_function(function: &str) -> Self {
        Self::new(keys::UNKNOWN_FUNCTION).with("fn", function)
    }

    /// Generic wrap for an unexpected fault; the message lands in `data`.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(keys::UNKNOWN_ERROR).with("message", message.into())
    }

    /// Malformed submitter certificate.
    pub fn invalid_certificate(cert: &str) -> Self {
        Self::new(keys::INVALID_CERTIFICATE).with("cert", cert)
    }

    /// Serialized form for the host failure channel.
    pub fn serialized(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| format!("{{\"key\":\"{}\",\"data\":{{}}}}", self.key))
    }
}

impl From<StateError> for ContractError {
    fn from(err: StateError) -> Self {
        ContractError::unknown(err.to_string())
    }
}

impl From<serde_json::Error> for ContractError {
    fn from(err: serde_json::Error) -> Self {
        ContractError::unknown(err.to_string())
    }
}

// =============================================================================
// HOST COLLABORATOR ERRORS
// =============================================================================

/// Failures surfaced by the host-provided transaction context.
#[derive(Debug, Clone, Error)]
pub enum StateError {
    /// The host rejected or failed a call; carries the host's message.
    #[error("host error: {0}")]
    Host(String),

    /// The per-transaction context lacks a required field.
    #[error("missing context field: {0}")]
    MissingContext(&'static str),
}

// =============================================================================
// REMOTE ERROR RE-HYDRATION
// =============================================================================

/// Wrapper the host puts around a remote contract's serialized error.
static INVOKE_ERROR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^.*?Calling\s+chaincode\s+Invoke\(\)\s+returned\s+error\s+response\s+(.*)\..*?$")
        .expect("invoke error pattern")
});

/// Extracts a structured error embedded in a host failure message.
///
/// A remote contract's failure travels back as free text wrapping its
/// serialized error; when that wrapper is recognized and its JSON body parses
/// into `{key, data, stack}`, the structured error is re-hydrated. A JSON
/// array body yields its first element.
pub fn parse_remote_error(message: &str) -> Option<ContractError> {
    let captured = INVOKE_ERROR_PATTERN.captures(message)?.get(1)?.as_str();

    let body: Value = match serde_json::from_str(captured) {
        Ok(body) => body,
        Err(err) => {
            debug!(%err, "unable to parse error details from host message");
            return None;
        }
    };
    let body = match body {
        Value::Array(mut items) if !items.is_empty() => items.remove(0),
        other => other,
    };

    serde_json::from_value::<ContractError>(body).ok().filter(|e| !e.key.is_empty())
}

// =============================================================================
// TESTS
// =============================================================================
