//! # Driving Ports (Inbound)
//!
//! The contract-author-facing surface: handler payloads, the response shape
//! returned to the host, and the explicit name→handler registration table the
//! dispatcher resolves against.

use crate::domain::args::ArgValue;
use crate::errors::ContractError;
use crate::helper::TransactionHelper;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

// =============================================================================
// PAYLOADS AND RESPONSES
// =============================================================================

/// A handler result (or event payload) before encoding.
///
/// Raw bytes pass through to the host untouched; JSON payloads go through the
/// normalization seam and are encoded by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Already-encoded bytes, forwarded as-is.
    Bytes(Vec<u8>),
    /// A JSON value, encoded after normalization.
    Json(Value),
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Json(Value::String(text.to_string()))
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Json(Value::String(text))
    }
}

/// What the host observes from an invocation: a success payload or a
/// serialized structured error — never a raw fault.
#[derive(Debug, Clone, PartialEq)]
pub enum ContractResponse {
    /// Successful invocation with its encoded payload.
    Success(Vec<u8>),
    /// Failed invocation carrying the serialized [`ContractError`].
    Error(String),
}

impl ContractResponse {
    /// Success response with the given payload.
    pub fn success(payload: Vec<u8>) -> Self {
        ContractResponse::Success(payload)
    }

    /// Failure response for the given error.
    pub fn error(err: &ContractError) -> Self {
        ContractResponse::Error(err.serialized())
    }

    /// The success payload, if any.
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            ContractResponse::Success(payload) => Some(payload),
            ContractResponse::Error(_) => None,
        }
    }
}

// =============================================================================
// HANDLER REGISTRY
// =============================================================================

/// Boxed future returned by a registered handler.
pub type HandlerFuture = BoxFuture<'static, Result<Payload, ContractError>>;

/// A handler bound in the registry.
///
/// Receives the per-transaction helper (which carries the raw context) and
/// the parsed argument vector.
pub type Handler = Arc<dyn Fn(TransactionHelper, Vec<ArgValue>) -> HandlerFuture + Send + Sync>;

/// Explicit name→handler table, built at contract construction.
///
/// Dispatch resolves against this table only; an absent entry is an unknown
/// function, and nothing is invoked dynamically.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Handler>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to an async handler. A later registration under the same
    /// name replaces the earlier one.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(TransactionHelper, Vec<ArgValue>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Payload, ContractError>> + Send + 'static,
    {
        self.handlers.insert(
            name.into(),
            Arc::new(move |helper, args| Box::pin(handler(helper, args))),
        );
    }

    /// Resolves a handler by name.
    pub fn resolve(&self, name: &str) -> Option<Handler> {
        self.handlers.get(name).cloned()
    }

    /// True iff `name` is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered handler names, unordered.
    pub fn names(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}
