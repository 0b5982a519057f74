//! # Driven Ports (Outbound)
//!
//! Capabilities the shim depends on, implemented by adapters around the host
//! runtime:
//!
//! - [`LedgerState`] — the per-transaction handle the host hands to a
//!   contract: state access, identity, timestamps, events, cross-invocation.
//! - [`StateIterator`] — forward-only cursor produced by a rich query.
//! - [`PayloadNormalizer`] — canonicalization seam applied before response
//!   payloads are JSON-encoded.
//! - [`MigrationSource`] — discovery of migration descriptor names.
//!
//! The shim never talks to the host except through these traits, so tests run
//! against the in-memory adapters in [`crate::adapters`].

use crate::errors::{ContractError, StateError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

// =============================================================================
// CONTEXT VALUE TYPES
// =============================================================================

/// Transaction timestamp as supplied by the host (seconds + nanoseconds).
///
/// Every node replaying the same transaction observes the same value, so time
/// derived from it is deterministic — unlike wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxTimestamp {
    /// Whole seconds since the Unix epoch.
    pub seconds: i64,
    /// Sub-second nanoseconds.
    pub nanos: i32,
}

impl TxTimestamp {
    /// Creates a timestamp from seconds and nanoseconds.
    pub fn new(seconds: i64, nanos: i32) -> Self {
        Self { seconds, nanos }
    }

    /// Converts to a UTC datetime at millisecond precision.
    pub fn to_datetime(self) -> DateTime<Utc> {
        let millis = self.seconds * 1_000 + i64::from(self.nanos) / 1_000_000;
        DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

/// One entry yielded by a rich-query iterator.
#[derive(Debug, Clone)]
pub struct QueryEntry {
    /// Ledger key of the entry.
    pub key: String,
    /// Serialized value bytes (empty for tombstoned entries).
    pub value: Vec<u8>,
    /// Last-modification time, when the host index tracks it.
    pub timestamp: Option<TxTimestamp>,
}

/// Result of a cross-contract invocation at the host boundary.
#[derive(Debug, Clone)]
pub struct CrossInvokeResponse {
    /// Host status code; 200 signals success.
    pub status: u16,
    /// Raw response payload from the target contract.
    pub payload: Vec<u8>,
}

// =============================================================================
// LEDGER STATE (host transaction context)
// =============================================================================

/// Host-provided per-transaction handle.
///
/// The host guarantees at most one active business-logic call per context.
/// State operations suspend the calling flow until the host completes them;
/// callers sequence them in program order wherever a read-after-write
/// dependency exists.
#[async_trait]
pub trait LedgerState: Send + Sync {
    /// Identifier of the transaction this context serves.
    fn tx_id(&self) -> String;

    /// Host-asserted transaction timestamp.
    fn tx_timestamp(&self) -> TxTimestamp;

    /// Channel the transaction executes on.
    fn channel_id(&self) -> String;

    /// Raw invocation argument vector; element 0 names the handler.
    fn args(&self) -> Vec<String>;

    /// Identity bytes of the transaction submitter (PEM certificate).
    fn creator_identity(&self) -> Result<Vec<u8>, StateError>;

    /// Decoded argument list of the *parent* invocation recorded in the
    /// transaction's signed proposal.
    fn parent_invocation(&self) -> Result<Vec<String>, StateError>;

    /// Reads a state entry. `None` when the key is absent.
    async fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, StateError>;

    /// Writes a state entry.
    async fn put_state(&self, key: &str, value: Vec<u8>) -> Result<(), StateError>;

    /// Deletes a state entry.
    async fn delete_state(&self, key: &str) -> Result<(), StateError>;

    /// Runs a rich query against the state index.
    async fn get_query_result(&self, query: &str)
        -> Result<Box<dyn StateIterator>, StateError>;

    /// Invokes another contract on the given channel.
    async fn invoke_chaincode(
        &self,
        name: &str,
        args: Vec<Vec<u8>>,
        channel: &str,
    ) -> Result<CrossInvokeResponse, StateError>;

    /// Publishes an event with the transaction.
    async fn set_event(&self, name: &str, payload: Vec<u8>) -> Result<(), StateError>;
}

/// Forward-only cursor over rich-query results.
///
/// Must be closed exactly once; [`crate::domain::query::iterator_to_list`]
/// owns that responsibility for all shim-driven queries.
#[async_trait]
pub trait StateIterator: Send {
    /// Next entry, or `None` when the result set is exhausted.
    async fn next(&mut self) -> Result<Option<QueryEntry>, StateError>;

    /// Releases the host-side cursor.
    async fn close(&mut self) -> Result<(), StateError>;
}

// =============================================================================
// PAYLOAD NORMALIZER
// =============================================================================

/// Canonicalization pass applied to a JSON payload before it is encoded for
/// the host (field pruning, date flattening, and similar policies live behind
/// this seam, outside the shim).
pub trait PayloadNormalizer: Send + Sync {
    /// Returns the canonical form of `value`.
    fn normalize(&self, value: Value) -> Value;
}

// =============================================================================
// MIGRATION SOURCE
// =============================================================================

/// Discovery of migration descriptor names.
///
/// A missing backing location yields an empty list, not an error; names that
/// do not match the descriptor pattern are ignored by the engine.
pub trait MigrationSource: Send + Sync {
    /// Lists available migration names, unordered.
    fn list(&self) -> Result<Vec<String>, ContractError>;
}

// =============================================================================
// TESTS
// =============================================================================
