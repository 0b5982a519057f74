//! # Transaction Helper
//!
//! The contract-facing accessor for one transaction: deterministic identifier
//! generation, typed ledger-state access, rich queries, cross-contract
//! invocation, submitter identity, and event publication.
//!
//! One helper is constructed per invocation and holds the host context plus
//! the process-wide sequence allocator. Every required string parameter is
//! checked non-empty before any side effect; a violation raises
//! `VALIDATION_ERROR` and aborts with no partial mutation.

use crate::domain::args::ArgValue;
use crate::domain::codec::{self, StateValue};
use crate::domain::identity::{self, CreatorCertificate};
use crate::domain::query::{iterator_to_list, QueryRecord};
use crate::domain::sequence::SequenceAllocator;
use crate::errors::{keys, parse_remote_error, ContractError};
use crate::ports::inbound::Payload;
use crate::ports::outbound::LedgerState;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Fixed pause before a cross-contract call, giving the host time to release
/// the transaction id of a just-completed invocation. An ordering nudge only
/// — not a correctness guarantee.
const INVOKE_RELEASE_DELAY: Duration = Duration::from_millis(100);

/// Per-transaction accessor over the host context.
///
/// Cheap to clone; all clones share the same context, sequence allocator, and
/// migration flag.
#[derive(Clone)]
pub struct TransactionHelper {
    ledger: Arc<dyn LedgerState>,
    sequences: Arc<SequenceAllocator>,
    migrating: Arc<AtomicBool>,
}

impl TransactionHelper {
    /// Creates a helper over the given context and sequence allocator.
    pub fn new(ledger: Arc<dyn LedgerState>, sequences: Arc<SequenceAllocator>) -> Self {
        Self {
            ledger,
            sequences,
            migrating: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shares the dispatcher's migration flag with this helper.
    pub(crate) fn with_migration_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.migrating = flag;
        self
    }

    /// The raw host context this helper wraps.
    pub fn ledger(&self) -> &Arc<dyn LedgerState> {
        &self.ledger
    }

    /// True while a migration batch is running, so contract logic can
    /// special-case it (for example relaxing identity checks).
    pub fn is_migrating(&self) -> bool {
        self.migrating.load(Ordering::SeqCst)
    }

    pub(crate) fn set_migrating(&self, migrating: bool) {
        self.migrating.store(migrating, Ordering::SeqCst);
    }

    // =========================================================================
    // IDENTIFIERS AND TIME
    // =========================================================================

    /// Generates the next deterministic identifier for `prefix` within the
    /// current transaction: `"{prefix}_{txId}_{n}"` with `n` counting up
    /// from 0.
    ///
    /// Replaying nodes derive the identical value because the counter is
    /// keyed on the transaction id and stamped with transaction time, never
    /// wall-clock randomness.
    pub fn uuid(&self, prefix: &str) -> Result<String, ContractError> {
        require_string("prefix", prefix)?;

        let tx_id = self.ledger.tx_id();
        let now_ms = self.tx_date().timestamp_millis();
        let value = self.sequences.next(prefix, &tx_id, now_ms);

        Ok(format!("{prefix}_{tx_id}_{value}"))
    }

    /// The transaction time, derived from the host-supplied timestamp.
    /// Deterministic across all nodes replaying the same transaction.
    pub fn tx_date(&self) -> DateTime<Utc> {
        self.ledger.tx_timestamp().to_datetime()
    }

    // =========================================================================
    // CROSS-CONTRACT INVOCATION
    // =========================================================================

    /// Invokes `function_name` on another contract and returns its parsed
    /// JSON payload.
    ///
    /// Non-string arguments are JSON-encoded. The channel defaults to the
    /// current one. A non-200 status or transport failure surfaces as
    /// `CROSS_INVOKE_ERROR`; when the failure text carries a remote
    /// structured error, that error is re-hydrated instead.
    pub async fn invoke_chaincode(
        &self,
        chaincode_name: &str,
        function_name: &str,
        args: &[Value],
        channel: Option<&str>,
    ) -> Result<Value, ContractError> {
        require_string("chaincodeName", chaincode_name)?;
        require_string("functionName", function_name)?;

        let mut invoke_args = vec![function_name.to_string()];
        invoke_args.extend(args.iter().map(|arg| match arg {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }));

        // Give the host a beat to release the previous invocation's tx id.
        tokio::time::sleep(INVOKE_RELEASE_DELAY).await;

        let channel = channel
            .map(ToString::to_string)
            .unwrap_or_else(|| self.ledger.channel_id());
        let arg_bytes = invoke_args.iter().map(|a| a.clone().into_bytes()).collect();

        match self
            .ledger
            .invoke_chaincode(chaincode_name, arg_bytes, &channel)
            .await
        {
            Ok(response) if response.status == 200 => {
                serde_json::from_slice(&response.payload).map_err(|err| {
                    ContractError::new(keys::CROSS_INVOKE_ERROR).with("message", err.to_string())
                })
            }
            Ok(response) => Err(ContractError::new(keys::CROSS_INVOKE_ERROR)
                .with("chaincodeName", chaincode_name)
                .with("args", json!(invoke_args))
                .with("channel", channel.as_str())
                .with("status", response.status)
                .with(
                    "payload",
                    String::from_utf8_lossy(&response.payload).into_owned(),
                )),
            Err(err) => {
                error!(
                    chaincode = chaincode_name,
                    %channel,
                    %err,
                    "error while calling chaincode"
                );
                let message = err.to_string();
                match parse_remote_error(&message) {
                    Some(remote) => Err(remote),
                    None => Err(ContractError::new(keys::CROSS_INVOKE_ERROR)
                        .with("message", message)),
                }
            }
        }
    }

    /// True iff this invocation was made from `chaincode_name` (and, when
    /// given, from `function_name`).
    ///
    /// A textual-substring check against the first decoded argument of the
    /// parent invocation, requiring the contract name to precede the function
    /// name. Not a structural parse: incidental substrings can false-positive.
    pub fn invoked_by_chaincode(
        &self,
        chaincode_name: &str,
        function_name: Option<&str>,
    ) -> Result<bool, ContractError> {
        require_string("chaincodeName", chaincode_name)?;

        let parent_args = self.ledger.parent_invocation()?;
        debug!(?parent_args, "chaincode parent args");

        let first = parent_args.first().map(String::as_str).unwrap_or_default();
        let chaincode_at = first.find(chaincode_name);

        match function_name {
            None => Ok(chaincode_at.is_some()),
            Some(function) => {
                let function_at = first.find(function);
                Ok(matches!(
                    (chaincode_at, function_at),
                    (Some(cc), Some(f)) if cc < f
                ))
            }
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Runs a rich query and drains the results into an ordered list of
    /// `{key, record[, lastModifiedOn]}`.
    pub async fn get_query_result_as_list(
        &self,
        query: &Value,
    ) -> Result<Vec<QueryRecord>, ContractError> {
        require_object("query", query)?;

        let query_string = query.to_string();
        debug!(query = %query_string, "rich query");
        let iterator = self.ledger.get_query_result(&query_string).await?;

        iterator_to_list(iterator).await.map_err(Into::into)
    }

    /// Deletes every key returned by `query`; the deletes are issued without
    /// any mutual ordering. Returns the deleted keys.
    pub async fn delete_all_returned_by_query(
        &self,
        query: &Value,
    ) -> Result<Vec<String>, ContractError> {
        let records = self.get_query_result_as_list(query).await?;

        let deletes = records.iter().map(|record| self.ledger.delete_state(&record.key));
        futures::future::try_join_all(deletes).await?;

        Ok(records.into_iter().map(|record| record.key).collect())
    }

    // =========================================================================
    // TYPED STATE ACCESS
    // =========================================================================

    /// Serializes `value` and stores it under `key`.
    pub async fn put_state(
        &self,
        key: &str,
        value: impl Into<StateValue>,
    ) -> Result<(), ContractError> {
        require_string("key", key)?;

        let bytes = codec::serialize(&value.into())?;
        self.ledger.put_state(key, bytes).await.map_err(Into::into)
    }

    /// The state under `key` parsed as JSON; `None` when absent or empty.
    pub async fn get_state_as_object(&self, key: &str) -> Result<Option<Value>, ContractError> {
        require_string("key", key)?;

        let raw = self.ledger.get_state(key).await?;
        codec::to_object(raw.as_deref())
    }

    /// The state under `key` as text; `None` when absent.
    pub async fn get_state_as_string(&self, key: &str) -> Result<Option<String>, ContractError> {
        require_string("key", key)?;

        let raw = self.ledger.get_state(key).await?;
        Ok(codec::to_text(raw.as_deref()))
    }

    /// The state under `key` as a date; `None` unless the stored text is
    /// purely numeric epoch milliseconds.
    pub async fn get_state_as_date(
        &self,
        key: &str,
    ) -> Result<Option<DateTime<Utc>>, ContractError> {
        require_string("key", key)?;

        let raw = self.ledger.get_state(key).await?;
        Ok(codec::to_date(raw.as_deref()))
    }

    // =========================================================================
    // IDENTITY
    // =========================================================================

    /// The submitter's certificate, normalized and parsed.
    pub fn get_creator_certificate(&self) -> Result<CreatorCertificate, ContractError> {
        let raw = self.ledger.creator_identity()?;
        identity::certificate_from_pem(&String::from_utf8_lossy(&raw))
    }

    /// SHA3-256 hash of the submitter certificate's public key hex.
    pub fn get_creator_public_key(&self) -> Result<String, ContractError> {
        let raw = self.ledger.creator_identity()?;
        identity::public_key_hash_from_pem(&String::from_utf8_lossy(&raw))
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// Publishes an event with the transaction. Byte payloads pass through
    /// unchanged; anything else is JSON-encoded first.
    pub async fn set_event(
        &self,
        name: &str,
        payload: impl Into<Payload>,
    ) -> Result<(), ContractError> {
        require_string("name", name)?;

        let bytes = match payload.into() {
            Payload::Bytes(bytes) => bytes,
            Payload::Json(value) => {
                debug!(event = name, payload = %value, "setting event");
                serde_json::to_vec(&value)?
            }
        };

        self.ledger.set_event(name, bytes).await.map_err(Into::into)
    }
}

fn require_string(arg: &str, value: &str) -> Result<(), ContractError> {
    if value.is_empty() {
        return Err(ContractError::validation(arg, value, "string"));
    }
    Ok(())
}

fn require_object(arg: &str, value: &Value) -> Result<(), ContractError> {
    if !value.is_object() {
        return Err(ContractError::validation(arg, value.clone(), "object"));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
