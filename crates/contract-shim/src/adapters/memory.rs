//! # In-Memory Host Context
//!
//! [`MemoryLedger`] implements the [`LedgerState`] port over in-process maps
//! for unit and integration tests. Production contexts come from the host
//! runtime's own bindings.
//!
//! The backing maps are shared across [`fork_with_args`](MemoryLedger::fork_with_args)
//! clones, so a test can run several invocations against one persistent
//! state, the way consecutive transactions see one ledger.
//!
//! Rich queries support the equality form `{"selector": {field: value}}`
//! against JSON-object records, which is enough to exercise the query and
//! bulk-delete paths; real selector semantics belong to the host's state
//! index.

use crate::errors::StateError;
use crate::ports::outbound::{
    CrossInvokeResponse, LedgerState, QueryEntry, StateIterator, TxTimestamp,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// A recorded cross-contract invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossInvocation {
    /// Target contract name.
    pub name: String,
    /// Encoded argument vector, function name first.
    pub args: Vec<Vec<u8>>,
    /// Channel the call was issued on.
    pub channel: String,
}

/// In-memory transaction context for tests.
#[derive(Debug)]
pub struct MemoryLedger {
    tx_id: String,
    timestamp: TxTimestamp,
    channel: String,
    args: Vec<String>,
    creator: Option<Vec<u8>>,
    parent_args: Vec<String>,
    failing_reads: Option<String>,
    state: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    events: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    cross_queue: Arc<Mutex<VecDeque<Result<CrossInvokeResponse, StateError>>>>,
    cross_calls: Arc<Mutex<Vec<CrossInvocation>>>,
    query_closes: Arc<AtomicUsize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self {
            tx_id: "tx-1".to_string(),
            timestamp: TxTimestamp::new(1_500_000_000, 0),
            channel: "defaultchannel".to_string(),
            args: Vec::new(),
            creator: None,
            parent_args: Vec::new(),
            failing_reads: None,
            state: Arc::new(Mutex::new(BTreeMap::new())),
            events: Arc::new(Mutex::new(Vec::new())),
            cross_queue: Arc::new(Mutex::new(VecDeque::new())),
            cross_calls: Arc::new(Mutex::new(Vec::new())),
            query_closes: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MemoryLedger {
    /// Creates a context with test defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// A new context for a follow-up invocation against the same ledger:
    /// shares state, events, and recorded calls; takes fresh arguments.
    pub fn fork_with_args(&self, args: Vec<String>) -> Self {
        Self {
            tx_id: self.tx_id.clone(),
            timestamp: self.timestamp,
            channel: self.channel.clone(),
            args,
            creator: self.creator.clone(),
            parent_args: self.parent_args.clone(),
            failing_reads: self.failing_reads.clone(),
            state: Arc::clone(&self.state),
            events: Arc::clone(&self.events),
            cross_queue: Arc::clone(&self.cross_queue),
            cross_calls: Arc::clone(&self.cross_calls),
            query_closes: Arc::clone(&self.query_closes),
        }
    }

    /// Sets the transaction id.
    pub fn with_tx_id(mut self, tx_id: impl Into<String>) -> Self {
        self.tx_id = tx_id.into();
        self
    }

    /// Sets the transaction timestamp.
    pub fn with_timestamp(mut self, seconds: i64, nanos: i32) -> Self {
        self.timestamp = TxTimestamp::new(seconds, nanos);
        self
    }

    /// Sets the channel id.
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Sets the raw invocation arguments (element 0 names the handler).
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Sets the submitter identity bytes.
    pub fn with_creator(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.creator = Some(pem.into());
        self
    }

    /// Sets the decoded parent-invocation arguments.
    pub fn with_parent_invocation(mut self, args: Vec<String>) -> Self {
        self.parent_args = args;
        self
    }

    /// Makes every state read fail with the given host message.
    pub fn with_failing_reads(mut self, message: impl Into<String>) -> Self {
        self.failing_reads = Some(message.into());
        self
    }

    /// Seeds a raw state entry.
    pub fn put_raw(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        lock(&self.state).insert(key.into(), value.into());
    }

    /// Queues the response for the next cross-contract invocation. With an
    /// empty queue, calls answer `200`/`null`.
    pub fn queue_cross_response(&self, response: Result<CrossInvokeResponse, StateError>) {
        lock(&self.cross_queue).push_back(response);
    }

    /// Snapshot of the current state map.
    pub fn state_snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        lock(&self.state).clone()
    }

    /// Events published so far.
    pub fn events(&self) -> Vec<(String, Vec<u8>)> {
        lock(&self.events).clone()
    }

    /// Cross-contract invocations issued so far.
    pub fn cross_invocations(&self) -> Vec<CrossInvocation> {
        lock(&self.cross_calls).clone()
    }

    /// How many query iterators have been closed.
    pub fn query_close_count(&self) -> usize {
        self.query_closes.load(Ordering::SeqCst)
    }

    fn check_reads(&self) -> Result<(), StateError> {
        match &self.failing_reads {
            Some(message) => Err(StateError::Host(message.clone())),
            None => Ok(()),
        }
    }
}

fn matches_selector(selector: &Value, raw: &[u8]) -> bool {
    let fields = match selector.as_object() {
        Some(fields) if !fields.is_empty() => fields,
        _ => return true,
    };
    let record: Value = match serde_json::from_slice(raw) {
        Ok(record) => record,
        Err(_) => return false,
    };
    fields
        .iter()
        .all(|(key, expected)| record.get(key) == Some(expected))
}

#[async_trait]
impl LedgerState for MemoryLedger {
    fn tx_id(&self) -> String {
        self.tx_id.clone()
    }

    fn tx_timestamp(&self) -> TxTimestamp {
        self.timestamp
    }

    fn channel_id(&self) -> String {
        self.channel.clone()
    }

    fn args(&self) -> Vec<String> {
        self.args.clone()
    }

    fn creator_identity(&self) -> Result<Vec<u8>, StateError> {
        self.creator
            .clone()
            .ok_or(StateError::MissingContext("creator"))
    }

    fn parent_invocation(&self) -> Result<Vec<String>, StateError> {
        Ok(self.parent_args.clone())
    }

    async fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, StateError> {
        self.check_reads()?;
        Ok(lock(&self.state).get(key).cloned())
    }

    async fn put_state(&self, key: &str, value: Vec<u8>) -> Result<(), StateError> {
        lock(&self.state).insert(key.to_string(), value);
        Ok(())
    }

    async fn delete_state(&self, key: &str) -> Result<(), StateError> {
        lock(&self.state).remove(key);
        Ok(())
    }

    async fn get_query_result(
        &self,
        query: &str,
    ) -> Result<Box<dyn StateIterator>, StateError> {
        self.check_reads()?;
        let query: Value = serde_json::from_str(query)
            .map_err(|err| StateError::Host(format!("malformed query: {err}")))?;
        let selector = query.get("selector").cloned().unwrap_or(Value::Null);

        let entries: Vec<QueryEntry> = lock(&self.state)
            .iter()
            .filter(|(_, value)| matches_selector(&selector, value))
            .map(|(key, value)| QueryEntry {
                key: key.clone(),
                value: value.clone(),
                timestamp: None,
            })
            .collect();

        Ok(Box::new(MemoryIterator::with_close_counter(
            entries,
            Arc::clone(&self.query_closes),
        )))
    }

    async fn invoke_chaincode(
        &self,
        name: &str,
        args: Vec<Vec<u8>>,
        channel: &str,
    ) -> Result<CrossInvokeResponse, StateError> {
        lock(&self.cross_calls).push(CrossInvocation {
            name: name.to_string(),
            args,
            channel: channel.to_string(),
        });

        lock(&self.cross_queue)
            .pop_front()
            .unwrap_or(Ok(CrossInvokeResponse {
                status: 200,
                payload: b"null".to_vec(),
            }))
    }

    async fn set_event(&self, name: &str, payload: Vec<u8>) -> Result<(), StateError> {
        lock(&self.events).push((name.to_string(), payload));
        Ok(())
    }
}

// =============================================================================
// ITERATOR
// =============================================================================

/// In-memory [`StateIterator`] with close accounting.
pub struct MemoryIterator {
    entries: VecDeque<QueryEntry>,
    fail_with: Option<String>,
    closes: Arc<AtomicUsize>,
}

impl MemoryIterator {
    /// Iterator over the given entries.
    pub fn new(entries: Vec<QueryEntry>) -> Self {
        Self::with_close_counter(entries, Arc::new(AtomicUsize::new(0)))
    }

    /// Iterator whose `close` calls increment the shared counter.
    pub fn with_close_counter(entries: Vec<QueryEntry>, closes: Arc<AtomicUsize>) -> Self {
        Self {
            entries: entries.into(),
            fail_with: None,
            closes,
        }
    }

    /// Iterator that yields the entries, then fails.
    pub fn failing_after(
        entries: Vec<QueryEntry>,
        message: impl Into<String>,
        closes: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            entries: entries.into(),
            fail_with: Some(message.into()),
            closes,
        }
    }
}

#[async_trait]
impl StateIterator for MemoryIterator {
    async fn next(&mut self) -> Result<Option<QueryEntry>, StateError> {
        if let Some(entry) = self.entries.pop_front() {
            return Ok(Some(entry));
        }
        match self.fail_with.take() {
            Some(message) => Err(StateError::Host(message)),
            None => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<(), StateError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
