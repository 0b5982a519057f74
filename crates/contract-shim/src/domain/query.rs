//! # Query Drain
//!
//! Turns a forward-only host iterator into a finite, ordered, in-memory
//! list. Values are JSON-decoded where possible and kept as raw text
//! otherwise; tombstoned (empty) entries are skipped. The iterator is closed
//! exactly once on every path, including empty result sets and mid-drain
//! failures.

use crate::domain::args::ArgValue;
use crate::errors::StateError;
use crate::ports::outbound::StateIterator;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

/// One row of a rich-query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRecord {
    /// Ledger key of the entry.
    pub key: String,
    /// Decoded value: JSON where it parses, raw text otherwise.
    pub record: ArgValue,
    /// Last-modification time, when the host index tracks it.
    #[serde(rename = "lastModifiedOn", skip_serializing_if = "Option::is_none")]
    pub last_modified_on: Option<DateTime<Utc>>,
}

/// Drains `iterator` into an ordered list.
pub async fn iterator_to_list(
    mut iterator: Box<dyn StateIterator>,
) -> Result<Vec<QueryRecord>, StateError> {
    let mut results = Vec::new();

    loop {
        let entry = match iterator.next().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(err) => {
                // Still release the host-side cursor before propagating.
                let _ = iterator.close().await;
                return Err(err);
            }
        };

        if entry.value.is_empty() {
            continue;
        }

        let text = String::from_utf8_lossy(&entry.value);
        debug!(key = %entry.key, value = %text, "query entry");

        results.push(QueryRecord {
            key: entry.key,
            record: ArgValue::parse(&text),
            last_modified_on: entry.timestamp.map(|ts| ts.to_datetime()),
        });
    }

    debug!("end of data");
    iterator.close().await?;

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryIterator;
    use crate::ports::outbound::{QueryEntry, TxTimestamp};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn entry(key: &str, value: &[u8]) -> QueryEntry {
        QueryEntry {
            key: key.to_string(),
            value: value.to_vec(),
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn test_decodes_json_and_keeps_raw() {
        let closes = Arc::new(AtomicUsize::new(0));
        let iterator = MemoryIterator::with_close_counter(
            vec![entry("a", b"{\"x\":1}"), entry("b", b"not-json")],
            Arc::clone(&closes),
        );

        let list = iterator_to_list(Box::new(iterator)).await.unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].key, "a");
        assert_eq!(list[0].record, ArgValue::Json(json!({"x": 1})));
        assert_eq!(list[1].key, "b");
        assert_eq!(list[1].record, ArgValue::Raw("not-json".to_string()));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_skips_tombstoned_entries() {
        let iterator = MemoryIterator::new(vec![entry("gone", b""), entry("kept", b"1")]);
        let list = iterator_to_list(Box::new(iterator)).await.unwrap();

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].key, "kept");
    }

    #[tokio::test]
    async fn test_empty_result_set_still_closes_once() {
        let closes = Arc::new(AtomicUsize::new(0));
        let iterator = MemoryIterator::with_close_counter(Vec::new(), Arc::clone(&closes));

        let list = iterator_to_list(Box::new(iterator)).await.unwrap();

        assert!(list.is_empty());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_carries_last_modified_on() {
        let iterator = MemoryIterator::new(vec![QueryEntry {
            key: "a".to_string(),
            value: b"{}".to_vec(),
            timestamp: Some(TxTimestamp::new(1_500_000_000, 0)),
        }]);

        let list = iterator_to_list(Box::new(iterator)).await.unwrap();
        let modified = list[0].last_modified_on.expect("timestamp");
        assert_eq!(modified.timestamp_millis(), 1_500_000_000_000);
    }

    #[tokio::test]
    async fn test_failing_iterator_closes_before_propagating() {
        let closes = Arc::new(AtomicUsize::new(0));
        let iterator = MemoryIterator::failing_after(
            vec![entry("a", b"1")],
            "index unavailable",
            Arc::clone(&closes),
        );

        let err = iterator_to_list(Box::new(iterator)).await.unwrap_err();
        assert!(matches!(err, StateError::Host(_)));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
