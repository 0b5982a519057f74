//! # Sequence Allocator
//!
//! Process-wide, prefix-keyed monotonic counter used for deterministic
//! identifier generation. One instance is constructed per process and shared
//! by reference into every per-transaction helper: a contract invoked several
//! times within one transaction (for example from another contract) must keep
//! counting where it left off, so the state cannot live on the helper.
//!
//! Entries are pruned opportunistically on every allocation with a TTL
//! measured in transaction time. Only what is in the cache at call time gets
//! swept; a prefix that is never touched again is never swept. The cache can
//! therefore grow with rarely-used prefixes — an accepted limitation.

use std::collections::HashMap;
use std::sync::Mutex;

/// Entries unused for this long (by transaction time) are pruned.
pub const SEQUENCE_TTL_MS: i64 = 30 * 60 * 1000;

#[derive(Debug, Clone)]
struct SequenceEntry {
    value: i64,
    last_used: i64,
}

/// Process-wide sequence cache: prefix → transaction id → counter.
///
/// Safe under concurrent invocations; each transaction only ever touches its
/// own `(prefix, tx id)` slice.
#[derive(Debug, Default)]
pub struct SequenceAllocator {
    cache: Mutex<HashMap<String, HashMap<String, SequenceEntry>>>,
}

impl SequenceAllocator {
    /// Creates an empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next value for `(prefix, tx_id)`, starting at 0.
    ///
    /// `now_ms` is the current transaction time in epoch milliseconds; it
    /// stamps the entry and drives the TTL sweep.
    pub fn next(&self, prefix: &str, tx_id: &str, now_ms: i64) -> i64 {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());

        let entry = cache
            .entry(prefix.to_string())
            .or_default()
            .entry(tx_id.to_string())
            .or_insert(SequenceEntry {
                value: -1,
                last_used: now_ms,
            });
        entry.value += 1;
        entry.last_used = now_ms;
        let value = entry.value;

        // TTL sweep over everything currently cached.
        let horizon = now_ms - SEQUENCE_TTL_MS;
        for transactions in cache.values_mut() {
            transactions.retain(|_, e| e.last_used > horizon);
        }
        cache.retain(|_, transactions| !transactions.is_empty());

        value
    }

    /// Number of live `(prefix, tx id)` entries. Test visibility.
    pub fn entry_count(&self) -> usize {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.values().map(HashMap::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_values_increase_from_zero() {
        let seq = SequenceAllocator::new();
        assert_eq!(seq.next("KDO", "tx-1", 1_000), 0);
        assert_eq!(seq.next("KDO", "tx-1", 1_000), 1);
        assert_eq!(seq.next("KDO", "tx-1", 1_000), 2);
    }

    #[test]
    fn test_slices_are_independent() {
        let seq = SequenceAllocator::new();
        assert_eq!(seq.next("A", "tx-1", 0), 0);
        assert_eq!(seq.next("A", "tx-2", 0), 0);
        assert_eq!(seq.next("B", "tx-1", 0), 0);
        assert_eq!(seq.next("A", "tx-1", 0), 1);
    }

    #[test]
    fn test_stale_entries_pruned_on_next_call() {
        let seq = SequenceAllocator::new();
        seq.next("OLD", "tx-1", 0);
        assert_eq!(seq.entry_count(), 1);

        // A later allocation on another prefix sweeps the stale entry.
        seq.next("NEW", "tx-2", SEQUENCE_TTL_MS + 1);
        assert_eq!(seq.entry_count(), 1);

        // The swept slice restarts at 0.
        assert_eq!(seq.next("OLD", "tx-1", SEQUENCE_TTL_MS + 2), 0);
    }

    #[test]
    fn test_entry_at_ttl_boundary_is_pruned() {
        let seq = SequenceAllocator::new();
        seq.next("P", "tx-1", 0);
        seq.next("P", "tx-2", SEQUENCE_TTL_MS);
        // last_used == horizon is not strictly newer, so tx-1 is gone.
        assert_eq!(seq.entry_count(), 1);
    }

    #[test]
    fn test_concurrent_allocations_stay_monotonic() {
        let seq = Arc::new(SequenceAllocator::new());
        let mut handles = Vec::new();
        for t in 0..8 {
            let seq = Arc::clone(&seq);
            handles.push(std::thread::spawn(move || {
                let tx = format!("tx-{t}");
                (0..100).map(|_| seq.next("P", &tx, 0)).collect::<Vec<_>>()
            }));
        }
        for handle in handles {
            let values = handle.join().expect("thread");
            assert_eq!(values, (0..100).collect::<Vec<i64>>());
        }
    }
}
