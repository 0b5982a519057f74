//! # Migration Flows
//!
//! Runs migration batches through the dispatcher the way a deployment would:
//! invoke `runMigrations`, observe the applied names and the persisted
//! watermark, and retry after a mid-batch failure.

#[cfg(test)]
mod tests {
    use contract_shim::prelude::*;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    const SEED_V1: &str = "Version-20200101000000";
    const SEED_V2: &str = "Version-20200201000000";

    /// Contract whose two migrations seed contour-type records. The second
    /// migration fails while `broken` is set, to exercise retries.
    fn contour_contract(broken: Arc<AtomicBool>) -> ContractService {
        let mut registry = MigrationRegistry::new();

        registry
            .register(SEED_V1, |helper, _args| async move {
                helper
                    .put_state("contour_ground", json!({"policy": "open", "roles": ["admin"]}))
                    .await?;
                Ok(())
            })
            .expect("valid name");

        registry
            .register(SEED_V2, move |helper, _args| {
                let broken = Arc::clone(&broken);
                async move {
                    if broken.load(Ordering::SeqCst) {
                        return Err(ContractError::unknown("contour backfill failed"));
                    }
                    helper
                        .put_state("contour_water", json!({"policy": "closed", "roles": []}))
                        .await?;
                    Ok(())
                }
            })
            .expect("valid name");

        ContractService::new("ContourContract").with_migrations(
            Arc::new(StaticMigrationSource::new(vec![
                // Deliberately listed newest-first; the engine orders them.
                SEED_V2.to_string(),
                SEED_V1.to_string(),
            ])),
            registry,
        )
    }

    fn payload_json(response: &ContractResponse) -> Value {
        serde_json::from_slice(response.payload().expect("success payload")).expect("JSON")
    }

    fn run_migrations_ctx(ledger: &MemoryLedger) -> Arc<MemoryLedger> {
        Arc::new(ledger.fork_with_args(vec!["runMigrations".to_string()]))
    }

    fn watermark_of(ledger: &MemoryLedger) -> Option<Vec<u8>> {
        ledger.state_snapshot().get(MIGRATION_STATE_KEY).cloned()
    }

    #[tokio::test]
    async fn test_batch_applies_ascending_then_advances_watermark() {
        let contract = contour_contract(Arc::new(AtomicBool::new(false)));
        let ledger = MemoryLedger::new().with_timestamp(1_600_000_000, 0);

        let response = contract.invoke(run_migrations_ctx(&ledger)).await;
        assert_eq!(payload_json(&response), json!([SEED_V1, SEED_V2]));

        let state = ledger.state_snapshot();
        assert!(state.contains_key("contour_ground"));
        assert!(state.contains_key("contour_water"));

        // Watermark is the transaction time, as epoch-millisecond text.
        assert_eq!(watermark_of(&ledger), Some(b"1600000000000".to_vec()));
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() {
        let contract = contour_contract(Arc::new(AtomicBool::new(false)));
        let ledger = MemoryLedger::new().with_timestamp(1_600_000_000, 0);

        contract.invoke(run_migrations_ctx(&ledger)).await;
        let watermark = watermark_of(&ledger);

        let response = contract.invoke(run_migrations_ctx(&ledger)).await;
        assert_eq!(payload_json(&response), json!("No migrations to execute"));
        assert_eq!(watermark_of(&ledger), watermark);
    }

    #[tokio::test]
    async fn test_failed_batch_keeps_watermark_and_retries_from_start() {
        let broken = Arc::new(AtomicBool::new(true));
        let contract = contour_contract(Arc::clone(&broken));
        let ledger = MemoryLedger::new().with_timestamp(1_600_000_000, 0);

        let response = contract.invoke(run_migrations_ctx(&ledger)).await;
        match response {
            ContractResponse::Error(serialized) => {
                let err: ContractError = serde_json::from_str(&serialized).unwrap();
                assert_eq!(err.data["message"], json!("contour backfill failed"));
            }
            ContractResponse::Success(_) => panic!("expected the batch to fail"),
        }

        // The first migration ran, but the watermark did not move.
        assert!(ledger.state_snapshot().contains_key("contour_ground"));
        assert_eq!(watermark_of(&ledger), None);

        // Once the migration is fixed, the retry replays from the same point.
        broken.store(false, Ordering::SeqCst);
        let response = contract.invoke(run_migrations_ctx(&ledger)).await;
        assert_eq!(payload_json(&response), json!([SEED_V1, SEED_V2]));
        assert!(ledger.state_snapshot().contains_key("contour_water"));
        assert_eq!(watermark_of(&ledger), Some(b"1600000000000".to_vec()));
    }

    #[tokio::test]
    async fn test_handlers_observe_migration_flag_only_during_batch() {
        let mut registry = MigrationRegistry::new();
        registry
            .register(SEED_V1, |helper, _args| async move {
                assert!(helper.is_migrating());
                Ok(())
            })
            .expect("valid name");

        let mut contract = ContractService::new("FlagContract").with_migrations(
            Arc::new(StaticMigrationSource::new(vec![SEED_V1.to_string()])),
            registry,
        );
        contract.register_handler("isMigrating", |helper, _args| async move {
            Ok(Payload::Json(json!(helper.is_migrating())))
        });

        let ledger = MemoryLedger::new();
        contract.invoke(run_migrations_ctx(&ledger)).await;

        let response = contract
            .invoke(Arc::new(
                ledger.fork_with_args(vec!["isMigrating".to_string()]),
            ))
            .await;
        assert_eq!(payload_json(&response), json!(false));
    }
}
