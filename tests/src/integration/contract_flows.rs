//! # Contract Dispatch Flows
//!
//! Drives a small gift-registry contract through the dispatcher exactly the
//! way a host would: raw string arguments in, encoded payload or serialized
//! structured error out, against one persistent in-memory ledger.

#[cfg(test)]
mod tests {
    use contract_shim::prelude::*;
    use serde_json::{json, Value};
    use std::sync::Arc;

    /// A contract with create / read / bulk-delete / echo handlers.
    fn gift_contract() -> ContractService {
        let mut contract = ContractService::new("GiftContract");

        contract.register_handler("createGift", |helper, args| async move {
            let gift = args
                .first()
                .and_then(|arg| arg.as_json().cloned())
                .ok_or_else(|| ContractError::validation("gift", Value::Null, "object"))?;

            let id = helper.uuid("KDO")?;
            helper.put_state(&id, gift).await?;
            helper.set_event("GiftCreated", json!({ "id": id })).await?;

            Ok(Payload::Json(json!({ "id": id })))
        });

        contract.register_handler("getGift", |helper, args| async move {
            let id = args
                .first()
                .and_then(|arg| arg.as_str())
                .map(str::to_string)
                .ok_or_else(|| ContractError::validation("id", Value::Null, "string"))?;

            let record = helper.get_state_as_object(&id).await?;
            Ok(Payload::Json(record.unwrap_or(Value::Null)))
        });

        contract.register_handler("deleteGiftsByType", |helper, args| async move {
            let gift_type = args
                .first()
                .and_then(|arg| arg.as_str())
                .map(str::to_string)
                .ok_or_else(|| ContractError::validation("type", Value::Null, "string"))?;

            let deleted = helper
                .delete_all_returned_by_query(&json!({ "selector": { "type": gift_type } }))
                .await?;
            Ok(Payload::Json(json!(deleted)))
        });

        contract.register_handler("echoFirstArg", |_helper, args| async move {
            let first = args
                .first()
                .cloned()
                .map(ArgValue::into_value)
                .unwrap_or(Value::Null);
            Ok(Payload::Json(first))
        });

        contract
    }

    fn payload_json(response: &ContractResponse) -> Value {
        let payload = response.payload().expect("success payload");
        serde_json::from_slice(payload).expect("JSON payload")
    }

    fn error_of(response: &ContractResponse) -> ContractError {
        match response {
            ContractResponse::Error(serialized) => {
                serde_json::from_str(serialized).expect("serialized structured error")
            }
            ContractResponse::Success(_) => panic!("expected an error response"),
        }
    }

    #[tokio::test]
    async fn test_create_then_read_back() {
        let contract = gift_contract();
        let ledger = MemoryLedger::new().with_tx_id("tx-77");

        let created = contract
            .invoke(Arc::new(ledger.fork_with_args(vec![
                "createGift".to_string(),
                json!({"type": "kdo", "amount": 20}).to_string(),
            ])))
            .await;
        assert_eq!(payload_json(&created), json!({ "id": "KDO_tx-77_0" }));

        let fetched = contract
            .invoke(Arc::new(ledger.fork_with_args(vec![
                "getGift".to_string(),
                "KDO_tx-77_0".to_string(),
            ])))
            .await;
        assert_eq!(
            payload_json(&fetched),
            json!({"type": "kdo", "amount": 20})
        );

        let events = ledger.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "GiftCreated");
    }

    #[tokio::test]
    async fn test_identifiers_continue_across_invocations_of_one_transaction() {
        let contract = gift_contract();
        let ledger = MemoryLedger::new().with_tx_id("tx-same");
        let gift = json!({"type": "kdo"}).to_string();

        for expected in ["KDO_tx-same_0", "KDO_tx-same_1", "KDO_tx-same_2"] {
            let response = contract
                .invoke(Arc::new(ledger.fork_with_args(vec![
                    "createGift".to_string(),
                    gift.clone(),
                ])))
                .await;
            assert_eq!(payload_json(&response), json!({ "id": expected }));
        }
    }

    #[tokio::test]
    async fn test_bulk_delete_removes_only_matching_records() {
        let contract = gift_contract();
        let ledger = MemoryLedger::new();

        for gift in [
            json!({"type": "kdo", "n": 1}),
            json!({"type": "kdo", "n": 2}),
            json!({"type": "voucher", "n": 3}),
        ] {
            contract
                .invoke(Arc::new(ledger.fork_with_args(vec![
                    "createGift".to_string(),
                    gift.to_string(),
                ])))
                .await;
        }
        assert_eq!(ledger.state_snapshot().len(), 3);

        let response = contract
            .invoke(Arc::new(ledger.fork_with_args(vec![
                "deleteGiftsByType".to_string(),
                "kdo".to_string(),
            ])))
            .await;

        let deleted = payload_json(&response);
        assert_eq!(deleted.as_array().map(Vec::len), Some(2));
        assert_eq!(ledger.state_snapshot().len(), 1);
        // Each query drain closed its iterator exactly once.
        assert_eq!(ledger.query_close_count(), 1);
    }

    #[tokio::test]
    async fn test_ping_built_in() {
        let contract = gift_contract();
        let ledger = MemoryLedger::new().with_args(vec!["ping".to_string()]);

        let response = contract.invoke(Arc::new(ledger)).await;
        assert_eq!(response.payload(), Some(b"\"pong\"".as_ref()));
    }

    #[tokio::test]
    async fn test_unknown_function_leaves_ledger_untouched() {
        let contract = gift_contract();
        let ledger = MemoryLedger::new();

        contract
            .invoke(Arc::new(ledger.fork_with_args(vec![
                "createGift".to_string(),
                json!({"type": "kdo"}).to_string(),
            ])))
            .await;
        let before = ledger.state_snapshot();

        let response = contract
            .invoke(Arc::new(
                ledger.fork_with_args(vec!["stealGift".to_string(), "KDO_tx-1_0".to_string()]),
            ))
            .await;

        let err = error_of(&response);
        assert_eq!(err.key, keys::UNKNOWN_FUNCTION);
        assert_eq!(err.data["fn"], json!("stealGift"));
        assert_eq!(ledger.state_snapshot(), before);
    }

    #[tokio::test]
    async fn test_unparsable_argument_arrives_as_raw_string() {
        let contract = gift_contract();
        let ledger =
            MemoryLedger::new().with_args(vec!["echoFirstArg".to_string(), "not json".to_string()]);

        let response = contract.invoke(Arc::new(ledger)).await;
        assert_eq!(payload_json(&response), json!("not json"));
    }

    #[tokio::test]
    async fn test_handler_validation_error_serializes_with_key() {
        let contract = gift_contract();
        let ledger = MemoryLedger::new().with_args(vec!["getGift".to_string()]);

        let response = contract.invoke(Arc::new(ledger)).await;
        let err = error_of(&response);
        assert_eq!(err.key, keys::VALIDATION_ERROR);
        assert_eq!(err.data["arg"], json!("id"));
    }
}
