//! # Contract Shim
//!
//! Middleware between a distributed-ledger host runtime and smart-contract
//! business logic. The host hands each invocation to the
//! [`service::ContractService`] dispatcher, which resolves the named handler,
//! supplies it a per-transaction [`helper::TransactionHelper`], and
//! normalizes every outcome into the host's success/failure response shape.
//!
//! ## Components
//!
//! | Component | Location | Purpose |
//! |-----------|----------|---------|
//! | Dispatcher | `service.rs` | Handler resolution, arg parsing, error normalization |
//! | TransactionHelper | `helper.rs` | State, identity, events, cross-contract calls, deterministic ids |
//! | Migration Engine | `migrations.rs` | Ordered, exactly-once data migrations with a persisted watermark |
//! | Identity | `domain/identity.rs` | PEM normalization and public-key hashing |
//! | Error Model | `errors.rs` | Structured `{key, data, stack}` failures |
//!
//! ## Usage Example
//!
//! ```ignore
//! use contract_shim::prelude::*;
//!
//! let mut contract = ContractService::new("GiftContract");
//! contract.register_handler("createGift", |helper, args| async move {
//!     let id = helper.uuid("KDO")?;
//!     helper.put_state(&id, args[0].clone().into_value()).await?;
//!     Ok(Payload::Json(serde_json::json!({ "id": id })))
//! });
//!
//! // host boundary
//! let response = contract.invoke(ctx).await;
//! ```
//!
//! The shim only talks to the host through the traits in
//! [`ports::outbound`], so the whole stack runs against the in-memory
//! adapters in [`adapters`] for tests.

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]

// =============================================================================
// MODULES
// =============================================================================

pub mod adapters;
pub mod domain;
pub mod errors;
pub mod helper;
pub mod migrations;
pub mod ports;
pub mod service;

// =============================================================================
// PRELUDE
// =============================================================================

/// Convenient re-exports for common usage.
pub mod prelude {
    // Dispatcher
    pub use crate::service::ContractService;

    // Per-transaction accessor
    pub use crate::helper::TransactionHelper;

    // Domain values
    pub use crate::domain::args::ArgValue;
    pub use crate::domain::codec::StateValue;
    pub use crate::domain::identity::CreatorCertificate;
    pub use crate::domain::query::QueryRecord;
    pub use crate::domain::sequence::SequenceAllocator;

    // Migrations
    pub use crate::migrations::{
        MigrationEngine, MigrationOutcome, MigrationRegistry, MIGRATION_STATE_KEY,
    };

    // Ports
    pub use crate::ports::inbound::{ContractResponse, HandlerRegistry, Payload};
    pub use crate::ports::outbound::{
        CrossInvokeResponse, LedgerState, MigrationSource, PayloadNormalizer, QueryEntry,
        StateIterator, TxTimestamp,
    };

    // Errors
    pub use crate::errors::{keys, ContractError, StateError};

    // Adapters
    pub use crate::adapters::{
        FsMigrationSource, MemoryLedger, PassthroughNormalizer, StaticMigrationSource,
    };
}

// =============================================================================
// CRATE INFO
// =============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
