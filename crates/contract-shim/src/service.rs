//! # Contract Service
//!
//! The invocation dispatcher. Routes each host invocation to a registered
//! handler, supplies it a per-transaction [`TransactionHelper`], and
//! normalizes the outcome into the host's response shape.
//!
//! The dispatcher never lets a raw fault escape: the host observes either a
//! success payload or a serialized structured error.

use crate::adapters::normalizer::PassthroughNormalizer;
use crate::domain::args::ArgValue;
use crate::domain::sequence::SequenceAllocator;
use crate::errors::{keys, ContractError};
use crate::helper::TransactionHelper;
use crate::migrations::{MigrationEngine, MigrationRegistry};
use crate::ports::inbound::{ContractResponse, HandlerRegistry, Payload};
use crate::ports::outbound::{LedgerState, MigrationSource, PayloadNormalizer};
use std::future::Future;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, instrument, warn};

/// Dispatcher for one contract.
///
/// Construction builds the explicit name→handler table; `ping` is always
/// bound, and `runMigrations` drives the migration engine once
/// [`with_migrations`](Self::with_migrations) has configured one.
pub struct ContractService {
    name: String,
    handlers: HandlerRegistry,
    sequences: Arc<SequenceAllocator>,
    normalizer: Arc<dyn PayloadNormalizer>,
    engine: Arc<OnceLock<Arc<MigrationEngine>>>,
    migrating: Arc<AtomicBool>,
}

impl ContractService {
    /// Creates a service for the named contract with the built-in handlers.
    pub fn new(name: impl Into<String>) -> Self {
        let mut handlers = HandlerRegistry::new();
        let engine: Arc<OnceLock<Arc<MigrationEngine>>> = Arc::new(OnceLock::new());

        handlers.register("ping", |_helper, _args| async { Ok(Payload::from("pong")) });

        let engine_slot = Arc::clone(&engine);
        handlers.register("runMigrations", move |helper, args| {
            let engine_slot = Arc::clone(&engine_slot);
            async move {
                let engine = engine_slot
                    .get()
                    .cloned()
                    .ok_or_else(|| ContractError::new(keys::MIGRATIONS_NOT_CONFIGURED))?;
                let outcome = engine.run(&helper, &args).await?;
                Ok(Payload::Json(outcome.to_value()))
            }
        });

        Self {
            name: name.into(),
            handlers,
            sequences: Arc::new(SequenceAllocator::new()),
            normalizer: Arc::new(PassthroughNormalizer),
            engine,
            migrating: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Contract name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Installs a payload canonicalization policy.
    pub fn with_normalizer(mut self, normalizer: Arc<dyn PayloadNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Configures the migration engine; `runMigrations` becomes functional.
    /// Only the first configuration takes effect.
    pub fn with_migrations(
        self,
        source: Arc<dyn MigrationSource>,
        registry: MigrationRegistry,
    ) -> Self {
        if self
            .engine
            .set(Arc::new(MigrationEngine::new(source, registry)))
            .is_err()
        {
            warn!(contract = %self.name, "migrations already configured, ignoring");
        }
        self
    }

    /// Binds a handler to a function name.
    pub fn register_handler<F, Fut>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(TransactionHelper, Vec<ArgValue>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Payload, ContractError>> + Send + 'static,
    {
        self.handlers.register(name, handler);
    }

    /// Builds the per-transaction helper for a context.
    pub fn helper_for(&self, ctx: Arc<dyn LedgerState>) -> TransactionHelper {
        TransactionHelper::new(ctx, Arc::clone(&self.sequences))
            .with_migration_flag(Arc::clone(&self.migrating))
    }

    /// Instantiation acknowledgement. Mutates nothing; always succeeds.
    pub async fn init(&self, _ctx: Arc<dyn LedgerState>) -> ContractResponse {
        info!(contract = %self.name, "=========== Instantiated contract ===========");
        ContractResponse::success(Vec::new())
    }

    /// Dispatches one invocation.
    #[instrument(skip(self, ctx), fields(contract = %self.name))]
    pub async fn invoke(&self, ctx: Arc<dyn LedgerState>) -> ContractResponse {
        match self.try_invoke(ctx).await {
            Ok(payload) => ContractResponse::success(payload),
            Err(err) => {
                // The stack and the error data are always logged before the
                // failure goes back to the host.
                error!(stack = err.stack.as_deref().unwrap_or("<no stack>"));
                error!(
                    key = %err.key,
                    data = %serde_json::Value::Object(err.data.clone()),
                    "invocation failed"
                );
                ContractResponse::error(&err)
            }
        }
    }

    async fn try_invoke(&self, ctx: Arc<dyn LedgerState>) -> Result<Vec<u8>, ContractError> {
        let raw_args = ctx.args();
        info!(contract = %self.name, tx_id = %ctx.tx_id(), "=========== Invoked contract ===========");
        info!(args = ?raw_args);

        let function = raw_args.first().cloned().unwrap_or_default();
        let handler = self.handlers.resolve(&function).ok_or_else(|| {
            error!(function = %function, "unknown function");
            ContractError::unknown_function(&function)
        })?;

        let parsed_args: Vec<ArgValue> = raw_args[1..]
            .iter()
            .map(|raw| {
                let value = ArgValue::parse(raw);
                if matches!(value, ArgValue::Raw(_)) {
                    debug!(arg = %raw, "argument is not JSON, keeping raw string");
                }
                value
            })
            .collect();

        let helper = self.helper_for(Arc::clone(&ctx));
        let payload = handler(helper, parsed_args).await?;

        match payload {
            Payload::Bytes(bytes) => Ok(bytes),
            Payload::Json(value) => {
                let normalized = self.normalizer.normalize(value);
                serde_json::to_vec(&normalized).map_err(Into::into)
            }
        }
    }
}

impl std::fmt::Debug for ContractService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractService")
            .field("name", &self.name)
            .field("handlers", &self.handlers)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
