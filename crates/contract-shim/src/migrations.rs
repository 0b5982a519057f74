//! # Migration Engine
//!
//! Applies registered data migrations exactly once, in ascending timestamp
//! order, tracking progress through a persisted watermark.
//!
//! A migration is named `Version-<YYYYMMDDHHmmss>`. Candidates come from a
//! [`MigrationSource`]; names that do not match the pattern are ignored, and
//! only names strictly newer than the watermark run. The batch is sequential
//! — migrations may depend on prior ones — and the watermark advances only
//! after the whole batch succeeds, so a failed batch retries from the same
//! starting point on the next invocation. Migrations are expected to be
//! idempotent on their own: there is no compensation or rollback here.

use crate::domain::args::ArgValue;
use crate::errors::ContractError;
use crate::helper::TransactionHelper;
use crate::ports::outbound::MigrationSource;
use chrono::{DateTime, NaiveDateTime, Utc};
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// State key holding the watermark (textual epoch milliseconds).
pub const MIGRATION_STATE_KEY: &str = "last-update-time";

/// Strict descriptor shape: `Version-` followed by a 14-digit timestamp.
static MIGRATION_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Version-(\d{14})$").expect("migration name pattern"));

/// Boxed future returned by a migration handler.
pub type MigrationFuture = BoxFuture<'static, Result<(), ContractError>>;

/// A registered migration body. Receives the per-transaction helper and the
/// extra arguments forwarded from the triggering invocation.
pub type MigrationHandler =
    Arc<dyn Fn(TransactionHelper, Vec<ArgValue>) -> MigrationFuture + Send + Sync>;

// =============================================================================
// REGISTRY
// =============================================================================

/// Name→handler table for migrations, supplied at contract startup.
#[derive(Default)]
pub struct MigrationRegistry {
    handlers: HashMap<String, MigrationHandler>,
}

impl MigrationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a migration body to its descriptor name.
    ///
    /// The name must match `Version-<YYYYMMDDHHmmss>` with a parseable
    /// timestamp; anything else is a validation error.
    pub fn register<F, Fut>(
        &mut self,
        name: impl Into<String>,
        handler: F,
    ) -> Result<(), ContractError>
    where
        F: Fn(TransactionHelper, Vec<ArgValue>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), ContractError>> + Send + 'static,
    {
        let name = name.into();
        if parse_descriptor(&name).is_none() {
            return Err(ContractError::validation(
                "name",
                name.as_str(),
                "Version-<YYYYMMDDHHmmss>",
            ));
        }

        self.handlers.insert(
            name,
            Arc::new(move |helper, args| Box::pin(handler(helper, args))),
        );
        Ok(())
    }

    /// Resolves a migration body by descriptor name.
    pub fn get(&self, name: &str) -> Option<MigrationHandler> {
        self.handlers.get(name).cloned()
    }

    /// Number of registered migrations.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationRegistry")
            .field("names", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Result of a migration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Nothing was newer than the watermark; the watermark is untouched.
    NoPending,
    /// These migrations ran, in order, and the watermark advanced.
    Applied(Vec<String>),
}

impl MigrationOutcome {
    /// JSON shape reported back through the invocation payload.
    pub fn to_value(&self) -> Value {
        match self {
            MigrationOutcome::NoPending => json!("No migrations to execute"),
            MigrationOutcome::Applied(names) => json!(names),
        }
    }
}

/// Discovers, orders, and applies pending migrations.
pub struct MigrationEngine {
    source: Arc<dyn MigrationSource>,
    registry: MigrationRegistry,
}

impl MigrationEngine {
    /// Creates an engine over a discovery source and a handler registry.
    pub fn new(source: Arc<dyn MigrationSource>, registry: MigrationRegistry) -> Self {
        Self { source, registry }
    }

    /// Runs every migration strictly newer than the persisted watermark.
    ///
    /// On success the watermark is persisted as the current transaction time.
    /// On failure the batch stops at the failing migration, the error
    /// propagates, and the watermark stays where it was.
    pub async fn run(
        &self,
        helper: &TransactionHelper,
        args: &[ArgValue],
    ) -> Result<MigrationOutcome, ContractError> {
        let watermark = helper.get_state_as_date(MIGRATION_STATE_KEY).await?;
        let names = self.source.list()?;
        let pending = pending_migrations(&names, watermark);

        if pending.is_empty() {
            info!("no migrations to execute");
            return Ok(MigrationOutcome::NoPending);
        }

        helper.set_migrating(true);
        let batch = self.run_batch(&pending, helper, args).await;
        helper.set_migrating(false);
        batch?;

        helper
            .put_state(MIGRATION_STATE_KEY, helper.tx_date())
            .await?;

        Ok(MigrationOutcome::Applied(pending))
    }

    /// Runs the batch sequentially; migrations may depend on prior ones, so
    /// they are never applied concurrently.
    async fn run_batch(
        &self,
        pending: &[String],
        helper: &TransactionHelper,
        args: &[ArgValue],
    ) -> Result<(), ContractError> {
        for name in pending {
            let handler = self.registry.get(name).ok_or_else(|| {
                warn!(migration = %name, "discovered migration has no registered handler");
                ContractError::unknown(format!("migration {name} has no registered handler"))
            })?;

            info!(migration = %name, "running migration");
            handler(helper.clone(), args.to_vec()).await?;
        }
        Ok(())
    }
}

// =============================================================================
// DESCRIPTOR ORDERING
// =============================================================================

/// Parses `Version-<YYYYMMDDHHmmss>` into its timestamp (interpreted as UTC).
fn parse_descriptor(name: &str) -> Option<DateTime<Utc>> {
    let digits = MIGRATION_NAME_PATTERN.captures(name)?.get(1)?.as_str();
    NaiveDateTime::parse_from_str(digits, "%Y%m%d%H%M%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Filters to well-formed names strictly newer than `watermark`, ascending.
fn pending_migrations(names: &[String], watermark: Option<DateTime<Utc>>) -> Vec<String> {
    let mut dated: Vec<(DateTime<Utc>, String)> = names
        .iter()
        .filter_map(|name| parse_descriptor(name).map(|at| (at, name.clone())))
        .filter(|(at, _)| watermark.map_or(true, |mark| *at > mark))
        .collect();
    dated.sort();
    dated.into_iter().map(|(_, name)| name).collect()
}

// =============================================================================
// TESTS
// =============================================================================
