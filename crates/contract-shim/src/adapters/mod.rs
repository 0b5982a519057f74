//! # Adapters
//!
//! Concrete implementations of the outbound ports: the in-memory host
//! context used by unit and integration tests, migration discovery sources,
//! and the default payload normalizer. Production contexts are provided by
//! the host runtime's own bindings.

pub mod memory;
pub mod migrations_fs;
pub mod normalizer;

pub use memory::{CrossInvocation, MemoryIterator, MemoryLedger};
pub use migrations_fs::{FsMigrationSource, StaticMigrationSource};
pub use normalizer::PassthroughNormalizer;
