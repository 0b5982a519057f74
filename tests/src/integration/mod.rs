//! Cross-component flows through the public API.

pub mod contract_flows;
pub mod migration_flows;
