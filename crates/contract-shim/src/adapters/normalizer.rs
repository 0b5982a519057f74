//! Default payload normalizer.

use crate::ports::outbound::PayloadNormalizer;
use serde_json::Value;

/// Hands payloads through unchanged.
///
/// Canonicalization policies (field pruning, date flattening) belong to the
/// embedding process; installing none means payloads are encoded as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughNormalizer;

impl PayloadNormalizer for PassthroughNormalizer {
    fn normalize(&self, value: Value) -> Value {
        value
    }
}
