//! # Domain
//!
//! Pure logic of the shim: argument and state-value codecs, the sequence
//! allocator, identity normalization, and the query drain. Nothing in here
//! talks to the host directly.

pub mod args;
pub mod codec;
pub mod identity;
pub mod query;
pub mod sequence;
