//! # Ports
//!
//! Boundary interfaces of the shim. Inbound ports are what the host and the
//! contract author drive; outbound ports are the host-provided capabilities
//! the shim depends on.

pub mod inbound;
pub mod outbound;
