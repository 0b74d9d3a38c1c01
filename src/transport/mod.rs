//! Transport implementations.
//!
//! This module provides concrete implementations of the domain-level
//! `Transport` trait. Network transports are hidden behind feature flags
//! and exposed only through constructor functions.
//!
//! Client code must not depend on transport-specific types.

mod memory;

#[cfg(feature = "transport_websocket")]
mod websocket;

pub use memory::{create_memory_transport_with_hub, MemoryHub};

#[cfg(feature = "transport_websocket")]
pub use websocket::create_websocket_transport;

/// Stub used when the `transport_websocket` feature is disabled.
#[cfg(not(feature = "transport_websocket"))]
pub async fn create_websocket_transport(
    config: crate::TransportConfig,
) -> crate::Result<crate::TransportPtr> {
    Err(crate::Error::ConnectFailed {
        uri: config.uri,
        reason: "transport_websocket feature is not enabled".into(),
    })
}
