//! Client engine for the Fenix chat protocol.
//!
//! Requests are tagged with a locally generated id and the caller is
//! suspended until the reply carrying that id arrives; everything the server
//! pushes on its own is fanned out to listeners registered by type name. Wire
//! payloads are mapped to typed records through a registry per direction.
//!

// Values that only feed log lines go unused without the `logging` feature.
#![cfg_attr(not(feature = "logging"), allow(unused_variables))]

// Import all sub modules once...
mod macros;
pub(crate) use macros::{log_debug, log_error, log_info, log_warn};

mod client;
mod client_config;
mod domain;
mod error;
pub mod protocol;
mod transport;
mod transport_builder;

use std::sync::{Mutex, MutexGuard};

// Re-export main types
pub use client::{Client, DispatcherState, ListenerId, ListenerResult};
pub use client_config::{ClientConfig, DEFAULT_REQUEST_TIMEOUT, DEFAULT_URI};
pub use error::{Error, Result};
pub use transport_builder::{TransportBuilder, DEFAULT_CONNECT_TIMEOUT};

pub use protocol::catalog::{AuthUser, ChatMessage, Incoming, Outgoing};
pub use protocol::{Fields, RequestId, WireCodec};

pub use transport::{create_memory_transport_with_hub, create_websocket_transport, MemoryHub};

// --- public re-exports
pub use domain::{
    //
    Transport,
    TransportBase,
    TransportConfig,
    TransportPtr,
};

/// Acquire mutex guard, ignoring poisoning
pub(crate) fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
