// src/domain/transport.rs

//! The duplex connection the client runs over.
//!
//! A transport moves whole frames in both directions and knows nothing about
//! what is inside them. Envelopes, request ids and listeners belong to the
//! layers above.
//!
//! Implementations live in `src/transport/`.
use crate::Result;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

/// Identity shared by every transport implementation.
///
/// Implementations hold it in a `base` field and hand it out from
/// [`Transport::base`], which gives them `transport_id()` and `uri()` for
/// free:
///
/// ```ignore
/// struct MemoryTransport {
///     base: TransportBase,
///     // channels...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct TransportBase {
    /// Name used in log lines.
    pub transport_id: String,
    /// Endpoint of the connection.
    pub uri: String,
}

impl TransportBase {
    pub fn new(transport_id: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            transport_id: transport_id.into(),
            uri: uri.into(),
        }
    }
}

impl From<&TransportConfig> for TransportBase {
    fn from(config: &TransportConfig) -> Self {
        // ---
        Self::new(config.transport_id.clone(), config.uri.clone())
    }
}

/// Settings consumed by the `create_*_transport()` factories.
///
/// Usually produced by [`TransportBuilder`](crate::TransportBuilder).
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Endpoint, e.g. `"wss://bloblet.com:3300"` or `"memory://test"`.
    pub uri: String,
    /// Name used in log lines.
    pub transport_id: String,
    /// Explicit kind (`"websocket"`, `"memory"`); `None` means derive it
    /// from the URI scheme.
    pub transport_type: Option<String>,
    /// Upper bound on the connection handshake.
    pub connect_timeout: Duration,
}

/// One established full-duplex connection carrying whole frames.
///
/// Contract:
/// - `send()` writes a frame atomically; concurrent callers never interleave
///   partial frames.
/// - `recv()` has a single reader and suspends until a frame arrives, the
///   connection ends cleanly (`Ok(None)`), or it fails (`Err`).
/// - After `close()`, pending and future `recv()` calls return `Ok(None)`
///   and `send()` fails.
///
/// [`MemoryHub`](crate::MemoryHub) transports follow this contract exactly
/// and are what the tests run against.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    // ---
    fn base(&self) -> &TransportBase;

    fn transport_id(&self) -> &str {
        &self.base().transport_id
    }

    fn uri(&self) -> &str {
        &self.base().uri
    }

    /// Write one frame.
    async fn send(&self, frame: Bytes) -> Result<()>;

    /// Read the next frame, `None` once the connection has ended cleanly.
    async fn recv(&self) -> Result<Option<Bytes>>;

    /// Close the connection. Closing twice is not an error.
    async fn close(&self) -> Result<()>;
}

/// Shared handle to a transport; clones refer to the same connection.
pub type TransportPtr = Arc<dyn Transport>;
