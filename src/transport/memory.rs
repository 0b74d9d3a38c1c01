//! In-memory transport implementation.
//!
//! This module provides a pure in-process implementation of the domain-level
//! `Transport` trait. It is intended primarily for testing, local execution,
//! and as a reference for transport semantics.
//!
//! ## Reference Semantics
//!
//! The in-memory transport defines the **reference behavior** for the transport
//! layer:
//!
//! - Frames are delivered whole, in the order they were sent.
//! - No frames are dropped due to timing, scheduling, or background IO.
//! - `close()` on the client end wakes a parked `recv()` with `Ok(None)`.
//! - [`MemoryHub::disconnect`] behaves like the server hanging up: the client
//!   drains what was already pushed, then sees `Ok(None)`.
//!
//! ## Non-Goals
//!
//! This transport does not attempt to emulate network failure modes, latency,
//! or websocket control frames.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::{mpsc, watch};

#[allow(unused_imports)]
use crate::{
    // ---
    lock_ignore_poison,
    log_debug,
    log_error,
    log_info,
    log_warn,
    Error,
    Result,
    Transport,
    TransportBase,
    TransportConfig,
    TransportPtr,
};

type ClientEnds = (mpsc::UnboundedSender<Bytes>, mpsc::UnboundedReceiver<Bytes>);

/// Server end of an in-memory connection.
///
/// A hub accepts exactly one client transport, created with
/// [`create_memory_transport_with_hub`]. Tests drive the server side through
/// the hub: read what the client sent with [`next_frame`](Self::next_frame),
/// answer with [`push`](Self::push), and hang up with
/// [`disconnect`](Self::disconnect).
///
/// ```
/// # use fenix_client::{MemoryHub, Transport, TransportConfig};
/// # use std::time::Duration;
/// # async fn example() -> fenix_client::Result<()> {
/// let hub = MemoryHub::new();
/// let config = TransportConfig {
///     uri: "memory://test".into(),
///     transport_id: "client".into(),
///     transport_type: None,
///     connect_timeout: Duration::from_secs(1),
/// };
/// let transport = fenix_client::create_memory_transport_with_hub(config, hub.clone()).await?;
///
/// transport.send(r#"{"type":"getServer","serverID":1}"#.into()).await?;
/// assert!(hub.next_frame().await.is_some());
/// # Ok(())
/// # }
/// ```
pub struct MemoryHub {
    // ---
    from_client: tokio::sync::Mutex<mpsc::UnboundedReceiver<Bytes>>,
    to_client: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    client_ends: Mutex<Option<ClientEnds>>,
}

impl MemoryHub {
    /// Create a new hub with no client attached.
    pub fn new() -> Arc<Self> {
        // ---
        let (client_tx, from_client) = mpsc::unbounded_channel();
        let (to_client, client_rx) = mpsc::unbounded_channel();

        Arc::new(Self {
            from_client: tokio::sync::Mutex::new(from_client),
            to_client: Mutex::new(Some(to_client)),
            client_ends: Mutex::new(Some((client_tx, client_rx))),
        })
    }

    /// Next frame written by the client, `None` once the client has closed.
    pub async fn next_frame(&self) -> Option<Bytes> {
        // ---
        self.from_client.lock().await.recv().await
    }

    /// Deliver a frame to the client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] after [`disconnect`](Self::disconnect)
    /// or once the client transport is gone.
    pub fn push(&self, frame: impl Into<Bytes>) -> Result<()> {
        // ---
        let guard = lock_ignore_poison(&self.to_client);
        let tx = guard
            .as_ref()
            .ok_or_else(|| Error::ConnectionClosed("memory hub disconnected".into()))?;

        tx.send(frame.into())
            .map_err(|_| Error::ConnectionClosed("memory client dropped".into()))
    }

    /// Hang up on the client.
    pub fn disconnect(&self) {
        // ---
        log_debug!("memory hub: disconnect");
        lock_ignore_poison(&self.to_client).take();
    }
}

/// Client end of an in-memory connection.
struct MemoryTransport {
    // ---
    base: TransportBase,
    tx: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Bytes>>,
    closed: watch::Sender<bool>,
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    // ---
    fn base(&self) -> &TransportBase {
        &self.base
    }

    async fn send(&self, frame: Bytes) -> Result<()> {
        // ---
        let guard = lock_ignore_poison(&self.tx);
        let tx = guard
            .as_ref()
            .ok_or_else(|| Error::ConnectionClosed("transport closed".into()))?;

        tx.send(frame)
            .map_err(|_| Error::ConnectionClosed("memory hub dropped".into()))
    }

    async fn recv(&self) -> Result<Option<Bytes>> {
        // ---
        let mut rx = self.rx.lock().await;
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Ok(None);
        }

        tokio::select! {
            frame = rx.recv() => Ok(frame),
            _ = closed.changed() => Ok(None),
        }
    }

    async fn close(&self) -> Result<()> {
        // ---
        log_debug!("{}: closing transport...", self.transport_id());

        lock_ignore_poison(&self.tx).take();
        self.closed.send_replace(true);
        Ok(())
    }
}

/// Create a client transport attached to `hub`.
///
/// # Errors
///
/// Returns [`Error::ConnectFailed`] if the hub already has a client.
pub async fn create_memory_transport_with_hub(
    config: TransportConfig,
    hub: Arc<MemoryHub>,
) -> Result<TransportPtr> {
    // ---
    log_debug!("{}: create memory transport", config.transport_id);

    let (tx, rx) = lock_ignore_poison(&hub.client_ends)
        .take()
        .ok_or_else(|| Error::ConnectFailed {
            uri: config.uri.clone(),
            reason: "memory hub already has a client attached".into(),
        })?;

    let (closed, _) = watch::channel(false);

    let transport = MemoryTransport {
        base: TransportBase::from(&config),
        tx: Mutex::new(Some(tx)),
        rx: tokio::sync::Mutex::new(rx),
        closed,
    };

    Ok(Arc::new(transport))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn config() -> TransportConfig {
        TransportConfig {
            uri: "memory://test".into(),
            transport_id: "memory-test".into(),
            transport_type: None,
            connect_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        // ---
        let hub = MemoryHub::new();
        let transport = create_memory_transport_with_hub(config(), hub.clone())
            .await
            .unwrap();

        transport.send(Bytes::from_static(b"up")).await.unwrap();
        assert_eq!(hub.next_frame().await.unwrap(), Bytes::from_static(b"up"));

        hub.push(Bytes::from_static(b"down")).unwrap();
        assert_eq!(
            transport.recv().await.unwrap(),
            Some(Bytes::from_static(b"down"))
        );
    }

    #[tokio::test]
    async fn test_second_client_rejected() {
        // ---
        let hub = MemoryHub::new();
        let _first = create_memory_transport_with_hub(config(), hub.clone())
            .await
            .unwrap();
        let second = create_memory_transport_with_hub(config(), hub).await;
        assert!(matches!(second, Err(Error::ConnectFailed { .. })));
    }

    #[tokio::test]
    async fn test_close_wakes_parked_recv() {
        // ---
        let hub = MemoryHub::new();
        let transport = create_memory_transport_with_hub(config(), hub.clone())
            .await
            .unwrap();

        let reader = {
            let transport = transport.clone();
            tokio::spawn(async move { transport.recv().await })
        };

        tokio::task::yield_now().await;
        transport.close().await.unwrap();

        let result = timeout(Duration::from_secs(1), reader)
            .await
            .expect("recv stayed parked after close")
            .unwrap();
        assert!(matches!(result, Ok(None)));
        assert!(transport.send(Bytes::from_static(b"late")).await.is_err());
    }

    #[tokio::test]
    async fn test_disconnect_drains_then_ends() {
        // ---
        let hub = MemoryHub::new();
        let transport = create_memory_transport_with_hub(config(), hub.clone())
            .await
            .unwrap();

        hub.push(Bytes::from_static(b"last")).unwrap();
        hub.disconnect();

        assert_eq!(
            transport.recv().await.unwrap(),
            Some(Bytes::from_static(b"last"))
        );
        assert_eq!(transport.recv().await.unwrap(), None);
        assert!(hub.push(Bytes::from_static(b"more")).is_err());
    }
}
