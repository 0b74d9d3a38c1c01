//! Read side of the connection.
//!
//! One dispatcher task owns `Transport::recv`. Every frame is either a reply
//! to a pending request or a push for the listeners; nothing a peer sends can
//! stop the loop except the connection itself ending.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use super::listeners::ListenerRegistry;
use super::pending::{CorrelationTable, Delivery};
use crate::protocol::WireCodec;
use crate::{lock_ignore_poison, log_debug, log_error, log_warn, TransportPtr};

/// Lifecycle of the dispatcher, observable through
/// [`Client::state`](crate::Client::state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatcherState {
    /// No transport attached yet.
    #[default]
    Disconnected,
    /// Transport attached, read loop not started.
    Connected,
    /// Read loop running.
    Reading,
    /// Connection ended; every pending request has been failed.
    Closed,
}

/// Who ended the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Shutdown {
    /// `Client::close` was called.
    Local,
    /// The peer or the transport ended the connection.
    Remote(String),
}

impl Shutdown {
    pub fn reason(&self) -> &str {
        match self {
            Shutdown::Local => "client closed",
            Shutdown::Remote(reason) => reason,
        }
    }
}

/// First recorded shutdown cause wins.
#[derive(Default)]
pub(crate) struct ShutdownCell(Mutex<Option<Shutdown>>);

impl ShutdownCell {
    /// Record `cause` unless one is already set, returning the effective cause.
    pub fn record(&self, cause: Shutdown) -> Shutdown {
        lock_ignore_poison(&self.0).get_or_insert(cause).clone()
    }

    pub fn get(&self) -> Option<Shutdown> {
        lock_ignore_poison(&self.0).clone()
    }
}

pub(crate) struct Dispatcher {
    // ---
    transport: TransportPtr,
    codec: WireCodec,
    pending: CorrelationTable,
    listeners: Arc<ListenerRegistry>,
    shutdown: Arc<ShutdownCell>,
    state: watch::Sender<DispatcherState>,
}

impl Dispatcher {
    // ---

    /// Attach to `transport`; the returned receiver tracks the state.
    pub fn new(
        transport: TransportPtr,
        codec: WireCodec,
        pending: CorrelationTable,
        listeners: Arc<ListenerRegistry>,
        shutdown: Arc<ShutdownCell>,
    ) -> (Self, watch::Receiver<DispatcherState>) {
        // ---
        let (state, state_rx) = watch::channel(DispatcherState::default());
        state.send_replace(DispatcherState::Connected);

        let dispatcher = Self {
            transport,
            codec,
            pending,
            listeners,
            shutdown,
            state,
        };
        (dispatcher, state_rx)
    }

    /// Read until the connection ends, then fail whatever is still pending.
    pub async fn run(self) {
        // ---
        let transport_id = self.transport.transport_id().to_string();

        self.state.send_replace(DispatcherState::Reading);
        log_debug!("{transport_id}: dispatcher started");

        let ended = loop {
            match self.transport.recv().await {
                Ok(Some(frame)) => self.dispatch(&frame),
                Ok(None) => break Shutdown::Remote("connection closed".into()),
                Err(e) => {
                    log_error!("{transport_id}: receive failed: {e}");
                    break Shutdown::Remote(e.to_string());
                }
            }
        };

        let cause = self.shutdown.record(ended);
        let failed = self.pending.fail_all(cause.reason());
        if failed > 0 {
            log_debug!("{transport_id}: failed {failed} pending requests: {}", cause.reason());
        }

        self.state.send_replace(DispatcherState::Closed);
        log_debug!("{transport_id}: dispatcher stopped ({})", cause.reason());
    }

    /// Route one frame. Malformed and unknown frames are logged and dropped.
    pub(crate) fn dispatch(&self, frame: &[u8]) {
        // ---
        let envelope = match self.codec.deserialize(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                log_warn!("dropping frame: {e}");
                return;
            }
        };

        let id = envelope.id;
        let type_name = envelope.type_name.clone();
        let decoded = self.codec.decode(envelope);

        // A reply nobody claims, e.g. one for a request that just timed out,
        // is routed like a push.
        let decoded = match id {
            Some(id) => {
                let (reply, failure) = match decoded {
                    Ok(message) => (Some(message), None),
                    Err(e) => (None, Some(e)),
                };
                match self.pending.resolve(id, reply) {
                    Delivery::Delivered => {
                        if let Some(e) = failure {
                            log_warn!("reply {id} ({type_name}) did not decode: {e}");
                        }
                        return;
                    }
                    Delivery::Unclaimed(Some(message)) => Ok(message),
                    Delivery::Unclaimed(None) => Err(failure),
                }
            }
            None => decoded.map_err(Some),
        };

        match decoded {
            Ok(message) => {
                // Failures are logged by the registry.
                let _ = self.listeners.fanout(&type_name, &message);
            }
            Err(Some(e)) => {
                log_warn!("dropping {type_name} frame: {e}");
            }
            Err(None) => {}
        }
    }
}
