//! WebSocket transport over `tokio-tungstenite`.
//!
//! Frames go out as text messages. Incoming text and binary messages are
//! both accepted; pings are answered, pongs ignored, and a close frame ends
//! the stream.

use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

#[allow(unused_imports)]
use crate::{
    // ---
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

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport.
///
/// The sink sits behind its own lock so concurrent `send()` calls write whole
/// messages one at a time. The stream is only ever read by the dispatcher.
struct WebSocketTransport {
    // ---
    base: TransportBase,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    closed: watch::Sender<bool>,
}

impl WebSocketTransport {
    async fn write(&self, message: Message) -> Result<()> {
        // ---
        if *self.closed.borrow() {
            return Err(Error::ConnectionClosed("transport closed".into()));
        }

        self.sink
            .lock()
            .await
            .send(message)
            .await
            .map_err(|e| match e {
                tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                    Error::ConnectionClosed(e.to_string())
                }
                other => Error::Transport(other.to_string()),
            })
    }

    async fn next_message(&self) -> Result<Option<Bytes>> {
        // ---
        let mut stream = self.stream.lock().await;

        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(Bytes::copy_from_slice(text.as_bytes())));
                }
                Some(Ok(Message::Binary(data))) => return Ok(Some(data)),
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = self.write(Message::Pong(data)).await {
                        log_warn!("{}: failed to answer ping: {e}", self.transport_id());
                    }
                }
                Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    log_debug!("{}: server closed connection: {frame:?}", self.transport_id());
                    return Ok(None);
                }
                Some(Err(tungstenite::Error::ConnectionClosed)) | None => return Ok(None),
                Some(Err(e)) => return Err(Error::Transport(e.to_string())),
            }
        }
    }
}

#[async_trait::async_trait]
impl Transport for WebSocketTransport {
    // ---
    fn base(&self) -> &TransportBase {
        &self.base
    }

    async fn send(&self, frame: Bytes) -> Result<()> {
        // ---
        let message = match String::from_utf8(frame.to_vec()) {
            Ok(text) => Message::Text(text.into()),
            Err(_) => Message::Binary(frame),
        };
        self.write(message).await
    }

    async fn recv(&self) -> Result<Option<Bytes>> {
        // ---
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Ok(None);
        }

        tokio::select! {
            frame = self.next_message() => frame,
            _ = closed.changed() => Ok(None),
        }
    }

    async fn close(&self) -> Result<()> {
        // ---
        log_debug!("{}: closing transport...", self.transport_id());

        if self.closed.send_replace(true) {
            return Ok(());
        }

        let mut sink = self.sink.lock().await;
        match sink.close().await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(Error::Transport(e.to_string())),
        }
    }
}

/// Open a websocket connection to `config.uri`.
///
/// # Errors
///
/// Returns [`Error::ConnectFailed`] if the handshake fails or does not
/// complete within `config.connect_timeout`.
pub async fn create_websocket_transport(config: TransportConfig) -> Result<TransportPtr> {
    // ---
    log_debug!("{}: connecting to {}", config.transport_id, config.uri);

    let connect_failed = |reason: String| Error::ConnectFailed {
        uri: config.uri.clone(),
        reason,
    };

    let handshake = connect_async(config.uri.as_str());
    let (ws, _response) = tokio::time::timeout(config.connect_timeout, handshake)
        .await
        .map_err(|_| connect_failed(format!("no handshake within {:?}", config.connect_timeout)))?
        .map_err(|e| connect_failed(e.to_string()))?;

    log_info!("{}: connected to {}", config.transport_id, config.uri);

    let (sink, stream) = ws.split();
    let (closed, _) = watch::channel(false);

    let transport = WebSocketTransport {
        base: TransportBase::from(&config),
        sink: Mutex::new(sink),
        stream: Mutex::new(stream),
        closed,
    };

    Ok(Arc::new(transport))
}
