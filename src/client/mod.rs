//! Client facade: correlated requests, one-way sends, and push listeners over
//! one connection.
mod dispatcher;
mod listeners;
mod pending;

pub use dispatcher::DispatcherState;
pub use listeners::{ListenerId, ListenerResult};

use crate::protocol::catalog::{AuthUser, Incoming, Outgoing, SignIn, SignUp};
use crate::protocol::{Fields, Record, WireCodec};
use crate::{log_debug, log_info, ClientConfig, Error, Result, TransportBuilder, TransportPtr};
use dispatcher::{Dispatcher, Shutdown, ShutdownCell};
use listeners::ListenerRegistry;
use pending::CorrelationTable;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Fenix protocol client
///
/// Owns one transport and a background dispatcher task reading from it. Any
/// number of tasks may issue requests concurrently through clones of the
/// same client; each request is matched to its reply by id, regardless of
/// the order replies arrive in.
///
/// # Example
///
/// ```no_run
/// use fenix_client::{Client, ClientConfig};
///
/// # async fn example() -> fenix_client::Result<()> {
/// let client = Client::connect(ClientConfig::new("desktop")).await?;
///
/// client.on("message", |message| {
///     if let Some(chat) = message.as_chat_message() {
///         println!("{}: {}", chat.author_id, chat.contents);
///     }
///     Ok(())
/// });
///
/// if let Some(user) = client.sign_in("ada@example.com", "hunter2").await? {
///     println!("signed in as {}", user.username);
/// }
///
/// client.run().await
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    // ---
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    transport: TransportPtr,
    codec: WireCodec,
    pending: CorrelationTable,
    listeners: Arc<ListenerRegistry>,
    shutdown: Arc<ShutdownCell>,
    state: watch::Receiver<DispatcherState>,
    dispatcher_task: JoinHandle<()>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.dispatcher_task.abort();
    }
}

impl Client {
    // ---

    /// Connect to `config.uri` over a websocket.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectFailed`] if the connection cannot be
    /// established, or a configuration error for an unusable URI.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        // ---
        let transport = TransportBuilder::new()
            .uri(config.uri.clone())
            .transport_id(config.client_id.clone())
            .connect_timeout(config.connect_timeout)
            .build()
            .await?;

        Self::with_transport(transport, config)
    }

    /// Run a client over an already established transport.
    ///
    /// Spawns the dispatcher task, so this must be called from within a
    /// tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateType`] if a message catalog is misdeclared.
    pub fn with_transport(transport: TransportPtr, config: ClientConfig) -> Result<Self> {
        // ---
        let codec = WireCodec::new()?;
        let pending = CorrelationTable::new();
        let listeners = Arc::new(ListenerRegistry::new());
        let shutdown = Arc::new(ShutdownCell::default());

        let (dispatcher, state) = Dispatcher::new(
            transport.clone(),
            codec.clone(),
            pending.clone(),
            listeners.clone(),
            shutdown.clone(),
        );
        let dispatcher_task = tokio::spawn(dispatcher.run());

        log_info!("{}: client ready on {}", config.client_id, transport.uri());

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                transport,
                codec,
                pending,
                listeners,
                shutdown,
                state,
                dispatcher_task,
            }),
        })
    }

    /// Send `message` and wait for the reply carrying the same id.
    ///
    /// Waits at most `request_timeout` from the client config.
    ///
    /// # Returns
    ///
    /// `Some(reply)`, or `None` if a reply arrived but its shape could not be
    /// decoded.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection is or becomes closed
    /// - [`Error::Timeout`] if no reply arrived in time
    /// - [`Error::Transport`] if the write failed
    pub async fn send_and_await(&self, message: impl Into<Outgoing>) -> Result<Option<Incoming>> {
        // ---
        let message = message.into();
        let pending = self.inner.pending.begin()?;
        let frame = self.inner.codec.serialize(&message, Some(pending.id()))?;

        log_debug!(
            "{}: -> {} (id {})",
            self.inner.config.client_id,
            message.type_name(),
            pending.id()
        );

        self.inner.transport.send(frame).await?;
        pending.wait(self.inner.config.request_timeout).await
    }

    /// Send `message` without expecting a reply.
    pub async fn send_only(&self, message: impl Into<Outgoing>) -> Result<()> {
        // ---
        let message = message.into();
        let frame = self.inner.codec.serialize(&message, None)?;

        log_debug!("{}: -> {}", self.inner.config.client_id, message.type_name());
        self.inner.transport.send(frame).await
    }

    /// Like [`send_and_await`](Self::send_and_await), for a message given by
    /// type name and raw fields.
    ///
    /// # Errors
    ///
    /// In addition to the errors of `send_and_await`:
    /// [`Error::UnknownType`], [`Error::MissingField`] or
    /// [`Error::UnexpectedField`] if the fields do not match a known shape.
    /// Nothing is sent in that case.
    pub async fn send_request(&self, type_name: &str, fields: Fields) -> Result<Option<Incoming>> {
        // ---
        let message = self.inner.codec.decode_outgoing(type_name, fields)?;
        self.send_and_await(message).await
    }

    /// Like [`send_only`](Self::send_only), for a message given by type name
    /// and raw fields.
    pub async fn send_fire_and_forget(&self, type_name: &str, fields: Fields) -> Result<()> {
        // ---
        let message = self.inner.codec.decode_outgoing(type_name, fields)?;
        self.send_only(message).await
    }

    /// Call `callback` for every pushed message of `type_name`.
    ///
    /// Listeners of one type run in registration order on the dispatcher
    /// task, so they should return quickly. An error or panic in one listener
    /// is logged and does not affect the others.
    pub fn on<F>(&self, type_name: impl Into<String>, callback: F) -> ListenerId
    where
        F: Fn(&Incoming) -> ListenerResult + Send + Sync + 'static,
    {
        // ---
        self.inner.listeners.subscribe(type_name, callback)
    }

    /// Remove a listener added with [`on`](Self::on).
    pub fn off(&self, id: ListenerId) -> bool {
        // ---
        self.inner.listeners.unsubscribe(id)
    }

    /// Sign into an existing account.
    pub async fn sign_in(
        &self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Option<AuthUser>> {
        // ---
        let request = SignIn {
            email: email.into(),
            password: password.into(),
        };
        let reply = self.send_and_await(request).await?;
        Ok(reply.and_then(Incoming::into_auth_user))
    }

    /// Create an account.
    pub async fn sign_up(
        &self,
        email: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Option<AuthUser>> {
        // ---
        let request = SignUp {
            email: email.into(),
            username: username.into(),
            password: password.into(),
        };
        let reply = self.send_and_await(request).await?;
        Ok(reply.and_then(Incoming::into_auth_user))
    }

    /// Wait until the connection ends.
    ///
    /// # Errors
    ///
    /// Returns `Ok(())` after a local [`close`](Self::close), and
    /// [`Error::ConnectionClosed`] if the peer or the transport ended the
    /// connection.
    pub async fn run(&self) -> Result<()> {
        // ---
        let mut state = self.inner.state.clone();
        // A dropped sender means the dispatcher task is gone; treat as closed.
        let _ = state.wait_for(|s| *s == DispatcherState::Closed).await;

        match self.inner.shutdown.get() {
            Some(Shutdown::Local) => Ok(()),
            Some(Shutdown::Remote(reason)) => Err(Error::ConnectionClosed(reason)),
            None => Err(Error::ConnectionClosed("dispatcher stopped".into())),
        }
    }

    /// Close the connection.
    ///
    /// Pending requests fail with [`Error::ConnectionClosed`] and
    /// [`run`](Self::run) returns `Ok(())`.
    pub async fn close(&self) -> Result<()> {
        // ---
        log_debug!("{}: closing", self.inner.config.client_id);
        self.inner.shutdown.record(Shutdown::Local);
        self.inner.transport.close().await
    }

    /// Current dispatcher state.
    pub fn state(&self) -> DispatcherState {
        *self.inner.state.borrow()
    }

    /// Number of requests still waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.len()
    }

    /// Number of listeners registered for `type_name`.
    pub fn listener_count(&self, type_name: &str) -> usize {
        self.inner.listeners.count(type_name)
    }

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }
}
