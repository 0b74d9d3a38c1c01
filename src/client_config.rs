//! Public client configuration.
//!
//! This type intentionally contains no transport-specific concepts beyond
//! the endpoint URI. [`Client::connect`](crate::Client::connect) turns it into
//! a [`TransportBuilder`](crate::TransportBuilder) call.

use std::time::Duration;

use crate::transport_builder::DEFAULT_CONNECT_TIMEOUT;

/// Public Fenix endpoint.
pub const DEFAULT_URI: &str = "wss://bloblet.com:3300";

/// Default time a request waits for its reply.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client connection and request parameters.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // ---
    /// Server endpoint.
    ///
    /// Default: `wss://bloblet.com:3300`
    pub uri: String,

    /// Identifier for this client instance, used for logging.
    pub client_id: String,

    /// How long `send_and_await` waits for a reply.
    ///
    /// `None` waits until the reply arrives or the connection closes.
    ///
    /// Default: 30 seconds
    pub request_timeout: Option<Duration>,

    /// How long `connect` waits for the transport handshake.
    ///
    /// Default: 10 seconds
    pub connect_timeout: Duration,
}

impl ClientConfig {
    /// Config for the public endpoint.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self::with_uri(DEFAULT_URI, client_id)
    }

    /// Config for an explicit endpoint.
    pub fn with_uri(uri: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            client_id: client_id.into(),
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Set the per-request reply timeout.
    ///
    /// # Example
    ///
    /// ```
    /// use fenix_client::ClientConfig;
    /// use std::time::Duration;
    ///
    /// let config = ClientConfig::new("desktop")
    ///     .with_request_timeout(Duration::from_secs(5));
    /// assert_eq!(config.request_timeout, Some(Duration::from_secs(5)));
    /// ```
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Wait for replies without a deadline.
    pub fn without_request_timeout(mut self) -> Self {
        self.request_timeout = None;
        self
    }

    /// Set the handshake timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("fenix-client")
    }
}
