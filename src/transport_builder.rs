//! Transport builder for creating transport instances.
//!
//! Provides a fluent builder API for constructing network transports with
//! clear separation between required and optional configuration.

use std::time::Duration;

use crate::{Error, Result, TransportConfig, TransportPtr};

/// Default time allowed for the connection handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builder for creating transport instances.
///
/// # Examples
///
/// ```no_run
/// use fenix_client::TransportBuilder;
/// use std::time::Duration;
///
/// # async fn example() -> fenix_client::Result<()> {
/// let transport = TransportBuilder::new()
///     .uri("wss://bloblet.com:3300")
///     .transport_id("desktop-client")
///     .connect_timeout(Duration::from_secs(5))
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct TransportBuilder {
    uri: Option<String>,
    transport_id: Option<String>,
    transport_type: Option<String>,
    connect_timeout: Option<Duration>,
}

impl TransportBuilder {
    /// Create a new transport builder.
    pub fn new() -> Self {
        Self {
            uri: None,
            transport_id: None,
            transport_type: None,
            connect_timeout: None,
        }
    }

    /// Set the endpoint URI (required).
    ///
    /// Examples:
    /// - `"wss://bloblet.com:3300"`
    /// - `"ws://127.0.0.1:3300"`
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Set the transport ID (required). Used in log output.
    pub fn transport_id(mut self, id: impl Into<String>) -> Self {
        self.transport_id = Some(id.into());
        self
    }

    /// Set explicit transport type.
    ///
    /// Valid values: `"websocket"`. If not specified, the type is derived
    /// from the URI scheme.
    pub fn transport_type(mut self, flag: impl Into<String>) -> Self {
        self.transport_type = Some(flag.into());
        self
    }

    /// Set the handshake timeout.
    ///
    /// Default: 10s.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Validate and assemble the configuration without connecting.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Required fields missing (`uri`, `transport_id`)
    /// - The URI scheme is not `ws` or `wss`
    /// - An explicit transport type contradicts the URI scheme
    pub fn config(self) -> Result<TransportConfig> {
        // ---
        let uri = self
            .uri
            .ok_or_else(|| Error::MissingConfig("uri".into()))?;
        let transport_id = self
            .transport_id
            .ok_or_else(|| Error::MissingConfig("transport_id".into()))?;

        let scheme = uri
            .split_once("://")
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .ok_or_else(|| Error::MissingConfig(format!("scheme in uri {uri}")))?;

        match (self.transport_type.as_deref(), scheme.as_str()) {
            (None | Some("websocket"), "ws" | "wss") => {}
            (Some("memory"), _) => {
                return Err(Error::ConfigConflict(
                    "memory transports are attached to a MemoryHub, not built from a uri".into(),
                ))
            }
            (Some(other), _) if other != "websocket" => {
                return Err(Error::ConfigConflict(format!(
                    "unrecognized transport_type: {other}, valid values: websocket"
                )))
            }
            (_, other) => {
                return Err(Error::ConfigConflict(format!(
                    "unsupported uri scheme: {other}, expected ws or wss"
                )))
            }
        }

        Ok(TransportConfig {
            uri,
            transport_id,
            transport_type: Some("websocket".into()),
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
        })
    }

    /// Build and connect the transport (consumes self).
    ///
    /// # Errors
    ///
    /// Returns the validation errors of [`config`](Self::config), or
    /// [`Error::ConnectFailed`] if the connection cannot be established.
    pub async fn build(self) -> Result<TransportPtr> {
        // ---
        let config = self.config()?;
        crate::create_websocket_transport(config).await
    }
}

impl Default for TransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_config_defaults() {
        // ---
        let config = TransportBuilder::new()
            .uri("wss://bloblet.com:3300")
            .transport_id("c1")
            .config()
            .unwrap();

        assert_eq!(config.transport_type.as_deref(), Some("websocket"));
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn test_missing_uri() {
        // ---
        let err = TransportBuilder::new().transport_id("c1").config().unwrap_err();
        assert!(matches!(err, Error::MissingConfig(field) if field == "uri"));
    }

    #[test]
    fn test_missing_transport_id() {
        // ---
        let err = TransportBuilder::new().uri("ws://x").config().unwrap_err();
        assert!(matches!(err, Error::MissingConfig(field) if field == "transport_id"));
    }

    #[test]
    fn test_rejects_other_schemes() {
        // ---
        let err = TransportBuilder::new()
            .uri("mqtt://localhost:1883")
            .transport_id("c1")
            .config()
            .unwrap_err();
        assert!(matches!(err, Error::ConfigConflict(_)));
    }

    #[test]
    fn test_rejects_unknown_transport_type() {
        // ---
        let err = TransportBuilder::new()
            .uri("ws://localhost:3300")
            .transport_id("c1")
            .transport_type("carrier-pigeon")
            .config()
            .unwrap_err();
        assert!(matches!(err, Error::ConfigConflict(msg) if msg.contains("carrier-pigeon")));
    }

    #[tokio::test]
    async fn test_build_fails_to_connect() {
        // ---
        // Port 9 on loopback is the discard service; nothing speaks websocket there.
        let result = TransportBuilder::new()
            .uri("ws://127.0.0.1:9")
            .transport_id("c1")
            .connect_timeout(Duration::from_secs(2))
            .build()
            .await;
        assert!(matches!(result, Err(Error::ConnectFailed { .. })));
    }
}
