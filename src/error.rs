use thiserror::Error;

/// Errors that can occur while talking to a Fenix server
#[derive(Error, Debug)]
pub enum Error {
    /// Transport could not be established
    #[error("failed to connect to {uri}: {reason}")]
    ConnectFailed { uri: String, reason: String },

    /// No registry entry for the given type name
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// Type name registered twice in the same registry
    #[error("message type registered twice: {0}")]
    DuplicateType(String),

    /// A declared field is absent from the decoded map
    #[error("message type {type_name} is missing field {field}")]
    MissingField { type_name: String, field: String },

    /// The decoded map carries a key the shape does not declare
    #[error("message type {type_name} has unexpected field {field}")]
    UnexpectedField { type_name: String, field: String },

    /// Frame is not a valid envelope
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// The connection ended before a reply arrived
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Request timed out waiting for a reply
    #[error("request timed out")]
    Timeout,

    /// A listener callback failed or panicked
    #[error("listener for {type_name} failed: {reason}")]
    ListenerFailure { type_name: String, reason: String },

    /// JSON serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport read or write failure
    #[error("transport error: {0}")]
    Transport(String),

    /// A required builder field was not supplied
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    /// Builder settings contradict each other
    #[error("configuration conflict: {0}")]
    ConfigConflict(String),
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, Error>;
