use std::time::Duration;

use thiserror::Error;

/// Result type alias for RPC operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by RPC operations.
#[derive(Debug, Error)]
pub enum Error {
    /// `expose` was already called on this instance.
    #[error("handlers already exposed for this service")]
    AlreadyExposed,

    /// The reply could not be interpreted.
    #[error("bad response payload: {0}")]
    BadResponsePayload(String),

    /// The instance has been closed.
    #[error("connection closed")]
    Closed,

    /// Invalid construction options.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A handler binding violates the handler contract.
    #[error("handler contract violation: {0}")]
    HandlerContract(String),

    /// No connection has been established yet.
    #[error("not connected")]
    NotConnected,

    /// The remote handler replied with an error.
    #[error("{0}")]
    Remote(String),

    /// The request message could not be serialized.
    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    /// No reply arrived before the deadline.
    #[error("request to {method} timed out after {timeout:?}")]
    Timeout {
        /// The subject the request was sent to.
        method: String,
        /// How long the request waited.
        timeout: Duration,
    },

    /// The transport reported a failure.
    #[error("transport error: {0}")]
    Transport(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub(crate) fn transport<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport(Box::new(error))
    }
}
