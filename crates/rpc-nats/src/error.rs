use proven_rpc::TransportError;
use thiserror::Error;

/// Errors that can occur in the NATS transport.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// Draining the connection failed.
    #[error("failed to close: {0}")]
    Close(String),

    /// Could not connect to the servers.
    #[error("failed to connect: {0}")]
    Connect(String),

    /// Flushing the connection failed.
    #[error("failed to flush: {0}")]
    Flush(String),

    /// A server address could not be parsed.
    #[error("invalid server address {0:?}: {1}")]
    InvalidServer(String, String),

    /// Publishing failed.
    #[error("failed to publish to {0}: {1}")]
    Publish(String, String),

    /// Subscribing failed.
    #[error("failed to subscribe to {0}: {1}")]
    Subscribe(String, String),
}

impl TransportError for Error {}
