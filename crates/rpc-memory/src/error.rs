use proven_rpc::TransportError;
use thiserror::Error;

/// Errors that can occur in the in-memory transport.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The connection has been closed.
    #[error("connection closed")]
    Closed,

    /// The subject cannot be published to.
    #[error("invalid subject {0:?}: must be non-empty and free of wildcards")]
    InvalidSubject(String),

    /// Publishing was made to fail.
    #[error("failed to publish to {0}")]
    Publish(String),
}

impl TransportError for Error {}
