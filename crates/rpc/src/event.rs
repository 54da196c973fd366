use thiserror::Error;

use crate::handler::HandlerError;

/// Errors observed by a service instance outside of any caller's `Result`.
///
/// Delivered through [`RpcService::subscribe_errors`](crate::RpcService::subscribe_errors).
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ErrorEvent {
    /// A request body was not valid JSON.
    #[error("bad request payload on {subject}: {reason}")]
    BadRequestPayload {
        /// The subject the request arrived on.
        subject: String,
        /// Why parsing failed.
        reason: String,
    },

    /// A handler failed while serving a request.
    #[error("handler for {method} failed: {error}")]
    HandlerRejection {
        /// The method whose handler failed.
        method: String,
        /// The failure.
        error: HandlerError,
    },

    /// A handler panicked. No reply is sent, so a waiting caller runs into its timeout.
    #[error("handler panicked while serving {subject}")]
    HandlerPanicked {
        /// The subject the request arrived on.
        subject: String,
    },

    /// The subject of an inbound message does not name a method.
    #[error("invalid subject {subject}: {reason}")]
    InvalidSubject {
        /// The offending subject.
        subject: String,
        /// Why parsing failed.
        reason: String,
    },

    /// No handler is bound for the requested method.
    #[error("method not found: {method}")]
    MethodNotFound {
        /// The subject the request arrived on.
        subject: String,
        /// The method that was requested.
        method: String,
    },

    /// A reply could not be published.
    #[error("failed to reply on {reply}: {reason}")]
    ReplyFailed {
        /// The reply subject.
        reply: String,
        /// The transport failure.
        reason: String,
    },

    /// The transport reported a connection-level failure.
    #[error("transport error: {0}")]
    Transport(String),
}
