use std::error::Error;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

/// Marker trait for transport errors
pub trait TransportError: Error + Send + Sync + 'static {}

/// Callback invoked with every error the transport reports outside of a specific operation.
pub type TransportErrorCallback = Arc<dyn Fn(String) + Send + Sync>;

/// A stream of messages delivered to a subscription.
pub type InboundStream = BoxStream<'static, InboundMessage>;

/// A message delivered by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    /// The full subject the message was published to.
    pub subject: String,

    /// Where a response should be published, if the publisher expects one.
    pub reply: Option<String>,

    /// The raw message body.
    pub payload: Bytes,
}

/// A publish/subscribe transport able to open connections.
#[async_trait]
pub trait Transport
where
    Self: Clone + Debug + Send + Sync + 'static,
{
    /// The error type for the transport.
    type Error: TransportError;

    /// The connection type produced by the transport.
    type Connection: Connection<Error = Self::Error>;

    /// Opens a connection to the given servers, identifying as `name`.
    ///
    /// Errors reported by the transport after the connection is established are passed to
    /// `on_error`.
    async fn connect(
        &self,
        servers: &[String],
        name: &str,
        on_error: TransportErrorCallback,
    ) -> Result<Self::Connection, Self::Error>;
}

/// An open transport connection.
#[async_trait]
pub trait Connection
where
    Self: Clone + Debug + Send + Sync + 'static,
{
    /// The error type for the connection.
    type Error: TransportError;

    /// Returns a fresh, unique subject prefix suitable for receiving replies.
    fn new_inbox(&self) -> String;

    /// Subscribes to a subject or subject pattern.
    async fn subscribe(&self, subject: String) -> Result<InboundStream, Self::Error>;

    /// Subscribes to a subject or subject pattern as a member of a queue group.
    ///
    /// Each matching message is delivered to exactly one member of the group.
    async fn queue_subscribe(
        &self,
        subject: String,
        group: String,
    ) -> Result<InboundStream, Self::Error>;

    /// Publishes a message.
    async fn publish(&self, subject: String, payload: Bytes) -> Result<(), Self::Error>;

    /// Publishes a message that expects a response on `reply`.
    async fn publish_with_reply(
        &self,
        subject: String,
        reply: String,
        payload: Bytes,
    ) -> Result<(), Self::Error>;

    /// Waits until everything published so far has been accepted by the transport.
    async fn flush(&self) -> Result<(), Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;
}
