use crate::error::Error;

use async_nats::{Client, Message, Subscriber};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, future};
use proven_rpc::{Connection, InboundMessage, InboundStream};
use tracing::{debug, trace};

/// A connection to a NATS server.
#[derive(Clone, Debug)]
pub struct NatsConnection {
    client: Client,
}

impl NatsConnection {
    pub(crate) const fn new(client: Client) -> Self {
        Self { client }
    }

    /// The underlying NATS client.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }
}

fn into_stream(subscriber: Subscriber) -> InboundStream {
    subscriber
        .filter_map(|message| future::ready(inbound(message)))
        .boxed()
}

/// Converts a delivered message, dropping server status messages.
///
/// With no responders the server answers a request with an empty `503` status message on the
/// reply subject. It carries no envelope, so the waiting request settles by its timeout instead.
fn inbound(message: Message) -> Option<InboundMessage> {
    if let Some(status) = message.status {
        trace!("dropping status {} on {}", status, message.subject);
        return None;
    }

    Some(InboundMessage {
        subject: message.subject.to_string(),
        reply: message.reply.map(|reply| reply.to_string()),
        payload: message.payload,
    })
}

#[async_trait]
impl Connection for NatsConnection {
    type Error = Error;

    fn new_inbox(&self) -> String {
        self.client.new_inbox()
    }

    async fn subscribe(&self, subject: String) -> Result<InboundStream, Error> {
        let subscriber = self
            .client
            .subscribe(subject.clone())
            .await
            .map_err(|e| Error::Subscribe(subject, e.to_string()))?;

        Ok(into_stream(subscriber))
    }

    async fn queue_subscribe(&self, subject: String, group: String) -> Result<InboundStream, Error> {
        let subscriber = self
            .client
            .queue_subscribe(subject.clone(), group)
            .await
            .map_err(|e| Error::Subscribe(subject, e.to_string()))?;

        Ok(into_stream(subscriber))
    }

    async fn publish(&self, subject: String, payload: Bytes) -> Result<(), Error> {
        self.client
            .publish(subject.clone(), payload)
            .await
            .map_err(|e| Error::Publish(subject, e.to_string()))
    }

    async fn publish_with_reply(
        &self,
        subject: String,
        reply: String,
        payload: Bytes,
    ) -> Result<(), Error> {
        self.client
            .publish_with_reply(subject.clone(), reply, payload)
            .await
            .map_err(|e| Error::Publish(subject, e.to_string()))
    }

    async fn flush(&self) -> Result<(), Error> {
        self.client
            .flush()
            .await
            .map_err(|e| Error::Flush(e.to_string()))
    }

    /// Drains the connection: subscriptions stop, pending publishes are flushed and the client
    /// disconnects, including for clones still held by in-flight work.
    async fn close(&self) -> Result<(), Error> {
        debug!("draining nats connection");

        self.client
            .drain()
            .await
            .map_err(|e| Error::Close(e.to_string()))
    }
}
