use crate::error::Error;
use crate::Bus;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use proven_rpc::{Connection, InboundMessage, InboundStream};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;
use uuid::Uuid;

/// A connection to an in-memory bus.
#[derive(Clone, Debug)]
pub struct MemoryConnection {
    id: u64,
    name: String,
    bus: Arc<Bus>,
    closed: Arc<AtomicBool>,
}

impl MemoryConnection {
    pub(crate) fn new(id: u64, name: String, bus: Arc<Bus>) -> Self {
        Self {
            id,
            name,
            bus,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The name the connection was opened with.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the connection has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        Ok(())
    }

    fn subscription(&self, subject: String, group: Option<String>) -> InboundStream {
        let receiver = self.bus.add_subscription(self.id, subject, group);
        UnboundedReceiverStream::new(receiver).boxed()
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    type Error = Error;

    fn new_inbox(&self) -> String {
        format!("_INBOX.{}", Uuid::new_v4().simple())
    }

    async fn subscribe(&self, subject: String) -> Result<InboundStream, Error> {
        self.ensure_open()?;

        Ok(self.subscription(subject, None))
    }

    async fn queue_subscribe(&self, subject: String, group: String) -> Result<InboundStream, Error> {
        self.ensure_open()?;

        Ok(self.subscription(subject, Some(group)))
    }

    async fn publish(&self, subject: String, payload: Bytes) -> Result<(), Error> {
        self.ensure_open()?;

        self.bus.deliver(&InboundMessage {
            subject,
            reply: None,
            payload,
        })
    }

    async fn publish_with_reply(
        &self,
        subject: String,
        reply: String,
        payload: Bytes,
    ) -> Result<(), Error> {
        self.ensure_open()?;

        self.bus.deliver(&InboundMessage {
            subject,
            reply: Some(reply),
            payload,
        })
    }

    async fn flush(&self) -> Result<(), Error> {
        // Delivery is synchronous.
        self.ensure_open()
    }

    async fn close(&self) -> Result<(), Error> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("memory connection {} closed", self.id);
            self.bus.remove_connection(self.id);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::MemoryTransport;

    use std::sync::Arc;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use bytes::Bytes;
    use futures::StreamExt;
    use proven_rpc::{Connection, Transport};
    use tokio::time::timeout;

    use crate::Error;

    async fn connect(transport: &MemoryTransport, name: &str) -> super::MemoryConnection {
        transport
            .connect(&[], name, Arc::new(|_| {}))
            .await
            .expect("Failed to connect")
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let transport = MemoryTransport::new();
        let connection = connect(&transport, "test").await;

        let mut messages = connection.subscribe("orders.*".to_string()).await.unwrap();

        connection
            .publish("orders.new".to_string(), Bytes::from("hello"))
            .await
            .unwrap();

        let message = timeout(Duration::from_secs(1), messages.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.subject, "orders.new");
        assert_eq!(message.reply, None);
        assert_eq!(message.payload, Bytes::from("hello"));
    }

    #[tokio::test]
    async fn test_publish_with_reply_carries_reply_subject() {
        let transport = MemoryTransport::new();
        let connection = connect(&transport, "test").await;
        let inbox = connection.new_inbox();

        let mut messages = connection.subscribe("orders.new".to_string()).await.unwrap();

        connection
            .publish_with_reply("orders.new".to_string(), inbox.clone(), Bytes::new())
            .await
            .unwrap();

        let message = timeout(Duration::from_secs(1), messages.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.reply, Some(inbox));
    }

    #[tokio::test]
    async fn test_queue_group_delivers_once() {
        let transport = MemoryTransport::new();
        let first = connect(&transport, "first").await;
        let second = connect(&transport, "second").await;

        let mut first_messages = first
            .queue_subscribe("jobs.>".to_string(), "workers".to_string())
            .await
            .unwrap();
        let mut second_messages = second
            .queue_subscribe("jobs.>".to_string(), "workers".to_string())
            .await
            .unwrap();

        for _ in 0..10 {
            first
                .publish("jobs.run".to_string(), Bytes::new())
                .await
                .unwrap();
        }

        let mut received = 0;
        while timeout(Duration::from_millis(50), first_messages.next())
            .await
            .is_ok()
        {
            received += 1;
        }
        while timeout(Duration::from_millis(50), second_messages.next())
            .await
            .is_ok()
        {
            received += 1;
        }

        assert_eq!(received, 10);
    }

    #[tokio::test]
    async fn test_inboxes_are_unique() {
        let transport = MemoryTransport::new();
        let connection = connect(&transport, "test").await;

        assert_ne!(connection.new_inbox(), connection.new_inbox());
    }

    #[tokio::test]
    async fn test_rejects_wildcard_publish() {
        let transport = MemoryTransport::new();
        let connection = connect(&transport, "test").await;

        assert_matches!(
            connection.publish("orders.*".to_string(), Bytes::new()).await,
            Err(Error::InvalidSubject(_))
        );
    }

    #[tokio::test]
    async fn test_fail_publishes() {
        let transport = MemoryTransport::new();
        let connection = connect(&transport, "test").await;

        transport.fail_publishes(true);
        assert_matches!(
            connection.publish("orders.new".to_string(), Bytes::new()).await,
            Err(Error::Publish(_))
        );

        transport.fail_publishes(false);
        assert!(
            connection
                .publish("orders.new".to_string(), Bytes::new())
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_close_ends_subscriptions() {
        let transport = MemoryTransport::new();
        let connection = connect(&transport, "test").await;

        let mut messages = connection.subscribe("orders.>".to_string()).await.unwrap();
        assert_eq!(transport.subscription_count(), 1);

        connection.close().await.unwrap();
        assert!(connection.is_closed());
        assert_eq!(transport.subscription_count(), 0);

        assert!(
            timeout(Duration::from_secs(1), messages.next())
                .await
                .unwrap()
                .is_none()
        );
        assert_matches!(
            connection.publish("orders.new".to_string(), Bytes::new()).await,
            Err(Error::Closed)
        );
    }

    #[tokio::test]
    async fn test_inject_error_reaches_callbacks() {
        let transport = MemoryTransport::new();
        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();

        let _connection = transport
            .connect(
                &[],
                "test",
                Arc::new(move |message| {
                    let _ = sender.send(message);
                }),
            )
            .await
            .unwrap();

        transport.inject_error("connection reset");

        assert_eq!(receiver.recv().await, Some("connection reset".to_string()));
    }
}
