//! In-memory implementation of the RPC transport.
//!
//! All connections opened from clones of one [`MemoryTransport`] share a bus. Subjects support
//! NATS-style wildcards and queue groups deliver each message to exactly one member.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

/// Connections to the in-memory bus.
pub mod connection;

/// Subject matching.
pub mod subject;

pub use connection::MemoryConnection;
pub use error::Error;

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use proven_rpc::transport::TransportErrorCallback;
use proven_rpc::{InboundMessage, Transport};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::subject::{is_publishable, subject_matches_pattern};

struct SubscriptionEntry {
    id: u64,
    connection_id: u64,
    pattern: String,
    group: Option<String>,
    sender: mpsc::UnboundedSender<InboundMessage>,
}

#[derive(Default)]
struct Subscriptions {
    entries: Vec<SubscriptionEntry>,
    group_cursors: HashMap<String, usize>,
}

#[derive(Default)]
struct Bus {
    subscriptions: Mutex<Subscriptions>,
    error_callbacks: Mutex<HashMap<u64, TransportErrorCallback>>,
    next_id: AtomicU64,
    fail_publishes: AtomicBool,
}

impl Bus {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn add_subscription(
        &self,
        connection_id: u64,
        pattern: String,
        group: Option<String>,
    ) -> mpsc::UnboundedReceiver<InboundMessage> {
        let (sender, receiver) = mpsc::unbounded_channel();

        self.subscriptions.lock().entries.push(SubscriptionEntry {
            id: self.next_id(),
            connection_id,
            pattern,
            group,
            sender,
        });

        receiver
    }

    fn remove_connection(&self, connection_id: u64) {
        self.subscriptions
            .lock()
            .entries
            .retain(|entry| entry.connection_id != connection_id);
        self.error_callbacks.lock().remove(&connection_id);
    }

    fn deliver(&self, message: &InboundMessage) -> Result<(), Error> {
        if !is_publishable(&message.subject) {
            return Err(Error::InvalidSubject(message.subject.clone()));
        }

        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(Error::Publish(message.subject.clone()));
        }

        let mut subscriptions = self.subscriptions.lock();
        subscriptions
            .entries
            .retain(|entry| !entry.sender.is_closed());

        let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
        let mut delivered = 0;

        for (index, entry) in subscriptions.entries.iter().enumerate() {
            if !subject_matches_pattern(&message.subject, &entry.pattern) {
                continue;
            }

            match &entry.group {
                Some(group) => groups.entry(group.clone()).or_default().push(index),
                None => {
                    trace!("delivering {} to subscription {}", message.subject, entry.id);
                    if entry.sender.send(message.clone()).is_ok() {
                        delivered += 1;
                    }
                }
            }
        }

        for (group, members) in groups {
            let cursor = subscriptions.group_cursors.entry(group).or_default();
            let index = members[*cursor % members.len()];
            *cursor = cursor.wrapping_add(1);

            if subscriptions.entries[index].sender.send(message.clone()).is_ok() {
                delivered += 1;
            }
        }

        debug!("published to {} ({} deliveries)", message.subject, delivered);

        Ok(())
    }
}

impl Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("subscriptions", &self.subscriptions.lock().entries.len())
            .field("fail_publishes", &self.fail_publishes.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// An in-process publish/subscribe bus.
#[derive(Clone, Debug, Default)]
pub struct MemoryTransport {
    bus: Arc<Bus>,
}

impl MemoryTransport {
    /// Creates a new, empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports a transport error to every open connection.
    pub fn inject_error(&self, message: impl Into<String>) {
        let message = message.into();
        let callbacks: Vec<TransportErrorCallback> =
            self.bus.error_callbacks.lock().values().cloned().collect();

        for callback in callbacks {
            callback(message.clone());
        }
    }

    /// Makes every publish fail (or succeed again).
    pub fn fail_publishes(&self, fail: bool) {
        self.bus.fail_publishes.store(fail, Ordering::SeqCst);
    }

    /// Number of live subscriptions on the bus.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.bus
            .subscriptions
            .lock()
            .entries
            .iter()
            .filter(|entry| !entry.sender.is_closed())
            .count()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    type Error = Error;

    type Connection = MemoryConnection;

    async fn connect(
        &self,
        _servers: &[String],
        name: &str,
        on_error: TransportErrorCallback,
    ) -> Result<MemoryConnection, Error> {
        let id = self.bus.next_id();
        self.bus.error_callbacks.lock().insert(id, on_error);

        debug!("memory connection {} opened for {}", id, name);

        Ok(MemoryConnection::new(id, name.to_string(), Arc::clone(&self.bus)))
    }
}
