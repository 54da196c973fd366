use crate::error::{Error, Result};
use crate::event::ErrorEvent;
use crate::service::RpcService;
use crate::transport::{Connection, InboundStream, Transport, TransportErrorCallback};

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use futures::StreamExt;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Requests awaiting their reply, keyed by the token at the end of their reply subject.
pub(crate) type PendingReplies = Arc<DashMap<u64, oneshot::Sender<Bytes>>>;

/// A registered reply slot. The slot is released on drop, so a request that is abandoned by its
/// caller does not leave an entry behind.
pub(crate) struct PendingSlot {
    pending: PendingReplies,
    request_id: u64,
}

impl PendingSlot {
    pub(crate) fn register(
        pending: &PendingReplies,
        request_id: u64,
    ) -> (Self, oneshot::Receiver<Bytes>) {
        let (sender, receiver) = oneshot::channel();
        pending.insert(request_id, sender);

        let slot = Self {
            pending: Arc::clone(pending),
            request_id,
        };

        (slot, receiver)
    }
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        self.pending.remove(&self.request_id);
    }
}

/// Lifecycle of the transport connection owned by a service instance.
#[derive(Debug)]
pub(crate) enum ConnectionState<C> {
    Uninitialized,
    Connected { connection: C, inbox: String },
    Closed,
}

impl<T> RpcService<T>
where
    T: Transport,
{
    /// Establishes the transport connection if none exists yet.
    ///
    /// Transport errors reported after this point are emitted on the error stream as
    /// [`ErrorEvent::Transport`].
    ///
    /// # Errors
    ///
    /// Returns an error if the instance was closed or the transport fails to connect.
    pub async fn connect(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;

        match &*state {
            ConnectionState::Connected { .. } => return Ok(()),
            ConnectionState::Closed => return Err(Error::Closed),
            ConnectionState::Uninitialized => {}
        }

        let service = self.inner.name.clone();
        let events = self.inner.events.clone();
        let on_error: TransportErrorCallback = Arc::new(move |message: String| {
            warn!("transport error on {}: {}", service, message);
            let _ = events.send(ErrorEvent::Transport(message));
        });

        let connection = self
            .inner
            .transport
            .connect(&self.inner.options.servers, &self.inner.name, on_error)
            .await
            .map_err(Error::transport)?;

        let inbox = connection.new_inbox();
        let replies = connection
            .subscribe(format!("{inbox}.*"))
            .await
            .map_err(Error::transport)?;

        spawn_reply_router(
            replies,
            Arc::clone(&self.inner.pending),
            self.inner.shutdown.child_token(),
        );

        info!("{} connected (replies on {})", self.inner.name, inbox);
        *state = ConnectionState::Connected { connection, inbox };

        Ok(())
    }

    /// Terminates the transport connection.
    ///
    /// Requests still in flight are not drained; they settle through their own timeouts.
    /// Closing is idempotent, but a closed instance cannot connect again.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails to close the connection.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        let previous = std::mem::replace(&mut *state, ConnectionState::Closed);
        self.inner.shutdown.cancel();

        if let ConnectionState::Connected { connection, .. } = previous {
            info!("closing connection for {}", self.inner.name);
            connection.close().await.map_err(Error::transport)?;
        }

        Ok(())
    }

    /// Whether the instance currently holds an open connection.
    pub async fn is_connected(&self) -> bool {
        matches!(
            &*self.inner.state.lock().await,
            ConnectionState::Connected { .. }
        )
    }

    /// The open connection and the instance's reply inbox.
    pub(crate) async fn connection(&self) -> Result<(T::Connection, String)> {
        match &*self.inner.state.lock().await {
            ConnectionState::Connected { connection, inbox } => {
                Ok((connection.clone(), inbox.clone()))
            }
            ConnectionState::Uninitialized => Err(Error::NotConnected),
            ConnectionState::Closed => Err(Error::Closed),
        }
    }
}

/// Routes replies arriving on the inbox to the request waiting for them.
///
/// Each slot is removed on first delivery, so a request observes at most one reply and replies
/// for requests that already timed out are dropped.
fn spawn_reply_router(
    mut replies: InboundStream,
    pending: PendingReplies,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                reply = replies.next() => {
                    let Some(reply) = reply else {
                        break;
                    };

                    let Some(request_id) = reply
                        .subject
                        .rsplit_once('.')
                        .and_then(|(_, token)| token.parse::<u64>().ok())
                    else {
                        warn!("reply on unexpected subject {}", reply.subject);
                        continue;
                    };

                    match pending.remove(&request_id) {
                        Some((_, sender)) => {
                            let _ = sender.send(reply.payload);
                        }
                        None => trace!("dropping reply for settled request {}", request_id),
                    }
                }
            }
        }

        debug!("reply router stopped");
    });
}
