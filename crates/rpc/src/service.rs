use crate::connection::{ConnectionState, PendingReplies};
use crate::error::{Error, Result};
use crate::event::ErrorEvent;
use crate::handler::HandlerBindings;
use crate::options::RpcOptions;
use crate::protocol::{
    BAD_JSON_REQUEST, ResponseEnvelope, decode_request, invalid_subject, method_not_found,
};
use crate::subject::{MethodSubject, service_wildcard};
use crate::transport::{Connection, InboundMessage, Transport};

use std::fmt::{self, Debug};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use futures::{FutureExt, StreamExt};
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Capacity of the error event channel; slow subscribers miss the oldest events.
const ERROR_EVENT_CAPACITY: usize = 256;

pub(crate) struct Inner<T>
where
    T: Transport,
{
    pub(crate) name: String,
    pub(crate) options: RpcOptions,
    pub(crate) transport: T,
    pub(crate) state: Mutex<ConnectionState<T::Connection>>,
    pub(crate) pending: PendingReplies,
    pub(crate) next_request_id: AtomicU64,
    pub(crate) events: broadcast::Sender<ErrorEvent>,
    pub(crate) exposed: AtomicBool,
    pub(crate) shutdown: CancellationToken,
}

/// A service instance: exposes methods, sends requests and publishes messages over one
/// lazily established transport connection.
pub struct RpcService<T>
where
    T: Transport,
{
    pub(crate) inner: Arc<Inner<T>>,
}

impl<T> Clone for RpcService<T>
where
    T: Transport,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for RpcService<T>
where
    T: Transport,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcService")
            .field("name", &self.inner.name)
            .field("options", &self.inner.options)
            .field("transport", &self.inner.transport)
            .finish_non_exhaustive()
    }
}

impl<T> RpcService<T>
where
    T: Transport,
{
    /// Creates a service instance. No connection is made until [`connect`](Self::connect) or
    /// [`expose`](Self::expose).
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the name cannot be used as a subject segment and queue
    /// group, or the options are invalid.
    pub fn new(transport: T, name: impl Into<String>, options: RpcOptions) -> Result<Self> {
        let name = name.into();
        options.validate(&name)?;

        let (events, _) = broadcast::channel(ERROR_EVENT_CAPACITY);

        Ok(Self {
            inner: Arc::new(Inner {
                name,
                options,
                transport,
                state: Mutex::new(ConnectionState::Uninitialized),
                pending: Arc::new(DashMap::new()),
                next_request_id: AtomicU64::new(0),
                events,
                exposed: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
            }),
        })
    }

    /// The service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The options the instance was created with.
    #[must_use]
    pub fn options(&self) -> &RpcOptions {
        &self.inner.options
    }

    /// Number of requests from this instance still waiting for a reply.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.len()
    }

    /// Subscribes to errors observed by this instance: transport failures and every fault met
    /// while serving requests.
    #[must_use]
    pub fn subscribe_errors(&self) -> broadcast::Receiver<ErrorEvent> {
        self.inner.events.subscribe()
    }

    /// Serves the given methods on `<name>.<method>`.
    ///
    /// Connects if needed, then subscribes to `<name>.>` in queue group `<name>`, so each call is
    /// handled by exactly one of the instances sharing the name. Bindings are fixed for the
    /// lifetime of the instance.
    ///
    /// # Errors
    ///
    /// Returns `Error::HandlerContract` for method names that cannot be addressed,
    /// `Error::AlreadyExposed` on a second call, or a connection error.
    #[instrument(skip(self, bindings), fields(service = %self.inner.name))]
    pub async fn expose(&self, bindings: HandlerBindings) -> Result<()> {
        bindings.validate()?;

        if self.inner.exposed.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyExposed);
        }

        let result = self.start_exposer(bindings).await;
        if result.is_err() {
            self.inner.exposed.store(false, Ordering::SeqCst);
        }

        result
    }

    async fn start_exposer(&self, bindings: HandlerBindings) -> Result<()> {
        self.connect().await?;
        let (connection, _) = self.connection().await?;

        let subject = service_wildcard(&self.inner.name);
        let mut messages = connection
            .queue_subscribe(subject.clone(), self.inner.name.clone())
            .await
            .map_err(Error::transport)?;

        info!(
            "exposing {:?} on {} (group {})",
            bindings.methods(),
            subject,
            self.inner.name
        );

        let dispatcher = Arc::new(Dispatcher {
            connection,
            bindings,
            events: self.inner.events.clone(),
        });
        let shutdown = self.inner.shutdown.child_token();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    message = messages.next() => {
                        let Some(message) = message else {
                            break;
                        };

                        let dispatcher = Arc::clone(&dispatcher);
                        tokio::spawn(async move {
                            let subject = message.subject.clone();

                            if AssertUnwindSafe(dispatcher.dispatch(message))
                                .catch_unwind()
                                .await
                                .is_err()
                            {
                                error!("handler panicked while serving {}", subject);
                                dispatcher.emit(ErrorEvent::HandlerPanicked { subject });
                            }
                        });
                    }
                }
            }

            debug!("stopped serving {}", subject);
        });

        Ok(())
    }
}

/// Routes inbound calls to their handlers and publishes the outcome.
struct Dispatcher<C> {
    connection: C,
    bindings: HandlerBindings,
    events: broadcast::Sender<ErrorEvent>,
}

impl<C> Dispatcher<C>
where
    C: Connection,
{
    async fn dispatch(&self, message: InboundMessage) {
        let InboundMessage {
            subject,
            reply,
            payload,
        } = message;

        let method = match MethodSubject::parse(&subject) {
            Ok(parsed) => parsed.method().to_string(),
            Err(e) => {
                warn!("invalid subject {}: {}", subject, e);
                self.emit(ErrorEvent::InvalidSubject {
                    subject: subject.clone(),
                    reason: e.to_string(),
                });
                self.reply_error(reply, invalid_subject(&subject)).await;
                return;
            }
        };

        let Some(handler) = self.bindings.get(&method) else {
            debug!("no handler for {} ({})", method, subject);
            self.emit(ErrorEvent::MethodNotFound {
                subject,
                method: method.clone(),
            });
            self.reply_error(reply, method_not_found(&method)).await;
            return;
        };

        let args = match decode_request(&payload) {
            Ok(args) => args,
            Err(e) => {
                debug!("bad request payload on {}: {}", subject, e);
                self.emit(ErrorEvent::BadRequestPayload {
                    subject,
                    reason: e.to_string(),
                });
                self.reply_error(reply, BAD_JSON_REQUEST.to_string()).await;
                return;
            }
        };

        let Some(reply) = reply else {
            // Nobody is waiting for the outcome, failures included.
            let _ = handler.call(args).await;
            return;
        };

        match handler.call(args).await {
            Ok(value) => self.respond(reply, ResponseEnvelope::Payload(value)).await,
            Err(e) => {
                error!("handler for {} failed: {}", method, e);
                let message = e.reply_message();
                self.emit(ErrorEvent::HandlerRejection { method, error: e });
                self.respond(reply, ResponseEnvelope::Error(message)).await;
            }
        }
    }

    async fn reply_error(&self, reply: Option<String>, message: String) {
        if let Some(reply) = reply {
            self.respond(reply, ResponseEnvelope::Error(message)).await;
        }
    }

    async fn respond(&self, reply: String, envelope: ResponseEnvelope) {
        if let Err(e) = self
            .connection
            .publish(reply.clone(), envelope.to_bytes())
            .await
        {
            warn!("failed to publish reply to {}: {}", reply, e);
            self.emit(ErrorEvent::ReplyFailed {
                reply,
                reason: e.to_string(),
            });
        }
    }

    fn emit(&self, event: ErrorEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
