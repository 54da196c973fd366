use crate::connection::PendingSlot;
use crate::error::{Error, Result};
use crate::options::RequestOptions;
use crate::protocol::{ReplyDecodeError, ResponseEnvelope, encode_request};
use crate::service::RpcService;
use crate::transport::{Connection, Transport};

use std::sync::atomic::Ordering;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::timeout;
use tracing::{debug, instrument};

impl<T> RpcService<T>
where
    T: Transport,
{
    /// Sends `message` to `subject` and waits for the reply, using the instance's default
    /// timeout.
    ///
    /// # Errors
    ///
    /// See [`request_with_options`](Self::request_with_options).
    pub async fn request<M, R>(&self, subject: &str, message: &M) -> Result<R>
    where
        M: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        self.request_with_options(subject, message, RequestOptions::default())
            .await
    }

    /// Sends `message` to `subject` and waits for exactly one reply.
    ///
    /// # Errors
    ///
    /// - `Error::NotConnected` / `Error::Closed` without an open connection.
    /// - `Error::Serialize` if the message cannot be encoded.
    /// - `Error::Timeout` if no reply arrives in time. No retry is attempted.
    /// - `Error::Remote` if the handler side replied with an error.
    /// - `Error::BadResponsePayload` if the reply cannot be decoded into `R`.
    /// - `Error::Transport` if the request could not be published.
    #[instrument(skip(self, message, options), fields(service = %self.inner.name))]
    pub async fn request_with_options<M, R>(
        &self,
        subject: &str,
        message: &M,
        options: RequestOptions,
    ) -> Result<R>
    where
        M: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let (connection, inbox) = self.connection().await?;
        let payload = encode_request(message)?;
        let request_timeout = options.timeout.unwrap_or(self.inner.options.timeout);

        let request_id = self.inner.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (_slot, receiver) = PendingSlot::register(&self.inner.pending, request_id);

        debug!(
            "sending request {} to {} (pending: {})",
            request_id,
            subject,
            self.inner.pending.len()
        );

        if let Err(e) = connection
            .publish_with_reply(subject.to_string(), format!("{inbox}.{request_id}"), payload)
            .await
        {
            return Err(Error::transport(e));
        }

        let body = match timeout(request_timeout, receiver).await {
            Ok(Ok(body)) => body,
            Ok(Err(_)) => return Err(Error::Closed),
            Err(_) => {
                debug!("request {} to {} timed out", request_id, subject);
                return Err(Error::Timeout {
                    method: subject.to_string(),
                    timeout: request_timeout,
                });
            }
        };

        decode_reply(&body)
    }
}

fn decode_reply<R>(body: &[u8]) -> Result<R>
where
    R: DeserializeOwned,
{
    match ResponseEnvelope::decode(body) {
        Ok(ResponseEnvelope::Payload(value)) => {
            serde_json::from_value(value).map_err(|e| Error::BadResponsePayload(e.to_string()))
        }
        Ok(ResponseEnvelope::Error(message)) => Err(Error::Remote(message)),
        Err(ReplyDecodeError::NotJson(reason) | ReplyDecodeError::NotAnObject(reason)) => {
            Err(Error::BadResponsePayload(reason))
        }
    }
}
