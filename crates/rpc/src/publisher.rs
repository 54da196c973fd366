use crate::error::{Error, Result};
use crate::protocol::encode_request;
use crate::service::RpcService;
use crate::transport::{Connection, Transport};

use serde::Serialize;
use tracing::{debug, instrument};

impl<T> RpcService<T>
where
    T: Transport,
{
    /// Publishes `message` to `subject` without expecting a reply.
    ///
    /// Resolves once the transport has accepted the message. This says nothing about whether
    /// anything was subscribed to the subject or whether a handler ran.
    ///
    /// # Errors
    ///
    /// Returns an error without an open connection, if the message cannot be encoded, or if the
    /// transport rejects the publish.
    #[instrument(skip(self, message), fields(service = %self.inner.name))]
    pub async fn publish<M>(&self, subject: &str, message: &M) -> Result<()>
    where
        M: Serialize + Sync + ?Sized,
    {
        let (connection, _) = self.connection().await?;
        let payload = encode_request(message)?;

        debug!("publishing {} bytes to {}", payload.len(), subject);

        connection
            .publish(subject.to_string(), payload)
            .await
            .map_err(Error::transport)?;
        connection.flush().await.map_err(Error::transport)?;

        Ok(())
    }
}
