//! NATS implementation of the RPC transport.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod connection;
mod error;
mod options;

pub use connection::NatsConnection;
pub use error::Error;
pub use options::{DEFAULT_SERVER, NatsTransportOptions};

use std::sync::Arc;

use async_nats::{ConnectOptions, Event, ServerAddr};
use async_trait::async_trait;
use proven_rpc::Transport;
use proven_rpc::transport::TransportErrorCallback;
use tracing::{debug, info, warn};

/// Opens connections to a NATS cluster.
#[derive(Clone, Debug, Default)]
pub struct NatsTransport {
    options: NatsTransportOptions,
}

impl NatsTransport {
    /// Creates a transport with the given options.
    #[must_use]
    pub const fn new(options: NatsTransportOptions) -> Self {
        Self { options }
    }

    /// The options the transport was created with.
    #[must_use]
    pub const fn options(&self) -> &NatsTransportOptions {
        &self.options
    }
}

#[async_trait]
impl Transport for NatsTransport {
    type Error = Error;

    type Connection = NatsConnection;

    async fn connect(
        &self,
        servers: &[String],
        name: &str,
        on_error: TransportErrorCallback,
    ) -> Result<NatsConnection, Error> {
        let addrs = parse_servers(servers, &self.options.default_server)?;

        let connect_options = ConnectOptions::new()
            .name(name)
            .connection_timeout(self.options.connection_timeout)
            .event_callback(move |event| {
                let on_error = Arc::clone(&on_error);
                async move { report_event(&event, on_error.as_ref()) }
            });

        let client = async_nats::connect_with_options(addrs.as_slice(), connect_options)
            .await
            .map_err(|e| Error::Connect(e.to_string()))?;

        info!("connected to nats as {}", name);

        Ok(NatsConnection::new(client))
    }
}

fn report_event(event: &Event, on_error: &(dyn Fn(String) + Send + Sync)) {
    match event {
        Event::ServerError(e) => on_error(format!("server error: {e}")),
        Event::ClientError(e) => on_error(format!("client error: {e}")),
        Event::SlowConsumer(sid) => on_error(format!("slow consumer on subscription {sid}")),
        Event::Disconnected => warn!("disconnected from nats"),
        other => debug!("nats event: {}", other),
    }
}

/// Parses server addresses, falling back to `default_server` for an empty list.
fn parse_servers(servers: &[String], default_server: &str) -> Result<Vec<ServerAddr>, Error> {
    if servers.is_empty() {
        return parse_server(default_server).map(|addr| vec![addr]);
    }

    servers.iter().map(|server| parse_server(server)).collect()
}

fn parse_server(server: &str) -> Result<ServerAddr, Error> {
    server
        .parse::<ServerAddr>()
        .map_err(|e| Error::InvalidServer(server.to_string(), e.to_string()))
}
