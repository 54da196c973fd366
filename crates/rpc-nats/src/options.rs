use std::time::Duration;

/// Server used when a service is configured without any.
pub const DEFAULT_SERVER: &str = "nats://127.0.0.1:4222";

/// Options for the NATS transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NatsTransportOptions {
    /// How long to wait for the initial connection.
    pub connection_timeout: Duration,

    /// Server to connect to when a service lists none.
    pub default_server: String,
}

impl Default for NatsTransportOptions {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(5),
            default_server: DEFAULT_SERVER.to_string(),
        }
    }
}
