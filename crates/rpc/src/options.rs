use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::subject::validate_token;
use crate::{Error, Result};

/// Default time a request waits for its reply.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Options for a service instance.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RpcOptions {
    /// How long requests wait for a reply unless overridden per call.
    #[serde(rename = "timeout_ms", deserialize_with = "deserialize_millis")]
    pub timeout: Duration,

    /// Addresses of the transport servers. An empty list lets the transport pick its default.
    pub servers: Vec<String>,
}

impl Default for RpcOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            servers: Vec::new(),
        }
    }
}

impl RpcOptions {
    /// Set the default request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add a server address.
    #[must_use]
    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.servers.push(server.into());
        self
    }

    /// Set the server addresses.
    #[must_use]
    pub fn servers<I, S>(mut self, servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.servers = servers.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn validate(&self, service_name: &str) -> Result<()> {
        validate_token(service_name)
            .map_err(|e| Error::Configuration(format!("service name: {e}")))?;

        if self.timeout.is_zero() {
            return Err(Error::Configuration(
                "timeout must be greater than zero".to_string(),
            ));
        }

        if self.servers.iter().any(|server| server.trim().is_empty()) {
            return Err(Error::Configuration(
                "server addresses must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn deserialize_millis<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

/// Per-request options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Overrides the instance's default timeout for this request.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Options with the given timeout.
    #[must_use]
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}
