//! Request/response RPC and fire-and-forget publishing over a publish/subscribe bus.
//!
//! A service instance is identified by its name, which doubles as the subject namespace of its
//! methods (`<service>.<method>`) and as the queue group shared by every instance of the service.
//!
//! ```no_run
//! use proven_rpc::{HandlerBindings, RpcOptions, RpcService, Transport};
//! use serde_json::{Value, json};
//!
//! async fn example<T: Transport>(transport: T) -> Result<(), proven_rpc::Error> {
//!     let service = RpcService::new(transport.clone(), "math", RpcOptions::default())?;
//!     service
//!         .expose(HandlerBindings::new().bind_typed("double", |n: i64| async move {
//!             Ok::<_, proven_rpc::HandlerError>(n * 2)
//!         }))
//!         .await?;
//!
//!     let caller = RpcService::new(transport, "caller", RpcOptions::default())?;
//!     caller.connect().await?;
//!     let doubled: Value = caller.request("math.double", &json!(21)).await?;
//!     assert_eq!(doubled, json!(42));
//!
//!     Ok(())
//! }
//! ```
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod client;
mod connection;
mod error;
mod event;
mod publisher;
mod service;

/// Method handlers and their bindings.
pub mod handler;

/// Construction options.
pub mod options;

/// JSON envelopes carried on the wire.
pub mod protocol;

/// Subject naming and parsing.
pub mod subject;

/// The publish/subscribe transport consumed by services.
pub mod transport;

pub use error::{Error, Result};
pub use event::ErrorEvent;
pub use handler::{Handler, HandlerBindings, HandlerError};
pub use options::{RequestOptions, RpcOptions};
pub use service::RpcService;
pub use transport::{Connection, InboundMessage, InboundStream, Transport, TransportError};
