use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::subject::validate_token;
use crate::{Error, Result};

/// The reason a handler failed.
#[derive(Clone, Debug, PartialEq)]
pub enum HandlerError {
    /// A message, optionally accompanied by structured details.
    Message {
        /// Human readable description.
        message: String,
        /// Further structured information.
        details: Option<Value>,
    },

    /// Plain text.
    Text(String),

    /// An arbitrary JSON value.
    Value(Value),
}

impl HandlerError {
    /// Creates an error carrying a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
            details: None,
        }
    }

    /// Creates an error carrying a message and structured details.
    pub fn with_details(message: impl Into<String>, details: impl Into<Value>) -> Self {
        Self::Message {
            message: message.into(),
            details: Some(details.into()),
        }
    }

    /// The text sent back to the caller.
    ///
    /// Details are appended only when they carry information: `null`, `{}` and `[]` are dropped.
    #[must_use]
    pub fn reply_message(&self) -> String {
        match self {
            Self::Message {
                message,
                details: Some(details),
            } if !is_trivial(details) => format!("{message} {details}"),
            Self::Message { message, .. } | Self::Text(message) => message.clone(),
            Self::Value(value) => value.to_string(),
        }
    }
}

fn is_trivial(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(fields) => fields.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reply_message())
    }
}

impl std::error::Error for HandlerError {}

impl From<String> for HandlerError {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for HandlerError {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Value> for HandlerError {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(error: serde_json::Error) -> Self {
        Self::message(error.to_string())
    }
}

/// Handles calls to one exposed method.
///
/// `args` is `None` when the request carried no body.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Handles one call.
    async fn call(&self, args: Option<Value>) -> std::result::Result<Value, HandlerError>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Value, HandlerError>> + Send + 'static,
{
    async fn call(&self, args: Option<Value>) -> std::result::Result<Value, HandlerError> {
        self(args).await
    }
}

/// The methods a service exposes, keyed by method name.
#[derive(Clone, Default)]
pub struct HandlerBindings {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl fmt::Debug for HandlerBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerBindings")
            .field("methods", &self.methods())
            .finish()
    }
}

impl HandlerBindings {
    /// Creates an empty set of bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a handler working on raw JSON values.
    #[must_use]
    pub fn bind<H>(mut self, method: impl Into<String>, handler: H) -> Self
    where
        H: Handler,
    {
        self.handlers.insert(method.into(), Arc::new(handler));
        self
    }

    /// Binds a handler working on typed arguments and results.
    ///
    /// Absent arguments are deserialized from `null`, so `A` may be `()` or an `Option`.
    #[must_use]
    pub fn bind_typed<A, R, F, Fut>(self, method: impl Into<String>, handler: F) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, HandlerError>> + Send + 'static,
    {
        let handler = Arc::new(handler);

        self.bind(method, move |args: Option<Value>| {
            let handler = Arc::clone(&handler);
            async move {
                let args: A = serde_json::from_value(args.unwrap_or(Value::Null)).map_err(|e| {
                    HandlerError::with_details("Invalid arguments", e.to_string())
                })?;
                let result = handler(args).await?;
                Ok::<_, HandlerError>(serde_json::to_value(result)?)
            }
        })
    }

    /// Returns the handler bound to `method`.
    #[must_use]
    pub fn get(&self, method: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(method).cloned()
    }

    /// Names of all bound methods, sorted.
    #[must_use]
    pub fn methods(&self) -> Vec<&str> {
        let mut methods: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        methods.sort_unstable();
        methods
    }

    /// Number of bound methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no methods are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Checks every method name can be addressed as a single subject segment.
    pub(crate) fn validate(&self) -> Result<()> {
        for method in self.handlers.keys() {
            validate_token(method)
                .map_err(|e| Error::HandlerContract(format!("method {method:?}: {e}")))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn test_reply_message_derivation() {
        assert_eq!(HandlerError::message("boom").reply_message(), "boom");
        assert_eq!(HandlerError::from("plain").reply_message(), "plain");
        assert_eq!(
            HandlerError::with_details("boom", json!({"code": 42})).reply_message(),
            r#"boom {"code":42}"#
        );
        assert_eq!(
            HandlerError::from(json!({"code": 42})).reply_message(),
            r#"{"code":42}"#
        );
    }

    #[test]
    fn test_trivial_details_are_dropped() {
        for details in [Value::Null, json!({}), json!([])] {
            assert_eq!(
                HandlerError::with_details("boom", details).reply_message(),
                "boom"
            );
        }
    }

    #[tokio::test]
    async fn test_closure_handler() {
        let bindings = HandlerBindings::new().bind("echo", |args: Option<Value>| async move {
            Ok::<_, HandlerError>(args.unwrap_or(Value::Null))
        });

        let handler = bindings.get("echo").unwrap();
        assert_eq!(handler.call(Some(json!([1]))).await, Ok(json!([1])));
        assert_eq!(handler.call(None).await, Ok(Value::Null));
        assert!(bindings.get("missing").is_none());
    }

    #[tokio::test]
    async fn test_typed_handler() {
        let bindings = HandlerBindings::new()
            .bind_typed("add", |(a, b): (i64, i64)| async move {
                Ok::<_, HandlerError>(a + b)
            })
            .bind_typed("ping", |(): ()| async move { Ok::<_, HandlerError>("pong") });

        let add = bindings.get("add").unwrap();
        assert_eq!(add.call(Some(json!([2, 3]))).await, Ok(json!(5)));
        assert_matches!(
            add.call(Some(json!("nope"))).await,
            Err(HandlerError::Message { message, .. }) if message == "Invalid arguments"
        );

        let ping = bindings.get("ping").unwrap();
        assert_eq!(ping.call(None).await, Ok(json!("pong")));
    }

    #[test]
    fn test_validate_rejects_unaddressable_methods() {
        let noop = |_: Option<Value>| async { Ok::<_, HandlerError>(Value::Null) };

        assert!(HandlerBindings::new().bind("ok", noop).validate().is_ok());
        assert_matches!(
            HandlerBindings::new().bind("a.b", noop).validate(),
            Err(Error::HandlerContract(_))
        );
        assert_matches!(
            HandlerBindings::new().bind("", noop).validate(),
            Err(Error::HandlerContract(_))
        );
    }

    #[test]
    fn test_methods_are_sorted() {
        let noop = |_: Option<Value>| async { Ok::<_, HandlerError>(Value::Null) };
        let bindings = HandlerBindings::new().bind("b", noop).bind("a", noop);

        assert_eq!(bindings.methods(), vec!["a", "b"]);
        assert_eq!(bindings.len(), 2);
        assert!(!bindings.is_empty());
    }
}
