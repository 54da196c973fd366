use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reply text sent when a request body is not valid JSON.
pub const BAD_JSON_REQUEST: &str = "Bad JSON request";

/// Reply text sent when no handler is bound for the requested method.
#[must_use]
pub fn method_not_found(method: &str) -> String {
    format!("Method not found \"{method}\"")
}

/// Reply text sent when the subject does not name a method.
#[must_use]
pub fn invalid_subject(subject: &str) -> String {
    format!("Invalid subject \"{subject}\"")
}

/// The outcome of a request as carried on the reply subject.
///
/// Serializes as `{"payload": ...}` or `{"error": "..."}`, never both.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseEnvelope {
    /// The handler succeeded with this value.
    Payload(Value),

    /// The request failed with this message.
    Error(String),
}

/// Why a reply body could not be turned into an envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplyDecodeError {
    /// The body is not JSON.
    NotJson(String),

    /// The body is JSON but not an object.
    NotAnObject(String),
}

impl ResponseEnvelope {
    /// Encodes the envelope as JSON.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        // An enum of a JSON value or a string always serializes.
        serde_json::to_vec(self).map_or_else(|_| Bytes::new(), Bytes::from)
    }

    /// Decodes a reply body.
    ///
    /// An empty body is a success without payload. A present, non-null `error` field takes
    /// precedence over `payload`; a missing `payload` decodes as `null`.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not JSON or is JSON but not an object.
    pub fn decode(body: &[u8]) -> Result<Self, ReplyDecodeError> {
        if body.is_empty() {
            return Ok(Self::Payload(Value::Null));
        }

        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ReplyDecodeError::NotJson(e.to_string()))?;

        let Value::Object(mut fields) = value else {
            return Err(ReplyDecodeError::NotAnObject(value.to_string()));
        };

        match fields.remove("error") {
            Some(Value::String(message)) => Ok(Self::Error(message)),
            Some(Value::Null) | None => Ok(Self::Payload(
                fields.remove("payload").unwrap_or(Value::Null),
            )),
            Some(other) => Ok(Self::Error(other.to_string())),
        }
    }
}

/// Encodes request arguments.
///
/// Arguments that serialize to `null` are sent as an empty body, meaning "no arguments".
///
/// # Errors
///
/// Returns an error if the message cannot be serialized.
pub fn encode_request<M>(message: &M) -> Result<Bytes, serde_json::Error>
where
    M: Serialize + ?Sized,
{
    let value = serde_json::to_value(message)?;

    if value.is_null() {
        return Ok(Bytes::new());
    }

    serde_json::to_vec(&value).map(Bytes::from)
}

/// Decodes request arguments. An empty body means no arguments.
///
/// # Errors
///
/// Returns an error if a non-empty body is not valid JSON.
pub fn decode_request(body: &[u8]) -> Result<Option<Value>, serde_json::Error> {
    if body.is_empty() {
        return Ok(None);
    }

    serde_json::from_slice(body).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_envelope_wire_format() {
        assert_eq!(
            ResponseEnvelope::Payload(json!({"sum": 3})).to_bytes(),
            Bytes::from_static(br#"{"payload":{"sum":3}}"#)
        );
        assert_eq!(
            ResponseEnvelope::Error(BAD_JSON_REQUEST.to_string()).to_bytes(),
            Bytes::from_static(br#"{"error":"Bad JSON request"}"#)
        );
    }

    #[test]
    fn test_decode_payload_and_error() {
        assert_eq!(
            ResponseEnvelope::decode(br#"{"payload":[1,2]}"#),
            Ok(ResponseEnvelope::Payload(json!([1, 2])))
        );
        assert_eq!(
            ResponseEnvelope::decode(br#"{"error":"boom"}"#),
            Ok(ResponseEnvelope::Error("boom".to_string()))
        );
        assert_eq!(
            ResponseEnvelope::decode(br#"{"error":{"code":7},"payload":1}"#),
            Ok(ResponseEnvelope::Error(r#"{"code":7}"#.to_string()))
        );
    }

    #[test]
    fn test_decode_absent_payload() {
        assert_eq!(
            ResponseEnvelope::decode(b""),
            Ok(ResponseEnvelope::Payload(Value::Null))
        );
        assert_eq!(
            ResponseEnvelope::decode(b"{}"),
            Ok(ResponseEnvelope::Payload(Value::Null))
        );
        assert_eq!(
            ResponseEnvelope::decode(br#"{"error":null,"payload":"ok"}"#),
            Ok(ResponseEnvelope::Payload(json!("ok")))
        );
    }

    #[test]
    fn test_decode_rejects_non_objects() {
        assert!(matches!(
            ResponseEnvelope::decode(b"not json"),
            Err(ReplyDecodeError::NotJson(_))
        ));
        for body in [&b"null"[..], b"false", b"0", b"\"text\"", b"[]"] {
            assert!(matches!(
                ResponseEnvelope::decode(body),
                Err(ReplyDecodeError::NotAnObject(_))
            ));
        }
    }

    #[test]
    fn test_request_encoding() {
        assert_eq!(encode_request(&()).unwrap(), Bytes::new());
        assert_eq!(encode_request(&None::<u8>).unwrap(), Bytes::new());
        assert_eq!(
            encode_request(&json!({"a": 1})).unwrap(),
            Bytes::from_static(br#"{"a":1}"#)
        );

        assert_eq!(decode_request(b"").unwrap(), None);
        assert_eq!(decode_request(b"[1]").unwrap(), Some(json!([1])));
        assert!(decode_request(b"not json").is_err());
    }

    #[test]
    fn test_reply_texts() {
        assert_eq!(method_not_found("missing"), "Method not found \"missing\"");
        assert_eq!(invalid_subject("math"), "Invalid subject \"math\"");
    }
}
