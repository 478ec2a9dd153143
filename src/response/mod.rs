//! Response-processing layer.
//!
//! Strictly ordered per invocation:
//!
//! ```text
//! TransportOutcome ──► ResponseProcessorNode        connection check
//!                  ──► ResponseHttpErrorProcessorNode  status classification
//!                  ──► ResponseDataPreprocessorNode    204 short-circuit
//!                  ──► ResponseDataParserNode          body decode -> Json
//! ```
//!
//! The data-loading variant swaps the last two stages for
//! [`DataLoadingResponseProcessor`], which returns the body bytes untouched.

pub mod nodes;

pub use nodes::{
    DataLoadingResponseProcessor, ResponseDataParserNode, ResponseDataPreprocessorNode,
    ResponseHttpErrorProcessorNode, ResponseProcessorNode,
};

use crate::{
    error::{BoxError, DecodeError},
    mapping::{wrap_value, Json},
    transport::RawResponse,
};
use serde_json::Value;

/// Maps a server error body into a domain error.
///
/// Returning `None` means "not mine": the next adapter is tried, then the
/// generic status classification applies.
///
/// ```
/// use netnode::response::ErrorMapperAdapter;
/// use netnode::mapping::Json;
/// use netnode::error::BoxError;
///
/// #[derive(Debug, thiserror::Error)]
/// #[error("bad credentials")]
/// struct BadCredentials;
///
/// struct AuthErrors;
///
/// impl ErrorMapperAdapter for AuthErrors {
///     fn map(&self, payload: &Json, status: Option<u16>) -> Option<BoxError> {
///         match (status, payload.get("code").and_then(|c| c.as_str())) {
///             (Some(401), Some("bad_credentials")) => Some(Box::new(BadCredentials)),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait ErrorMapperAdapter: Send + Sync {
    fn map(&self, payload: &Json, status: Option<u16>) -> Option<BoxError>;
}

impl<F> ErrorMapperAdapter for F
where
    F: Fn(&Json, Option<u16>) -> Option<BoxError> + Send + Sync,
{
    fn map(&self, payload: &Json, status: Option<u16>) -> Option<BoxError> {
        self(payload, status)
    }
}

/// Decodes response bytes into a structured value.
///
/// [`JsonCodec`] is the default. Other formats (BSON, MessagePack) plug in
/// by implementing this trait and passing it to
/// [`ChainBuilder::codec`](crate::builder::ChainBuilder::codec).
pub trait PayloadCodec: Send + Sync {
    /// MIME type handled by this codec, for logs.
    fn content_type(&self) -> &str;

    /// Decode a non-empty body.
    fn decode(&self, body: &[u8]) -> Result<Value, DecodeError>;

    /// Decode a body into a payload.
    ///
    /// Empty bodies and `null` are the empty payload; top-level arrays are
    /// wrapped under [`ARRAY_KEY`](crate::mapping::ARRAY_KEY).
    fn decode_payload(&self, body: &[u8]) -> Result<Json, DecodeError> {
        if body.is_empty() {
            return Ok(Json::new());
        }
        let value = self.decode(body)?;
        wrap_value(value).map_err(|e| DecodeError::BadJsonFormat(e.to_string()))
    }
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn content_type(&self) -> &str {
        "application/json"
    }

    fn decode(&self, body: &[u8]) -> Result<Value, DecodeError> {
        serde_json::from_slice(body).map_err(|e| {
            DecodeError::BadJsonFormat(format!(
                "{e}: {}",
                String::from_utf8_lossy(body).chars().take(200).collect::<String>()
            ))
        })
    }
}

/// A decoded response handed to post-processors.
#[derive(Debug, Clone)]
pub struct ProcessedResponse {
    pub response: RawResponse,
    pub json: Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_payload_empty_and_null() {
        assert!(JsonCodec.decode_payload(b"").unwrap().is_empty());
        assert!(JsonCodec.decode_payload(b"null").unwrap().is_empty());
    }

    #[test]
    fn test_decode_payload_wraps_arrays() {
        let json = JsonCodec.decode_payload(br#"[{"id":"1"}]"#).unwrap();
        assert!(json["_array"].is_array());
    }

    #[test]
    fn test_decode_payload_rejects_garbage_and_scalars() {
        assert!(matches!(
            JsonCodec.decode_payload(b"<html>"),
            Err(DecodeError::BadJsonFormat(_))
        ));
        assert!(matches!(
            JsonCodec.decode_payload(b"42"),
            Err(DecodeError::BadJsonFormat(_))
        ));
    }

    #[test]
    fn test_closure_error_mapper() {
        let mapper = |payload: &Json, _status: Option<u16>| -> Option<BoxError> {
            payload.get("code").map(|c| c.to_string().into())
        };
        let mut payload = Json::new();
        payload.insert("code".into(), "x".into());
        assert!(mapper.map(&payload, Some(400)).is_some());
        assert!(mapper.map(&Json::new(), Some(400)).is_none());
    }
}
