//! Payload encoding into the final [`TransportRequest`].

use super::{
    query::{append_pairs, QueryConfig},
    Metadata, ParametersEncoding, RequestEncodingModel, TransportRequest,
};
use crate::{
    error::{NodeError, Result},
    logging::{LogEntry, LogOrder},
    mapping::Json,
    node::{BoxFut, Node, NodeCtx},
};
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;

const CONTENT_TYPE: &str = "content-type";

/// Encodes the raw payload with the selected [`ParametersEncoding`].
///
/// GET-like methods never carry a body: whatever encoding was selected, their
/// payload is folded into the URL query. The query flattening used for that
/// is the node's [`QueryConfig`] strategies (the config's own `query` is not
/// used here).
pub struct RequestEncodingNode<O> {
    next: Arc<dyn Node<TransportRequest, O>>,
    query: QueryConfig,
}

impl<O> RequestEncodingNode<O> {
    pub fn new(next: Arc<dyn Node<TransportRequest, O>>) -> Self {
        Self {
            next,
            query: QueryConfig::default(),
        }
    }

    /// Use these strategies when folding a payload into the query.
    pub fn with_query_strategies(mut self, query: QueryConfig) -> Self {
        self.query = query;
        self
    }
}

/// Encode one model into a transport request.
pub fn encode_request(
    model: RequestEncodingModel,
    strategies: &QueryConfig,
) -> std::result::Result<TransportRequest, NodeError> {
    let encoding = effective_encoding(&model);
    let RequestEncodingModel {
        method,
        mut url,
        mut headers,
        raw,
        ..
    } = model;

    let body = match encoding {
        ParametersEncoding::UrlQuery => {
            append_pairs(&mut url, &strategies.encode(&raw));
            None
        }
        ParametersEncoding::Json => {
            let body = serde_json::to_vec(&raw).map_err(|e| NodeError::Encoding(e.to_string()))?;
            set_default(&mut headers, "application/json");
            Some(Bytes::from(body))
        }
        ParametersEncoding::FormUrlEncoded => {
            let body = serde_urlencoded::to_string(strategies.encode(&raw))
                .map_err(|e| NodeError::Encoding(e.to_string()))?;
            set_default(&mut headers, "application/x-www-form-urlencoded; charset=utf-8");
            Some(Bytes::from(body))
        }
        ParametersEncoding::Multipart => {
            let boundary = format!("netnode.boundary.{:016x}", fastrand::u64(..));
            let body = multipart_body(&raw, &boundary);
            headers.insert(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            );
            Some(body)
        }
    };

    Ok(TransportRequest {
        method,
        url,
        headers,
        body,
    })
}

fn effective_encoding(model: &RequestEncodingModel) -> ParametersEncoding {
    if model.method.is_get_like() {
        ParametersEncoding::UrlQuery
    } else {
        model.encoding
    }
}

fn set_default(headers: &mut Metadata, content_type: &str) {
    if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, content_type);
    }
}

/// One text part per top-level key. Strings are written as-is, anything else
/// as its JSON text.
fn multipart_body(raw: &Json, boundary: &str) -> Bytes {
    let mut body = String::new();
    for (key, value) in raw {
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        body.push_str(&format!("--{boundary}\r\n"));
        body.push_str(&format!(
            "Content-Disposition: form-data; name=\"{key}\"\r\n\r\n"
        ));
        body.push_str(&text);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{boundary}--\r\n"));
    Bytes::from(body)
}

impl<O> Node<RequestEncodingModel, O> for RequestEncodingNode<O>
where
    O: Send + 'static,
{
    fn name(&self) -> &str {
        "RequestEncodingNode"
    }

    fn process<'a>(
        &'a self,
        input: RequestEncodingModel,
        ctx: &'a NodeCtx,
    ) -> BoxFut<'a, Result<O>> {
        Box::pin(async move {
            ctx.check_cancelled()?;
            let encoding = effective_encoding(&input);
            let mut entry = LogEntry::info(
                self.name(),
                LogOrder::REQUEST_ENCODING_NODE,
                "input: RequestEncodingModel",
            );
            entry.push_line(format!("encoding: {}", input.encoding));
            entry.push_line(format!("raw: {}", Value::Object(input.raw.clone())));

            match encode_request(input, &self.query) {
                Ok(request) => {
                    entry.push_line(format!("type: {encoding}"));
                    ctx.log(entry);
                    self.next.process(request, ctx).await
                }
                Err(e) => {
                    entry.push_line(format!("can't encode data -> terminate with error: {e}"));
                    entry.set_kind(crate::logging::LogKind::Error);
                    ctx.log(entry);
                    Err(e)
                }
            }
        })
    }
}
