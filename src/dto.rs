//! Model mapping at the edges of a chain.

use crate::{
    error::{DecodeError, NodeError, Result},
    logging::{LogEntry, LogOrder},
    mapping::{Json, RawDecodable, RawEncodable},
    node::{BoxFut, Node, NodeCtx},
};
use std::marker::PhantomData;
use std::sync::Arc;

/// Converts the input model to a payload, runs `next`, and converts the
/// resulting payload into the output model.
///
/// Mapping failures become [`DecodeError::CantMapObjectToRaw`] /
/// [`DecodeError::CantMapObjectFromRaw`] with the mapping error kept as the
/// source, and are the only thing this node logs.
pub struct DtoMapperNode<I, O> {
    next: Arc<dyn Node<Json, Json>>,
    _marker: PhantomData<fn(I) -> O>,
}

impl<I, O> DtoMapperNode<I, O> {
    pub fn new(next: Arc<dyn Node<Json, Json>>) -> Self {
        Self {
            next,
            _marker: PhantomData,
        }
    }

    fn fail(&self, ctx: &NodeCtx, err: DecodeError) -> NodeError {
        ctx.log(LogEntry::error(
            "DtoMapperNode",
            LogOrder::DTO_MAPPER_NODE,
            err.to_string(),
        ));
        err.into()
    }
}

impl<I, O> Node<I, O> for DtoMapperNode<I, O>
where
    I: RawEncodable + Send + 'static,
    O: RawDecodable + Send + 'static,
{
    fn name(&self) -> &str {
        "DtoMapperNode"
    }

    fn process<'a>(&'a self, input: I, ctx: &'a NodeCtx) -> BoxFut<'a, Result<O>> {
        Box::pin(async move {
            ctx.check_cancelled()?;
            let raw = input
                .to_raw()
                .map_err(|e| self.fail(ctx, DecodeError::CantMapObjectToRaw(e)))?;

            let result = self.next.process(raw, ctx).await?;
            ctx.check_cancelled()?;

            O::from_raw(result).map_err(|e| self.fail(ctx, DecodeError::CantMapObjectFromRaw(e)))
        })
    }
}

/// Converts the input model to a payload and runs `next` with it.
///
/// Used where the output is not a payload, such as data-loading chains.
pub struct RawEncoderNode<I, O> {
    next: Arc<dyn Node<Json, O>>,
    _marker: PhantomData<fn(I)>,
}

impl<I, O> RawEncoderNode<I, O> {
    pub fn new(next: Arc<dyn Node<Json, O>>) -> Self {
        Self {
            next,
            _marker: PhantomData,
        }
    }
}

impl<I, O> Node<I, O> for RawEncoderNode<I, O>
where
    I: RawEncodable + Send + 'static,
    O: Send + 'static,
{
    fn name(&self) -> &str {
        "RawEncoderNode"
    }

    fn process<'a>(&'a self, input: I, ctx: &'a NodeCtx) -> BoxFut<'a, Result<O>> {
        Box::pin(async move {
            ctx.check_cancelled()?;
            let raw = match input.to_raw() {
                Ok(raw) => raw,
                Err(e) => {
                    let err = DecodeError::CantMapObjectToRaw(e);
                    ctx.log(LogEntry::error(
                        self.name(),
                        LogOrder::RAW_ENCODER_NODE,
                        err.to_string(),
                    ));
                    return Err(err.into());
                }
            };
            self.next.process(raw, ctx).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MappingError;
    use crate::mapping::{from_raw_via_serde, to_raw_via_serde};
    use crate::node::FnNode;
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Login {
        user: String,
    }

    impl RawEncodable for Login {
        fn to_raw(&self) -> std::result::Result<Json, MappingError> {
            to_raw_via_serde(self)
        }
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Token {
        token: String,
    }

    impl RawDecodable for Token {
        fn from_raw(raw: Json) -> std::result::Result<Self, MappingError> {
            from_raw_via_serde(raw)
        }
    }

    struct Broken;

    impl RawEncodable for Broken {
        fn to_raw(&self) -> std::result::Result<Json, MappingError> {
            Err(MappingError::Custom("nope".into()))
        }
    }

    fn echo_token() -> Arc<dyn Node<Json, Json>> {
        Arc::new(FnNode::new("server", |raw: Json| async move {
            let mut out = Json::new();
            out.insert("token".into(), Value::String(format!("t-{}", raw["user"].as_str().unwrap_or(""))));
            Ok(out)
        }))
    }

    #[tokio::test]
    async fn test_maps_both_directions() {
        let node: DtoMapperNode<Login, Token> = DtoMapperNode::new(echo_token());
        let ctx = NodeCtx::new();
        let out = node
            .process(Login { user: "neo".into() }, &ctx)
            .await
            .unwrap();
        assert_eq!(out, Token { token: "t-neo".into() });
        assert!(ctx.logging().is_empty());
    }

    #[tokio::test]
    async fn test_decode_failure_keeps_source() {
        let empty: Arc<dyn Node<Json, Json>> =
            Arc::new(FnNode::new("server", |_: Json| async move { Ok(Json::new()) }));
        let node: DtoMapperNode<Login, Token> = DtoMapperNode::new(empty);
        let ctx = NodeCtx::new();
        let err = node.process(Login { user: "x".into() }, &ctx).await.unwrap_err();
        match err {
            NodeError::Decode(DecodeError::CantMapObjectFromRaw(MappingError::Codec(_))) => {}
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(ctx.logging().len(), 1);
    }

    #[tokio::test]
    async fn test_encode_failure_skips_next() {
        let node: DtoMapperNode<Broken, Json> = DtoMapperNode::new(echo_token());
        let err = node.process(Broken, &NodeCtx::new()).await.unwrap_err();
        assert!(matches!(
            err,
            NodeError::Decode(DecodeError::CantMapObjectToRaw(MappingError::Custom(_)))
        ));
    }

    #[tokio::test]
    async fn test_raw_encoder_forwards_payload() {
        let next: Arc<dyn Node<Json, String>> = Arc::new(FnNode::new("s", |raw: Json| async move {
            Ok(Value::Object(raw).to_string())
        }));
        let node: RawEncoderNode<Login, String> = RawEncoderNode::new(next);
        let out = node.process(Login { user: "a".into() }, &NodeCtx::new()).await.unwrap();
        assert_eq!(out, json!({ "user": "a" }).to_string());
    }
}
