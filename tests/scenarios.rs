//! End-to-end chain scenarios against a mock transport.

use netnode::error::{BoxError, HttpStatusError, MappingError, NodeError};
use netnode::mapping::{from_raw_via_serde, to_raw_via_serde, Json, RawDecodable, RawEncodable};
use netnode::{
    ChainBuilder, ChainPageProvider, LogKind, LogOrder, Method, MockReply, MockTransport,
    OffsetPage, Pager, ParametersEncoding, UrlRoute,
};
use serde::{Deserialize, Serialize};
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

const BASE: &str = "http://api.test";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct User {
    id: String,
    first_name: String,
    last_name: String,
}

impl RawDecodable for User {
    fn from_raw(raw: Json) -> Result<Self, MappingError> {
        from_raw_via_serde(raw)
    }
}

#[derive(Debug, Serialize)]
struct Credentials {
    login: String,
    password: String,
}

impl RawEncodable for Credentials {
    fn to_raw(&self) -> Result<Json, MappingError> {
        to_raw_via_serde(self)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("bad_credentials")]
struct BadCredentials;

fn credentials() -> Credentials {
    Credentials {
        login: "neo".into(),
        password: "red-pill".into(),
    }
}

fn users_builder(mock: Arc<MockTransport>) -> ChainBuilder {
    ChainBuilder::new(mock).route(Method::Get, UrlRoute::new(BASE, "users"))
}

#[tokio::test]
async fn get_users_decodes_wrapped_array() {
    let mock = Arc::new(MockTransport::fixed(MockReply::json(
        200,
        r#"{"_array":[{"id":"1","firstName":"A","lastName":"B"}]}"#,
    )));
    let chain = assert_ok!(users_builder(mock).build::<(), Vec<User>>());

    let users = assert_ok!(chain.invoke(()).await.into_result());
    assert_eq!(
        users,
        vec![User {
            id: "1".into(),
            first_name: "A".into(),
            last_name: "B".into(),
        }]
    );
}

#[tokio::test]
async fn get_users_top_level_array_body() {
    let mock = Arc::new(MockTransport::fixed(MockReply::json(
        200,
        r#"[{"id":"2","firstName":"C","lastName":"D"}]"#,
    )));
    let chain = assert_ok!(users_builder(mock).build::<(), Vec<User>>());
    let users = assert_ok!(chain.invoke(()).await.into_result());
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, "2");
}

#[tokio::test]
async fn empty_object_body_is_empty_list() {
    let mock = Arc::new(MockTransport::fixed(MockReply::json(200, "{}")));
    let chain = assert_ok!(users_builder(mock).build::<(), Vec<User>>());
    let users = assert_ok!(chain.invoke(()).await.into_result());
    assert!(users.is_empty());
}

#[tokio::test]
async fn object_without_wrapper_key_fails_mapping() {
    let mock = Arc::new(MockTransport::fixed(MockReply::json(200, r#"{"items":[]}"#)));
    let chain = assert_ok!(users_builder(mock).build::<(), Vec<User>>());
    let err = assert_err!(chain.invoke(()).await.into_result());
    assert!(matches!(
        err,
        NodeError::Decode(netnode::error::DecodeError::CantMapObjectFromRaw(
            MappingError::CantFindKeyInRaw(_)
        ))
    ));
}

#[tokio::test]
async fn auth_401_uses_error_mapper() {
    let mock = Arc::new(MockTransport::fixed(MockReply::json(
        401,
        r#"{"code":"bad_credentials"}"#,
    )));
    let chain = assert_ok!(ChainBuilder::new(mock.clone())
        .route(Method::Post, UrlRoute::new(BASE, "auth"))
        .add_error_mapper(|payload: &Json, status: Option<u16>| -> Option<BoxError> {
            match (status, payload.get("code").and_then(|c| c.as_str())) {
                (Some(401), Some("bad_credentials")) => Some(Box::new(BadCredentials)),
                _ => None,
            }
        })
        .build::<Credentials, Json>());

    let err = assert_err!(chain.invoke(credentials()).await.into_result());
    match err {
        NodeError::ServerMapped(mapped) => {
            assert_eq!(mapped.status, 401);
            assert!(mapped.downcast_ref::<BadCredentials>().is_some());
        }
        other => panic!("expected mapped error, got {other:?}"),
    }
}

#[tokio::test]
async fn auth_401_without_mapper_is_unauthorized() {
    let mock = Arc::new(MockTransport::fixed(MockReply::json(
        401,
        r#"{"code":"bad_credentials"}"#,
    )));
    let chain = assert_ok!(ChainBuilder::new(mock)
        .route(Method::Post, UrlRoute::new(BASE, "auth"))
        .build::<Credentials, Json>());
    let err = assert_err!(chain.invoke(credentials()).await.into_result());
    assert!(matches!(err, NodeError::Http(HttpStatusError::Unauthorized { .. })));
}

#[tokio::test]
async fn not_modified_is_distinct_outcome() {
    let mock = Arc::new(MockTransport::fixed(MockReply::empty(304)));
    let chain = assert_ok!(users_builder(mock).build::<(), Vec<User>>());
    let done = chain.invoke(()).await;
    assert!(!done.entries_for("ResponseHttpErrorProcessorNode").is_empty());
    match done.into_result() {
        Err(NodeError::NotModified(response)) => assert_eq!(response.status, 304),
        other => panic!("expected NotModified, got {other:?}"),
    }
}

#[tokio::test]
async fn get_never_sends_body_post_json_does() {
    let mock = Arc::new(MockTransport::fixed(MockReply::json(200, "{}")));

    let get = assert_ok!(ChainBuilder::new(mock.clone())
        .route(Method::Get, UrlRoute::new(BASE, "auth"))
        .encode(ParametersEncoding::Json)
        .build::<Credentials, Json>());
    assert_ok!(get.invoke(credentials()).await.into_result());

    let post = assert_ok!(ChainBuilder::new(mock.clone())
        .route(Method::Post, UrlRoute::new(BASE, "auth"))
        .build::<Credentials, Json>());
    assert_ok!(post.invoke(credentials()).await.into_result());

    let sent = mock.requests();
    assert!(sent[0].body.is_none());
    assert_eq!(sent[0].url.query(), Some("login=neo&password=red-pill"));

    let body: serde_json::Value = assert_ok!(serde_json::from_slice(
        sent[1].body.as_deref().unwrap_or_default()
    ));
    assert_eq!(body["login"], "neo");
    assert_eq!(sent[1].headers.get("content-type"), Some("application/json"));
    assert_eq!(sent[1].url.query(), None);
}

#[tokio::test]
async fn cancel_before_reply_stops_the_chain() {
    let mock = Arc::new(
        MockTransport::fixed(MockReply::json(200, "{}")).with_delay(Duration::from_secs(5)),
    );
    let chain = assert_ok!(users_builder(mock.clone()).build::<(), Vec<User>>());

    let call = chain.invoke(());
    while mock.requests().is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    call.cancel();
    let done = call.await;

    assert!(matches!(done.result, Err(NodeError::Cancelled)));
    let last = done.log.last().map(|e| (e.id.as_str(), e.kind));
    assert_eq!(last, Some(("RequestSenderNode", LogKind::Warning)));
    assert!(done
        .log
        .iter()
        .all(|e| e.order <= LogOrder::REQUEST_SENDER_NODE));
}

#[tokio::test]
async fn log_is_sorted_in_chain_order() {
    let mock = Arc::new(MockTransport::fixed(MockReply::json(200, "{}")));
    let chain = assert_ok!(users_builder(mock).build::<(), Vec<User>>());
    let done = chain.invoke(()).await;
    assert!(done.is_ok());

    let orders: Vec<f64> = done.log.iter().map(|e| e.order).collect();
    assert!(orders.windows(2).all(|w| w[0] <= w[1]));

    let ids: Vec<&str> = done.log.iter().map(|e| e.id.as_str()).collect();
    let position = |id: &str| ids.iter().position(|i| *i == id);
    assert!(position("RequestCreatorNode") < position("ResponseProcessorNode"));
    assert!(position("ResponseProcessorNode") < position("ResponseDataParserNode"));
}

#[tokio::test]
async fn concurrent_invocations_keep_separate_logs() {
    let mock = Arc::new(
        MockTransport::fixed(MockReply::json(200, r#"{"_array":[]}"#))
            .with_delay(Duration::from_millis(10)),
    );
    let chain = assert_ok!(users_builder(mock.clone()).build::<(), Vec<User>>());

    let calls: Vec<_> = (0..8).map(|_| chain.invoke(()).into_future()).collect();
    let done = futures::future::join_all(calls).await;

    assert_eq!(mock.requests().len(), 8);
    for completion in done {
        assert_eq!(completion.entries_for("RequestCreatorNode").len(), 1);
        assert_ok!(completion.into_result());
    }
}

#[tokio::test]
async fn pager_walks_a_built_chain() {
    let mock = Arc::new(MockTransport::new(vec![
        MockReply::json(
            200,
            r#"[{"id":"1","firstName":"A","lastName":"A"},{"id":"2","firstName":"B","lastName":"B"}]"#,
        ),
        MockReply::json(200, r#"[{"id":"3","firstName":"C","lastName":"C"}]"#),
    ]));
    let chain = assert_ok!(users_builder(mock.clone()).build::<OffsetPage, Vec<User>>());
    let mut pager = Pager::new(Arc::new(ChainPageProvider::offset(chain)), 2);

    assert_eq!(assert_ok!(pager.next().await).len(), 2);
    assert!(pager.has_next());
    assert_eq!(assert_ok!(pager.next().await).len(), 1);
    assert!(!pager.has_next());
    assert!(matches!(pager.next().await, Err(NodeError::NoMorePages)));

    let urls: Vec<String> = mock
        .requests()
        .iter()
        .map(|r| r.url.query().unwrap_or_default().to_string())
        .collect();
    assert_eq!(urls, vec!["limit=2&offset=0", "limit=2&offset=2"]);
}
