//! Example: a typed users endpoint served by MockTransport.
//!
//! Run with: `cargo run --example users_chain`

use netnode::error::{BoxError, MappingError};
use netnode::mapping::{from_raw_via_serde, to_raw_via_serde, Json, RawDecodable, RawEncodable};
use netnode::{ChainBuilder, Metadata, Method, MockReply, MockTransport, NodeError, UrlRoute};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
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
struct Login {
    login: String,
    password: String,
}

impl RawEncodable for Login {
    fn to_raw(&self) -> Result<Json, MappingError> {
        to_raw_via_serde(self)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("login or password is wrong")]
struct BadCredentials;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let mock = Arc::new(MockTransport::new(vec![
        MockReply::json(
            200,
            r#"[{"id":"1","firstName":"Ada","lastName":"Lovelace"},{"id":"2","firstName":"Alan","lastName":"Turing"}]"#,
        ),
        MockReply::json(401, r#"{"code":"bad_credentials"}"#),
    ]));

    let base = ChainBuilder::new(mock.clone())
        .add_provider(|| Metadata::from([("Authorization", "Bearer demo-token")]))
        .add_error_mapper(|payload: &Json, _status: Option<u16>| -> Option<BoxError> {
            (payload.get("code")?.as_str()? == "bad_credentials")
                .then(|| Box::new(BadCredentials) as BoxError)
        });

    // GET /users
    let users = base
        .clone()
        .route(Method::Get, UrlRoute::new("https://api.example.com", "users"))
        .build::<(), Vec<User>>()?;

    for user in users.invoke(()).await.into_result()? {
        println!("{}: {} {}", user.id, user.first_name, user.last_name);
    }

    // POST /auth, answered with 401
    let auth = base
        .route(Method::Post, UrlRoute::new("https://api.example.com", "auth"))
        .build::<Login, ()>()?;

    let done = auth
        .invoke(Login {
            login: "ada".into(),
            password: "engine".into(),
        })
        .await;
    println!("\n{}\n", done.render_log());

    match done.into_result() {
        Err(NodeError::ServerMapped(err)) if err.downcast_ref::<BadCredentials>().is_some() => {
            println!("Auth rejected: {}", err.source);
        }
        other => println!("Unexpected outcome: {other:?}"),
    }

    println!("Requests sent: {}", mock.requests().len());
    Ok(())
}
