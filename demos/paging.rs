//! Example: offset pagination over a built chain.
//!
//! Run with: `cargo run --example paging`

use netnode::error::MappingError;
use netnode::mapping::{from_raw_via_serde, Json, RawDecodable};
use netnode::{
    ChainBuilder, ChainPageProvider, Method, MockReply, MockTransport, OffsetPage, Pager, UrlRoute,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct Article {
    id: u32,
    title: String,
}

impl RawDecodable for Article {
    fn from_raw(raw: Json) -> Result<Self, MappingError> {
        from_raw_via_serde(raw)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let mock = Arc::new(MockTransport::new(vec![
        MockReply::json(200, r#"[{"id":1,"title":"One"},{"id":2,"title":"Two"},{"id":3,"title":"Three"}]"#),
        MockReply::json(200, r#"[{"id":4,"title":"Four"},{"id":5,"title":"Five"},{"id":6,"title":"Six"}]"#),
        MockReply::json(200, r#"[{"id":7,"title":"Seven"}]"#),
    ]));

    let chain = ChainBuilder::new(mock.clone())
        .route(Method::Get, UrlRoute::new("https://api.example.com", "articles"))
        .log_filter(["RequestCreatorNode", "ResponseDataParserNode"])
        .build::<OffsetPage, Vec<Article>>()?;

    let mut pager = Pager::new(Arc::new(ChainPageProvider::offset(chain)), 3)
        .on_over(|| println!("-- no more articles --"));

    while pager.has_next() {
        for article in pager.next().await? {
            println!("#{} {}", article.id, article.title);
        }
    }

    for request in mock.requests() {
        println!("sent {}", request.url);
    }
    Ok(())
}
