//! End-to-end tests against a local mock HTTP server, using the real reqwest transport.

use ai_relay::transport::TransportError;
use ai_relay::{CompletionRequest, Error, Message, RelayClient, RelayConfig};
use futures::StreamExt;
use mockito::{Matcher, Server, ServerGuard};
use serde_json::{json, Value};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Test fixture that owns a mock server and knows its base URL.
struct MockServerFixture {
    server: ServerGuard,
    base_url: String,
}

impl MockServerFixture {
    async fn new() -> Self {
        init_tracing();
        let server = Server::new_async().await;
        let base_url = format!("{}/v1", server.url());
        Self { server, base_url }
    }

    fn client(&self) -> RelayClient {
        RelayClient::builder()
            .base_url(&self.base_url)
            .api_key("sk-mock")
            .alias("gpt-4o", "gpt-4o-2024-08-06")
            .build()
            .expect("client builds")
    }
}

#[tokio::test]
async fn streaming_completion_over_http() {
    let mut fixture = MockServerFixture::new().await;
    let body = [
        r#"data: {"choices":[{"delta":{"role":"assistant"},"index":0}]}"#,
        r#"data: {"choices":[{"delta":{"content":"Hello"},"index":0}]}"#,
        r#"data: {"choices":[{"delta":{"content":" World"},"index":0}]}"#,
        "data: [DONE]",
    ]
    .iter()
    .map(|line| format!("{}\n\n", line))
    .collect::<String>();

    let mock = fixture
        .server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-mock")
        .match_header("accept", "text/event-stream")
        .match_header("x-request-id", Matcher::Any)
        .match_body(Matcher::PartialJson(
            json!({"model": "gpt-4o-2024-08-06", "stream": true}),
        ))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let out = fixture
        .client()
        .create_completion(CompletionRequest::new("gpt-4o", vec![Message::user("Hi")]).stream())
        .await
        .unwrap();
    let events: Vec<Value> = out
        .into_stream()
        .unwrap()
        .map(|e| e.unwrap())
        .collect()
        .await;

    mock.assert_async().await;
    assert_eq!(events.len(), 3);
    assert_eq!(events[1]["choices"][0]["delta"]["content"], "Hello");
}

#[tokio::test]
async fn non_streaming_completion_over_http() {
    let mut fixture = MockServerFixture::new().await;
    let _mock = fixture
        .server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"Hi!"}}]}"#)
        .create_async()
        .await;

    let out = fixture
        .client()
        .create_completion(CompletionRequest::new("gpt-4o", vec![Message::user("Hi")]))
        .await
        .unwrap();
    assert_eq!(out.collect_text().await.unwrap(), "Hi!");
}

#[tokio::test]
async fn upstream_error_surfaces_status_and_body() {
    let mut fixture = MockServerFixture::new().await;
    let _mock = fixture
        .server
        .mock("POST", "/v1/chat/completions")
        .with_status(401)
        .with_body(r#"{"error":{"message":"invalid api key"}}"#)
        .create_async()
        .await;

    let err = fixture
        .client()
        .create_completion(CompletionRequest::new("gpt-4o", vec![Message::user("Hi")]))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert!(matches!(
        err,
        Error::Transport(TransportError::Status { ref body, .. }) if body.contains("invalid api key")
    ));
}

#[tokio::test]
async fn listing_through_a_proxy_prefix() {
    let mut fixture = MockServerFixture::new().await;
    let target = format!("{}/models", fixture.base_url);

    let _dead = fixture
        .server
        .mock("GET", "/dead")
        .match_query(Matcher::Any)
        .with_status(502)
        .create_async()
        .await;
    let proxy = fixture
        .server
        .mock("GET", "/relay")
        .match_query(Matcher::UrlEncoded("url".into(), target))
        .with_status(200)
        .with_body(r#"{"data":[{"id":"gpt-4o-2024-08-06"}]}"#)
        .expect(1)
        .create_async()
        .await;

    let config = RelayConfig::new(fixture.base_url.clone())
        .with_proxies(vec![
            format!("{}/dead?url=", fixture.server.url()),
            format!("{}/relay?url=", fixture.server.url()),
        ])
        .with_alias("gpt-4o", "gpt-4o-2024-08-06".into());
    let client = RelayClient::builder_from_config(config).build().unwrap();

    let models = client.list_models().await.unwrap();
    let cached = client.list_models().await.unwrap();

    proxy.assert_async().await;
    assert_eq!(models, cached);
    assert_eq!(models[0].id, "gpt-4o");
    assert_eq!(models[0].model, "gpt-4o-2024-08-06");
    assert_eq!(client.proxy_rotator().unwrap().current_index(), 1);
}
