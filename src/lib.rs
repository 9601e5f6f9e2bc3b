//! # ai-relay
//!
//! Async relay for OpenAI-compatible completion backends.
//!
//! ## Overview
//!
//! A caller talks to [`RelayClient`] using display model names. The client resolves those
//! names to canonical backend ids, sends the request (directly or through a rotating list of
//! URL-prefix proxies), and hands back either one parsed body or a lazy stream of decoded
//! server-sent events.
//!
//! ## Key Features
//!
//! - **Alias resolution**: [`AliasResolver`] maps display names to one canonical id or to a
//!   set of alternatives picked at random per request
//! - **Proxy failover**: [`ProxyRotator`] walks the proxy list from a persisted index and
//!   returns the first successful response
//! - **Streaming decode**: [`StreamDecoder`] turns arbitrarily chunked bytes into JSON events,
//!   tolerating split UTF-8 sequences, comments and malformed lines
//! - **Model listing**: [`RelayClient::list_models`] normalizes listings and caches the first
//!   non-empty result
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_relay::{CompletionRequest, Message, RelayClient};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> ai_relay::Result<()> {
//!     let client = RelayClient::builder()
//!         .base_url("https://api.example.com/v1")
//!         .api_key("your-api-key")
//!         .alias("gpt-4o", "gpt-4o-2024-08-06")
//!         .build()?;
//!
//!     let request = CompletionRequest::new("gpt-4o", vec![Message::user("Hello!")]).stream();
//!     if let Some(mut events) = client.create_completion(request).await?.into_stream() {
//!         while let Some(event) = events.next().await {
//!             println!("{}", event?);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Request dispatcher and builder |
//! | [`config`] | YAML/env configuration |
//! | [`models`] | Alias resolution and model listings |
//! | [`pipeline`] | Incremental event-stream decoding |
//! | [`transport`] | HTTP fetch seam and proxy rotation |
//! | [`types`] | Messages, request parameters, completion output |

pub mod client;
pub mod config;
pub mod models;
pub mod pipeline;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use client::{RelayClient, RelayClientBuilder};
pub use config::{RelayConfig, SseConfig, TransportConfig};
pub use models::{AliasResolver, AliasTarget, ModelEntry, ModelKind};
pub use pipeline::{DecoderState, StreamDecoder};
pub use transport::{Fetch, FetchRequest, FetchResponse, HttpTransport, ProxyRotator};
pub use types::{
    message::{Message, MessageRole},
    CompletionOutput, CompletionRequest, ImageRequest,
};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
