//! Network transport seam.
//!
//! Everything above this module talks to the network through the [`Fetch`] trait. The
//! production implementation is [`HttpTransport`] (reqwest); [`ProxyRotator`] wraps any
//! other `Fetch` and routes each request through an ordered list of proxy prefixes.
//! Tests substitute their own counting implementations.

pub mod http;
pub mod proxy;

pub use http::HttpTransport;
pub use proxy::ProxyRotator;

use crate::{BoxStream, Result};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::Method;

/// One outgoing request. Cheap to clone so a rotation can replay it per attempt.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Same request, different destination.
    pub fn with_url(&self, url: String) -> Self {
        Self {
            url,
            ..self.clone()
        }
    }
}

/// Status plus a lazily consumed body.
///
/// Dropping the response (or its body stream) releases the underlying connection.
pub struct FetchResponse {
    pub status: u16,
    pub body: BoxStream<'static, Bytes>,
}

impl std::fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl FetchResponse {
    pub fn new(status: u16, body: BoxStream<'static, Bytes>) -> Self {
        Self { status, body }
    }

    /// A response whose whole body is already in memory.
    pub fn from_bytes(status: u16, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        Self {
            status,
            body: Box::pin(futures::stream::once(async move { Ok(body) })),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Drain the body into one buffer.
    pub async fn bytes(mut self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    pub async fn text(self) -> Result<String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub async fn json<T: serde::de::DeserializeOwned>(self) -> Result<T> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Turn a non-2xx response into a [`TransportError::Status`], reading the body for context.
    pub async fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let status = self.status;
        let body = self.text().await.unwrap_or_default();
        Err(TransportError::Status { status, body }.into())
    }
}

/// Generic `fetch(url) -> {status, body}` capability supplied by the host.
#[async_trait::async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Transport error: {0}")]
    Other(String),
}
