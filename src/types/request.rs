//! Request parameters and completion output.

use super::message::Message;
use crate::{BoxStream, Error, ErrorContext, Result};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Chat completion parameters. `model` is a display alias or a canonical id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Provider-specific fields passed through verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
            temperature: None,
            max_tokens: None,
            extra: Map::new(),
        }
    }

    pub fn stream(mut self) -> Self {
        self.stream = true;
        self
    }

    pub fn temperature(mut self, temp: f64) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.messages.is_empty() {
            return Err(Error::validation_with_context(
                "completion request needs at least one message",
                ErrorContext::new()
                    .with_field_path("messages")
                    .with_source("completion_request"),
            ));
        }
        validate_model(&self.model, "completion_request")
    }

    /// Body sent upstream, with `model` replaced by the canonical id.
    pub(crate) fn to_body(&self, canonical_model: &str) -> Result<Value> {
        let mut body = serde_json::to_value(self)?;
        body["model"] = Value::String(canonical_model.to_string());
        Ok(body)
    }
}

/// Image generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// `url` or `b64_json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ImageRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            n: None,
            size: None,
            response_format: None,
            extra: Map::new(),
        }
    }

    pub fn n(mut self, n: u32) -> Self {
        self.n = Some(n);
        self
    }

    pub fn size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    pub fn response_format(mut self, format: impl Into<String>) -> Self {
        self.response_format = Some(format.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(Error::validation_with_context(
                "image prompt must not be empty",
                ErrorContext::new()
                    .with_field_path("prompt")
                    .with_source("image_request"),
            ));
        }
        validate_model(&self.model, "image_request")
    }

    pub(crate) fn to_body(&self, canonical_model: &str) -> Result<Value> {
        let mut body = serde_json::to_value(self)?;
        body["model"] = Value::String(canonical_model.to_string());
        Ok(body)
    }
}

fn validate_model(model: &str, source: &str) -> Result<()> {
    if model.trim().is_empty() {
        return Err(Error::validation_with_context(
            "model must not be empty",
            ErrorContext::new()
                .with_field_path("model")
                .with_source(source),
        ));
    }
    Ok(())
}

/// Result of a completion call: one parsed body, or a lazy, forward-only event sequence.
pub enum CompletionOutput {
    Single(Value),
    Stream(BoxStream<'static, Value>),
}

impl std::fmt::Debug for CompletionOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionOutput::Single(v) => f.debug_tuple("Single").field(v).finish(),
            CompletionOutput::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl CompletionOutput {
    pub fn is_stream(&self) -> bool {
        matches!(self, CompletionOutput::Stream(_))
    }

    pub fn into_single(self) -> Option<Value> {
        match self {
            CompletionOutput::Single(v) => Some(v),
            CompletionOutput::Stream(_) => None,
        }
    }

    pub fn into_stream(self) -> Option<BoxStream<'static, Value>> {
        match self {
            CompletionOutput::Single(_) => None,
            CompletionOutput::Stream(s) => Some(s),
        }
    }

    /// Assistant text of the first choice, draining the stream if there is one.
    pub async fn collect_text(self) -> Result<String> {
        match self {
            CompletionOutput::Single(v) => Ok(v
                .pointer("/choices/0/message/content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()),
            CompletionOutput::Stream(mut events) => {
                let mut text = String::new();
                while let Some(event) = events.next().await {
                    if let Some(delta) = event?
                        .pointer("/choices/0/delta/content")
                        .and_then(Value::as_str)
                    {
                        text.push_str(delta);
                    }
                }
                Ok(text)
            }
        }
    }
}
