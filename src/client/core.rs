use crate::config::{RelayConfig, SseConfig};
use crate::models::{parse_model_listing, AliasResolver, ModelEntry};
use crate::pipeline::decode::decode_stream;
use crate::transport::{Fetch, FetchRequest, FetchResponse, ProxyRotator, TransportError};
use crate::types::{CompletionOutput, CompletionRequest, ImageRequest};
use crate::{Error, Result};
use arc_swap::ArcSwapOption;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Dispatches completion, image and listing calls.
///
/// Resolves display model names, shapes the request body, and executes it through the
/// configured [`Fetch`] (optionally a [`ProxyRotator`]). Streaming completions are handed
/// back as a lazy event stream; nothing is buffered beyond the current line.
pub struct RelayClient {
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) fetch: Arc<dyn Fetch>,
    pub(crate) rotator: Option<Arc<ProxyRotator>>,
    pub(crate) aliases: Arc<AliasResolver>,
    pub(crate) sse: SseConfig,
    pub(crate) cache_models: bool,
    pub(crate) model_cache: ArcSwapOption<Vec<ModelEntry>>,
}

impl RelayClient {
    pub fn builder() -> crate::client::builder::RelayClientBuilder {
        crate::client::builder::RelayClientBuilder::new()
    }

    pub fn builder_from_config(config: RelayConfig) -> crate::client::builder::RelayClientBuilder {
        crate::client::builder::RelayClientBuilder::from_config(config)
    }

    /// Build a client straight from configuration with the default transport.
    pub fn from_config(config: RelayConfig) -> Result<Self> {
        Self::builder_from_config(config).build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn aliases(&self) -> &AliasResolver {
        &self.aliases
    }

    /// The rotator requests go through, when proxies are configured.
    pub fn proxy_rotator(&self) -> Option<&ProxyRotator> {
        self.rotator.as_deref()
    }

    /// Run a chat completion.
    ///
    /// With `request.stream` unset the full body is awaited and parsed once. With it set, the
    /// returned stream yields each event as soon as it is decoded.
    pub async fn create_completion(&self, request: CompletionRequest) -> Result<CompletionOutput> {
        request.validate()?;
        let canonical = self.aliases.resolve(&request.model);
        debug!(
            model = request.model.as_str(),
            canonical = canonical.as_str(),
            stream = request.stream,
            "resolved completion model"
        );

        let body = request.to_body(&canonical)?;
        let url = self.endpoint("chat/completions");
        let mut fetch_req = FetchRequest::post(url, body);
        fetch_req = if request.stream {
            fetch_req.header("accept", "text/event-stream")
        } else {
            fetch_req.header("accept", "application/json")
        };

        let resp = self.send(fetch_req, "chat/completions").await?;

        if request.stream {
            Ok(CompletionOutput::Stream(decode_stream(resp.body, &self.sse)))
        } else {
            Ok(CompletionOutput::Single(resp.json::<Value>().await?))
        }
    }

    /// Generate images. Always non-streaming.
    pub async fn create_image(&self, request: ImageRequest) -> Result<Value> {
        request.validate()?;
        let canonical = self.aliases.resolve(&request.model);
        let body = request.to_body(&canonical)?;
        let fetch_req = FetchRequest::post(self.endpoint("images/generations"), body)
            .header("accept", "application/json");

        let resp = self.send(fetch_req, "images/generations").await?;
        resp.json().await
    }

    /// List models, backfilling display ids through the alias table.
    ///
    /// The first non-empty listing is kept for the lifetime of the client (unless caching is
    /// disabled) and later calls return it without touching the network.
    pub async fn list_models(&self) -> Result<Vec<ModelEntry>> {
        if self.cache_models {
            if let Some(cached) = self.model_cache.load_full() {
                debug!(count = cached.len(), "model listing served from cache");
                return Ok(cached.as_ref().clone());
            }
        }

        let fetch_req =
            FetchRequest::get(self.endpoint("models")).header("accept", "application/json");
        let resp = self.send(fetch_req, "models").await?;
        let body: Value = resp.json().await?;

        let entries = parse_model_listing(&body, |canonical| self.aliases.swap(canonical));
        if self.cache_models && !entries.is_empty() {
            self.model_cache.store(Some(Arc::new(entries.clone())));
        }
        Ok(entries)
    }

    /// Forget the cached model listing.
    pub fn clear_model_cache(&self) {
        self.model_cache.store(None);
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send(&self, mut request: FetchRequest, endpoint: &str) -> Result<FetchResponse> {
        let client_request_id = Uuid::new_v4().to_string();
        if let Some(key) = &self.api_key {
            request = request.header("authorization", format!("Bearer {}", key));
        }
        request = request.header("x-request-id", client_request_id.as_str());

        let start = Instant::now();
        let resp = self.fetch.fetch(request).await?;

        if !resp.is_success() {
            let status = resp.status;
            info!(
                http_status = status,
                endpoint,
                client_request_id = client_request_id.as_str(),
                duration_ms = start.elapsed().as_millis() as u64,
                "ai-relay request failed"
            );
            // Same error a failed proxy attempt produces.
            return Err(resp.error_for_status().await.err().unwrap_or_else(|| {
                Error::Transport(TransportError::Status {
                    status,
                    body: String::new(),
                })
            }));
        }

        info!(
            http_status = resp.status,
            endpoint,
            client_request_id = client_request_id.as_str(),
            proxied = self.rotator.is_some(),
            duration_ms = start.elapsed().as_millis() as u64,
            "ai-relay request accepted"
        );
        Ok(resp)
    }
}

impl std::fmt::Debug for RelayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayClient")
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .field("rotator", &self.rotator)
            .field("aliases", &self.aliases.len())
            .field("cache_models", &self.cache_models)
            .finish()
    }
}
