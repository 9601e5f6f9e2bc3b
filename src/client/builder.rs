use crate::client::core::RelayClient;
use crate::config::{RelayConfig, SseConfig};
use crate::models::{AliasResolver, AliasTarget};
use crate::transport::{Fetch, HttpTransport, ProxyRotator};
use crate::Result;
use arc_swap::ArcSwapOption;
use std::sync::Arc;

/// Builder for [`RelayClient`].
///
/// Everything that can be wrong with a setup (bad URL, empty proxy list, missing required
/// key) surfaces from [`build`](Self::build), never from a later request.
pub struct RelayClientBuilder {
    config: RelayConfig,
    transport: Option<Arc<dyn Fetch>>,
}

impl RelayClientBuilder {
    pub fn new() -> Self {
        Self {
            config: RelayConfig::default(),
            transport: None,
        }
    }

    pub fn from_config(config: RelayConfig) -> Self {
        Self {
            config,
            transport: None,
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    /// Refuse to build without an API key.
    pub fn require_api_key(mut self, required: bool) -> Self {
        self.config.require_api_key = required;
        self
    }

    /// Route every request through these proxy prefixes.
    pub fn proxies(mut self, proxies: Vec<String>) -> Self {
        self.config.proxies = Some(proxies);
        self
    }

    pub fn alias(mut self, display: impl Into<String>, target: impl Into<AliasTarget>) -> Self {
        self.config.aliases.insert(display.into(), target.into());
        self
    }

    pub fn sse(mut self, sse: SseConfig) -> Self {
        self.config.sse = sse;
        self
    }

    pub fn cache_models(mut self, enable: bool) -> Self {
        self.config.cache_models = enable;
        self
    }

    /// Use a caller-supplied transport instead of the default reqwest one.
    pub fn transport(mut self, transport: Arc<dyn Fetch>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<RelayClient> {
        let config = self.config;
        config.validate()?;

        let transport: Arc<dyn Fetch> = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new(&config.transport)?),
        };

        let rotator = match config.proxies {
            Some(proxies) => Some(Arc::new(ProxyRotator::new(transport.clone(), proxies)?)),
            None => None,
        };

        let fetch: Arc<dyn Fetch> = match &rotator {
            Some(r) => r.clone(),
            None => transport,
        };

        Ok(RelayClient {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.filter(|k| !k.trim().is_empty()),
            fetch,
            rotator,
            aliases: Arc::new(AliasResolver::from_table(&config.aliases)),
            sse: config.sse,
            cache_models: config.cache_models,
            model_cache: ArcSwapOption::empty(),
        })
    }
}

impl Default for RelayClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
