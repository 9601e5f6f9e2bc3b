//! Relay configuration.
//!
//! A [`RelayConfig`] can be written by hand, deserialized from YAML, or assembled from
//! environment variables. Env values always win over file values so that deployments can
//! override a checked-in config without editing it:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `AI_RELAY_BASE_URL` | `base_url` |
//! | `AI_RELAY_API_KEY` | `api_key` |
//! | `AI_RELAY_PROXIES` | `proxies` (comma separated) |
//! | `AI_HTTP_TIMEOUT_SECS` | `transport.timeout_secs` |
//! | `AI_HTTP_POOL_MAX_IDLE_PER_HOST` | `transport.pool_max_idle_per_host` |
//!
//! ```yaml
//! base_url: https://api.example.com/v1
//! require_api_key: true
//! proxies:
//!   - https://proxy-a.example.net/fetch?url=
//!   - https://proxy-b.example.net/?
//! aliases:
//!   gpt-4o: gpt-4o-2024-08-06
//!   llama-3.3-70b:
//!     - meta/llama-3.3-70b-instruct
//!     - llama-3.3-70b-versatile
//! ```

use crate::models::AliasTarget;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::Path;

pub const DEFAULT_EVENT_PREFIX: &str = "data: ";
pub const DEFAULT_DONE_SIGNAL: &str = "[DONE]";

/// Line framing used by [`crate::pipeline::decode::StreamDecoder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SseConfig {
    /// Marker that starts every event line.
    pub prefix: String,
    /// Payload that marks intended completion. Ignored, never a hard stop.
    pub done_signal: String,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_EVENT_PREFIX.to_string(),
            done_signal: DEFAULT_DONE_SIGNAL.to_string(),
        }
    }
}

/// Knobs handed to the reqwest-backed transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// `None` leaves timeouts entirely to the caller.
    pub timeout_secs: Option<u64>,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            pool_max_idle_per_host: 32,
            pool_idle_timeout_secs: 90,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub require_api_key: bool,
    /// Proxy URL prefixes. When present the list must not be empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxies: Option<Vec<String>>,
    pub aliases: BTreeMap<String, AliasTarget>,
    pub sse: SseConfig,
    pub transport: TransportConfig,
    /// Keep the first non-empty model listing for the lifetime of the client.
    pub cache_models: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            require_api_key: false,
            proxies: None,
            aliases: BTreeMap::new(),
            sse: SseConfig::default(),
            transport: TransportConfig::default(),
            cache_models: true,
        }
    }
}

impl RelayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::configuration_with_context(
                format!("Failed to read config: {}", e),
                ErrorContext::new()
                    .with_field_path(path.as_ref().display().to_string())
                    .with_source("relay_config"),
            )
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Defaults overlaid with whatever the environment provides.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(base_url) = env::var("AI_RELAY_BASE_URL") {
            self.base_url = base_url;
        }
        if let Ok(key) = env::var("AI_RELAY_API_KEY") {
            if !key.trim().is_empty() {
                self.api_key = Some(key);
            }
        }
        if let Ok(raw) = env::var("AI_RELAY_PROXIES") {
            let proxies = split_proxy_list(&raw);
            if !proxies.is_empty() {
                self.proxies = Some(proxies);
            }
        }
        if let Some(secs) = env::var("AI_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            self.transport.timeout_secs = Some(secs);
        }
        if let Some(n) = env::var("AI_HTTP_POOL_MAX_IDLE_PER_HOST")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        {
            self.transport.pool_max_idle_per_host = n;
        }
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_proxies(mut self, proxies: Vec<String>) -> Self {
        self.proxies = Some(proxies);
        self
    }

    pub fn with_alias(mut self, display: impl Into<String>, target: AliasTarget) -> Self {
        self.aliases.insert(display.into(), target);
        self
    }

    /// Fail fast on setups that can never work.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base_url: {}", e),
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_details(self.base_url.clone())
                    .with_source("relay_config"),
            )
        })?;

        if self.require_api_key
            && self
                .api_key
                .as_deref()
                .map(|k| k.trim().is_empty())
                .unwrap_or(true)
        {
            return Err(Error::configuration_with_context(
                "missing required API key",
                ErrorContext::new()
                    .with_field_path("api_key")
                    .with_details("set api_key or AI_RELAY_API_KEY")
                    .with_source("relay_config"),
            ));
        }

        if self.sse.prefix.is_empty() {
            return Err(Error::configuration_with_context(
                "event prefix must not be empty",
                ErrorContext::new()
                    .with_field_path("sse.prefix")
                    .with_source("relay_config"),
            ));
        }

        Ok(())
    }
}

fn split_proxy_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_yaml_with_scalar_and_list_aliases() {
        let cfg = RelayConfig::from_yaml_str(
            r#"
base_url: https://api.example.com/v1
api_key: sk-test
proxies:
  - https://proxy-a.example.net/fetch?url=
aliases:
  gpt-4o: gpt-4o-2024-08-06
  llama:
    - meta/llama-3.3-70b-instruct
    - llama-3.3-70b-versatile
sse:
  done_signal: "[END]"
"#,
        )
        .unwrap();

        assert_eq!(cfg.base_url, "https://api.example.com/v1");
        assert_eq!(cfg.api_key.as_deref(), Some("sk-test"));
        assert_eq!(cfg.proxies.as_ref().map(Vec::len), Some(1));
        assert_eq!(
            cfg.aliases.get("gpt-4o"),
            Some(&AliasTarget::Scalar("gpt-4o-2024-08-06".into()))
        );
        assert!(matches!(
            cfg.aliases.get("llama"),
            Some(AliasTarget::Alternatives(ids)) if ids.len() == 2
        ));
        assert_eq!(cfg.sse.prefix, DEFAULT_EVENT_PREFIX);
        assert_eq!(cfg.sse.done_signal, "[END]");
        assert!(cfg.cache_models);
    }

    #[test]
    fn missing_required_key_is_configuration_error() {
        let mut cfg = RelayConfig::new("https://api.example.com/v1");
        cfg.require_api_key = true;
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("api_key")
        );

        assert!(cfg.with_api_key("sk-test").validate().is_ok());
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = RelayConfig::new("not a url").validate().unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn from_path_reads_yaml_and_reports_missing_file() {
        let path = std::env::temp_dir().join(format!("ai-relay-{}.yaml", std::process::id()));
        std::fs::write(&path, "base_url: https://file.example.com/v1\ncache_models: false\n")
            .unwrap();
        let cfg = RelayConfig::from_path(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(cfg.base_url, "https://file.example.com/v1");
        assert!(!cfg.cache_models);

        let err = RelayConfig::from_path(&path).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert_eq!(
            err.context().and_then(|c| c.field_path.clone()),
            Some(path.display().to_string())
        );
    }

    // Every test touching the process environment lives here so they never race.
    #[test]
    fn env_overrides() {
        const VARS: [&str; 5] = [
            "AI_RELAY_BASE_URL",
            "AI_RELAY_API_KEY",
            "AI_RELAY_PROXIES",
            "AI_HTTP_TIMEOUT_SECS",
            "AI_HTTP_POOL_MAX_IDLE_PER_HOST",
        ];
        let clear = || VARS.iter().for_each(|v| env::remove_var(v));
        clear();

        let file = RelayConfig::from_yaml_str(
            "base_url: https://file.example.com/v1\napi_key: sk-file\ntransport:\n  timeout_secs: 5\n",
        )
        .unwrap();

        env::set_var("AI_RELAY_BASE_URL", "https://env.example.com/v1");
        env::set_var("AI_RELAY_API_KEY", "sk-env");
        env::set_var("AI_RELAY_PROXIES", "https://a.example.net/?url=, https://b.example.net/?u=");
        env::set_var("AI_HTTP_TIMEOUT_SECS", "30");
        env::set_var("AI_HTTP_POOL_MAX_IDLE_PER_HOST", "4");
        let cfg = file.clone().with_env_overrides();
        assert_eq!(cfg.base_url, "https://env.example.com/v1");
        assert_eq!(cfg.api_key.as_deref(), Some("sk-env"));
        assert_eq!(
            cfg.proxies,
            Some(vec![
                "https://a.example.net/?url=".to_string(),
                "https://b.example.net/?u=".to_string()
            ])
        );
        assert_eq!(cfg.transport.timeout_secs, Some(30));
        assert_eq!(cfg.transport.pool_max_idle_per_host, 4);

        // Blank or unparsable values leave the file values alone.
        clear();
        env::set_var("AI_RELAY_API_KEY", "   ");
        env::set_var("AI_RELAY_PROXIES", " , ");
        env::set_var("AI_HTTP_TIMEOUT_SECS", "soon");
        env::set_var("AI_HTTP_POOL_MAX_IDLE_PER_HOST", "-1");
        let cfg = file.clone().with_env_overrides();
        assert_eq!(cfg.api_key.as_deref(), Some("sk-file"));
        assert_eq!(cfg.proxies, None);
        assert_eq!(cfg.transport.timeout_secs, Some(5));
        assert_eq!(cfg.transport.pool_max_idle_per_host, 32);

        clear();
        let cfg = RelayConfig::from_env();
        assert_eq!(cfg, RelayConfig::default());
    }

    #[test]
    fn proxy_list_splitting_drops_blanks() {
        assert_eq!(
            split_proxy_list(" https://a/?url= ,, https://b/? "),
            vec!["https://a/?url=".to_string(), "https://b/?".to_string()]
        );
    }
}
