//! Proxy rotation with bounded failover.
//!
//! A [`ProxyRotator`] owns an ordered, non-empty list of URL prefixes and a rotation index.
//! Each call starts at the current index and walks forward at most once around the list;
//! every failed attempt moves the shared index on, so the next call starts at the proxy
//! after the last one that failed rather than at position 0.

use super::{Fetch, FetchRequest, FetchResponse};
use crate::{Error, ErrorContext, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub struct ProxyRotator {
    inner: Arc<dyn Fetch>,
    proxies: Vec<String>,
    index: AtomicUsize,
}

impl std::fmt::Debug for ProxyRotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyRotator")
            .field("proxies", &self.proxies)
            .field("index", &self.current_index())
            .finish()
    }
}

impl ProxyRotator {
    /// Build a rotator over `proxies`, fetching through `inner`.
    ///
    /// An empty list, or a prefix that is not an absolute URL, is a configuration error.
    pub fn new(inner: Arc<dyn Fetch>, proxies: Vec<String>) -> Result<Self> {
        if proxies.is_empty() {
            return Err(Error::configuration_with_context(
                "proxy list must not be empty",
                ErrorContext::new()
                    .with_field_path("proxies")
                    .with_source("proxy_rotator"),
            ));
        }

        for (i, prefix) in proxies.iter().enumerate() {
            url::Url::parse(prefix).map_err(|e| {
                Error::configuration_with_context(
                    format!("invalid proxy prefix: {}", e),
                    ErrorContext::new()
                        .with_field_path(format!("proxies[{}]", i))
                        .with_details(prefix.clone())
                        .with_source("proxy_rotator"),
                )
            })?;
        }

        Ok(Self {
            inner,
            proxies,
            index: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn proxies(&self) -> &[String] {
        &self.proxies
    }

    pub fn current_index(&self) -> usize {
        self.index.load(Ordering::Relaxed)
    }

    /// `proxies[current] + percent_encode(target)`.
    pub fn get_proxied_url(&self, target: &str) -> String {
        self.proxied_url_at(self.current_index(), target)
    }

    fn proxied_url_at(&self, index: usize, target: &str) -> String {
        format!("{}{}", self.proxies[index], urlencoding::encode(target))
    }

    /// Fetch `request` through the proxies, starting from the current index.
    ///
    /// At most `len()` attempts are made, each proxy at most once. A non-2xx status counts
    /// as a failure exactly like a transport error.
    pub async fn execute(&self, request: FetchRequest) -> Result<FetchResponse> {
        let n = self.proxies.len();
        let start = self.current_index() % n;
        let mut last_err: Option<Error> = None;

        for attempt in 0..n {
            let idx = (start + attempt) % n;
            let proxied = request.with_url(self.proxied_url_at(idx, &request.url));
            let began = Instant::now();

            let outcome = match self.inner.fetch(proxied).await {
                Ok(resp) => resp.error_for_status().await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(resp) => {
                    debug!(
                        proxy_index = idx,
                        attempt = attempt + 1,
                        duration_ms = began.elapsed().as_millis() as u64,
                        "proxy attempt succeeded"
                    );
                    return Ok(resp);
                }
                Err(e) => {
                    warn!(
                        proxy_index = idx,
                        attempt = attempt + 1,
                        of = n,
                        error = %e,
                        "proxy attempt failed, rotating"
                    );
                    self.index.store((idx + 1) % n, Ordering::Relaxed);
                    last_err = Some(e);
                }
            }
        }

        Err(Error::ExhaustedProxies {
            attempts: n,
            last: Box::new(last_err.unwrap_or_else(|| {
                Error::configuration_with_context(
                    "no proxy attempt was made",
                    ErrorContext::new().with_source("proxy_rotator"),
                )
            })),
        })
    }
}

#[async_trait::async_trait]
impl Fetch for ProxyRotator {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        self.execute(request).await
    }
}
