//! # Discovery Document Fetcher
//!
//! HTTP fetcher for OpenID Connect Discovery 1.0 documents, with RFC 8414
//! Authorization Server Metadata as a fallback location, response size limits
//! and a per-URI cache driven by `Cache-Control`.

use super::types::{DiscoveryDocument, DiscoveryError, ProviderMetadata};
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::header::{CACHE_CONTROL, HeaderMap};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};
use url::Url;

const WELL_KNOWN_SEGMENT: &str = "/.well-known/";
const OIDC_WELL_KNOWN: &str = "/.well-known/openid-configuration";
const OAUTH2_WELL_KNOWN: &str = "/.well-known/oauth-authorization-server";

/// Anything that can resolve a discovery URI into validated provider metadata.
///
/// [`DiscoveryFetcher`] is the network implementation; tests substitute stubs.
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    /// Resolve `uri` (an issuer URL or a full `.well-known` URL)
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] when no valid document can be obtained.
    async fn discover(&self, uri: &str) -> Result<DiscoveryDocument, DiscoveryError>;
}

/// Cache entry for discovery documents
#[derive(Debug, Clone)]
struct CacheEntry {
    document: DiscoveryDocument,
    expires_at: SystemTime,
}

/// Configuration for the discovery fetcher
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Maximum response size in bytes (default: 64 KiB)
    pub max_response_size: usize,

    /// Request timeout (default: 10 seconds)
    pub request_timeout: Duration,

    /// Cache TTL when the provider sends no cache headers (default: 1 hour)
    pub default_cache_ttl: Duration,

    /// Upper bound on any TTL (default: 24 hours)
    pub max_cache_ttl: Duration,

    /// User agent for HTTP requests
    pub user_agent: String,

    /// Try the RFC 8414 location when OIDC discovery fails (default: true)
    pub fallback_to_oauth2: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_response_size: 64 * 1024,
            request_timeout: Duration::from_secs(10),
            default_cache_ttl: Duration::from_secs(3600),
            max_cache_ttl: Duration::from_secs(86400),
            user_agent: format!("bae-auth/{}", env!("CARGO_PKG_VERSION")),
            fallback_to_oauth2: true,
        }
    }
}

/// Discovery document fetcher
///
/// ## Endpoint resolution
///
/// 1. A URI whose path already contains `/.well-known/` is fetched as is
/// 2. Otherwise `<issuer>/.well-known/openid-configuration`
/// 3. Then `/.well-known/oauth-authorization-server[/path]` (if fallback enabled)
///
/// Redirects are never followed.
pub struct DiscoveryFetcher {
    client: reqwest::Client,
    config: FetcherConfig,
    cache: Arc<DashMap<String, CacheEntry>>,
}

impl DiscoveryFetcher {
    /// Create a fetcher with default configuration
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client creation fails
    pub fn new() -> Result<Self, DiscoveryError> {
        Self::with_config(FetcherConfig::default())
    }

    /// Create a fetcher with custom configuration
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client creation fails
    pub fn with_config(config: FetcherConfig) -> Result<Self, DiscoveryError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| DiscoveryError::Http {
                uri: String::new(),
                reason: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            config,
            cache: Arc::new(DashMap::new()),
        })
    }

    /// Fetch and validate the discovery document for `uri`
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] if the URI is invalid or every candidate
    /// location fails.
    pub async fn fetch(&self, uri: &str) -> Result<DiscoveryDocument, DiscoveryError> {
        let parsed = Url::parse(uri).map_err(|e| DiscoveryError::InvalidUri {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;

        if let Some(cached) = self.get_cached(uri) {
            debug!("Returning cached discovery document for: {}", uri);
            return Ok(cached);
        }

        let (document, ttl) = if parsed.path().contains(WELL_KNOWN_SEGMENT) {
            debug!("Fetching explicit discovery document: {}", uri);
            self.fetch_document(parsed.as_str()).await?
        } else {
            self.fetch_from_issuer(&parsed).await?
        };

        self.cache_document(uri, document.clone(), ttl);
        Ok(document)
    }

    async fn fetch_from_issuer(
        &self,
        issuer: &Url,
    ) -> Result<(DiscoveryDocument, Duration), DiscoveryError> {
        let oidc_url = build_oidc_discovery_url(issuer);
        debug!("Trying OIDC discovery: {}", oidc_url);

        match self.fetch_document(&oidc_url).await {
            Ok(found) => Ok(found),
            Err(oidc_error) if self.config.fallback_to_oauth2 => {
                debug!("OIDC discovery failed: {}", oidc_error);
                let oauth2_url = build_oauth2_discovery_url(issuer);
                debug!("Trying RFC 8414 fallback: {}", oauth2_url);

                self.fetch_document(&oauth2_url).await.map_err(|oauth2_error| {
                    warn!(
                        "Both OIDC and RFC 8414 discovery failed for issuer: {}",
                        issuer
                    );
                    DiscoveryError::AllEndpointsFailed {
                        oidc_error: oidc_error.to_string(),
                        oauth2_error: oauth2_error.to_string(),
                    }
                })
            }
            Err(oidc_error) => Err(oidc_error),
        }
    }

    /// Fetch one discovery URL, returning the document and its cache TTL
    async fn fetch_document(
        &self,
        url: &str,
    ) -> Result<(DiscoveryDocument, Duration), DiscoveryError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DiscoveryError::Timeout {
                    uri: url.to_string(),
                }
            } else {
                DiscoveryError::Http {
                    uri: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        if !response.status().is_success() {
            return Err(DiscoveryError::Status {
                uri: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        // Extract cache headers before consuming response
        let cache_ttl = self.parse_cache_headers(response.headers());

        if let Some(content_length) = response.content_length()
            && content_length > self.config.max_response_size as u64
        {
            return Err(DiscoveryError::ResponseTooLarge {
                limit: self.config.max_response_size,
            });
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                DiscoveryError::Timeout {
                    uri: url.to_string(),
                }
            } else {
                DiscoveryError::Http {
                    uri: url.to_string(),
                    reason: format!("Failed to read response: {}", e),
                }
            }
        })?;

        if body.len() > self.config.max_response_size {
            return Err(DiscoveryError::ResponseTooLarge {
                limit: self.config.max_response_size,
            });
        }

        let metadata: ProviderMetadata = serde_json::from_slice(&body)
            .map_err(|e| DiscoveryError::InvalidJson(e.to_string()))?;

        Ok((metadata.validate()?, cache_ttl))
    }

    fn get_cached(&self, uri: &str) -> Option<DiscoveryDocument> {
        if let Some(entry) = self.cache.get(uri) {
            if SystemTime::now() < entry.expires_at {
                return Some(entry.document.clone());
            }
            // Expired: release the shard lock before removing
            drop(entry);
            self.cache.remove(uri);
        }
        None
    }

    fn cache_document(&self, uri: &str, document: DiscoveryDocument, ttl: Duration) {
        if ttl.is_zero() {
            debug!("Provider disabled caching for {}", uri);
            return;
        }

        debug!(
            "Caching discovery document for {} with TTL of {}s",
            uri,
            ttl.as_secs()
        );

        self.cache.insert(
            uri.to_string(),
            CacheEntry {
                document,
                expires_at: SystemTime::now() + ttl,
            },
        );
    }

    /// TTL from `Cache-Control`; `no-store`/`no-cache` win over `max-age`
    fn parse_cache_headers(&self, headers: &HeaderMap) -> Duration {
        let Some(value) = headers.get(CACHE_CONTROL).and_then(|v| v.to_str().ok()) else {
            return self.config.default_cache_ttl;
        };

        let directives: Vec<&str> = value.split(',').map(str::trim).collect();

        if directives
            .iter()
            .any(|d| d.eq_ignore_ascii_case("no-store") || d.eq_ignore_ascii_case("no-cache"))
        {
            return Duration::ZERO;
        }

        directives
            .iter()
            .find_map(|d| d.strip_prefix("max-age="))
            .and_then(|seconds| seconds.parse::<u64>().ok())
            .map(|seconds| Duration::from_secs(seconds).min(self.config.max_cache_ttl))
            .unwrap_or(self.config.default_cache_ttl)
    }

    /// Drop the cached document for `uri` so the next fetch hits the network
    pub fn invalidate(&self, uri: &str) {
        self.cache.remove(uri);
    }

    /// Clear the cache
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Get cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        let now = SystemTime::now();
        let total_entries = self.cache.len();
        let expired_entries = self
            .cache
            .iter()
            .filter(|entry| now >= entry.expires_at)
            .count();

        CacheStats {
            total_entries,
            expired_entries,
            valid_entries: total_entries - expired_entries,
        }
    }
}

impl std::fmt::Debug for DiscoveryFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryFetcher")
            .field("config", &self.config)
            .field("cached", &self.cache.len())
            .finish()
    }
}

#[async_trait]
impl DiscoverySource for DiscoveryFetcher {
    async fn discover(&self, uri: &str) -> Result<DiscoveryDocument, DiscoveryError> {
        self.fetch(uri).await
    }
}

/// Build RFC 8414 discovery URL
///
/// For issuer without path: `https://example.com/.well-known/oauth-authorization-server`
/// For issuer with path: `https://example.com/.well-known/oauth-authorization-server/path`
fn build_oauth2_discovery_url(issuer: &Url) -> String {
    let mut url = issuer.clone();
    let path = url.path().trim_end_matches('/').to_string();

    if path.is_empty() {
        url.set_path(OAUTH2_WELL_KNOWN);
    } else {
        url.set_path(&format!("{}{}", OAUTH2_WELL_KNOWN, path));
    }
    url.set_query(None);
    url.to_string()
}

/// Build OIDC discovery URL
///
/// OpenID Connect appends to the issuer path: `https://example.com/realm/.well-known/openid-configuration`
fn build_oidc_discovery_url(issuer: &Url) -> String {
    let mut url = issuer.clone();
    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{}{}", path, OIDC_WELL_KNOWN));
    url.set_query(None);
    url.to_string()
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of cache entries
    pub total_entries: usize,

    /// Number of expired entries
    pub expired_entries: usize,

    /// Number of valid entries
    pub valid_entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(cache_control: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static(cache_control));
        headers
    }

    #[test]
    fn test_fetcher_creation() {
        assert!(DiscoveryFetcher::new().is_ok());
    }

    #[test]
    fn test_oauth2_discovery_url_building() {
        let issuer = Url::parse("https://example.com").unwrap();
        assert_eq!(
            build_oauth2_discovery_url(&issuer),
            "https://example.com/.well-known/oauth-authorization-server"
        );

        let issuer = Url::parse("https://example.com/issuer1").unwrap();
        assert_eq!(
            build_oauth2_discovery_url(&issuer),
            "https://example.com/.well-known/oauth-authorization-server/issuer1"
        );
    }

    #[test]
    fn test_oidc_discovery_url_building() {
        let issuer = Url::parse("http://idp.com").unwrap();
        assert_eq!(
            build_oidc_discovery_url(&issuer),
            "http://idp.com/.well-known/openid-configuration"
        );

        let issuer = Url::parse("https://keycloak.example.com/realms/market/").unwrap();
        assert_eq!(
            build_oidc_discovery_url(&issuer),
            "https://keycloak.example.com/realms/market/.well-known/openid-configuration"
        );
    }

    #[test]
    fn test_cache_ttl_parsing() {
        let fetcher = DiscoveryFetcher::new().unwrap();

        assert_eq!(
            fetcher.parse_cache_headers(&headers("max-age=600")),
            Duration::from_secs(600)
        );
        assert_eq!(
            fetcher.parse_cache_headers(&headers("public, max-age=999999")),
            Duration::from_secs(86400)
        );
        assert_eq!(
            fetcher.parse_cache_headers(&headers("max-age=600, no-store")),
            Duration::ZERO
        );
        assert_eq!(
            fetcher.parse_cache_headers(&HeaderMap::new()),
            Duration::from_secs(3600)
        );
    }

    #[tokio::test]
    async fn test_invalid_uri_rejected() {
        let fetcher = DiscoveryFetcher::new().unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidUri { .. }));
    }

    #[test]
    fn test_cache_stats() {
        let fetcher = DiscoveryFetcher::new().unwrap();

        let stats = fetcher.cache_stats();
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.valid_entries, 0);
        assert_eq!(stats.expired_entries, 0);
    }
}
