//! # Identity Provider Discovery
//!
//! Fetches an identity provider's OpenID Connect discovery document, checks
//! that it carries the endpoints a login needs, and caches it per URI.
//!
//! ## Endpoint Priority
//!
//! 1. An explicit `.well-known` URI (the usual `oidc_discovery_uri` setting)
//! 2. **OIDC Discovery 1.0**: `<issuer>/.well-known/openid-configuration`
//! 3. **RFC 8414** (fallback): `/.well-known/oauth-authorization-server[/path]`
//!
//! ## Caching Strategy
//!
//! - Respects HTTP `Cache-Control` headers (`max-age`, `no-cache`, `no-store`)
//! - Default cache TTL: 1 hour, capped at 24 hours
//! - [`DiscoveryFetcher::invalidate`] forces the next fetch to hit the network
//!
//! Strategies copy the document they were built with, so a refreshed cache
//! only affects strategies built afterwards.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use bae_auth::discovery::{DiscoveryFetcher, DiscoverySource};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = DiscoveryFetcher::new()?;
//! let document = fetcher
//!     .discover("https://idp.example.com/.well-known/openid-configuration")
//!     .await?;
//! println!("authorize at {}", document.authorization_endpoint);
//! # Ok(())
//! # }
//! ```

pub mod fetcher;
pub mod types;

pub use fetcher::{CacheStats, DiscoveryFetcher, DiscoverySource, FetcherConfig};
pub use types::{DiscoveryDocument, DiscoveryError, ProviderMetadata};
