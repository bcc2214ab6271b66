//! # bae-auth
//!
//! OpenID Connect login for the Business API Ecosystem: discovery, per-provider
//! login strategies and the registry that serves them.
//!
//! ## Architecture
//!
//! - [`discovery`] - discovery document fetching, validation and caching
//! - [`strategy`] - [`StrategyFactory`], [`OidcStrategy`] and the [`LoginFlow`] seam
//! - [`registry`] - every configured provider, built concurrently
//! - [`config`] - [`BridgeConfig`] loading with `BAE_` environment overrides
//! - [`logging`] - tracing subscriber setup
//!
//! Signing keys and JWT production live in the `bae-jwt` crate.
//!
//! ## Login flow
//!
//! 1. [`Strategy::begin`] returns the redirect URL and a [`PendingAuthorization`]
//!    the caller keeps in its session
//! 2. [`Strategy::handle_callback`] validates the callback, exchanges the code,
//!    fetches the profile and reports to the [`LoginCompletion`] handler
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bae_auth::{AuthResult, BridgeConfig, CompletedLogin, ContextTag, ProviderRegistry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BridgeConfig::from_file("/etc/bae/auth.toml")?;
//! let registry = ProviderRegistry::from_config(
//!     &config,
//!     Arc::new(|outcome: AuthResult<CompletedLogin>, tag: ContextTag| async move {
//!         match outcome {
//!             Ok(login) => println!("{tag}: {} logged in", login.profile.id),
//!             Err(e) => eprintln!("{tag}: {e}"),
//!         }
//!     }),
//! )
//! .await?;
//!
//! let redirect = registry.begin("keycloak").await?;
//! println!("{}", redirect.url);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod discovery;
pub mod error;
pub mod http_client;
pub mod logging;
pub mod registry;
pub mod strategy;
pub mod types;

pub use config::{
    BridgeConfig, ConfigError, LoggingConfig, OidcScopes, StrategyConfig, TokenEndpointAuthMethod,
};
pub use discovery::{DiscoveryDocument, DiscoveryError, DiscoveryFetcher, DiscoverySource};
pub use error::{AuthError, AuthResult};
pub use registry::ProviderRegistry;
pub use strategy::{
    ClientParams, LoginCompletion, LoginFlow, LoginStatus, OidcStrategy, Strategy,
    StrategyFactory, normalize_profile,
};
pub use types::{
    AuthProfile, AuthorizationRequest, CallbackParams, CompletedLogin, ContextTag,
    PendingAuthorization, Role, TokenSet,
};

pub use bae_jwt;
