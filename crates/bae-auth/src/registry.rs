//! Provider Registry
//!
//! Holds one [`OidcStrategy`] per configured identity provider. Providers are
//! built concurrently and a provider that fails construction is recorded and
//! skipped; the others keep serving.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bae_jwt::JwtSigner;
use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::config::{BridgeConfig, OidcScopes};
use crate::discovery::{DiscoveryFetcher, DiscoverySource};
use crate::error::{AuthError, AuthResult};
use crate::strategy::{LoginCompletion, LoginStatus, OidcStrategy, Strategy, StrategyFactory};
use crate::types::{AuthorizationRequest, CallbackParams, ContextTag, PendingAuthorization};

/// Strategies by provider name
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    strategies: Arc<RwLock<HashMap<String, Arc<OidcStrategy>>>>,
    failures: BTreeMap<String, String>,
}

impl ProviderRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every provider in `config`.
    ///
    /// Discovery for all providers runs concurrently. Failures are logged and
    /// reported by [`failures`](Self::failures).
    pub async fn build(
        config: &BridgeConfig,
        discovery: Arc<dyn DiscoverySource>,
        signer: Option<Arc<JwtSigner>>,
        completion: Arc<dyn LoginCompletion>,
    ) -> Self {
        let timeout = config.discovery.request_timeout();

        let builds = config.providers.iter().map(|(name, provider)| {
            let mut factory = StrategyFactory::new(provider.clone(), Arc::clone(&discovery))
                .with_name(name.clone())
                .with_fallback_role(config.fallback_role.clone())
                .with_request_timeout(timeout);
            if let Some(signer) = &signer {
                factory = factory.with_signer(Arc::clone(signer));
            }
            let completion = Arc::clone(&completion);
            async move { (name.clone(), factory.build(completion).await) }
        });

        let mut strategies = HashMap::new();
        let mut failures = BTreeMap::new();
        for (name, result) in join_all(builds).await {
            match result {
                Ok(strategy) => {
                    strategies.insert(name, Arc::new(strategy));
                }
                Err(e) => {
                    error!(provider = %name, error = %e, "Identity provider unavailable");
                    failures.insert(name, e.to_string());
                }
            }
        }

        info!(
            ready = strategies.len(),
            failed = failures.len(),
            "Provider registry built"
        );

        Self {
            strategies: Arc::new(RwLock::new(strategies)),
            failures,
        }
    }

    /// Build from configuration alone: the signer from `siop` and a
    /// [`DiscoveryFetcher`] from the discovery settings.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyLoad`] if `siop` is set but its key cannot be
    /// loaded, and [`AuthError::Discovery`] if the fetcher cannot be created.
    /// Individual provider failures are not errors.
    pub async fn from_config(
        config: &BridgeConfig,
        completion: Arc<dyn LoginCompletion>,
    ) -> AuthResult<Self> {
        let signer = match &config.siop {
            Some(siop) => Some(Arc::new(JwtSigner::new(siop)?)),
            None => None,
        };
        let fetcher = DiscoveryFetcher::with_config(config.discovery.fetcher_config())?;

        Ok(Self::build(config, Arc::new(fetcher), signer, completion).await)
    }

    /// Register a strategy under its own name, replacing any previous one
    pub async fn add(&self, strategy: OidcStrategy) {
        let name = strategy.name().to_string();
        self.strategies.write().await.insert(name, Arc::new(strategy));
    }

    /// Remove a provider
    pub async fn remove(&self, name: &str) -> bool {
        self.strategies.write().await.remove(name).is_some()
    }

    /// Strategy for `name`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownProvider`] if no strategy is registered.
    pub async fn get(&self, name: &str) -> AuthResult<Arc<OidcStrategy>> {
        self.strategies
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| AuthError::UnknownProvider(name.to_string()))
    }

    /// Names of the available providers, sorted
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.strategies.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Providers that failed construction, with the reason
    pub fn failures(&self) -> &BTreeMap<String, String> {
        &self.failures
    }

    /// Configured scopes of `name`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownProvider`] if no strategy is registered.
    pub async fn scope(&self, name: &str) -> AuthResult<OidcScopes> {
        Ok(self.get(name).await?.scope().clone())
    }

    /// Start a login with `name`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownProvider`] or the error from
    /// [`Strategy::begin`].
    pub async fn begin(&self, name: &str) -> AuthResult<AuthorizationRequest> {
        self.get(name).await?.begin()
    }

    /// Route a callback to `name`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownProvider`] without calling any completion
    /// handler. Every other outcome goes to the provider's handler.
    pub async fn handle_callback(
        &self,
        name: &str,
        params: CallbackParams,
        pending: &PendingAuthorization,
        tag: ContextTag,
    ) -> AuthResult<LoginStatus> {
        let strategy = self.get(name).await?;
        Ok(strategy.handle_callback(params, pending, tag).await)
    }

    /// Number of available providers
    pub async fn len(&self) -> usize {
        self.strategies.read().await.len()
    }

    /// Whether no provider is available
    pub async fn is_empty(&self) -> bool {
        self.strategies.read().await.is_empty()
    }
}
