//! Strategy construction from configuration plus discovery

use std::sync::Arc;
use std::time::Duration;

use bae_jwt::JwtSigner;
use tracing::{info, warn};

use super::{LoginCompletion, Strategy};
use super::oidc::{OidcStrategy, StrategyParts};
use crate::config::{FALLBACK_ROLE, StrategyConfig, TokenEndpointAuthMethod};
use crate::discovery::DiscoverySource;
use crate::error::{AuthError, AuthResult};
use crate::http_client::IdpHttpClient;

/// Builds an [`OidcStrategy`] for one provider.
///
/// Discovery runs inside [`build`](Self::build); a strategy is only returned
/// once the provider's metadata has been fetched and validated.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use bae_auth::config::StrategyConfig;
/// # use bae_auth::discovery::DiscoveryFetcher;
/// # use bae_auth::strategy::StrategyFactory;
/// # use bae_auth::{AuthResult, CompletedLogin, ContextTag};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = StrategyConfig::new("bae", "secret", "https://market.example/auth/callback", "https://idp.example");
/// let strategy = StrategyFactory::new(config, Arc::new(DiscoveryFetcher::new()?))
///     .with_name("keycloak")
///     .build(Arc::new(|outcome: AuthResult<CompletedLogin>, tag: ContextTag| async move {
///         println!("{tag}: {}", outcome.is_ok());
///     }))
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct StrategyFactory {
    config: StrategyConfig,
    discovery: Arc<dyn DiscoverySource>,
    signer: Option<Arc<JwtSigner>>,
    name: String,
    fallback_role: String,
    request_timeout: Duration,
}

impl StrategyFactory {
    /// Factory for `config`, resolving metadata through `discovery`
    pub fn new(config: StrategyConfig, discovery: Arc<dyn DiscoverySource>) -> Self {
        Self {
            config,
            discovery,
            signer: None,
            name: "oidc".to_string(),
            fallback_role: FALLBACK_ROLE.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Signer for request objects and client assertions
    pub fn with_signer(mut self, signer: Arc<JwtSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Provider name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Role used when the provider config has no `default_role`
    pub fn with_fallback_role(mut self, role: impl Into<String>) -> Self {
        self.fallback_role = role.into();
        self
    }

    /// Timeout for token and userinfo requests
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Validate the configuration, run discovery and assemble the strategy.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidConfig`] if the configuration is incomplete or a
    ///   signing feature is enabled without a signer
    /// - [`AuthError::Discovery`] if the discovery document cannot be obtained
    pub async fn build(self, completion: Arc<dyn LoginCompletion>) -> AuthResult<OidcStrategy> {
        self.config.validate()?;

        let method = self.config.oidc_token_endpoint_auth_method;
        if self.signer.is_none() {
            if self.config.signed_request_object {
                return Err(AuthError::InvalidConfig(format!(
                    "provider '{}' enables signed request objects but no signing key is configured",
                    self.name
                )));
            }
            if method == TokenEndpointAuthMethod::PrivateKeyJwt {
                return Err(AuthError::InvalidConfig(format!(
                    "provider '{}' uses private_key_jwt but no signing key is configured",
                    self.name
                )));
            }
        }

        let document = self.discovery.discover(self.config.discovery_uri()).await?;

        if !document.supports_auth_method(method.as_str()) {
            warn!(
                provider = %self.name,
                method = %method,
                "Token endpoint auth method is not advertised by the provider"
            );
        }

        let http = IdpHttpClient::new(self.request_timeout)
            .map_err(|e| AuthError::InvalidConfig(format!("HTTP client: {}", e)))?;

        let default_role = self
            .config
            .default_role
            .clone()
            .filter(|role| !role.is_empty())
            .unwrap_or(self.fallback_role);

        let strategy = OidcStrategy::from_parts(StrategyParts {
            name: self.name,
            config: self.config,
            document,
            http,
            signer: self.signer,
            default_role,
            completion,
        })?;

        info!(
            provider = %strategy.name(),
            issuer = %strategy.metadata().issuer.as_deref().unwrap_or("-"),
            client_id = %strategy.config().client_id,
            pkce = strategy.uses_pkce(),
            "OIDC strategy ready"
        );

        Ok(strategy)
    }
}

impl std::fmt::Debug for StrategyFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyFactory")
            .field("name", &self.name)
            .field("client_id", &self.config.client_id)
            .field("signer", &self.signer.is_some())
            .finish_non_exhaustive()
    }
}
