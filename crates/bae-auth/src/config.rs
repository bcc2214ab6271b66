//! Bridge configuration
//!
//! Per-provider [`StrategyConfig`], the SIOP [`SigningConfig`], discovery
//! settings and logging, loaded from TOML/YAML/JSON with `BAE_` environment
//! overrides.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bae_jwt::SigningConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::discovery::FetcherConfig;
use crate::error::AuthError;

/// Role handed to users whose provider sends none and has no `default_role`
pub const FALLBACK_ROLE: &str = "seller";

/// Environment prefix for configuration overrides
pub const ENV_PREFIX: &str = "BAE";

/// How the client authenticates at the token endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    /// HTTP Basic with client id and secret
    #[default]
    ClientSecretBasic,
    /// Client id and secret in the form body
    ClientSecretPost,
    /// Signed JWT client assertion (RFC 7523)
    PrivateKeyJwt,
    /// Public client, client id only
    None,
}

impl TokenEndpointAuthMethod {
    /// Registered name of the method
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClientSecretBasic => "client_secret_basic",
            Self::ClientSecretPost => "client_secret_post",
            Self::PrivateKeyJwt => "private_key_jwt",
            Self::None => "none",
        }
    }

    /// Whether the method sends the client secret
    pub fn uses_secret(self) -> bool {
        matches!(self, Self::ClientSecretBasic | Self::ClientSecretPost)
    }
}

impl std::fmt::Display for TokenEndpointAuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scopes as configured: a space separated string or a list.
///
/// The configured shape is preserved so it can be echoed back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OidcScopes {
    /// `"openid profile"`
    Single(String),
    /// `["openid", "profile"]`
    List(Vec<String>),
}

impl OidcScopes {
    /// Individual scope values
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::Single(scopes) => scopes.split_whitespace().map(str::to_string).collect(),
            Self::List(scopes) => scopes.clone(),
        }
    }
}

impl Default for OidcScopes {
    fn default() -> Self {
        Self::Single("openid".to_string())
    }
}

/// Static configuration for one identity provider.
///
/// Field names follow snake_case; the camelCase names used by existing
/// deployments are accepted as aliases.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    /// OAuth client id
    #[serde(alias = "clientID", alias = "clientId")]
    pub client_id: String,

    /// OAuth client secret (unused for `none` and `private_key_jwt`)
    #[serde(default, alias = "clientSecret")]
    pub client_secret: Option<SecretString>,

    /// Redirect URI registered with the provider
    #[serde(alias = "callbackURL", alias = "callbackUrl")]
    pub callback_url: String,

    /// Provider base URL; used for discovery when no discovery URI is set
    pub server: String,

    /// Scopes requested at authorization
    #[serde(default, alias = "oidcScopes")]
    pub oidc_scopes: OidcScopes,

    /// Explicit discovery document URI
    #[serde(default, alias = "oidcDiscoveryURI", alias = "oidcDiscoveryUri")]
    pub oidc_discovery_uri: Option<String>,

    /// Token endpoint authentication method
    #[serde(default, alias = "oidcTokenEndpointAuthMethod")]
    pub oidc_token_endpoint_auth_method: TokenEndpointAuthMethod,

    /// Role given to users whose profile carries no roles
    #[serde(default, alias = "defaultRole", alias = "oidcDefaultRole")]
    pub default_role: Option<String>,

    /// Key identifier used as `kid` for JWTs signed on behalf of this provider
    #[serde(default)]
    pub key: Option<String>,

    /// Send a signed `request` object with the authorization redirect
    #[serde(default, alias = "signedRequestObject")]
    pub signed_request_object: bool,
}

impl StrategyConfig {
    /// Minimal configuration; everything else takes its default
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        callback_url: impl Into<String>,
        server: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Some(SecretString::new(client_secret.into())),
            callback_url: callback_url.into(),
            server: server.into(),
            oidc_scopes: OidcScopes::default(),
            oidc_discovery_uri: None,
            oidc_token_endpoint_auth_method: TokenEndpointAuthMethod::default(),
            default_role: None,
            key: None,
            signed_request_object: false,
        }
    }

    /// Set the scopes
    pub fn with_scopes(mut self, scopes: OidcScopes) -> Self {
        self.oidc_scopes = scopes;
        self
    }

    /// Set the discovery URI
    pub fn with_discovery_uri(mut self, uri: impl Into<String>) -> Self {
        self.oidc_discovery_uri = Some(uri.into());
        self
    }

    /// Set the token endpoint auth method
    pub fn with_auth_method(mut self, method: TokenEndpointAuthMethod) -> Self {
        self.oidc_token_endpoint_auth_method = method;
        self
    }

    /// Set the default role
    pub fn with_default_role(mut self, role: impl Into<String>) -> Self {
        self.default_role = Some(role.into());
        self
    }

    /// Set the key identifier
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Enable signed request objects
    pub fn with_signed_request_object(mut self, enabled: bool) -> Self {
        self.signed_request_object = enabled;
        self
    }

    /// URI handed to discovery: `oidc_discovery_uri` when set, else `server`
    pub fn discovery_uri(&self) -> &str {
        self.oidc_discovery_uri
            .as_deref()
            .filter(|uri| !uri.trim().is_empty())
            .unwrap_or(self.server.as_str())
    }

    /// Client secret, when configured and non-empty
    pub fn secret(&self) -> Option<&str> {
        self.client_secret
            .as_ref()
            .map(|secret| secret.expose_secret().as_str())
            .filter(|secret| !secret.is_empty())
    }

    /// Check the fields a strategy cannot work without.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] naming the first problem found.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.client_id.trim().is_empty() {
            return Err(AuthError::InvalidConfig("client_id is empty".to_string()));
        }
        if self.server.trim().is_empty() && self.oidc_discovery_uri.is_none() {
            return Err(AuthError::InvalidConfig(
                "server or oidc_discovery_uri must be set".to_string(),
            ));
        }
        url::Url::parse(&self.callback_url).map_err(|e| {
            AuthError::InvalidConfig(format!("callback_url '{}': {}", self.callback_url, e))
        })?;
        if self.oidc_token_endpoint_auth_method.uses_secret() && self.secret().is_none() {
            return Err(AuthError::InvalidConfig(format!(
                "{} requires client_secret",
                self.oidc_token_endpoint_auth_method
            )));
        }
        if self.oidc_scopes.to_vec().is_empty() {
            return Err(AuthError::InvalidConfig("oidc_scopes is empty".to_string()));
        }
        Ok(())
    }
}

/// Discovery client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    /// Timeout for discovery, token and userinfo requests
    pub request_timeout_secs: u64,
    /// Largest accepted discovery document
    pub max_response_size: usize,
    /// Cache TTL when the provider sends no cache headers
    pub default_cache_ttl_secs: u64,
    /// Upper bound on any cache TTL
    pub max_cache_ttl_secs: u64,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            max_response_size: 64 * 1024,
            default_cache_ttl_secs: 3600,
            max_cache_ttl_secs: 86400,
        }
    }
}

impl DiscoverySettings {
    /// Network timeout as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Fetcher configuration derived from these settings
    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            max_response_size: self.max_response_size,
            request_timeout: self.request_timeout(),
            default_cache_ttl: Duration::from_secs(self.default_cache_ttl_secs),
            max_cache_ttl: Duration::from_secs(self.max_cache_ttl_secs),
            ..FetcherConfig::default()
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub structured: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            structured: false,
        }
    }
}

/// Top-level configuration for the authentication bridge
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// SIOP signing key; required for signed request objects and `private_key_jwt`
    #[serde(default)]
    pub siop: Option<SigningConfig>,

    /// Identity providers by name
    #[serde(default)]
    pub providers: BTreeMap<String, StrategyConfig>,

    /// Role used when neither the profile nor the provider supplies one
    #[serde(default = "default_fallback_role")]
    pub fallback_role: String,

    /// Discovery client settings
    #[serde(default)]
    pub discovery: DiscoverySettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_fallback_role() -> String {
    FALLBACK_ROLE.to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            siop: None,
            providers: BTreeMap::new(),
            fallback_role: default_fallback_role(),
            discovery: DiscoverySettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),
}

impl BridgeConfig {
    /// Load configuration from a file (TOML, YAML, or JSON)
    ///
    /// The file format is auto-detected from the extension. Environment
    /// variables with the `BAE_` prefix override file settings, with `__`
    /// separating nested keys, e.g. `BAE_SIOP__PRIVATE_KEY_PEM=/keys/siop.pem`
    /// or `BAE_PROVIDERS__KEYCLOAK__CLIENT_SECRET=...`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing, has an unknown
    /// extension, or does not deserialize.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_prefix(path, ENV_PREFIX)
    }

    /// Load configuration from a file with a custom environment prefix
    ///
    /// # Errors
    ///
    /// See [`from_file`](Self::from_file).
    pub fn from_file_with_prefix(
        path: impl AsRef<Path>,
        env_prefix: &str,
    ) -> Result<Self, ConfigError> {
        use config::{Config, File, FileFormat};

        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat),
        };

        let config = Config::builder()
            .add_source(File::new(
                path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
                format,
            ))
            .add_source(env_source(env_prefix))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Load configuration from `BAE_` environment variables alone
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseError`] if the variables do not deserialize.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    /// Load configuration from environment variables with a custom prefix
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_env_with_prefix(env_prefix: &str) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(env_source(env_prefix))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Provider configuration by name
    pub fn provider(&self, name: &str) -> Option<&StrategyConfig> {
        self.providers.get(name)
    }
}

// Values stay strings; typed fields are parsed during deserialization so a
// secret such as `0123` keeps its leading zero.
fn env_source(env_prefix: &str) -> config::Environment {
    config::Environment::with_prefix(env_prefix).separator("__")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_camel_case_strategy_config() {
        let config: StrategyConfig = serde_json::from_value(json!({
            "clientID": "client_id",
            "clientSecret": "client_secret",
            "callbackURL": "http://market.com/callback",
            "server": "http://idp.com",
            "oidcScopes": ["openid", "profile", "email"],
            "oidcDiscoveryURI": "http://idp.com/.well-known/openid-configuration",
            "oidcTokenEndpointAuthMethod": "client_secret_basic",
            "defaultRole": "seller",
            "key": "key",
        }))
        .unwrap();

        assert_eq!(config.client_id, "client_id");
        assert_eq!(config.secret(), Some("client_secret"));
        assert_eq!(
            config.discovery_uri(),
            "http://idp.com/.well-known/openid-configuration"
        );
        assert_eq!(
            config.oidc_token_endpoint_auth_method,
            TokenEndpointAuthMethod::ClientSecretBasic
        );
        assert_eq!(config.default_role.as_deref(), Some("seller"));
        assert_eq!(config.key.as_deref(), Some("key"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_discovery_uri_falls_back_to_server() {
        let config = StrategyConfig::new("id", "secret", "http://market.com/cb", "http://idp.com");
        assert_eq!(config.discovery_uri(), "http://idp.com");

        let config = config.with_discovery_uri("");
        assert_eq!(config.discovery_uri(), "http://idp.com");
    }

    #[test]
    fn test_scope_shapes() {
        assert_eq!(
            OidcScopes::Single("openid profile".to_string()).to_vec(),
            vec!["openid", "profile"]
        );
        assert_eq!(
            OidcScopes::List(vec!["openid".to_string()]).to_vec(),
            vec!["openid"]
        );
        assert_eq!(OidcScopes::default().to_vec(), vec!["openid"]);
    }

    #[test]
    fn test_validation_rules() {
        let mut config = StrategyConfig::new("id", "", "http://market.com/cb", "http://idp.com");
        assert!(matches!(config.validate(), Err(AuthError::InvalidConfig(_))));

        config.oidc_token_endpoint_auth_method = TokenEndpointAuthMethod::None;
        assert!(config.validate().is_ok());

        config.callback_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(AuthError::InvalidConfig(_))));
    }

    #[test]
    fn test_from_file_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
fallback_role = "customer"

[siop]
private_key = "1d"
sign_algorithm = "ES256"

[providers.keycloak]
client_id = "bae"
client_secret = "df68d1b9"
callback_url = "http://proxy.docker:8004/auth/keycloak/callback"
server = "http://keycloak.docker:8080/realms/bae"
oidc_scopes = "openid profile"
key = "281e126aa35c80f2"

[discovery]
request_timeout_secs = 5
"#
        )
        .unwrap();

        let config = BridgeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.fallback_role, "customer");
        assert!(config.siop.is_some());
        let keycloak = config.provider("keycloak").unwrap();
        assert_eq!(keycloak.client_id, "bae");
        assert_eq!(keycloak.oidc_scopes.to_vec(), vec!["openid", "profile"]);
        assert_eq!(config.discovery.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.discovery.max_response_size, 64 * 1024);
    }

    #[test]
    fn test_from_file_errors() {
        assert!(matches!(
            BridgeConfig::from_file("/nonexistent/bae.toml"),
            Err(ConfigError::FileNotFound(_))
        ));

        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(matches!(
            BridgeConfig::from_file(file.path()),
            Err(ConfigError::UnsupportedFormat)
        ));
    }
}
