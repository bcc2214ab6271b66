//! OpenID Connect authorization code strategy
//!
//! Built by [`StrategyFactory`](super::StrategyFactory) from a validated
//! [`DiscoveryDocument`]. Everything here is read-only after construction, so
//! one strategy serves any number of concurrent login attempts.

use std::sync::Arc;

use async_trait::async_trait;
use bae_jwt::{JwtSigner, SignOptions};
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, ExtraTokenFields, PkceCodeChallenge, PkceCodeVerifier,
    RedirectUrl, RequestTokenError, Scope, StandardRevocableToken, StandardTokenResponse,
    TokenResponse, TokenUrl,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use super::{LoginCompletion, LoginFlow, LoginStatus, Strategy, normalize_profile, verify_callback};
use crate::config::{OidcScopes, StrategyConfig, TokenEndpointAuthMethod};
use crate::discovery::DiscoveryDocument;
use crate::error::{AuthError, AuthResult};
use crate::http_client::IdpHttpClient;
use crate::types::{
    AuthProfile, AuthorizationRequest, CallbackParams, ContextTag, PendingAuthorization, TokenSet,
};

/// Lifetime of a signed request object
const REQUEST_OBJECT_LIFETIME: Duration = Duration::from_secs(300);

/// Lifetime of a `private_key_jwt` client assertion
const CLIENT_ASSERTION_LIFETIME: Duration = Duration::from_secs(60);

const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Token response fields beyond RFC 6749: the OIDC `id_token`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdTokenFields {
    /// ID token as issued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl ExtraTokenFields for IdTokenFields {}

/// Token endpoint response carrying an optional ID token
pub type OidcTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

/// oauth2 client with the authorization and token endpoints set
type ConfiguredClient = Client<
    BasicErrorResponse,
    OidcTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// Client parameters a strategy was constructed with
#[derive(Debug, Clone)]
pub struct ClientParams {
    /// URI discovery was performed against
    pub discovery_uri: String,
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: Option<SecretString>,
    /// Registered redirect URIs
    pub redirect_uris: Vec<String>,
    /// Token endpoint authentication method
    pub token_endpoint_auth_method: TokenEndpointAuthMethod,
}

/// Everything the factory resolved for one provider
pub(crate) struct StrategyParts {
    pub name: String,
    pub config: StrategyConfig,
    pub document: DiscoveryDocument,
    pub http: IdpHttpClient,
    pub signer: Option<Arc<JwtSigner>>,
    pub default_role: String,
    pub completion: Arc<dyn LoginCompletion>,
}

/// OIDC authorization code login against one identity provider
pub struct OidcStrategy {
    name: String,
    config: StrategyConfig,
    document: Arc<DiscoveryDocument>,
    client: ConfiguredClient,
    http: IdpHttpClient,
    signer: Option<Arc<JwtSigner>>,
    default_role: String,
    completion: Arc<dyn LoginCompletion>,
    use_pkce: bool,
}

impl OidcStrategy {
    /// Assemble the oauth2 client from discovered endpoints
    pub(crate) fn from_parts(parts: StrategyParts) -> AuthResult<Self> {
        let StrategyParts {
            name,
            config,
            document,
            http,
            signer,
            default_role,
            completion,
        } = parts;

        let auth_url = AuthUrl::new(document.authorization_endpoint.clone())
            .map_err(|e| AuthError::InvalidConfig(format!("authorization_endpoint: {}", e)))?;
        let token_url = TokenUrl::new(document.token_endpoint.clone())
            .map_err(|e| AuthError::InvalidConfig(format!("token_endpoint: {}", e)))?;
        let redirect_url = RedirectUrl::new(config.callback_url.clone())
            .map_err(|e| AuthError::InvalidConfig(format!("callback_url: {}", e)))?;

        let mut client: ConfiguredClient = Client::new(ClientId::new(config.client_id.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        let method = config.oidc_token_endpoint_auth_method;
        if method.uses_secret()
            && let Some(secret) = config.secret()
        {
            client = client.set_client_secret(ClientSecret::new(secret.to_string()));
        }
        client = client.set_auth_type(match method {
            TokenEndpointAuthMethod::ClientSecretBasic => AuthType::BasicAuth,
            _ => AuthType::RequestBody,
        });

        let use_pkce = document.supports_pkce_s256();

        Ok(Self {
            name,
            config,
            document: Arc::new(document),
            client,
            http,
            signer,
            default_role,
            completion,
            use_pkce,
        })
    }

    /// Configuration the strategy was built from, unchanged
    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Discovered provider metadata
    pub fn metadata(&self) -> &DiscoveryDocument {
        &self.document
    }

    /// Client parameters derived from the configuration
    pub fn client_params(&self) -> ClientParams {
        ClientParams {
            discovery_uri: self.config.discovery_uri().to_string(),
            client_id: self.config.client_id.clone(),
            client_secret: self.config.client_secret.clone(),
            redirect_uris: vec![self.config.callback_url.clone()],
            token_endpoint_auth_method: self.config.oidc_token_endpoint_auth_method,
        }
    }

    /// Whether authorization requests carry a PKCE challenge
    pub fn uses_pkce(&self) -> bool {
        self.use_pkce
    }

    /// Role given to profiles without a `roles` claim
    pub fn default_role(&self) -> &str {
        &self.default_role
    }

    fn audience(&self) -> &str {
        self.document.audience_or(&self.config.server)
    }

    fn signer(&self) -> AuthResult<&JwtSigner> {
        self.signer.as_deref().ok_or_else(|| {
            AuthError::InvalidConfig(format!("provider '{}' has no signing key", self.name))
        })
    }

    fn with_key_id(&self, options: SignOptions) -> SignOptions {
        match &self.config.key {
            Some(kid) => options.with_key_id(kid.clone()),
            None => options,
        }
    }

    fn sign_request_object(
        &self,
        state: &str,
        nonce: &str,
        scopes: &[String],
        pkce_challenge: Option<&PkceCodeChallenge>,
    ) -> AuthResult<String> {
        let signer = self.signer()?;
        let mut claims = json!({
            "iss": self.config.client_id,
            "client_id": self.config.client_id,
            "aud": self.audience(),
            "response_type": "code",
            "redirect_uri": self.config.callback_url,
            "scope": scopes.join(" "),
            "state": state,
            "nonce": nonce,
            "jti": uuid::Uuid::new_v4().to_string(),
        });
        // Providers enforcing JAR ignore query parameters outside the request object
        if let Some(challenge) = pkce_challenge {
            claims["code_challenge"] = json!(challenge.as_str());
            claims["code_challenge_method"] = json!("S256");
        }
        let options = self.with_key_id(
            SignOptions::request_object(signer.algorithm()).expires_in(REQUEST_OBJECT_LIFETIME),
        );
        Ok(signer.sign_jwt(&claims, &options)?)
    }

    fn sign_client_assertion(&self) -> AuthResult<String> {
        let signer = self.signer()?;
        let claims = json!({
            "iss": self.config.client_id,
            "sub": self.config.client_id,
            "aud": self.document.token_endpoint,
            "jti": uuid::Uuid::new_v4().to_string(),
        });
        let options = self.with_key_id(
            SignOptions::client_assertion(signer.algorithm()).expires_in(CLIENT_ASSERTION_LIFETIME),
        );
        Ok(signer.sign_jwt(&claims, &options)?)
    }
}

impl std::fmt::Debug for OidcStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcStrategy")
            .field("name", &self.name)
            .field("client_id", &self.config.client_id)
            .field("authorization_endpoint", &self.document.authorization_endpoint)
            .field("token_endpoint", &self.document.token_endpoint)
            .field("use_pkce", &self.use_pkce)
            .field("signer", &self.signer.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LoginFlow for OidcStrategy {
    fn provider(&self) -> &str {
        &self.name
    }

    async fn exchange_token(
        &self,
        params: &CallbackParams,
        pending: &PendingAuthorization,
    ) -> AuthResult<TokenSet> {
        let code = verify_callback(params, pending)?;

        let mut request = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()));

        if let Some(verifier) = &pending.pkce_verifier {
            request = request.set_pkce_verifier(PkceCodeVerifier::new(verifier.clone()));
        }

        if self.config.oidc_token_endpoint_auth_method == TokenEndpointAuthMethod::PrivateKeyJwt {
            let assertion = self.sign_client_assertion()?;
            request = request
                .add_extra_param("client_assertion_type", CLIENT_ASSERTION_TYPE)
                .add_extra_param("client_assertion", assertion);
        }

        let response = request.request_async(&self.http).await.map_err(|e| match e {
            RequestTokenError::ServerResponse(response) => AuthError::Provider {
                error: response.error().to_string(),
                description: response.error_description().cloned(),
            },
            other => AuthError::TokenExchange(other.to_string()),
        })?;

        debug!(provider = %self.name, "Authorization code exchanged");

        Ok(TokenSet {
            access_token: response.access_token().secret().clone(),
            token_type: response.token_type().as_ref().to_string(),
            refresh_token: response.refresh_token().map(|t| t.secret().clone()),
            id_token: response.extra_fields().id_token.clone(),
            expires_in: response.expires_in().map(|d| d.as_secs()),
            scope: response
                .scopes()
                .map(|scopes| scopes.iter().map(|s| s.as_str().to_string()).collect()),
        })
    }

    async fn fetch_profile(&self, tokens: &TokenSet) -> AuthResult<AuthProfile> {
        let endpoint = self.document.userinfo_endpoint.as_deref().ok_or_else(|| {
            AuthError::ProfileFetch(format!(
                "provider '{}' does not publish a userinfo endpoint",
                self.name
            ))
        })?;

        let response = self
            .http
            .client()
            .get(endpoint)
            .bearer_auth(&tokens.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AuthError::ProfileFetch(format!("Userinfo request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AuthError::ProfileFetch(format!(
                "Userinfo endpoint returned status {}",
                response.status()
            )));
        }

        let claims = match response.json::<Value>().await {
            Ok(Value::Object(claims)) => claims,
            Ok(_) => {
                return Err(AuthError::ProfileFetch(
                    "Userinfo response is not a JSON object".to_string(),
                ));
            }
            Err(e) => {
                return Err(AuthError::ProfileFetch(format!(
                    "Failed to parse userinfo response: {}",
                    e
                )));
            }
        };

        normalize_profile(claims, &self.default_role)
    }
}

#[async_trait]
impl Strategy for OidcStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn scope(&self) -> &OidcScopes {
        &self.config.oidc_scopes
    }

    fn begin(&self) -> AuthResult<AuthorizationRequest> {
        let state = CsrfToken::new_random();
        let state_value = state.secret().clone();
        let nonce = CsrfToken::new_random().into_secret();
        let scopes = self.config.oidc_scopes.to_vec();

        let mut request = self
            .client
            .authorize_url(move || state)
            .add_scopes(scopes.iter().cloned().map(Scope::new))
            .add_extra_param("nonce", nonce.clone());

        let (pkce_challenge, pkce_verifier) = if self.use_pkce {
            let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
            (Some(challenge), Some(verifier.into_secret()))
        } else {
            (None, None)
        };

        if self.config.signed_request_object {
            let request_object =
                self.sign_request_object(&state_value, &nonce, &scopes, pkce_challenge.as_ref())?;
            request = request.add_extra_param("request", request_object);
        }

        if let Some(challenge) = pkce_challenge {
            request = request.set_pkce_challenge(challenge);
        }

        let (url, _) = request.url();
        debug!(provider = %self.name, pkce = self.use_pkce, "Authorization redirect built");

        Ok(AuthorizationRequest {
            url,
            pending: PendingAuthorization {
                state: state_value,
                nonce,
                pkce_verifier,
            },
        })
    }

    async fn handle_callback(
        &self,
        params: CallbackParams,
        pending: &PendingAuthorization,
        tag: ContextTag,
    ) -> LoginStatus {
        self.complete_login(&params, pending, self.completion.as_ref(), tag)
            .await
    }
}
