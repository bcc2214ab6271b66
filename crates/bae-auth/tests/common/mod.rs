//! Common test utilities for integration tests
//!
//! A wiremock identity provider serving discovery, token and UserInfo
//! endpoints, plus a completion handler that records what it receives.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bae_auth::discovery::{DiscoveryDocument, DiscoveryError, DiscoverySource, ProviderMetadata};
use bae_auth::{AuthResult, CompletedLogin, ContextTag, LoginCompletion};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Identity provider mock
pub struct MockIdentityProvider {
    pub server: MockServer,
}

impl MockIdentityProvider {
    /// Start a provider; nothing is mounted yet
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn discovery_uri(&self) -> String {
        format!("{}/.well-known/openid-configuration", self.uri())
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/token", self.uri())
    }

    /// Discovery document pointing at this server
    pub fn discovery_document(&self) -> Value {
        let base = self.uri();
        json!({
            "issuer": base,
            "authorization_endpoint": format!("{}/authorize", base),
            "token_endpoint": format!("{}/token", base),
            "userinfo_endpoint": format!("{}/userinfo", base),
            "jwks_uri": format!("{}/jwks", base),
            "response_types_supported": ["code"],
            "code_challenge_methods_supported": ["S256"],
            "token_endpoint_auth_methods_supported": [
                "client_secret_basic",
                "client_secret_post",
                "private_key_jwt",
            ],
        })
    }

    /// Serve the discovery document at the OIDC location
    pub async fn mock_discovery(&self) {
        self.mock_discovery_with(self.discovery_document()).await;
    }

    pub async fn mock_discovery_with(&self, document: Value) {
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(document))
            .mount(&self.server)
            .await;
    }

    /// Successful token response
    pub async fn mock_token_success(&self, access_token: &str, refresh_token: &str) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": access_token,
                "token_type": "Bearer",
                "expires_in": 3600,
                "refresh_token": refresh_token,
                "id_token": "eyJhbGciOiJub25lIn0.e30.",
                "scope": "openid profile email",
            })))
            .mount(&self.server)
            .await;
    }

    /// OAuth error response from the token endpoint
    pub async fn mock_token_error(&self, error: &str, description: &str) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": error,
                "error_description": description,
            })))
            .mount(&self.server)
            .await;
    }

    /// UserInfo response for a given bearer token
    pub async fn mock_userinfo(&self, access_token: &str, claims: Value) {
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", format!("Bearer {}", access_token).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(claims))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_userinfo_error(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Form bodies received at the token endpoint
    pub async fn token_requests(&self) -> Vec<wiremock::Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == "/token")
            .collect()
    }
}

/// Discovery double returning a fixed document and recording requested URIs
pub struct StubDiscovery {
    document: Result<DiscoveryDocument, DiscoveryError>,
    pub requested: Mutex<Vec<String>>,
}

impl StubDiscovery {
    pub fn new(document: Value) -> Self {
        let metadata: ProviderMetadata = serde_json::from_value(document).unwrap();
        Self {
            document: metadata.validate(),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: DiscoveryError) -> Self {
        Self {
            document: Err(error),
            requested: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DiscoverySource for StubDiscovery {
    async fn discover(&self, uri: &str) -> Result<DiscoveryDocument, DiscoveryError> {
        self.requested.lock().await.push(uri.to_string());
        self.document.clone()
    }
}

/// Completion handler recording every call
#[derive(Default)]
pub struct RecordingCompletion {
    pub calls: AtomicUsize,
    pub outcomes: Mutex<Vec<(AuthResult<CompletedLogin>, ContextTag)>>,
}

impl RecordingCompletion {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Take the single recorded outcome
    pub async fn single(&self) -> (AuthResult<CompletedLogin>, ContextTag) {
        let mut outcomes = self.outcomes.lock().await;
        assert_eq!(outcomes.len(), 1, "completion must be called exactly once");
        outcomes.remove(0)
    }
}

#[async_trait]
impl LoginCompletion for RecordingCompletion {
    async fn complete(&self, outcome: AuthResult<CompletedLogin>, tag: ContextTag) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes.lock().await.push((outcome, tag));
    }
}

/// Query parameter from a URL
pub fn query_param(url: &url::Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Decode the claims of a compact JWT without verifying it
pub fn jwt_claims(token: &str) -> Value {
    use base64::Engine;
    let payload = token.split('.').nth(1).unwrap();
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload)
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Decode the header of a compact JWT
pub fn jwt_header(token: &str) -> Value {
    use base64::Engine;
    let header = token.split('.').next().unwrap();
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(header)
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Form-decoded body of a request
pub fn form_body(request: &wiremock::Request) -> Vec<(String, String)> {
    url::form_urlencoded::parse(&request.body)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

pub fn form_value(request: &wiremock::Request, name: &str) -> Option<String> {
    form_body(request)
        .into_iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value)
}
