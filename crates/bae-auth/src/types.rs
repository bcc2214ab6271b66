//! Login attempt types

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tokens returned by the token endpoint
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenSet {
    /// Access token
    pub access_token: String,
    /// Token type, normally `Bearer`
    pub token_type: String,
    /// Refresh token, when issued
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// ID token as issued (not verified here)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// Access token lifetime in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// Granted scopes, when the provider reports them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<Vec<String>>,
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

/// A role assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Role identifier
    pub id: String,
    /// Display name
    pub name: String,
}

impl Role {
    /// Role whose id and name are both `name`
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
        }
    }
}

/// Normalized user profile handed to the completion handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthProfile {
    /// Stable user identifier
    pub id: String,
    /// Login name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Name for display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// E-mail address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Organizations the user belongs to
    pub organizations: Vec<Value>,
    /// Roles held by the user
    pub roles: Vec<Role>,
    /// Raw UserInfo claims
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub claims: Map<String, Value>,
}

/// Query parameters delivered to the redirect URI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackParams {
    /// Authorization code
    #[serde(default)]
    pub code: Option<String>,
    /// Echoed state
    #[serde(default)]
    pub state: Option<String>,
    /// OAuth error code
    #[serde(default)]
    pub error: Option<String>,
    /// OAuth error description
    #[serde(default)]
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Successful callback with a code and state
    pub fn code(code: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            state: Some(state.into()),
            ..Self::default()
        }
    }
}

/// Per-attempt state produced by `begin` and presented again at callback.
///
/// The outer pipeline keeps this in its session store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    /// CSRF state echoed by the provider
    pub state: String,
    /// Nonce bound into the ID token
    pub nonce: String,
    /// PKCE verifier, when PKCE is in use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pkce_verifier: Option<String>,
}

impl fmt::Debug for PendingAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAuthorization")
            .field("state", &self.state)
            .field("nonce", &self.nonce)
            .field("pkce_verifier", &self.pkce_verifier.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Redirect target plus the state to keep until the callback
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// URL to send the browser to
    pub url: url::Url,
    /// State to store until the callback arrives
    pub pending: PendingAuthorization,
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct CompletedLogin {
    /// Provider the user logged in with
    pub provider: String,
    /// Tokens from the token endpoint
    pub tokens: TokenSet,
    /// Normalized profile
    pub profile: AuthProfile,
}

impl CompletedLogin {
    /// Access token
    pub fn access_token(&self) -> &str {
        &self.tokens.access_token
    }

    /// Refresh token, when issued
    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens.refresh_token.as_deref()
    }
}

/// Opaque caller context passed through to the completion handler
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ContextTag(pub String);

impl ContextTag {
    /// Wrap a caller supplied value
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Fresh random tag
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Inner value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
