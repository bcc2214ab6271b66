//! # Discovery Document Types
//!
//! Raw OpenID Connect Discovery 1.0 / RFC 8414 metadata as served by an
//! identity provider, and the validated [`DiscoveryDocument`] strategies are
//! built from.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

/// Errors raised while fetching or validating a discovery document
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    /// The discovery URI or server URL is not a valid URL
    #[error("Invalid discovery URI '{uri}': {reason}")]
    InvalidUri {
        /// URI as configured
        uri: String,
        /// Parse failure
        reason: String,
    },

    /// HTTP client construction or transport failure
    #[error("HTTP request to {uri} failed: {reason}")]
    Http {
        /// URL that was requested
        uri: String,
        /// Transport failure
        reason: String,
    },

    /// The provider did not answer in time
    #[error("Discovery request to {uri} timed out")]
    Timeout {
        /// URL that was requested
        uri: String,
    },

    /// Non-success HTTP status
    #[error("Discovery request to {uri} returned HTTP {status}")]
    Status {
        /// URL that was requested
        uri: String,
        /// Status code returned
        status: u16,
    },

    /// Response body exceeded the configured limit
    #[error("Discovery response exceeds {limit} bytes")]
    ResponseTooLarge {
        /// Configured limit in bytes
        limit: usize,
    },

    /// Response body is not a JSON discovery document
    #[error("Invalid discovery JSON: {0}")]
    InvalidJson(String),

    /// A required field is absent
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// A field is present but unusable
    #[error("Invalid field value for {field}: {reason}")]
    InvalidField {
        /// Field name
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// Neither the OIDC nor the RFC 8414 location produced a document
    #[error("All discovery endpoints failed. OIDC: {oidc_error}, RFC 8414: {oauth2_error}")]
    AllEndpointsFailed {
        /// Failure at `/.well-known/openid-configuration`
        oidc_error: String,
        /// Failure at `/.well-known/oauth-authorization-server`
        oauth2_error: String,
    },
}

/// Provider metadata exactly as served.
///
/// Every field is optional here; [`validate`](Self::validate) turns it into a
/// [`DiscoveryDocument`] once the endpoints a login needs are confirmed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProviderMetadata {
    /// Issuer identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// Authorization endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,

    /// Token endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,

    /// UserInfo endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<String>,

    /// JWK Set document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,

    /// RP-initiated logout endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,

    /// Dynamic client registration endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_endpoint: Option<String>,

    /// Supported scopes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    /// Supported `response_type` values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_types_supported: Option<Vec<String>>,

    /// Supported token endpoint client authentication methods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_methods_supported: Option<Vec<String>>,

    /// Supported PKCE challenge methods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_methods_supported: Option<Vec<String>>,

    /// Algorithms accepted for signed request objects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_object_signing_alg_values_supported: Option<Vec<String>>,

    /// Whether the `request` parameter is accepted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_parameter_supported: Option<bool>,

    /// Everything else the provider publishes
    #[serde(flatten)]
    pub additional_fields: BTreeMap<String, serde_json::Value>,
}

impl ProviderMetadata {
    /// Check the endpoints a login needs and produce a [`DiscoveryDocument`].
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::MissingField`] when `authorization_endpoint` or
    /// `token_endpoint` is absent, and [`DiscoveryError::InvalidField`] when any
    /// endpoint is not an absolute URL.
    pub fn validate(self) -> Result<DiscoveryDocument, DiscoveryError> {
        let authorization_endpoint = require_endpoint(
            "authorization_endpoint",
            self.authorization_endpoint,
        )?;
        let token_endpoint = require_endpoint("token_endpoint", self.token_endpoint)?;

        for (field, value) in [
            ("userinfo_endpoint", &self.userinfo_endpoint),
            ("jwks_uri", &self.jwks_uri),
            ("end_session_endpoint", &self.end_session_endpoint),
        ] {
            if let Some(value) = value {
                check_url(field, value)?;
            }
        }

        Ok(DiscoveryDocument {
            issuer: self.issuer,
            authorization_endpoint,
            token_endpoint,
            userinfo_endpoint: self.userinfo_endpoint,
            jwks_uri: self.jwks_uri,
            end_session_endpoint: self.end_session_endpoint,
            registration_endpoint: self.registration_endpoint,
            scopes_supported: self.scopes_supported,
            response_types_supported: self.response_types_supported,
            token_endpoint_auth_methods_supported: self.token_endpoint_auth_methods_supported,
            code_challenge_methods_supported: self.code_challenge_methods_supported,
            request_object_signing_alg_values_supported: self
                .request_object_signing_alg_values_supported,
            request_parameter_supported: self.request_parameter_supported,
            additional_fields: self.additional_fields,
        })
    }
}

fn require_endpoint(field: &str, value: Option<String>) -> Result<String, DiscoveryError> {
    let value = value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| DiscoveryError::MissingField(field.to_string()))?;
    check_url(field, &value)?;
    Ok(value)
}

fn check_url(field: &str, value: &str) -> Result<(), DiscoveryError> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| DiscoveryError::InvalidField {
            field: field.to_string(),
            reason: format!("Invalid URL: {}", e),
        })
}

/// Validated provider metadata.
///
/// Immutable once built; a strategy keeps the document it was constructed with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryDocument {
    /// Issuer identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// Authorization endpoint
    pub authorization_endpoint: String,

    /// Token endpoint
    pub token_endpoint: String,

    /// UserInfo endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<String>,

    /// JWK Set document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,

    /// RP-initiated logout endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,

    /// Dynamic client registration endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_endpoint: Option<String>,

    /// Supported scopes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    /// Supported `response_type` values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_types_supported: Option<Vec<String>>,

    /// Supported token endpoint client authentication methods
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_methods_supported: Option<Vec<String>>,

    /// Supported PKCE challenge methods
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge_methods_supported: Option<Vec<String>>,

    /// Algorithms accepted for signed request objects
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_object_signing_alg_values_supported: Option<Vec<String>>,

    /// Whether the `request` parameter is accepted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_parameter_supported: Option<bool>,

    /// Everything else the provider publishes
    #[serde(flatten)]
    pub additional_fields: BTreeMap<String, serde_json::Value>,
}

impl DiscoveryDocument {
    /// Whether the provider advertises the S256 PKCE method
    pub fn supports_pkce_s256(&self) -> bool {
        self.code_challenge_methods_supported
            .as_ref()
            .is_some_and(|methods| methods.iter().any(|m| m == "S256"))
    }

    /// Whether `method` is an accepted token endpoint auth method.
    ///
    /// Providers that omit the list implicitly support `client_secret_basic` only.
    pub fn supports_auth_method(&self, method: &str) -> bool {
        match &self.token_endpoint_auth_methods_supported {
            Some(methods) => methods.iter().any(|m| m == method),
            None => method == "client_secret_basic",
        }
    }

    /// Audience for request objects and client assertions: the issuer when
    /// published, otherwise `fallback`
    pub fn audience_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.issuer.as_deref().unwrap_or(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(value: serde_json::Value) -> ProviderMetadata {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_minimal_document_validates() {
        let doc = metadata(json!({
            "authorization_endpoint": "http://idp.com/auth",
            "token_endpoint": "http://idp.com/token",
        }))
        .validate()
        .unwrap();

        assert_eq!(doc.authorization_endpoint, "http://idp.com/auth");
        assert_eq!(doc.token_endpoint, "http://idp.com/token");
        assert!(doc.userinfo_endpoint.is_none());
        assert!(!doc.supports_pkce_s256());
    }

    #[test]
    fn test_missing_endpoints_rejected() {
        let err = metadata(json!({"token_endpoint": "http://idp.com/token"}))
            .validate()
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::MissingField(f) if f == "authorization_endpoint"));

        let err = metadata(json!({"authorization_endpoint": "http://idp.com/auth"}))
            .validate()
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::MissingField(f) if f == "token_endpoint"));
    }

    #[test]
    fn test_relative_endpoint_rejected() {
        let err = metadata(json!({
            "authorization_endpoint": "/auth",
            "token_endpoint": "http://idp.com/token",
        }))
        .validate()
        .unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidField { .. }));
    }

    #[test]
    fn test_extra_fields_preserved() {
        let doc = metadata(json!({
            "authorization_endpoint": "http://idp.com/auth",
            "token_endpoint": "http://idp.com/token",
            "claims_supported": ["sub", "email"],
        }))
        .validate()
        .unwrap();

        assert_eq!(
            doc.additional_fields.get("claims_supported"),
            Some(&json!(["sub", "email"]))
        );
    }

    #[test]
    fn test_capability_helpers() {
        let doc = metadata(json!({
            "issuer": "http://idp.com",
            "authorization_endpoint": "http://idp.com/auth",
            "token_endpoint": "http://idp.com/token",
            "code_challenge_methods_supported": ["plain", "S256"],
            "token_endpoint_auth_methods_supported": ["client_secret_post", "private_key_jwt"],
        }))
        .validate()
        .unwrap();

        assert!(doc.supports_pkce_s256());
        assert!(doc.supports_auth_method("private_key_jwt"));
        assert!(!doc.supports_auth_method("client_secret_basic"));
        assert_eq!(doc.audience_or("http://fallback"), "http://idp.com");
    }
}
