//! Error taxonomy for strategy construction and login attempts

use bae_jwt::{KeyLoadError, SigningError};
use thiserror::Error;

use crate::discovery::DiscoveryError;

/// Errors surfaced by strategies, the factory and the provider registry.
///
/// Construction errors (`Discovery`, `KeyLoad`, `InvalidConfig`) stop a single
/// provider from being built. Everything else belongs to one login attempt and
/// is handed to the completion handler.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The provider's discovery document could not be obtained
    #[error("Discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// The signing key could not be loaded
    #[error("Signing key unavailable: {0}")]
    KeyLoad(#[from] KeyLoadError),

    /// A request object or client assertion could not be signed
    #[error("Signing failed: {0}")]
    Signing(#[from] SigningError),

    /// Provider configuration is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The identity provider returned an OAuth error response
    #[error("Provider returned '{error}'{}", suffix(.description))]
    Provider {
        /// OAuth `error` code
        error: String,
        /// OAuth `error_description`, when sent
        description: Option<String>,
    },

    /// The callback `state` does not match the pending authorization
    #[error("State mismatch in authorization callback")]
    StateMismatch,

    /// The callback carried neither a code nor an error
    #[error("Authorization callback is missing the code parameter")]
    MissingCode,

    /// Token endpoint call failed
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    /// UserInfo call failed or returned an unusable profile
    #[error("Profile fetch failed: {0}")]
    ProfileFetch(String),

    /// No strategy is registered under this name
    #[error("Unknown identity provider: {0}")]
    UnknownProvider(String),
}

fn suffix(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(": {}", d))
        .unwrap_or_default()
}

/// Result alias for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
