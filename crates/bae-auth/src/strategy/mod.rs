//! # Login Strategies
//!
//! A strategy turns a discovered identity provider into the two calls a login
//! pipeline needs: [`Strategy::begin`] produces the redirect, and
//! [`Strategy::handle_callback`] runs the rest of the attempt:
//!
//! 1. validate the callback and exchange the code at the token endpoint
//! 2. fetch the UserInfo profile with the access token
//! 3. hand the outcome to the [`LoginCompletion`] handler, exactly once
//!
//! The steps are sequential and any failure ends the attempt. The handler
//! receives the error and no partial profile is ever produced.
//!
//! [`LoginFlow`] is the seam for steps 1 and 2; [`OidcStrategy`] is the
//! OpenID Connect implementation and tests provide their own.

use async_trait::async_trait;
use std::future::Future;
use tracing::{debug, warn};

use crate::config::OidcScopes;
use crate::error::{AuthError, AuthResult};
use crate::types::{
    AuthProfile, AuthorizationRequest, CallbackParams, CompletedLogin, ContextTag,
    PendingAuthorization, TokenSet,
};

pub mod factory;
pub mod oidc;
pub mod profile;

pub use factory::StrategyFactory;
pub use oidc::{ClientParams, OidcStrategy};
pub use profile::normalize_profile;

/// Receives the outcome of every handled callback.
///
/// Invoked exactly once per callback with either the completed login or the
/// error that ended the attempt, plus the caller's context tag.
#[async_trait]
pub trait LoginCompletion: Send + Sync {
    /// Deliver the outcome of one login attempt
    async fn complete(&self, outcome: AuthResult<CompletedLogin>, tag: ContextTag);
}

#[async_trait]
impl<F, Fut> LoginCompletion for F
where
    F: Fn(AuthResult<CompletedLogin>, ContextTag) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    async fn complete(&self, outcome: AuthResult<CompletedLogin>, tag: ContextTag) {
        (self)(outcome, tag).await;
    }
}

/// Whether a handled callback ended in a login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    /// The completion handler received a profile
    Succeeded,
    /// The completion handler received an error
    Failed,
}

/// Token exchange and profile retrieval for one provider
#[async_trait]
pub trait LoginFlow: Send + Sync {
    /// Provider name reported in [`CompletedLogin::provider`]
    fn provider(&self) -> &str;

    /// Validate the callback against the pending state and redeem the code
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] on provider errors, state mismatch, a missing
    /// code, or token endpoint failure.
    async fn exchange_token(
        &self,
        params: &CallbackParams,
        pending: &PendingAuthorization,
    ) -> AuthResult<TokenSet>;

    /// Retrieve and normalize the user's profile
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ProfileFetch`] when the profile cannot be obtained.
    async fn fetch_profile(&self, tokens: &TokenSet) -> AuthResult<AuthProfile>;

    /// Run exchange and profile fetch, then call `completion` exactly once
    async fn complete_login(
        &self,
        params: &CallbackParams,
        pending: &PendingAuthorization,
        completion: &dyn LoginCompletion,
        tag: ContextTag,
    ) -> LoginStatus {
        let outcome = match self.exchange_token(params, pending).await {
            Ok(tokens) => match self.fetch_profile(&tokens).await {
                Ok(profile) => Ok(CompletedLogin {
                    provider: self.provider().to_string(),
                    tokens,
                    profile,
                }),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        let status = match &outcome {
            Ok(login) => {
                debug!(provider = %self.provider(), user = %login.profile.id, "Login completed");
                LoginStatus::Succeeded
            }
            Err(e) => {
                warn!(provider = %self.provider(), error = %e, "Login failed");
                LoginStatus::Failed
            }
        };

        completion.complete(outcome, tag).await;
        status
    }
}

/// Capability set a login pipeline consumes
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Provider name
    fn name(&self) -> &str;

    /// Scopes requested at authorization, as configured
    fn scope(&self) -> &OidcScopes;

    /// Build the authorization redirect for a new attempt
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Signing`] if a signed request object cannot be produced.
    fn begin(&self) -> AuthResult<AuthorizationRequest>;

    /// Finish an attempt; the completion handler is called exactly once
    async fn handle_callback(
        &self,
        params: CallbackParams,
        pending: &PendingAuthorization,
        tag: ContextTag,
    ) -> LoginStatus;
}

/// Check a callback against the pending attempt and return the code.
///
/// Provider errors take precedence, then the state check, then the code.
pub(crate) fn verify_callback<'a>(
    params: &'a CallbackParams,
    pending: &PendingAuthorization,
) -> AuthResult<&'a str> {
    if let Some(error) = &params.error {
        return Err(AuthError::Provider {
            error: error.clone(),
            description: params.error_description.clone(),
        });
    }

    if params.state.as_deref() != Some(pending.state.as_str()) {
        return Err(AuthError::StateMismatch);
    }

    params
        .code
        .as_deref()
        .filter(|code| !code.is_empty())
        .ok_or(AuthError::MissingCode)
}
