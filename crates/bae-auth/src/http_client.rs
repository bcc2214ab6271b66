//! HTTP client for identity provider calls
//!
//! One reqwest client serves both the oauth2 token exchange (through the
//! `AsyncHttpClient` trait, since oauth2 5.0 is built against an older
//! reqwest) and the UserInfo request.
//!
//! Redirects are never followed and every request carries the configured
//! timeout.

use oauth2::AsyncHttpClient;
use oauth2::http::{self, HeaderValue, StatusCode};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Request type used by oauth2
pub type HttpRequest = http::Request<Vec<u8>>;
/// Response type used by oauth2
pub type HttpResponse = http::Response<Vec<u8>>;

/// Error type for identity provider HTTP calls
#[derive(Debug, Error)]
pub enum IdpHttpError {
    /// Request execution failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// A method, status or header could not be converted
    #[error("Invalid HTTP message: {0}")]
    InvalidMessage(String),
}

/// reqwest client shared by the token exchange and UserInfo calls
#[derive(Clone)]
pub struct IdpHttpClient {
    inner: reqwest::Client,
}

impl IdpHttpClient {
    /// Create a client with the given request timeout
    ///
    /// # Errors
    ///
    /// Returns error if the reqwest client cannot be built (TLS backend failure).
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let inner = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .user_agent(concat!("bae-auth/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { inner })
    }

    /// Underlying reqwest client
    pub fn client(&self) -> &reqwest::Client {
        &self.inner
    }

    /// Execute an oauth2 request through reqwest
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, IdpHttpError> {
        let (parts, body) = request.into_parts();

        let method = reqwest::Method::from_bytes(parts.method.as_str().as_bytes())
            .map_err(|_| IdpHttpError::InvalidMessage(format!("method {}", parts.method)))?;

        let mut builder = self.inner.request(method, parts.uri.to_string());
        for (name, value) in &parts.headers {
            builder = builder.header(name.as_str(), value.as_bytes());
        }

        let response = builder.body(body).send().await?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .map_err(|e| IdpHttpError::InvalidMessage(e.to_string()))?;
        let mut converted = http::Response::builder().status(status);
        for (name, value) in response.headers() {
            let value = HeaderValue::from_bytes(value.as_bytes())
                .map_err(|e| IdpHttpError::InvalidMessage(e.to_string()))?;
            converted = converted.header(name.as_str(), value);
        }

        let body = response.bytes().await?;
        converted
            .body(body.to_vec())
            .map_err(|e| IdpHttpError::InvalidMessage(e.to_string()))
    }
}

impl std::fmt::Debug for IdpHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdpHttpClient")
            .field("inner", &"<reqwest::Client>")
            .finish()
    }
}

/// Future type for the oauth2 adapter
pub type IdpHttpFuture<'c> =
    Pin<Box<dyn Future<Output = Result<HttpResponse, IdpHttpError>> + Send + 'c>>;

impl<'c> AsyncHttpClient<'c> for IdpHttpClient {
    type Error = IdpHttpError;
    type Future = IdpHttpFuture<'c>;

    fn call(&'c self, request: HttpRequest) -> Self::Future {
        Box::pin(async move { self.execute(request).await })
    }
}
