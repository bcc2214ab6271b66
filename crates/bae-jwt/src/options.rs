//! Per-call signing options

use std::time::Duration;

use crate::errors::{Result, SigningError};
use crate::types::SignAlgorithm;

/// Claims a SIOP request object must carry
pub const REQUEST_OBJECT_CLAIMS: &[&str] = &["iss", "aud", "client_id", "response_type"];

/// `typ` header of a JWT-secured authorization request (RFC 9101)
pub const REQUEST_OBJECT_TYPE: &str = "oauth-authz-req+jwt";

/// Claims a `private_key_jwt` client assertion must carry
pub const CLIENT_ASSERTION_CLAIMS: &[&str] = &["iss", "sub", "aud", "jti"];

/// Options for a single [`JwtSigner::sign_jwt`](crate::JwtSigner::sign_jwt) call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOptions {
    /// Algorithm to sign with; must match the loaded key
    pub algorithm: SignAlgorithm,
    /// Token lifetime; sets `exp = iat + expires_in` when present
    pub expires_in: Option<Duration>,
    /// Claims that must be present in the payload
    pub required_claims: Vec<String>,
    /// Overrides the signer's configured `kid` header
    pub key_id: Option<String>,
    /// `typ` header; `JWT` when unset
    pub typ: Option<String>,
}

impl SignOptions {
    /// Options for the given algorithm with no expiry
    pub fn new(algorithm: SignAlgorithm) -> Self {
        Self {
            algorithm,
            expires_in: None,
            required_claims: Vec::new(),
            key_id: None,
            typ: None,
        }
    }

    /// Options for a SIOP request object
    pub fn request_object(algorithm: SignAlgorithm) -> Self {
        Self::new(algorithm)
            .require_claims(REQUEST_OBJECT_CLAIMS)
            .with_type(REQUEST_OBJECT_TYPE)
    }

    /// Options for a `private_key_jwt` client assertion
    pub fn client_assertion(algorithm: SignAlgorithm) -> Self {
        Self::new(algorithm).require_claims(CLIENT_ASSERTION_CLAIMS)
    }

    /// Set the token lifetime
    pub fn expires_in(mut self, lifetime: Duration) -> Self {
        self.expires_in = Some(lifetime);
        self
    }

    /// Set the token lifetime from a string such as `"1h"`
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::InvalidExpiry`] if the string cannot be parsed.
    pub fn expires_in_str(self, lifetime: &str) -> Result<Self> {
        Ok(self.expires_in(parse_duration(lifetime)?))
    }

    /// Add claims that must be present in the payload
    pub fn require_claims(mut self, claims: &[&str]) -> Self {
        self.required_claims
            .extend(claims.iter().map(|claim| (*claim).to_string()));
        self
    }

    /// Set the `typ` header for this call
    pub fn with_type(mut self, typ: impl Into<String>) -> Self {
        self.typ = Some(typ.into());
        self
    }

    /// Override the `kid` header for this call
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }
}

/// Parse a lifetime such as `"90"`, `"45s"`, `"30m"`, `"1h"` or `"7d"`.
///
/// A bare number is seconds.
///
/// # Errors
///
/// Returns [`SigningError::InvalidExpiry`] for empty input, unknown units,
/// non-numeric values, or values that overflow.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let trimmed = input.trim();
    let invalid = || SigningError::InvalidExpiry(input.to_string());

    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);
    if digits.is_empty() {
        return Err(invalid());
    }

    let value: u64 = digits.parse().map_err(|_| invalid())?;
    let multiplier: u64 = match unit.trim() {
        "" | "s" | "sec" | "secs" => 1,
        "m" | "min" | "mins" => 60,
        "h" | "hr" | "hrs" => 3600,
        "d" | "day" | "days" => 86_400,
        _ => return Err(invalid()),
    };

    value
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}
