//! JWT signing service

use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::{Header, encode};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::SigningConfig;
use crate::errors::{KeyLoadError, Result, SigningError};
use crate::keys::{KeyHandle, load_key};
use crate::options::SignOptions;
use crate::types::{KeyFamily, KeySource, SignAlgorithm};

const JWT_TYPE: &str = "JWT";

/// Signs compact JWS tokens with a key loaded once at construction.
///
/// The signer holds no mutable state and can be shared across tasks behind
/// an `Arc`. The private key is never exposed; [`public_key_pem`](Self::public_key_pem)
/// and [`public_jwk`](Self::public_jwk) give verifiers what they need.
#[derive(Debug)]
pub struct JwtSigner {
    key: KeyHandle,
    algorithm: SignAlgorithm,
    key_id: Option<String>,
}

impl JwtSigner {
    /// Load the configured key and build a signer.
    ///
    /// # Errors
    ///
    /// Returns [`KeyLoadError`] if the key source is missing, ambiguous,
    /// unreadable, malformed, or does not suit the configured algorithm.
    pub fn new(config: &SigningConfig) -> std::result::Result<Self, KeyLoadError> {
        let source = config.key_source()?;
        Self::from_source(&source, config.sign_algorithm, config.key_id.clone())
    }

    /// Build a signer from an explicit key source.
    ///
    /// # Errors
    ///
    /// Returns [`KeyLoadError`] if the key cannot be loaded for `algorithm`.
    pub fn from_source(
        source: &KeySource,
        algorithm: SignAlgorithm,
        key_id: Option<String>,
    ) -> std::result::Result<Self, KeyLoadError> {
        let key = load_key(source, algorithm)?;

        tracing::debug!(
            algorithm = %algorithm,
            family = %key.family(),
            "JWT signer initialized"
        );

        Ok(Self {
            key,
            algorithm,
            key_id,
        })
    }

    /// Configured default algorithm
    pub fn algorithm(&self) -> SignAlgorithm {
        self.algorithm
    }

    /// Family of the loaded key
    pub fn key_family(&self) -> KeyFamily {
        self.key.family()
    }

    /// Configured `kid`, if any
    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    /// Options using the configured algorithm and no expiry
    pub fn default_options(&self) -> SignOptions {
        SignOptions::new(self.algorithm)
    }

    /// Sign `payload` with the configured algorithm and no expiry.
    ///
    /// # Errors
    ///
    /// See [`sign_jwt`](Self::sign_jwt).
    pub fn sign<T: Serialize + ?Sized>(&self, payload: &T) -> Result<String> {
        self.sign_jwt(payload, &self.default_options())
    }

    /// Sign `payload` and return a compact JWS.
    ///
    /// `iat` is set to the current time unless the payload carries one, in
    /// which case it is kept as given. `exp` is derived from
    /// `options.expires_in` when present.
    ///
    /// # Errors
    ///
    /// - [`SigningError::AlgorithmMismatch`] if the algorithm does not fit the key
    /// - [`SigningError::InvalidPayload`] if the payload is not a JSON object, or
    ///   an expiry is requested and the payload's `iat` is not an integer
    /// - [`SigningError::MissingClaim`] if a required claim is absent
    /// - [`SigningError::ConflictingClaim`] if `exp` is both set and requested
    /// - [`SigningError::Encoding`] if the JWT library fails
    pub fn sign_jwt<T: Serialize + ?Sized>(
        &self,
        payload: &T,
        options: &SignOptions,
    ) -> Result<String> {
        // No fallback: a mismatched algorithm is a configuration error
        if options.algorithm.family() != self.key.family() {
            return Err(SigningError::AlgorithmMismatch {
                requested: options.algorithm,
                key: self.key.family().describe(),
            });
        }

        let mut claims = payload_object(payload)?;

        if let Some(missing) = options
            .required_claims
            .iter()
            .find(|claim| !claims.contains_key(claim.as_str()))
        {
            return Err(SigningError::MissingClaim(missing.clone()));
        }

        let issued_at = match claims.get("iat") {
            Some(iat) => iat.clone(),
            None => {
                let now = Value::from(chrono::Utc::now().timestamp());
                claims.insert("iat".to_string(), now.clone());
                now
            }
        };

        if let Some(lifetime) = options.expires_in {
            if claims.contains_key("exp") {
                return Err(SigningError::ConflictingClaim("exp".to_string()));
            }
            let issued_at = issued_at.as_i64().ok_or_else(|| SigningError::InvalidPayload {
                reason: format!("`iat` must be an integer when an expiry is requested, got {}", issued_at),
            })?;
            let lifetime = i64::try_from(lifetime.as_secs())
                .map_err(|_| SigningError::InvalidExpiry(format!("{}s", lifetime.as_secs())))?;
            let expires_at = issued_at
                .checked_add(lifetime)
                .ok_or_else(|| SigningError::InvalidExpiry(format!("{}s", lifetime)))?;
            claims.insert("exp".to_string(), Value::from(expires_at));
        }

        let mut header = Header::new(options.algorithm.to_jwt());
        header.typ = Some(options.typ.clone().unwrap_or_else(|| JWT_TYPE.to_string()));
        header.kid = options.key_id.clone().or_else(|| self.key_id.clone());

        let jwt = encode(&header, &claims, self.key.encoding_key()).map_err(|e| {
            SigningError::Encoding {
                reason: format!("JWT signing failed: {}", e),
            }
        })?;

        tracing::debug!(
            algorithm = %options.algorithm,
            kid = ?header.kid,
            "Signed JWT"
        );

        Ok(jwt)
    }

    /// Public half of the signing key as an SPKI PEM
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::Encoding`] if PEM encoding fails.
    pub fn public_key_pem(&self) -> Result<String> {
        self.key.public_key_pem()
    }

    /// Public half of the signing key as a JWK carrying the configured `kid`
    pub fn public_jwk(&self) -> Jwk {
        self.key.public_jwk(self.algorithm, self.key_id.as_deref())
    }
}

fn payload_object<T: Serialize + ?Sized>(payload: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(payload) {
        Ok(Value::Object(claims)) => Ok(claims),
        Ok(other) => Err(SigningError::InvalidPayload {
            reason: format!("expected an object, got {}", json_kind(&other)),
        }),
        Err(e) => Err(SigningError::InvalidPayload {
            reason: e.to_string(),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
