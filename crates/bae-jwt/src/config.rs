//! Signing configuration

use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

use crate::errors::KeyLoadError;
use crate::types::{KeySource, SignAlgorithm};

/// SIOP signing configuration.
///
/// Exactly one of `private_key` (hex P-256 scalar) or `private_key_pem`
/// (path to a PEM file) must be set. Empty values count as unset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SigningConfig {
    /// Hex-encoded P-256 private scalar
    #[serde(default, alias = "privateKey")]
    pub private_key: Option<SecretString>,

    /// Path to a PEM private key
    #[serde(default, alias = "privateKeyPem")]
    pub private_key_pem: Option<PathBuf>,

    /// Algorithm used when a call does not request one explicitly
    #[serde(
        default,
        alias = "signAlgorithm",
        deserialize_with = "deserialize_algorithm"
    )]
    pub sign_algorithm: SignAlgorithm,

    /// Key identifier placed in the `kid` header when set
    #[serde(default, alias = "keyId")]
    pub key_id: Option<String>,
}

impl SigningConfig {
    /// Configuration backed by a hex scalar
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self {
            private_key: Some(SecretString::new(hex.into())),
            ..Self::default()
        }
    }

    /// Configuration backed by a PEM file
    pub fn from_pem_file(path: impl Into<PathBuf>) -> Self {
        Self {
            private_key_pem: Some(path.into()),
            ..Self::default()
        }
    }

    /// Set the default algorithm
    pub fn with_algorithm(mut self, algorithm: SignAlgorithm) -> Self {
        self.sign_algorithm = algorithm;
        self
    }

    /// Set the `kid` header value
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    /// Resolve the configured key source.
    ///
    /// # Errors
    ///
    /// Returns [`KeyLoadError::MissingKeySource`] when nothing is configured and
    /// [`KeyLoadError::AmbiguousKeySource`] when both sources are set.
    pub fn key_source(&self) -> Result<KeySource, KeyLoadError> {
        let hex = self
            .private_key
            .as_ref()
            .filter(|key| !key.expose_secret().trim().is_empty());
        let pem = self
            .private_key_pem
            .as_ref()
            .filter(|path| !path.as_os_str().is_empty());

        match (hex, pem) {
            (Some(_), Some(_)) => Err(KeyLoadError::AmbiguousKeySource),
            (Some(hex), None) => Ok(KeySource::Hex(hex.clone())),
            (None, Some(path)) => Ok(KeySource::PemFile(path.clone())),
            (None, None) => Err(KeyLoadError::MissingKeySource),
        }
    }
}

fn deserialize_algorithm<'de, D>(deserializer: D) -> Result<SignAlgorithm, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: String = Deserialize::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}
