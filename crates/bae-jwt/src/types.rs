//! Core signing types

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use jsonwebtoken::Algorithm;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::errors::KeyLoadError;

/// Asymmetric JWS algorithms the signer understands.
///
/// `ES384` is recognised so that it can be rejected with a precise error: the
/// key loader only produces P-256 and RSA keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SignAlgorithm {
    /// ECDSA using P-256 and SHA-256
    #[default]
    ES256,
    /// ECDSA using P-384 and SHA-384
    ES384,
    /// RSASSA-PKCS1-v1_5 using SHA-256
    RS256,
    /// RSASSA-PKCS1-v1_5 using SHA-384
    RS384,
    /// RSASSA-PKCS1-v1_5 using SHA-512
    RS512,
    /// RSASSA-PSS using SHA-256
    PS256,
    /// RSASSA-PSS using SHA-384
    PS384,
    /// RSASSA-PSS using SHA-512
    PS512,
}

impl SignAlgorithm {
    /// Algorithm name as it appears in the JWS `alg` header
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::PS256 => "PS256",
            Self::PS384 => "PS384",
            Self::PS512 => "PS512",
        }
    }

    /// Key family (and curve) this algorithm requires
    pub fn family(self) -> KeyFamily {
        match self {
            Self::ES256 => KeyFamily::EcP256,
            Self::ES384 => KeyFamily::EcP384,
            Self::RS256 | Self::RS384 | Self::RS512 | Self::PS256 | Self::PS384 | Self::PS512 => {
                KeyFamily::Rsa
            }
        }
    }

    pub(crate) fn to_jwt(self) -> Algorithm {
        match self {
            Self::ES256 => Algorithm::ES256,
            Self::ES384 => Algorithm::ES384,
            Self::RS256 => Algorithm::RS256,
            Self::RS384 => Algorithm::RS384,
            Self::RS512 => Algorithm::RS512,
            Self::PS256 => Algorithm::PS256,
            Self::PS384 => Algorithm::PS384,
            Self::PS512 => Algorithm::PS512,
        }
    }
}

impl fmt::Display for SignAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignAlgorithm {
    type Err = KeyLoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ES256" => Ok(Self::ES256),
            "ES384" => Ok(Self::ES384),
            "RS256" => Ok(Self::RS256),
            "RS384" => Ok(Self::RS384),
            "RS512" => Ok(Self::RS512),
            "PS256" => Ok(Self::PS256),
            "PS384" => Ok(Self::PS384),
            "PS512" => Ok(Self::PS512),
            _ => Err(KeyLoadError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// Family of an asymmetric key, including the curve for EC keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyFamily {
    /// Elliptic curve key on NIST P-256
    EcP256,
    /// Elliptic curve key on NIST P-384
    EcP384,
    /// RSA key of any modulus size
    Rsa,
}

impl KeyFamily {
    /// Short description used in error messages
    pub fn describe(self) -> &'static str {
        match self {
            Self::EcP256 => "EC P-256",
            Self::EcP384 => "EC P-384",
            Self::Rsa => "RSA",
        }
    }
}

impl fmt::Display for KeyFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Where the private key comes from.
///
/// Exactly one source is resolved per signer.
#[derive(Clone)]
pub enum KeySource {
    /// Hex-encoded P-256 private scalar (optionally `0x`-prefixed)
    Hex(SecretString),
    /// Path to a PEM-encoded private key (PKCS#8, SEC1 or PKCS#1)
    PemFile(PathBuf),
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hex(_) => f.write_str("KeySource::Hex([REDACTED])"),
            Self::PemFile(path) => f.debug_tuple("KeySource::PemFile").field(path).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_parsing() {
        assert_eq!("ES256".parse::<SignAlgorithm>().unwrap(), SignAlgorithm::ES256);
        assert_eq!("rs256".parse::<SignAlgorithm>().unwrap(), SignAlgorithm::RS256);
        assert!("HS256".parse::<SignAlgorithm>().is_err());
        assert!("none".parse::<SignAlgorithm>().is_err());
    }

    #[test]
    fn test_algorithm_families() {
        assert_eq!(SignAlgorithm::ES256.family(), KeyFamily::EcP256);
        assert_eq!(SignAlgorithm::ES384.family(), KeyFamily::EcP384);
        assert_eq!(SignAlgorithm::PS512.family(), KeyFamily::Rsa);
        assert_eq!(SignAlgorithm::default(), SignAlgorithm::ES256);
    }

    #[test]
    fn test_key_source_debug_redacts_hex() {
        let source = KeySource::Hex(SecretString::new("deadbeef".to_string()));
        let rendered = format!("{:?}", source);
        assert!(!rendered.contains("deadbeef"));
    }
}
