//! Error types for key loading and JWT signing

use std::path::PathBuf;
use thiserror::Error;

use crate::types::SignAlgorithm;

/// Errors raised while resolving configured key material into a signing key.
///
/// These are startup errors: a signer is never constructed from a key that
/// failed to load.
#[derive(Error, Debug)]
pub enum KeyLoadError {
    /// Neither a hex key nor a PEM path was configured
    #[error("no signing key configured: set either private_key or private_key_pem")]
    MissingKeySource,

    /// Both a hex key and a PEM path were configured
    #[error("ambiguous signing key: private_key and private_key_pem are mutually exclusive")]
    AmbiguousKeySource,

    /// The PEM file could not be read
    #[error("unable to read key file {path}: {reason}")]
    UnreadableFile {
        /// Path that was configured
        path: PathBuf,
        /// Underlying I/O failure
        reason: String,
    },

    /// The hex key is not valid hexadecimal or is longer than a P-256 scalar
    #[error("invalid hex private key: {reason}")]
    InvalidHex {
        /// What went wrong
        reason: String,
    },

    /// The hex key decoded to a value that is not a valid P-256 scalar
    #[error("invalid P-256 private scalar: {reason}")]
    InvalidScalar {
        /// What went wrong
        reason: String,
    },

    /// The PEM file does not contain a parsable private key
    #[error("invalid PEM private key: {reason}")]
    InvalidPem {
        /// What went wrong
        reason: String,
    },

    /// The PEM file holds a key of a different family or curve than the algorithm needs
    #[error("key in {path} does not match {algorithm}: expected {expected}")]
    WrongKeyFamily {
        /// Path that was configured
        path: PathBuf,
        /// Configured signing algorithm
        algorithm: SignAlgorithm,
        /// Human readable description of the expected key
        expected: &'static str,
    },

    /// The algorithm name is unknown or cannot be used with the configured source
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Errors raised by a single signing call.
#[derive(Error, Debug)]
pub enum SigningError {
    /// Requested algorithm does not match the loaded key
    #[error("algorithm {requested} cannot be used with the loaded {key} key")]
    AlgorithmMismatch {
        /// Algorithm requested in the sign options
        requested: SignAlgorithm,
        /// Description of the loaded key
        key: &'static str,
    },

    /// The payload did not serialize to a JSON object
    #[error("JWT payload must be a JSON object: {reason}")]
    InvalidPayload {
        /// What went wrong
        reason: String,
    },

    /// A claim listed as required is absent from the payload
    #[error("required claim '{0}' is missing from the payload")]
    MissingClaim(String),

    /// An expiry string such as `1h` could not be parsed
    #[error("invalid expiry '{0}': expected a number of seconds or a value like 30s, 15m, 1h, 7d")]
    InvalidExpiry(String),

    /// The payload already carries a claim the signer was asked to set
    #[error("payload already contains claim '{0}'")]
    ConflictingClaim(String),

    /// The underlying JWT library failed to produce a signature
    #[error("JWT encoding failed: {reason}")]
    Encoding {
        /// What went wrong
        reason: String,
    },
}

/// Result alias for signing operations
pub type Result<T> = std::result::Result<T, SigningError>;
