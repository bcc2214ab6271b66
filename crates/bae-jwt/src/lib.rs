//! # bae-jwt
//!
//! Key material loading and JWT signing for the Business API Ecosystem
//! authentication bridge.
//!
//! A [`JwtSigner`] is built once from a [`SigningConfig`] (hex P-256 scalar or
//! PEM file) and then signs SIOP request objects and `private_key_jwt` client
//! assertions. The algorithm requested for a call must match the loaded key;
//! there is no fallback to another algorithm.
//!
//! ```rust,no_run
//! use bae_jwt::{JwtSigner, SignAlgorithm, SignOptions, SigningConfig};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let signer = JwtSigner::new(&SigningConfig::from_pem_file("/etc/bae/siop.pem"))?;
//! let options = SignOptions::new(SignAlgorithm::ES256).expires_in(Duration::from_secs(300));
//! let token = signer.sign_jwt(&serde_json::json!({"sub": "user123", "iss": "test"}), &options)?;
//! assert_eq!(token.split('.').count(), 3);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod errors;
mod keys;
pub mod options;
pub mod signer;
pub mod types;

pub use config::SigningConfig;
pub use errors::{KeyLoadError, Result, SigningError};
pub use options::{SignOptions, parse_duration};
pub use signer::JwtSigner;
pub use types::{KeyFamily, KeySource, SignAlgorithm};
