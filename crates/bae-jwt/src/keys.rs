//! Key material loading
//!
//! Resolves a [`KeySource`] into a curve-bound [`KeyHandle`]. Hex sources are
//! raw P-256 scalars; PEM sources may be PKCS#8, SEC1 or PKCS#1 and are checked
//! against the family the configured algorithm needs before they are accepted.

use std::fmt;
use std::fs;
use std::path::Path;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::EncodingKey;
use jsonwebtoken::jwk::{AlgorithmParameters, CommonParameters, Jwk, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::jwk::{EllipticCurve, EllipticCurveKeyParameters, EllipticCurveKeyType};
use jsonwebtoken::jwk::{RSAKeyParameters, RSAKeyType};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::der::asn1::AnyRef;
use p256::pkcs8::der::{Decode, Reader, SliceReader, Tag, TagNumber, Tagged};
use p256::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, ObjectIdentifier};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use secrecy::ExposeSecret;
use tracing::debug;
use zeroize::Zeroizing;

use crate::errors::{KeyLoadError, SigningError};
use crate::types::{KeyFamily, KeySource, SignAlgorithm};

const P256_SCALAR_LEN: usize = 32;

const OID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const OID_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const OID_SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const OID_SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

const EC_PARAMETERS_END: &str = "-----END EC PARAMETERS-----";

/// Loaded private key bound to its family.
///
/// Only the signer holds one of these; the private half never leaves the crate.
pub(crate) enum KeyHandle {
    EcP256 {
        encoding: EncodingKey,
        public: p256::PublicKey,
    },
    Rsa {
        encoding: EncodingKey,
        public: Box<RsaPublicKey>,
    },
}

impl KeyHandle {
    pub(crate) fn family(&self) -> KeyFamily {
        match self {
            Self::EcP256 { .. } => KeyFamily::EcP256,
            Self::Rsa { .. } => KeyFamily::Rsa,
        }
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        match self {
            Self::EcP256 { encoding, .. } | Self::Rsa { encoding, .. } => encoding,
        }
    }

    pub(crate) fn public_key_pem(&self) -> Result<String, SigningError> {
        let encoded = match self {
            Self::EcP256 { public, .. } => public
                .to_public_key_pem(p256::pkcs8::LineEnding::LF)
                .map_err(|e| e.to_string()),
            Self::Rsa { public, .. } => rsa::pkcs8::EncodePublicKey::to_public_key_pem(
                &**public,
                rsa::pkcs8::LineEnding::LF,
            )
            .map_err(|e| e.to_string()),
        };
        encoded.map_err(|reason| SigningError::Encoding {
            reason: format!("Failed to encode public key: {}", reason),
        })
    }

    pub(crate) fn public_jwk(&self, algorithm: SignAlgorithm, key_id: Option<&str>) -> Jwk {
        let common = CommonParameters {
            public_key_use: Some(PublicKeyUse::Signature),
            key_algorithm: Some(key_algorithm(algorithm)),
            key_id: key_id.map(str::to_string),
            ..CommonParameters::default()
        };

        let algorithm = match self {
            Self::EcP256 { public, .. } => {
                let point = public.to_encoded_point(false);
                AlgorithmParameters::EllipticCurve(EllipticCurveKeyParameters {
                    key_type: EllipticCurveKeyType::EC,
                    curve: EllipticCurve::P256,
                    x: point.x().map(|x| URL_SAFE_NO_PAD.encode(x)).unwrap_or_default(),
                    y: point.y().map(|y| URL_SAFE_NO_PAD.encode(y)).unwrap_or_default(),
                })
            }
            Self::Rsa { public, .. } => AlgorithmParameters::RSA(RSAKeyParameters {
                key_type: RSAKeyType::RSA,
                n: URL_SAFE_NO_PAD.encode(public.n().to_bytes_be()),
                e: URL_SAFE_NO_PAD.encode(public.e().to_bytes_be()),
            }),
        };

        Jwk { common, algorithm }
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyHandle")
            .field("family", &self.family())
            .field("private", &"[REDACTED]")
            .finish()
    }
}

fn key_algorithm(algorithm: SignAlgorithm) -> KeyAlgorithm {
    match algorithm {
        SignAlgorithm::ES256 => KeyAlgorithm::ES256,
        SignAlgorithm::ES384 => KeyAlgorithm::ES384,
        SignAlgorithm::RS256 => KeyAlgorithm::RS256,
        SignAlgorithm::RS384 => KeyAlgorithm::RS384,
        SignAlgorithm::RS512 => KeyAlgorithm::RS512,
        SignAlgorithm::PS256 => KeyAlgorithm::PS256,
        SignAlgorithm::PS384 => KeyAlgorithm::PS384,
        SignAlgorithm::PS512 => KeyAlgorithm::PS512,
    }
}

/// Resolve a key source for the given algorithm.
///
/// The file is read once; no network access happens here.
///
/// # Errors
///
/// Returns [`KeyLoadError`] when the source cannot be read or parsed, or when
/// the key does not belong to the family the algorithm needs.
pub(crate) fn load_key(
    source: &KeySource,
    algorithm: SignAlgorithm,
) -> Result<KeyHandle, KeyLoadError> {
    if algorithm.family() == KeyFamily::EcP384 {
        return Err(KeyLoadError::UnsupportedAlgorithm(format!(
            "{} (only P-256 and RSA keys can be loaded)",
            algorithm
        )));
    }

    match source {
        KeySource::Hex(hex) => {
            if algorithm.family() != KeyFamily::EcP256 {
                return Err(KeyLoadError::UnsupportedAlgorithm(format!(
                    "{} cannot be used with a hex private key (hex keys are P-256 scalars)",
                    algorithm
                )));
            }
            debug!(algorithm = %algorithm, "Loading signing key from hex scalar");
            let secret = parse_hex_scalar(hex.expose_secret())?;
            ec_handle(&secret)
        }
        KeySource::PemFile(path) => {
            debug!(algorithm = %algorithm, path = %path.display(), "Loading signing key from PEM file");
            load_pem(path, algorithm)
        }
    }
}

/// Decode a hex P-256 scalar, left-padding short input to 32 bytes.
fn parse_hex_scalar(raw: &str) -> Result<p256::SecretKey, KeyLoadError> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.is_empty() {
        return Err(KeyLoadError::InvalidHex {
            reason: "key is empty".to_string(),
        });
    }

    let normalized = if digits.len() % 2 == 1 {
        Zeroizing::new(format!("0{}", digits))
    } else {
        Zeroizing::new(digits.to_string())
    };

    let bytes = Zeroizing::new(hex::decode(normalized.as_bytes()).map_err(|e| {
        KeyLoadError::InvalidHex {
            reason: e.to_string(),
        }
    })?);

    if bytes.len() > P256_SCALAR_LEN {
        return Err(KeyLoadError::InvalidHex {
            reason: format!(
                "key is {} bytes, a P-256 scalar is at most {}",
                bytes.len(),
                P256_SCALAR_LEN
            ),
        });
    }

    let mut padded = Zeroizing::new([0u8; P256_SCALAR_LEN]);
    padded[P256_SCALAR_LEN - bytes.len()..].copy_from_slice(&bytes);

    let field = p256::FieldBytes::from(*padded);
    p256::SecretKey::from_bytes(&field).map_err(|_| KeyLoadError::InvalidScalar {
        reason: "scalar is zero or not below the curve order".to_string(),
    })
}

fn load_pem(path: &Path, algorithm: SignAlgorithm) -> Result<KeyHandle, KeyLoadError> {
    let pem = Zeroizing::new(fs::read_to_string(path).map_err(|e| {
        KeyLoadError::UnreadableFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    })?);

    let pem = key_block(&pem);
    let (format, family) = detect_pem(pem)?;
    let expected = algorithm.family();
    if family != expected {
        return Err(KeyLoadError::WrongKeyFamily {
            path: path.to_path_buf(),
            algorithm,
            expected: expected.describe(),
        });
    }

    match (family, format) {
        (KeyFamily::EcP256, PemFormat::Pkcs8) => {
            let secret = p256::SecretKey::from_pkcs8_pem(pem).map_err(invalid_pem)?;
            ec_handle(&secret)
        }
        (KeyFamily::EcP256, PemFormat::Sec1) => {
            let secret = p256::SecretKey::from_sec1_pem(pem).map_err(invalid_pem)?;
            ec_handle(&secret)
        }
        (KeyFamily::Rsa, PemFormat::Pkcs8) => {
            let private =
                rsa::pkcs8::DecodePrivateKey::from_pkcs8_pem(pem).map_err(invalid_pem)?;
            rsa_handle(&private)
        }
        (KeyFamily::Rsa, PemFormat::Pkcs1) => {
            let private = RsaPrivateKey::from_pkcs1_pem(pem).map_err(invalid_pem)?;
            rsa_handle(&private)
        }
        _ => Err(KeyLoadError::InvalidPem {
            reason: format!("{} key in unexpected PEM encoding", family),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PemFormat {
    Pkcs8,
    Sec1,
    Pkcs1,
}

/// Drop the `EC PARAMETERS` block `openssl ecparam -genkey` writes ahead of the key.
fn key_block(pem: &str) -> &str {
    let pem = pem.trim();
    if pem.starts_with("-----BEGIN EC PARAMETERS-----")
        && let Some(end) = pem.find(EC_PARAMETERS_END)
    {
        return pem[end + EC_PARAMETERS_END.len()..].trim();
    }
    pem
}

/// Work out the key family from the PEM label and, for PKCS#8, the algorithm OID.
fn detect_pem(pem: &str) -> Result<(PemFormat, KeyFamily), KeyLoadError> {
    let (label, der) = p256::pkcs8::der::pem::decode_vec(pem.trim().as_bytes()).map_err(invalid_pem)?;
    let der = Zeroizing::new(der);

    match label {
        "PRIVATE KEY" => {
            let info = p256::pkcs8::PrivateKeyInfo::try_from(der.as_slice()).map_err(invalid_pem)?;
            if info.algorithm.oid == OID_RSA_ENCRYPTION {
                return Ok((PemFormat::Pkcs8, KeyFamily::Rsa));
            }
            if info.algorithm.oid != OID_EC_PUBLIC_KEY {
                return Err(KeyLoadError::InvalidPem {
                    reason: format!("unsupported key algorithm {}", info.algorithm.oid),
                });
            }
            let curve = info.algorithm.parameters_oid().map_err(invalid_pem)?;
            if curve == OID_SECP256R1 {
                Ok((PemFormat::Pkcs8, KeyFamily::EcP256))
            } else if curve == OID_SECP384R1 {
                Ok((PemFormat::Pkcs8, KeyFamily::EcP384))
            } else {
                Err(KeyLoadError::InvalidPem {
                    reason: format!("unsupported elliptic curve {}", curve),
                })
            }
        }
        "EC PRIVATE KEY" => match sec1_curve(&der)? {
            None => Ok((PemFormat::Sec1, KeyFamily::EcP256)),
            Some(curve) if curve == OID_SECP256R1 => Ok((PemFormat::Sec1, KeyFamily::EcP256)),
            Some(curve) if curve == OID_SECP384R1 => Ok((PemFormat::Sec1, KeyFamily::EcP384)),
            Some(curve) => Err(KeyLoadError::InvalidPem {
                reason: format!("unsupported elliptic curve {}", curve),
            }),
        },
        "RSA PRIVATE KEY" => Ok((PemFormat::Pkcs1, KeyFamily::Rsa)),
        "ENCRYPTED PRIVATE KEY" => Err(KeyLoadError::InvalidPem {
            reason: "encrypted private keys are not supported".to_string(),
        }),
        other => Err(KeyLoadError::InvalidPem {
            reason: format!("unexpected PEM label '{}'", other),
        }),
    }
}

/// Named curve from the `[0] parameters` field of a SEC1 `ECPrivateKey`
fn sec1_curve(der: &[u8]) -> Result<Option<ObjectIdentifier>, KeyLoadError> {
    let parameters = Tag::ContextSpecific {
        constructed: true,
        number: TagNumber::N0,
    };
    let mut reader = SliceReader::new(der).map_err(invalid_pem)?;
    reader
        .sequence(|fields| {
            let mut curve = None;
            while !fields.is_finished() {
                let field = AnyRef::decode(fields)?;
                if field.tag() == parameters {
                    curve = Some(ObjectIdentifier::from_der(field.value())?);
                }
            }
            Ok(curve)
        })
        .map_err(invalid_pem)
}

fn invalid_pem(e: impl fmt::Display) -> KeyLoadError {
    KeyLoadError::InvalidPem {
        reason: e.to_string(),
    }
}

fn ec_handle(secret: &p256::SecretKey) -> Result<KeyHandle, KeyLoadError> {
    // jsonwebtoken wants PKCS#8 DER for EC keys
    let pkcs8_der = secret.to_pkcs8_der().map_err(|e| KeyLoadError::InvalidScalar {
        reason: format!("Failed to convert EC key to PKCS#8: {}", e),
    })?;

    Ok(KeyHandle::EcP256 {
        encoding: EncodingKey::from_ec_der(pkcs8_der.as_bytes()),
        public: secret.public_key(),
    })
}

fn rsa_handle(private: &RsaPrivateKey) -> Result<KeyHandle, KeyLoadError> {
    // and PKCS#1 DER for RSA keys
    let pkcs1_der = private.to_pkcs1_der().map_err(invalid_pem)?;

    Ok(KeyHandle::Rsa {
        encoding: EncodingKey::from_rsa_der(pkcs1_der.as_bytes()),
        public: Box::new(RsaPublicKey::from(private)),
    })
}
