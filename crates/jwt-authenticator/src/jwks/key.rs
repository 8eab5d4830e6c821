//! Verification keys and key-id indexing
//!
//! Key identifiers from token headers are attacker controlled. They are
//! length-checked and percent-encoded before use as index keys, and JWKS
//! entries are indexed under the same encoding so lookups stay exact.

use std::collections::HashMap;
use std::str::FromStr;

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use tracing::debug;

use crate::error::AuthError;

/// Longest key identifier accepted from a token header
pub const MAX_KEY_ID_LEN: usize = 256;

/// Cryptographic family of a key or algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    /// HS256/384/512 shared secret
    Hmac,
    /// RS* and PS*
    Rsa,
    /// ES256/384
    Ec,
    /// EdDSA
    Ed,
}

impl KeyFamily {
    /// Family an algorithm requires
    pub fn of_algorithm(alg: Algorithm) -> Self {
        match alg {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Self::Hmac,
            Algorithm::ES256 | Algorithm::ES384 => Self::Ec,
            Algorithm::EdDSA => Self::Ed,
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => Self::Rsa,
        }
    }

    fn of_jwk(jwk: &Jwk) -> Self {
        match jwk.algorithm {
            AlgorithmParameters::OctetKey(_) => Self::Hmac,
            AlgorithmParameters::RSA(_) => Self::Rsa,
            AlgorithmParameters::EllipticCurve(_) => Self::Ec,
            AlgorithmParameters::OctetKeyPair(_) => Self::Ed,
        }
    }
}

/// A key able to verify token signatures
#[derive(Clone)]
pub struct VerificationKey {
    /// Sanitized key identifier, if the JWK carried one
    pub key_id: Option<String>,
    /// Algorithm pinned by the JWK `alg` member
    pub algorithm: Option<Algorithm>,
    /// Key family
    pub family: KeyFamily,
    /// Decoding key material
    pub decoding_key: DecodingKey,
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationKey")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .field("family", &self.family)
            .finish_non_exhaustive()
    }
}

impl VerificationKey {
    /// Build a key from a JWK.
    ///
    /// Returns `None` for keys not meant for signatures (`use` other than
    /// `sig`, or a non-signing `alg`) and for keys the crypto backend rejects.
    pub fn from_jwk(jwk: &Jwk) -> Option<Self> {
        let key_id = jwk.common.key_id.as_deref().map(escape_key_id);

        if let Some(key_use) = &jwk.common.public_key_use
            && !matches!(key_use, PublicKeyUse::Signature)
        {
            debug!(key_id = ?key_id, "Skipping JWK not intended for signatures");
            return None;
        }

        let algorithm = match &jwk.common.key_algorithm {
            Some(declared) => match Algorithm::from_str(&declared.to_string()) {
                Ok(alg) => Some(alg),
                Err(_) => {
                    debug!(key_id = ?key_id, alg = %declared, "Skipping JWK with non-signing algorithm");
                    return None;
                }
            },
            None => None,
        };

        match DecodingKey::from_jwk(jwk) {
            Ok(decoding_key) => Some(Self {
                key_id,
                algorithm,
                family: KeyFamily::of_jwk(jwk),
                decoding_key,
            }),
            Err(e) => {
                debug!(key_id = ?key_id, error = %e, "Skipping unusable JWK");
                None
            }
        }
    }
}

/// Percent-encode a key identifier for use as an index key
pub fn escape_key_id(kid: &str) -> String {
    urlencoding::encode(kid).into_owned()
}

/// Validate and escape a key identifier taken from a token header
///
/// # Errors
///
/// Returns [`AuthError::KeyNotFound`] for identifiers longer than
/// [`MAX_KEY_ID_LEN`] bytes.
pub fn sanitize_key_id(kid: &str) -> Result<String, AuthError> {
    if kid.len() > MAX_KEY_ID_LEN {
        return Err(AuthError::KeyNotFound(format!(
            "key id exceeds {MAX_KEY_ID_LEN} bytes"
        )));
    }
    Ok(escape_key_id(kid))
}

/// Keys indexed by sanitized identifier
#[derive(Debug, Default, Clone)]
pub struct KeyIndex {
    by_id: HashMap<String, VerificationKey>,
    anonymous: Vec<VerificationKey>,
}

impl KeyIndex {
    /// Index every usable JWK
    pub fn from_jwks<'a>(jwks: impl IntoIterator<Item = &'a Jwk>) -> Self {
        let mut index = Self::default();
        for key in jwks.into_iter().filter_map(VerificationKey::from_jwk) {
            match key.key_id.clone() {
                Some(id) => {
                    // First key wins on duplicate ids
                    index.by_id.entry(id).or_insert(key);
                }
                None => index.anonymous.push(key),
            }
        }
        index
    }

    /// Index the `keys` array of a JWKS document, skipping unparsable entries
    pub fn from_document(doc: &serde_json::Value) -> Self {
        let jwks: Vec<Jwk> = doc
            .get("keys")
            .and_then(serde_json::Value::as_array)
            .map(|keys| {
                keys.iter()
                    .filter_map(|k| match serde_json::from_value::<Jwk>(k.clone()) {
                        Ok(jwk) => Some(jwk),
                        Err(e) => {
                            debug!(error = %e, "Skipping unparsable JWK");
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self::from_jwks(&jwks)
    }

    /// Look up a key by sanitized identifier.
    ///
    /// Without an identifier the sole key is returned when exactly one exists.
    pub fn lookup(&self, key_id: Option<&str>) -> Option<VerificationKey> {
        match key_id {
            Some(id) => self.by_id.get(id).cloned(),
            None if self.len() == 1 => self
                .by_id
                .values()
                .chain(self.anonymous.iter())
                .next()
                .cloned(),
            None => None,
        }
    }

    /// Number of usable keys
    pub fn len(&self) -> usize {
        self.by_id.len() + self.anonymous.len()
    }

    /// Whether no usable key exists
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
