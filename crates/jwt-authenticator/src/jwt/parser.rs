//! Compact JWT parsing
//!
//! Splits `header.claims.signature`, base64url-decodes the first two
//! segments and parses them with [`parse_lenient`]. No signature or claim
//! semantics are checked here.

use base64::Engine as _;
use base64::alphabet::URL_SAFE;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use jsonwebtoken::Algorithm;
use serde::Deserialize;
use serde_json::Value;

use super::lenient::parse_lenient;
use crate::claims::ClaimSet;
use crate::error::AuthError;

/// Scheme prefix stripped from the header value
pub const BEARER_PREFIX: &str = "Bearer ";

/// Upper bound on accepted token length
pub const MAX_TOKEN_LEN: usize = 64 * 1024;

// base64url, padding optional
const SEGMENT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// JOSE header fields used for verification
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenHeader {
    /// Signing algorithm
    pub alg: Algorithm,
    /// Key identifier, raw as sent by the issuer
    #[serde(default)]
    pub kid: Option<String>,
    /// Token type
    #[serde(default)]
    pub typ: Option<String>,
}

/// A token split into its parts, not yet verified
#[derive(Debug, Clone)]
pub struct ParsedToken {
    /// Decoded header
    pub header: TokenHeader,
    /// Decoded, unverified claims
    pub claims: ClaimSet,
    /// `header.claims` exactly as received, the signed bytes
    pub signing_input: String,
    /// base64url signature segment
    pub signature: String,
}

/// Parse a raw token, optionally prefixed with `Bearer `
///
/// # Errors
///
/// Returns [`AuthError::Malformed`] if the token does not have three
/// segments, a segment is not base64url, the header lacks a supported `alg`,
/// or the claims are not a JSON object.
pub fn parse(raw: &str) -> Result<ParsedToken, AuthError> {
    let raw = raw.trim();
    let token = raw.strip_prefix(BEARER_PREFIX).unwrap_or(raw).trim();

    if token.len() > MAX_TOKEN_LEN {
        return Err(AuthError::Malformed(format!(
            "token exceeds {MAX_TOKEN_LEN} bytes"
        )));
    }

    let segments: Vec<&str> = token.split('.').collect();
    let [header_b64, claims_b64, signature] = segments.as_slice() else {
        return Err(AuthError::Malformed(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    };

    let header_json = decode_segment(header_b64, "header")?;
    let header: TokenHeader = serde_json::from_value(header_json)
        .map_err(|e| AuthError::Malformed(format!("invalid header: {e}")))?;

    let claims = match decode_segment(claims_b64, "claims")? {
        Value::Object(map) => map,
        _ => return Err(AuthError::Malformed("claims are not a JSON object".to_string())),
    };

    Ok(ParsedToken {
        header,
        claims,
        signing_input: format!("{header_b64}.{claims_b64}"),
        signature: (*signature).to_string(),
    })
}

fn decode_segment(segment: &str, name: &str) -> Result<Value, AuthError> {
    let bytes = SEGMENT_ENGINE
        .decode(segment)
        .map_err(|e| AuthError::Malformed(format!("{name} is not base64url: {e}")))?;
    parse_lenient(&bytes).map_err(|e| AuthError::Malformed(format!("{name} is not JSON: {e}")))
}
