//! Signature and temporal validation
//!
//! - Signature verified over the received `header.claims` bytes
//! - Algorithm must match the key family, and the key's pinned `alg` if any
//! - `exp`: rejected when `now > exp + skew`
//! - `nbf`: rejected when `now < nbf - skew`
//!
//! Both bounds are inclusive; a skew of zero enforces them exactly.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::crypto;
use serde_json::Value;
use tracing::debug;

use super::parser::ParsedToken;
use crate::claims::ClaimSet;
use crate::error::AuthError;
use crate::jwks::{KeyFamily, VerificationKey};

/// Current Unix time in seconds
pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Verify signature and validity window, releasing the claims on success
///
/// # Errors
///
/// Returns [`AuthError::BadSignature`], [`AuthError::Expired`],
/// [`AuthError::NotYetValid`], or [`AuthError::Malformed`] for non-numeric
/// time claims.
pub fn validate(
    parsed: ParsedToken,
    key: &VerificationKey,
    skew_seconds: u64,
) -> Result<ClaimSet, AuthError> {
    validate_at(parsed, key, skew_seconds, now_unix())
}

/// [`validate`] against an explicit clock
///
/// # Errors
///
/// See [`validate`].
pub fn validate_at(
    parsed: ParsedToken,
    key: &VerificationKey,
    skew_seconds: u64,
    now: i64,
) -> Result<ClaimSet, AuthError> {
    verify_signature(&parsed, key)?;
    check_time_window(&parsed.claims, skew_seconds, now)?;
    Ok(parsed.claims)
}

fn verify_signature(parsed: &ParsedToken, key: &VerificationKey) -> Result<(), AuthError> {
    let alg = parsed.header.alg;

    if KeyFamily::of_algorithm(alg) != key.family {
        debug!(algorithm = ?alg, key_family = ?key.family, "Algorithm does not match key family");
        return Err(AuthError::BadSignature(format!(
            "{alg:?} cannot be verified with a {:?} key",
            key.family
        )));
    }
    if let Some(pinned) = key.algorithm
        && pinned != alg
    {
        return Err(AuthError::BadSignature(format!(
            "key is pinned to {pinned:?}, token uses {alg:?}"
        )));
    }

    match crypto::verify(
        &parsed.signature,
        parsed.signing_input.as_bytes(),
        &key.decoding_key,
        alg,
    ) {
        Ok(true) => Ok(()),
        Ok(false) => Err(AuthError::BadSignature("signature mismatch".to_string())),
        Err(e) => Err(AuthError::BadSignature(e.to_string())),
    }
}

fn check_time_window(claims: &ClaimSet, skew_seconds: u64, now: i64) -> Result<(), AuthError> {
    let skew = i64::try_from(skew_seconds).unwrap_or(i64::MAX);

    if let Some(exp) = numeric_date(claims, "exp")?
        && now > exp.saturating_add(skew)
    {
        return Err(AuthError::Expired {
            exp,
            now,
            skew: skew_seconds,
        });
    }

    if let Some(nbf) = numeric_date(claims, "nbf")?
        && now < nbf.saturating_sub(skew)
    {
        return Err(AuthError::NotYetValid {
            nbf,
            now,
            skew: skew_seconds,
        });
    }

    Ok(())
}

// NumericDate per RFC 7519; fractional seconds are truncated
fn numeric_date(claims: &ClaimSet, name: &str) -> Result<Option<i64>, AuthError> {
    match claims.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| AuthError::Malformed(format!("{name} is out of range"))),
        Some(_) => Err(AuthError::Malformed(format!("{name} is not a number"))),
    }
}
