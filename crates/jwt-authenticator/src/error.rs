//! Error types for token authentication
//!
//! Every validation failure except [`AuthError::NoKeySource`] collapses to
//! "not authenticated" at the façade. `NoKeySource` is a configuration defect
//! and surfaces as a [`BackendFailure`].

use thiserror::Error;

/// Message carried by every [`BackendFailure`].
pub const BACKEND_FAILURE_MESSAGE: &str = "Authentication backend failed";

/// Reasons a token was not turned into credentials
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token could not be split, decoded or parsed
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// Signature did not verify, or algorithm and key family disagree
    #[error("Invalid signature: {0}")]
    BadSignature(String),

    /// `now > exp + skew`
    #[error("Token expired at {exp} (now {now}, skew {skew}s)")]
    Expired {
        /// Expiry claim
        exp: i64,
        /// Verifier time
        now: i64,
        /// Configured tolerance
        skew: u64,
    },

    /// `now < nbf - skew`
    #[error("Token not valid before {nbf} (now {now}, skew {skew}s)")]
    NotYetValid {
        /// Not-before claim
        nbf: i64,
        /// Verifier time
        now: i64,
        /// Configured tolerance
        skew: u64,
    },

    /// Issuer claim missing or not equal to the required issuer
    #[error("Issuer mismatch: expected {expected}, got {actual:?}")]
    IssuerMismatch {
        /// Required issuer
        expected: String,
        /// Issuer found in the token
        actual: Option<String>,
    },

    /// Audience claim missing or disjoint from the required set
    #[error("Audience mismatch: none of {actual:?} in required set")]
    AudienceMismatch {
        /// Audiences found in the token
        actual: Vec<String>,
    },

    /// Subject claim missing or empty
    #[error("Missing subject claim '{0}'")]
    MissingSubject(String),

    /// No key in the resolved key set matches the token
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Key material could not be fetched
    #[error("Key fetch failed: {0}")]
    FetchFailed(#[from] FetchError),

    /// Neither static keys nor a remote key location are configured
    #[error("No key source configured")]
    NoKeySource,
}

impl AuthError {
    /// Whether this error must propagate instead of being treated as a rejection
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NoKeySource)
    }
}

/// Outbound fetch failures (discovery document or JWKS)
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL is not https and not a loopback address
    #[error("Insecure URL rejected: {0}")]
    InsecureUrl(String),

    /// URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Request did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Transport level failure
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Endpoint answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status {
        /// Status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Response body exceeded the configured limit
    #[error("Response size limit exceeded")]
    ResponseTooLarge,

    /// Body was not the expected JSON document
    #[error("Invalid JSON response: {0}")]
    InvalidJson(String),

    /// Discovery document carried no `jwks_uri`
    #[error("Discovery document has no jwks_uri")]
    MissingJwksUri,
}

/// Configuration rejected at construction
#[derive(Debug, Error)]
pub enum ConfigError {
    /// More than one key source configured
    #[error("Exactly one key source may be configured, found: {0}")]
    AmbiguousKeySource(String),

    /// Static JWKS document could not be used
    #[error("Invalid static JWKS: {0}")]
    InvalidJwks(String),

    /// Roles pointer is not a valid JSON Pointer
    #[error("Invalid roles pointer: {0}")]
    InvalidRolesPointer(#[from] PointerError),

    /// Remote key location is not a valid URL
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// Configured value
        url: String,
        /// Parser error
        reason: String,
    },

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

/// JSON Pointer evaluation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PointerError {
    /// Pointer is neither empty nor starts with `/`
    #[error("pointer must be empty or start with '/': {0}")]
    Syntax(String),

    /// A `~` not followed by `0` or `1`
    #[error("invalid escape in pointer segment '{0}'")]
    InvalidEscape(String),

    /// Segment names a key or index that does not exist
    #[error("no value at segment '{segment}'")]
    NotFound {
        /// Unescaped segment
        segment: String,
    },

    /// Segment tried to descend into a scalar
    #[error("cannot descend into {found} at segment '{segment}'")]
    NotAContainer {
        /// Unescaped segment
        segment: String,
        /// JSON type name of the value found
        found: &'static str,
    },
}

/// Roles could not be extracted by pointer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RolesError {
    /// Pointer did not resolve
    #[error(transparent)]
    Pointer(#[from] PointerError),

    /// Resolved value is not an array
    #[error("expected array of roles, found {found}")]
    NotAnArray {
        /// JSON type name of the value found
        found: &'static str,
    },

    /// Array held a non-string element
    #[error("expected string role at index {index}, found {found}")]
    NonStringRole {
        /// Element index
        index: usize,
        /// JSON type name of the element
        found: &'static str,
    },
}

/// Fatal failure surfaced to the caller.
///
/// The message never varies with the underlying cause.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", BACKEND_FAILURE_MESSAGE)]
pub struct BackendFailure;
