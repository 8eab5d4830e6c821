//! Claims projection
//!
//! Turns a validated claim set into [`Credentials`]:
//! - enforces the required issuer (exact, case-sensitive)
//! - enforces the required audience set (at least one match)
//! - reads the username from the subject claim
//! - extracts roles by pointer, or by claim key
//! - copies every top-level claim into `attr.jwt.<claim>` attributes

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::ClaimSet;
use super::roles::{RolesObserver, TracingRolesObserver, extract_roles_by_key, extract_roles_by_pointer};
use crate::config::JwtAuthConfig;
use crate::error::AuthError;

/// Prefix of per-claim attribute names
pub const ATTRIBUTE_PREFIX: &str = "attr.jwt.";

/// Attribute carrying the audience collection
pub const AUDIENCE_ATTRIBUTE: &str = "attr.jwt.aud";

const DEFAULT_SUBJECT_KEY: &str = "sub";

/// Authenticated identity handed to the authorization layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Principal name
    pub username: String,
    /// Roles asserted by the token, deduplicated
    pub backend_roles: BTreeSet<String>,
    /// `attr.jwt.<claim>` string renderings of the claim set
    pub attributes: BTreeMap<String, String>,
}

impl Credentials {
    /// Check if the credentials carry a role
    pub fn has_role(&self, role: &str) -> bool {
        self.backend_roles.contains(role)
    }

    /// Look up an attribute
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Issuer/audience policy plus username and role extraction
pub struct ClaimsProjector {
    required_issuer: Option<String>,
    required_audiences: BTreeSet<String>,
    subject_key: String,
    roles_key: Option<String>,
    roles_pointer: Option<String>,
    observer: Arc<dyn RolesObserver>,
}

impl std::fmt::Debug for ClaimsProjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimsProjector")
            .field("required_issuer", &self.required_issuer)
            .field("required_audiences", &self.required_audiences)
            .field("subject_key", &self.subject_key)
            .field("roles_key", &self.roles_key)
            .field("roles_pointer", &self.roles_pointer)
            .finish_non_exhaustive()
    }
}

impl ClaimsProjector {
    /// Build a projector from configuration, reporting through `tracing`
    pub fn from_config(config: &JwtAuthConfig) -> Self {
        Self {
            required_issuer: config.required_issuer.clone(),
            required_audiences: config.required_audiences(),
            subject_key: config
                .subject_key
                .clone()
                .unwrap_or_else(|| DEFAULT_SUBJECT_KEY.to_string()),
            roles_key: config.roles_key.clone(),
            roles_pointer: config.roles_pointer.clone(),
            observer: Arc::new(TracingRolesObserver),
        }
    }

    /// Replace the roles diagnostics observer
    pub fn with_observer(mut self, observer: Arc<dyn RolesObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Project a validated claim set into credentials
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::IssuerMismatch`], [`AuthError::AudienceMismatch`]
    /// or [`AuthError::MissingSubject`]. Role extraction never fails.
    pub fn project(&self, claims: ClaimSet) -> Result<Credentials, AuthError> {
        self.check_issuer(&claims)?;
        self.check_audience(&claims)?;

        let username = match claims.get(&self.subject_key) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(AuthError::MissingSubject(self.subject_key.clone())),
        };

        let tree = Value::Object(claims);
        let backend_roles = self.extract_roles(&tree).into_iter().collect();
        let attributes = match &tree {
            Value::Object(map) => render_attributes(map),
            _ => BTreeMap::new(),
        };

        Ok(Credentials {
            username,
            backend_roles,
            attributes,
        })
    }

    fn check_issuer(&self, claims: &ClaimSet) -> Result<(), AuthError> {
        let Some(expected) = &self.required_issuer else {
            return Ok(());
        };
        let actual = claims.get("iss").and_then(Value::as_str);
        if actual == Some(expected.as_str()) {
            return Ok(());
        }
        debug!(expected = %expected, actual = ?actual, "JWT issuer mismatch");
        Err(AuthError::IssuerMismatch {
            expected: expected.clone(),
            actual: actual.map(str::to_string),
        })
    }

    fn check_audience(&self, claims: &ClaimSet) -> Result<(), AuthError> {
        if self.required_audiences.is_empty() {
            return Ok(());
        }
        let actual = audiences(claims.get("aud"));
        if actual.iter().any(|a| self.required_audiences.contains(a)) {
            return Ok(());
        }
        debug!(actual = ?actual, "JWT audience mismatch");
        Err(AuthError::AudienceMismatch { actual })
    }

    fn extract_roles(&self, tree: &Value) -> Vec<String> {
        if let Some(pointer) = &self.roles_pointer {
            return match extract_roles_by_pointer(tree, pointer) {
                Ok(roles) => {
                    self.observer.roles_extracted(pointer, &roles);
                    roles
                }
                Err(e) => {
                    self.observer.roles_rejected(pointer, &e);
                    Vec::new()
                }
            };
        }
        if let Some(key) = &self.roles_key {
            let roles = extract_roles_by_key(tree, key);
            self.observer.roles_extracted(key, &roles);
            return roles;
        }
        Vec::new()
    }
}

// String audiences of a single value or array; non-strings are ignored
fn audiences(aud: Option<&Value>) -> Vec<String> {
    match aud {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn render_attributes(claims: &ClaimSet) -> BTreeMap<String, String> {
    claims
        .iter()
        .map(|(name, value)| {
            let rendered = if name == "aud" {
                render_collection(value)
            } else {
                render(value)
            };
            (format!("{ATTRIBUTE_PREFIX}{name}"), rendered)
        })
        .collect()
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(render).collect();
            format!("[{}]", inner.join(", "))
        }
        other => other.to_string(),
    }
}

// Audience is always printed as a collection, even when a single string
fn render_collection(value: &Value) -> String {
    match value {
        Value::Array(_) => render(value),
        other => format!("[{}]", render(other)),
    }
}
