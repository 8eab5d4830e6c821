//! Role extraction from validated claims
//!
//! Roles enrich credentials but never gate them: every failure here yields an
//! empty role list and a diagnostic through [`RolesObserver`].

use serde_json::Value;
use tracing::{debug, warn};

use super::pointer::{resolve, type_name};
use crate::error::RolesError;

/// Receives diagnostics from role extraction
pub trait RolesObserver: Send + Sync {
    /// Roles were found and extracted
    fn roles_extracted(&self, source: &str, roles: &[String]);

    /// Configured source did not yield an array of strings
    fn roles_rejected(&self, source: &str, error: &RolesError);
}

/// Default observer, reporting through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRolesObserver;

impl RolesObserver for TracingRolesObserver {
    fn roles_extracted(&self, source: &str, roles: &[String]) {
        debug!(source = source, count = roles.len(), "Extracted roles from JWT");
    }

    fn roles_rejected(&self, source: &str, error: &RolesError) {
        warn!(
            source = source,
            error = %error,
            "Could not extract roles from JWT, continuing without roles"
        );
    }
}

/// Extract roles through a JSON Pointer.
///
/// The pointer must resolve to an array whose elements are all strings.
///
/// # Errors
///
/// Returns [`RolesError`] when the pointer does not resolve, resolves to a
/// non-array, or the array holds a non-string element.
pub fn extract_roles_by_pointer(claims: &Value, pointer: &str) -> Result<Vec<String>, RolesError> {
    let target = resolve(claims, pointer)?;
    let Value::Array(items) = target else {
        return Err(RolesError::NotAnArray {
            found: type_name(target),
        });
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::String(role) => Ok(role.clone()),
            other => Err(RolesError::NonStringRole {
                index,
                found: type_name(other),
            }),
        })
        .collect()
}

/// Extract roles from a top-level claim.
///
/// A string is split on commas; an array contributes each scalar element.
/// Absent claims, nulls and nested values contribute nothing.
pub fn extract_roles_by_key(claims: &Value, key: &str) -> Vec<String> {
    match claims.get(key) {
        Some(Value::String(raw)) => split_roles(raw),
        Some(Value::Array(items)) => items.iter().filter_map(scalar_to_string).collect(),
        Some(other) => scalar_to_string(other).map(|s| split_roles(&s)).unwrap_or_default(),
        None => Vec::new(),
    }
}

fn split_roles(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pointer_to_nested_roles() {
        let claims = json!({"realm_access": {"roles": ["role1", "role2"]}});
        assert_eq!(
            extract_roles_by_pointer(&claims, "/realm_access/roles").unwrap(),
            vec!["role1", "role2"]
        );
    }

    #[test]
    fn test_pointer_to_non_array() {
        let claims = json!({"realm_access": {"roles": "role1"}});
        assert_eq!(
            extract_roles_by_pointer(&claims, "/realm_access/roles"),
            Err(RolesError::NotAnArray { found: "string" })
        );
    }

    #[test]
    fn test_pointer_to_mixed_array() {
        let claims = json!({"roles": ["a", 1]});
        assert_eq!(
            extract_roles_by_pointer(&claims, "/roles"),
            Err(RolesError::NonStringRole {
                index: 1,
                found: "number"
            })
        );
    }

    #[test]
    fn test_pointer_missing() {
        let claims = json!({"sub": "x"});
        assert!(matches!(
            extract_roles_by_pointer(&claims, "/realm_access/roles"),
            Err(RolesError::Pointer(_))
        ));
    }

    #[test]
    fn test_roles_key_variants() {
        let claims = json!({
            "csv": "admin, ops ,,dev",
            "list": ["a", 2, true, {"x": 1}, null],
            "single": "solo",
            "num": 42
        });

        assert_eq!(extract_roles_by_key(&claims, "csv"), vec!["admin", "ops", "dev"]);
        assert_eq!(extract_roles_by_key(&claims, "list"), vec!["a", "2", "true"]);
        assert_eq!(extract_roles_by_key(&claims, "single"), vec!["solo"]);
        assert_eq!(extract_roles_by_key(&claims, "num"), vec!["42"]);
        assert!(extract_roles_by_key(&claims, "absent").is_empty());
    }
}
