//! Claim set projection into credentials
//!
//! - `pointer` - RFC 6901 JSON Pointer evaluation
//! - `roles` - role extraction by claim key or pointer
//! - `projector` - issuer/audience enforcement and credential assembly

pub mod pointer;
pub mod projector;
pub mod roles;

pub use projector::{AUDIENCE_ATTRIBUTE, ATTRIBUTE_PREFIX, ClaimsProjector, Credentials};
pub use roles::{
    RolesObserver, TracingRolesObserver, extract_roles_by_key, extract_roles_by_pointer,
};

/// Decoded token payload
pub type ClaimSet = serde_json::Map<String, serde_json::Value>;
