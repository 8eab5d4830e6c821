//! # JWT Authenticator - Bearer token verification
//!
//! Validates JWT bearer tokens and turns them into identity and role
//! credentials for an authorization layer. Signing keys come from a static
//! JWKS document, a JWKS endpoint, or OpenID Connect discovery.
//!
//! ## Key Features
//!
//! - **Key rotation** - unknown key ids trigger one rate-limited JWKS refresh
//! - **Clock skew** - symmetric tolerance on `exp` and `nbf`
//! - **Issuer and audience** - exact issuer, at-least-one audience match
//! - **Roles** - from a top-level claim or a JSON Pointer into nested claims
//! - **Lenient parsing** - accepts issuers that emit non-standard JSON escapes
//!
//! ## Architecture
//!
//! - [`authenticator`] - the façade, `Credentials | None | BackendFailure`
//! - [`jwt`] - token parsing and signature/time validation
//! - [`jwks`] - key conversion, fetching and the key cache
//! - [`claims`] - issuer/audience checks, subject, roles and attributes
//! - [`config`] - authenticator settings
//! - [`error`] - error types
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jwt_authenticator::{JwtAuthConfig, JwtAuthenticator};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = JwtAuthConfig::default()
//!     .with_openid_connect_url("https://idp.example.com/.well-known/openid-configuration")
//!     .with_required_issuer("https://idp.example.com")
//!     .with_required_audience("my-service")
//!     .with_roles_pointer("/realm_access/roles")
//!     .with_clock_skew(30);
//!
//! let authenticator = JwtAuthenticator::new(config)?;
//!
//! match authenticator.authenticate(Some("Bearer eyJ...")).await? {
//!     Some(credentials) => println!("{} {:?}", credentials.username, credentials.backend_roles),
//!     None => println!("not authenticated"),
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod authenticator;
pub mod claims;
pub mod config;
pub mod error;
pub mod jwks;
pub mod jwt;

pub use authenticator::JwtAuthenticator;
pub use claims::{ClaimSet, Credentials, RolesObserver, TracingRolesObserver};
pub use config::{FetchPolicy, JwtAuthConfig, KeySource};
pub use error::{AuthError, BackendFailure, ConfigError, FetchError};
pub use jwks::{HttpFetcher, KeySetFetcher};
