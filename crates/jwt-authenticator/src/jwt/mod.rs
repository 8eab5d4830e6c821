//! Bearer token handling
//!
//! ```text
//!   raw header value
//!         │
//!   ┌─────▼─────┐   split, base64url, lenient JSON
//!   │  parser   │
//!   └─────┬─────┘
//!         │ ParsedToken (header, claims, signing input)
//!   ┌─────▼─────┐   signature, exp / nbf with skew
//!   │ validator │
//!   └─────┬─────┘
//!         ▼
//!     ClaimSet
//! ```
//!
//! # Modules
//!
//! - `lenient` - tolerant JSON parsing for issuers with non-standard escapes
//! - `parser` - compact serialization parsing
//! - `validator` - signature and temporal checks

pub mod lenient;
pub mod parser;
pub mod validator;

pub use lenient::parse_lenient;
pub use parser::{BEARER_PREFIX, ParsedToken, TokenHeader, parse};
pub use validator::{now_unix, validate, validate_at};
