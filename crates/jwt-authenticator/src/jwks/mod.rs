//! Verification key management
//!
//! # Modules
//!
//! - `key` - JWK conversion, key id escaping, and the per-set index
//! - `fetcher` - HTTP retrieval of discovery documents and key sets
//! - `resolver` - key lookup with caching and refresh on unknown key ids

pub mod fetcher;
pub mod key;
pub mod resolver;

pub use fetcher::{HttpFetcher, KeySetFetcher, check_url_safety};
pub use key::{
    KeyFamily, KeyIndex, MAX_KEY_ID_LEN, VerificationKey, escape_key_id, sanitize_key_id,
};
pub use resolver::KeyResolver;
