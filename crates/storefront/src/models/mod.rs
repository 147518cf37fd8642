//! Domain models for storefront.

pub mod session;

pub use session::{IdentityRecord, VisitorKey, keys as session_keys, visitor_key};
