//! Session-related types.
//!
//! The tower-sessions record holds a stable visitor key and the identity
//! record. Carts are kept server-side under the visitor key (see
//! [`crate::carts`]).

use serde::{Deserialize, Serialize};
use tillpoint_core::Session;
use tower_sessions::Session as CookieSession;
use uuid::Uuid;

/// Stable per-visitor key, used to address identity notifications and the
/// in-flight checkout guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisitorKey(Uuid);

impl VisitorKey {
    /// Generate a fresh random key.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for VisitorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity as last published for this visitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// Signed-in shopper, `None` after sign-out.
    pub session: Option<Session>,
    /// Revision issued by the auth hub when this record was written.
    pub revision: u64,
}

/// Get the visitor key, generating and storing one if absent.
///
/// # Errors
///
/// Returns an error if the session store cannot be read or written.
pub async fn visitor_key(session: &CookieSession) -> Result<VisitorKey, tower_sessions::session::Error> {
    if let Some(key) = session.get::<VisitorKey>(keys::VISITOR_KEY).await? {
        return Ok(key);
    }
    let key = VisitorKey::generate();
    session.insert(keys::VISITOR_KEY, key).await?;
    Ok(key)
}

/// Session keys for visitor data.
pub mod keys {
    /// Key for the stable visitor key.
    pub const VISITOR_KEY: &str = "visitor_key";

    /// Key for the identity record.
    pub const IDENTITY: &str = "identity";
}
