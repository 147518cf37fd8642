//! Identity extractor.
//!
//! Reads the visitor's identity record from the session. Use it for
//! rendering ("Signed in as ..."); the cart page itself tracks identity
//! through [`crate::services::identity::SessionProvider`].

use axum::{extract::FromRequestParts, http::request::Parts};
use tillpoint_core::Session as Shopper;
use tower_sessions::Session;

use crate::models::{IdentityRecord, session_keys};

/// Extractor that optionally gets the signed-in shopper.
///
/// Never rejects; a missing or unreadable identity is treated as anonymous.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(OptionalAuth(shopper): OptionalAuth) -> impl IntoResponse {
///     match shopper {
///         Some(s) => format!("Hello, {}!", s.user_id),
///         None => "Hello, guest!".to_string(),
///     }
/// }
/// ```
pub struct OptionalAuth(pub Option<Shopper>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(current_shopper(parts).await))
    }
}

async fn current_shopper(parts: &Parts) -> Option<Shopper> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<IdentityRecord>(session_keys::IDENTITY)
        .await
        .ok()
        .flatten()
        .and_then(|record| record.session)
}
