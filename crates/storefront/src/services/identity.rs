//! Shopper identity source with change notifications.
//!
//! The cart page needs the current shopper on mount and must hear about
//! sign-in/sign-out while it is alive. [`SessionProvider`] captures that
//! contract: a one-shot [`SessionProvider::get_session`] plus a push
//! [`SessionProvider::subscribe`]. Both yield [`Revisioned`] values so the
//! page can drop stale answers.
//!
//! [`AuthHub`] is the process-wide fan-out for identity changes. Every change
//! gets the next revision from a single counter, which makes revisions
//! comparable across the fetch and notification paths.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use thiserror::Error;
use tillpoint_core::{Revisioned, Session};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tower_sessions::Session as CookieSession;

use crate::models::{IdentityRecord, VisitorKey, session_keys};

/// Number of identity changes buffered per subscriber before it lags.
const CHANNEL_CAPACITY: usize = 256;

/// Errors that can occur when reading or writing identity.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Session store operation failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

/// Asynchronous source of the current shopper.
pub trait SessionProvider: Send + Sync {
    /// Fetch the current session once.
    fn get_session(
        &self,
    ) -> impl Future<Output = Result<Revisioned<Option<Session>>, IdentityError>> + Send;

    /// Subscribe to identity changes. Dropping the subscription unsubscribes.
    fn subscribe(&self) -> SessionSubscription;
}

/// An identity change for one visitor.
#[derive(Debug, Clone)]
pub struct AuthChange {
    pub visitor: VisitorKey,
    pub update: Revisioned<Option<Session>>,
}

/// Process-wide broadcaster of identity changes.
#[derive(Debug)]
pub struct AuthHub {
    sender: broadcast::Sender<AuthChange>,
    revision: AtomicU64,
    subscribers: Arc<AtomicUsize>,
}

impl Default for AuthHub {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthHub {
    /// Create a hub with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            revision: AtomicU64::new(0),
            subscribers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Issue the next revision number.
    pub fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Publish a visitor's new identity and return the revisioned update.
    pub fn publish(&self, visitor: VisitorKey, session: Option<Session>) -> Revisioned<Option<Session>> {
        let update = Revisioned::new(self.next_revision(), session);
        // No receivers is fine: nobody is watching this visitor right now
        let _ = self.sender.send(AuthChange {
            visitor,
            update: update.clone(),
        });
        tracing::debug!(%visitor, revision = update.revision, "Identity change published");
        update
    }

    /// Subscribe to one visitor's identity changes.
    #[must_use]
    pub fn subscribe(&self, visitor: VisitorKey) -> SessionSubscription {
        self.subscribers.fetch_add(1, Ordering::SeqCst);
        SessionSubscription {
            receiver: self.sender.subscribe(),
            visitor,
            _guard: SubscriberGuard(Arc::clone(&self.subscribers)),
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::SeqCst)
    }
}

/// Decrements the hub's subscriber count when dropped.
#[derive(Debug)]
struct SubscriberGuard(Arc<AtomicUsize>);

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A live subscription to one visitor's identity changes.
///
/// Scoped resource: the subscription ends when this value is dropped.
#[derive(Debug)]
pub struct SessionSubscription {
    receiver: broadcast::Receiver<AuthChange>,
    visitor: VisitorKey,
    _guard: SubscriberGuard,
}

impl SessionSubscription {
    /// Next pending update for this visitor, without waiting.
    pub fn try_next(&mut self) -> Option<Revisioned<Option<Session>>> {
        loop {
            match self.receiver.try_recv() {
                Ok(change) if change.visitor == self.visitor => return Some(change.update),
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Identity subscription lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

/// Identity of the visitor behind a cookie session.
pub struct VisitorIdentity<'a> {
    session: &'a CookieSession,
    hub: &'a AuthHub,
    visitor: VisitorKey,
}

impl<'a> VisitorIdentity<'a> {
    #[must_use]
    pub const fn new(session: &'a CookieSession, hub: &'a AuthHub, visitor: VisitorKey) -> Self {
        Self {
            session,
            hub,
            visitor,
        }
    }

    /// Record a sign-in and notify subscribers.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store cannot be written.
    pub async fn sign_in(&self, session: Session) -> Result<Revisioned<Option<Session>>, IdentityError> {
        self.record(Some(session)).await
    }

    /// Record a sign-out and notify subscribers.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store cannot be written.
    pub async fn sign_out(&self) -> Result<Revisioned<Option<Session>>, IdentityError> {
        self.record(None).await
    }

    async fn record(
        &self,
        session: Option<Session>,
    ) -> Result<Revisioned<Option<Session>>, IdentityError> {
        let update = self.hub.publish(self.visitor, session);
        let record = IdentityRecord {
            session: update.value.clone(),
            revision: update.revision,
        };
        self.session.insert(session_keys::IDENTITY, &record).await?;
        Ok(update)
    }
}

impl SessionProvider for VisitorIdentity<'_> {
    async fn get_session(&self) -> Result<Revisioned<Option<Session>>, IdentityError> {
        let record = self
            .session
            .get::<IdentityRecord>(session_keys::IDENTITY)
            .await?;

        Ok(record.map_or_else(
            || Revisioned::new(0, None),
            |r| Revisioned::new(r.revision, r.session),
        ))
    }

    fn subscribe(&self) -> SessionSubscription {
        self.hub.subscribe(self.visitor)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tillpoint_core::UserId;
    use tower_sessions::MemoryStore;

    use super::*;

    fn shopper(id: &str) -> Session {
        Session {
            user_id: UserId::new(id),
            email: None,
        }
    }

    fn cookie_session() -> CookieSession {
        CookieSession::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[test]
    fn test_revisions_increase() {
        let hub = AuthHub::new();
        let first = hub.next_revision();
        let second = hub.next_revision();
        assert!(second > first);
    }

    #[test]
    fn test_subscription_filters_by_visitor() {
        let hub = AuthHub::new();
        let me = VisitorKey::generate();
        let other = VisitorKey::generate();
        let mut subscription = hub.subscribe(me);

        hub.publish(other, Some(shopper("someone-else")));
        let mine = hub.publish(me, Some(shopper("me")));

        assert_eq!(subscription.try_next(), Some(mine));
        assert_eq!(subscription.try_next(), None);
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let hub = AuthHub::new();
        let subscription = hub.subscribe(VisitorKey::generate());
        assert_eq!(hub.subscriber_count(), 1);

        drop(subscription);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_visitor_identity_roundtrip() {
        let hub = AuthHub::new();
        let cookie = cookie_session();
        let identity = VisitorIdentity::new(&cookie, &hub, VisitorKey::generate());

        let initial = identity.get_session().await.unwrap();
        assert_eq!(initial, Revisioned::new(0, None));

        let signed_in = identity.sign_in(shopper("u1")).await.unwrap();
        let fetched = identity.get_session().await.unwrap();
        assert_eq!(fetched, signed_in);

        let signed_out = identity.sign_out().await.unwrap();
        assert!(signed_out.revision > signed_in.revision);
        assert!(identity.get_session().await.unwrap().value.is_none());
    }
}
