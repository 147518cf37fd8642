//! Shopper identity and ordered session updates.
//!
//! Identity arrives from two sources that can race: a one-shot fetch when the
//! cart page mounts, and pushed change notifications. Each update carries a
//! revision issued by the identity source; [`SessionTracker`] applies an
//! update only when its revision is strictly newer than the last one applied,
//! so a slow initial fetch can never overwrite a fresher notification.

use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// An authenticated shopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub email: Option<String>,
}

/// A value tagged with the revision at which it was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revisioned<T> {
    pub revision: u64,
    pub value: T,
}

impl<T> Revisioned<T> {
    #[must_use]
    pub const fn new(revision: u64, value: T) -> Self {
        Self { revision, value }
    }
}

/// Latest known session, updated monotonically by revision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTracker {
    current: Option<Session>,
    revision: Option<u64>,
}

impl SessionTracker {
    /// Tracker with no session and no revision applied yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: None,
            revision: None,
        }
    }

    /// Apply an update if it is newer than the last applied revision.
    ///
    /// Returns `true` if the update was applied.
    pub fn apply(&mut self, update: Revisioned<Option<Session>>) -> bool {
        if self.revision.is_some_and(|seen| update.revision <= seen) {
            return false;
        }
        self.revision = Some(update.revision);
        self.current = update.value;
        true
    }

    /// The current session, if authenticated.
    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// The revision of the current session, if any update was applied.
    #[must_use]
    pub const fn revision(&self) -> Option<u64> {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_in(user: &str) -> Option<Session> {
        Some(Session {
            user_id: UserId::new(user),
            email: None,
        })
    }

    #[test]
    fn test_first_update_is_always_applied() {
        let mut tracker = SessionTracker::new();
        assert!(tracker.apply(Revisioned::new(0, signed_in("u1"))));
        assert_eq!(tracker.session().map(|s| s.user_id.as_str()), Some("u1"));
    }

    #[test]
    fn test_newer_update_replaces_older() {
        let mut tracker = SessionTracker::new();
        tracker.apply(Revisioned::new(1, signed_in("u1")));
        assert!(tracker.apply(Revisioned::new(2, None)));
        assert!(tracker.session().is_none());
        assert_eq!(tracker.revision(), Some(2));
    }

    #[test]
    fn test_stale_update_is_ignored() {
        let mut tracker = SessionTracker::new();
        // A sign-out notification arrives first...
        tracker.apply(Revisioned::new(5, None));
        // ...then the initial fetch resolves with an older signed-in state.
        assert!(!tracker.apply(Revisioned::new(3, signed_in("u1"))));
        assert!(tracker.session().is_none());
    }

    #[test]
    fn test_duplicate_revision_is_ignored() {
        let mut tracker = SessionTracker::new();
        tracker.apply(Revisioned::new(4, signed_in("u1")));
        assert!(!tracker.apply(Revisioned::new(4, signed_in("u2"))));
        assert_eq!(tracker.session().map(|s| s.user_id.as_str()), Some("u1"));
    }
}
