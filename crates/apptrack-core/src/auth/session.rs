//! Process-wide authentication state.
//!
//! The access token only ever lives here, in memory. It is lost when the
//! process exits; the refresh token in [`super::RefreshTokenStore`] is what
//! survives restarts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::models::User;

/// Snapshot of the session at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionData {
    pub user: Option<User>,
    pub access_token: Option<String>,
}

impl SessionData {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }
}

/// Shared, injectable holder of the current user and access token.
/// Clone is cheap - every clone observes the same state.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    inner: Arc<RwLock<SessionData>>,
    /// Bumped whenever the session starts or ends. A token refresh keeps it.
    generation: Arc<AtomicU64>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave SessionData half-written,
    // so a poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, SessionData> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionData> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn current(&self) -> SessionData {
        self.read().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().access_token.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.read().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_authenticated()
    }

    /// Identifies the current session. Anything derived from an earlier
    /// generation belongs to a session that no longer exists.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Replace the whole session after a successful login.
    pub fn set_auth(&self, user: User, access_token: String) {
        debug!(user_id = user.id, "Session established");
        let mut data = self.write();
        data.user = Some(user);
        data.access_token = Some(access_token);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Swap in a refreshed access token, keeping the user identity.
    pub fn set_access_token(&self, access_token: String) {
        self.write().access_token = Some(access_token);
    }

    pub fn clear(&self) {
        debug!("Session cleared");
        let mut data = self.write();
        data.user = None;
        data.access_token = None;
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Replace the stored user with a newer copy. No-op when logged out.
    pub fn update_user(&self, user: User) {
        let mut data = self.write();
        if data.user.is_some() {
            data.user = Some(user);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, first_name: &str) -> User {
        User {
            id,
            email: format!("user{}@example.com", id),
            username: format!("user{}", id),
            first_name: first_name.to_string(),
            last_name: String::new(),
            timezone: "UTC".to_string(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_set_auth_and_clear() {
        let session = SessionState::new();
        assert!(!session.is_authenticated());

        session.set_auth(user(1, "Ada"), "A1".to_string());
        assert!(session.is_authenticated());
        assert_eq!(session.access_token().as_deref(), Some("A1"));

        session.clear();
        assert_eq!(session.current(), SessionData::default());
    }

    #[test]
    fn test_set_access_token_keeps_user() {
        let session = SessionState::new();
        session.set_auth(user(1, "Ada"), "A1".to_string());
        session.set_access_token("A2".to_string());

        let data = session.current();
        assert_eq!(data.access_token.as_deref(), Some("A2"));
        assert_eq!(data.user.map(|u| u.id), Some(1));
    }

    #[test]
    fn test_generation_tracks_session_boundaries() {
        let session = SessionState::new();
        let start = session.generation();

        session.set_auth(user(1, "Ada"), "A1".to_string());
        let logged_in = session.generation();
        assert_ne!(logged_in, start);

        session.set_access_token("A2".to_string());
        assert_eq!(session.generation(), logged_in);

        session.clear();
        assert_ne!(session.generation(), logged_in);
    }

    #[test]
    fn test_clones_share_state() {
        let session = SessionState::new();
        let other = session.clone();
        session.set_access_token("A1".to_string());
        assert_eq!(other.access_token().as_deref(), Some("A1"));
    }

    #[test]
    fn test_update_user_only_when_logged_in() {
        let session = SessionState::new();
        session.update_user(user(1, "Ada"));
        assert!(session.user().is_none());

        session.set_auth(user(1, "Ada"), "A1".to_string());
        session.update_user(user(1, "Augusta"));
        assert_eq!(session.user().map(|u| u.first_name), Some("Augusta".to_string()));
    }
}
