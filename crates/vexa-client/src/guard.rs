//! Session/auth guard: the only writer of session state.

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::session::{Session, SessionStore};
use crate::types::UserProfile;

/// Where the process is in the sign-in lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Uninitialized,
    /// A login is in flight. The session it would replace stays usable
    /// until the login succeeds.
    Authenticating { previous: Option<Session> },
    Authenticated(Session),
}

impl SessionState {
    /// The live session, including one kept through a pending login.
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Authenticated(session) => Some(session),
            SessionState::Authenticating { previous } => previous.as_ref(),
            SessionState::Uninitialized => None,
        }
    }
}

/// Owns the live session and its persisted copy.
///
/// State changes are published on a `watch` channel so a front end can
/// react to a forced sign-out without polling.
pub struct AuthGuard {
    state: watch::Sender<SessionState>,
    store: Box<dyn SessionStore>,
}

impl AuthGuard {
    pub fn new(store: impl SessionStore + 'static) -> Self {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        Self {
            state,
            store: Box::new(store),
        }
    }

    /// Load the persisted session at startup.
    ///
    /// Returns whether a session was restored. Unreadable storage is
    /// cleared and leaves the guard signed out.
    pub fn restore(&self) -> bool {
        match self.store.load() {
            Ok(Some(session)) => {
                debug!("Restored session for {}", session.user.username);
                self.state.send_replace(SessionState::Authenticated(session));
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("Discarding unreadable session: {}", e);
                if let Err(e) = self.store.clear() {
                    warn!("Failed to clear session storage: {}", e);
                }
                false
            }
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().session().is_some()
    }

    /// Current bearer token, if signed in.
    pub fn token(&self) -> Option<String> {
        self.state.borrow().session().map(|s| s.token.clone())
    }

    /// Current user profile, if signed in.
    pub fn user(&self) -> Option<UserProfile> {
        self.state.borrow().session().map(|s| s.user.clone())
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn begin_login(&self) {
        self.state.send_modify(|state| {
            let previous = state.session().cloned();
            *state = SessionState::Authenticating { previous };
        });
    }

    /// Enter `Authenticated` with a credential issued by the backend.
    ///
    /// A persistence failure is logged; the session stays live for this
    /// process.
    pub fn complete_login(&self, session: Session) {
        if let Err(e) = self.store.save(&session) {
            warn!("Failed to persist session: {}", e);
        }
        info!("Signed in as {}", session.user.username);
        self.state.send_replace(SessionState::Authenticated(session));
    }

    /// Leave `Authenticating` after a failed login, going back to the
    /// session held before it, if any.
    pub fn abort_login(&self) {
        self.state.send_if_modified(|state| match state {
            SessionState::Authenticating { previous } => {
                let restored = previous.take();
                *state = match restored {
                    Some(session) => SessionState::Authenticated(session),
                    None => SessionState::Uninitialized,
                };
                true
            }
            _ => false,
        });
    }

    /// Explicit sign-out.
    pub fn logout(&self) {
        self.clear_store();
        info!("Signed out");
        self.state.send_replace(SessionState::Uninitialized);
    }

    /// Forced sign-out after the backend rejected the credential.
    pub fn expire(&self) {
        self.clear_store();
        warn!("Credential rejected by backend, signing out");
        self.state.send_replace(SessionState::Uninitialized);
    }

    /// Expire only if `token` is still the live credential, so a rejection
    /// of a request sent before a re-login does not end the new session.
    pub(crate) fn expire_token(&self, token: &str) {
        let current = self.token();
        if current.as_deref() == Some(token) {
            self.expire();
        } else {
            debug!("Ignoring rejection of a superseded credential");
        }
    }

    fn clear_store(&self) {
        if let Err(e) = self.store.clear() {
            warn!("Failed to clear session storage: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;
    use std::sync::Arc;

    fn session(token: &str) -> Session {
        Session::new(
            token,
            UserProfile {
                id: Some(1),
                username: "kamil".into(),
                email: None,
                is_active: Some(true),
            },
        )
    }

    #[test]
    fn test_lifecycle() {
        let store = Arc::new(MemorySessionStore::new());
        let guard = AuthGuard::new(store.clone());
        assert_eq!(guard.state(), SessionState::Uninitialized);
        assert!(!guard.restore());

        guard.begin_login();
        assert_eq!(
            guard.state(),
            SessionState::Authenticating { previous: None }
        );

        guard.complete_login(session("T"));
        assert!(guard.is_authenticated());
        assert_eq!(guard.token().as_deref(), Some("T"));
        assert_eq!(store.load().unwrap(), Some(session("T")));

        guard.logout();
        assert_eq!(guard.state(), SessionState::Uninitialized);
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_restore_from_store() {
        let guard = AuthGuard::new(MemorySessionStore::with_session(session("T")));
        assert!(guard.restore());
        assert_eq!(guard.user().map(|u| u.username), Some("kamil".to_string()));
    }

    #[test]
    fn test_abort_login_only_from_authenticating() {
        let guard = AuthGuard::new(MemorySessionStore::new());
        guard.complete_login(session("T"));
        guard.abort_login();
        assert_eq!(guard.state(), SessionState::Authenticated(session("T")));

        guard.logout();
        guard.begin_login();
        guard.abort_login();
        assert_eq!(guard.state(), SessionState::Uninitialized);
    }

    #[test]
    fn test_failed_relogin_keeps_previous_session() {
        let store = Arc::new(MemorySessionStore::with_session(session("OLD")));
        let guard = AuthGuard::new(store.clone());
        assert!(guard.restore());

        guard.begin_login();
        // still usable while the new login is in flight
        assert!(guard.is_authenticated());
        assert_eq!(guard.token().as_deref(), Some("OLD"));

        guard.abort_login();
        assert_eq!(guard.state(), SessionState::Authenticated(session("OLD")));
        assert_eq!(store.load().unwrap(), Some(session("OLD")));
    }

    #[test]
    fn test_expiry_during_login_is_not_undone_by_abort() {
        let guard = AuthGuard::new(MemorySessionStore::with_session(session("OLD")));
        guard.restore();

        guard.begin_login();
        guard.expire_token("OLD");
        guard.abort_login();
        assert_eq!(guard.state(), SessionState::Uninitialized);
    }

    #[test]
    fn test_expire_clears_store_and_notifies() {
        let store = Arc::new(MemorySessionStore::new());
        let guard = AuthGuard::new(store.clone());
        guard.complete_login(session("T"));

        let mut rx = guard.subscribe();
        let _ = rx.borrow_and_update();

        guard.expire();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), SessionState::Uninitialized);
        assert!(store.load().unwrap().is_none());
        assert!(guard.token().is_none());
        assert!(guard.user().is_none());
    }

    #[test]
    fn test_expire_token_ignores_superseded_credential() {
        let guard = AuthGuard::new(MemorySessionStore::new());
        guard.complete_login(session("new"));
        guard.expire_token("old");
        assert!(guard.is_authenticated());

        guard.expire_token("new");
        assert!(!guard.is_authenticated());
    }
}
