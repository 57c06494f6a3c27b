//! Session state machine
//!
//! Pure transition function: receives the current state and an event,
//! returns the next state. `AuthSession` performs the network I/O and
//! reports what happened through events.
//!
//! ```text
//! NoToken ──LoginStarted──▶ Authenticating ──Succeeded──▶ Authenticated
//!    ▲                          │    ▲                      │
//!    └────────LoginFailed───────┘    └──RefreshFailed──┐    RefreshStarted
//!                                                      │    ▼
//!                         Authenticated ◀──Succeeded── Refreshing
//! ```
//!
//! `Authenticating` and `Refreshing` only exist while a network round-trip
//! is in flight.

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No usable token; the next request performs a full login
    NoToken,
    /// Login in flight (password grant, then browser flow)
    Authenticating,
    /// Holding a token set
    Authenticated,
    /// Refresh grant in flight
    Refreshing,
}

impl AuthState {
    /// Status label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            AuthState::NoToken => "no_token",
            AuthState::Authenticating => "authenticating",
            AuthState::Authenticated => "authenticated",
            AuthState::Refreshing => "refreshing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    /// Full login begins
    LoginStarted,
    /// Refresh grant begins
    RefreshStarted,
    /// Login or refresh produced a new token set
    Succeeded,
    /// Refresh failed; login follows
    RefreshFailed,
    /// Every grant strategy failed
    LoginFailed,
    /// Cached tokens dropped (forced re-login, session closed)
    Invalidated,
}

/// Handle a state transition. Pure function: no I/O.
///
/// Events that make no sense in the current state leave it unchanged.
pub fn next(state: AuthState, event: AuthEvent) -> AuthState {
    match (state, event) {
        (_, AuthEvent::Invalidated) => AuthState::NoToken,

        (AuthState::NoToken | AuthState::Authenticated, AuthEvent::LoginStarted) => {
            AuthState::Authenticating
        }
        (AuthState::Authenticated, AuthEvent::RefreshStarted) => AuthState::Refreshing,

        (AuthState::Authenticating | AuthState::Refreshing, AuthEvent::Succeeded) => {
            AuthState::Authenticated
        }
        (AuthState::Refreshing, AuthEvent::RefreshFailed) => AuthState::Authenticating,
        (AuthState::Authenticating, AuthEvent::LoginFailed) => AuthState::NoToken,

        (state, event) => {
            debug!(state = state.label(), ?event, "ignoring event");
            state
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_success_path() {
        let s = next(AuthState::NoToken, AuthEvent::LoginStarted);
        assert_eq!(s, AuthState::Authenticating);
        assert_eq!(next(s, AuthEvent::Succeeded), AuthState::Authenticated);
    }

    #[test]
    fn login_failure_returns_to_no_token() {
        let s = next(AuthState::NoToken, AuthEvent::LoginStarted);
        assert_eq!(next(s, AuthEvent::LoginFailed), AuthState::NoToken);
    }

    #[test]
    fn refresh_loop() {
        let s = next(AuthState::Authenticated, AuthEvent::RefreshStarted);
        assert_eq!(s, AuthState::Refreshing);
        assert_eq!(next(s, AuthEvent::Succeeded), AuthState::Authenticated);
    }

    #[test]
    fn refresh_failure_falls_back_to_login() {
        let s = next(AuthState::Refreshing, AuthEvent::RefreshFailed);
        assert_eq!(s, AuthState::Authenticating);
        // the fallback login announces itself without leaving Authenticating
        assert_eq!(next(s, AuthEvent::LoginStarted), AuthState::Authenticating);
        assert_eq!(next(s, AuthEvent::LoginFailed), AuthState::NoToken);
    }

    #[test]
    fn invalidation_from_any_state() {
        for state in [
            AuthState::NoToken,
            AuthState::Authenticating,
            AuthState::Authenticated,
            AuthState::Refreshing,
        ] {
            assert_eq!(next(state, AuthEvent::Invalidated), AuthState::NoToken);
        }
    }

    #[test]
    fn nonsense_events_are_ignored() {
        assert_eq!(
            next(AuthState::NoToken, AuthEvent::RefreshStarted),
            AuthState::NoToken
        );
        assert_eq!(
            next(AuthState::Authenticated, AuthEvent::LoginFailed),
            AuthState::Authenticated
        );
    }
}
