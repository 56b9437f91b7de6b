//! Process-wide auth state mirrored from the identity provider.
//!
//! # Invariants
//! - Exactly one provider subscription per `AuthContext::init`; clones share it.
//! - `loading` starts `true`, clears on the first session event, never returns.
//! - The listener lives for the rest of the process.

use crate::auth::IdentityProvider;
use crate::model::session::Session;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::watch;

/// Snapshot of the auth state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub current_session: Option<Session>,
    /// `true` until the provider reported the first session state.
    pub loading: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            current_session: None,
            loading: true,
        }
    }
}

impl AuthState {
    pub fn signed_in(session: Session) -> Self {
        Self {
            current_session: Some(session),
            loading: false,
        }
    }

    pub fn signed_out() -> Self {
        Self {
            current_session: None,
            loading: false,
        }
    }
}

/// Shared handle on the auth state. Cheap to clone.
#[derive(Clone)]
pub struct AuthContext {
    state: watch::Receiver<AuthState>,
    _publisher: Arc<watch::Sender<AuthState>>,
}

impl AuthContext {
    /// Registers the single session listener with `provider`.
    ///
    /// Must be called from inside a tokio runtime; the forwarding task runs
    /// until the provider drops the subscription.
    pub fn init<P: IdentityProvider + ?Sized>(provider: &P) -> Self {
        let mut sessions = provider.subscribe_sessions();
        let (sender, receiver) = watch::channel(AuthState::default());
        let publisher = Arc::new(sender);
        let task_publisher = Arc::clone(&publisher);

        tokio::spawn(async move {
            while let Some(session) = sessions.next().await {
                info!(
                    "event=session_change module=auth status=ok signed_in={}",
                    session.is_some()
                );
                task_publisher.send_modify(|state| {
                    state.current_session = session;
                    state.loading = false;
                });
            }
            warn!("event=session_listener module=auth status=closed");
        });

        Self {
            state: receiver,
            _publisher: publisher,
        }
    }

    /// Context that never receives events, pinned to `state`. Used for
    /// previews and tests of consumers.
    pub fn fixed(state: AuthState) -> Self {
        let (sender, receiver) = watch::channel(state);
        Self {
            state: receiver,
            _publisher: Arc::new(sender),
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn current_session(&self) -> Option<Session> {
        self.state.borrow().current_session.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Waits until the state changes after the last observed value.
    pub async fn changed(&mut self) {
        // The publisher is co-owned by `self`, so the channel never closes.
        let _ = self.state.changed().await;
    }

    /// Marks the current value as seen without waiting.
    pub fn mark_seen(&mut self) -> AuthState {
        self.state.borrow_and_update().clone()
    }
}
