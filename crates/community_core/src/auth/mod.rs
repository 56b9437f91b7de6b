//! Identity provider boundary and process-wide auth state.
//!
//! # Responsibility
//! - Define the sign-in / sign-up / sign-out / session-listener contract.
//! - Provide `SessionHub`, the listener registry adapters share.
//!
//! # Invariants
//! - A session subscription yields the current session once on
//!   registration, then every later change, in order.

use crate::model::session::Session;
use crate::subscription::Subscription;
use async_trait::async_trait;
use log::error;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;

pub mod context;
pub mod firebase;

pub use context::{AuthContext, AuthState};
pub use firebase::FirebaseIdentityProvider;

pub type AuthResult<T> = Result<T, AuthError>;

/// Live session-change stream; `None` means signed out.
pub type SessionSubscription = Subscription<Option<Session>>;

/// Identity provider failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    EmailExists,
    InvalidCredentials,
    InvalidEmail,
    WeakPassword(String),
    UserDisabled,
    TooManyAttempts,
    /// No identity provider key configured.
    MissingApiKey,
    Network(String),
    /// Provider answered with an error this client does not classify.
    Provider { status: u16, code: String },
    MalformedResponse(String),
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmailExists => write!(f, "an account with this email already exists"),
            Self::InvalidCredentials => write!(f, "email or password is incorrect"),
            Self::InvalidEmail => write!(f, "email address is invalid"),
            Self::WeakPassword(detail) => write!(f, "password is too weak: {detail}"),
            Self::UserDisabled => write!(f, "account is disabled"),
            Self::TooManyAttempts => write!(f, "too many attempts; try again later"),
            Self::MissingApiKey => write!(f, "identity provider api key is not configured"),
            Self::Network(message) => write!(f, "identity provider unreachable: {message}"),
            Self::Provider { status, code } => {
                write!(f, "identity provider error {status}: {code}")
            }
            Self::MalformedResponse(message) => {
                write!(f, "identity provider response is malformed: {message}")
            }
        }
    }
}

impl Error for AuthError {}

/// External identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Session>;
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Session>;
    async fn sign_out(&self) -> AuthResult<()>;

    /// Registers one session listener.
    fn subscribe_sessions(&self) -> SessionSubscription;
}

struct HubInner {
    current: Option<Session>,
    listeners: Vec<(u64, UnboundedSender<Option<Session>>)>,
    next_id: u64,
}

/// Current session plus the listeners waiting for its changes.
#[derive(Clone)]
pub struct SessionHub {
    inner: Arc<Mutex<HubInner>>,
}

impl Default for SessionHub {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner {
                current: None,
                listeners: Vec::new(),
                next_id: 1,
            })),
        }
    }
}

impl SessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Session> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.current.clone())
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().map_or(0, |inner| inner.listeners.len())
    }

    /// Registers a listener and hands it the current session right away.
    pub fn subscribe(&self) -> SessionSubscription {
        let Ok(mut inner) = self.inner.lock() else {
            error!("event=session_subscribe module=auth status=error error=session hub lock poisoned");
            let (_, subscription) = Subscription::channel(|| {});
            return subscription;
        };

        let listener_id = inner.next_id;
        inner.next_id += 1;
        let registry = Arc::downgrade(&self.inner);
        let (sender, subscription) = Subscription::channel(move || {
            if let Some(registry) = registry.upgrade() {
                if let Ok(mut inner) = registry.lock() {
                    inner.listeners.retain(|(id, _)| *id != listener_id);
                }
            }
        });

        let _ = sender.send(inner.current.clone());
        inner.listeners.push((listener_id, sender));
        subscription
    }

    /// Stores `session` as current and notifies every listener.
    pub fn publish(&self, session: Option<Session>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.current = session.clone();
            inner
                .listeners
                .retain(|(_, sender)| sender.send(session.clone()).is_ok());
        }
    }
}
