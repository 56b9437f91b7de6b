//! Read-only mirror of the identity provider's session record.

use serde::{Deserialize, Serialize};

/// Author label used when the session has no email.
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

/// Signed-in identity as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Provider-assigned user id.
    pub id: String,
    pub email: Option<String>,
}

impl Session {
    pub fn new(id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: id.into(),
            email,
        }
    }
}

/// Returns the label stored as a post's author for `session`.
pub fn author_label(session: Option<&Session>) -> String {
    session
        .and_then(|session| session.email.as_deref())
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .unwrap_or(ANONYMOUS_AUTHOR)
        .to_string()
}
