//! Email/password identity provider over the Identity Toolkit REST API.
//!
//! # Invariants
//! - Sign-in and sign-up publish the new session to every listener.
//! - Sign-out is local: it forgets the session and publishes `None`.

use crate::auth::{AuthError, AuthResult, IdentityProvider, SessionHub, SessionSubscription};
use crate::config::IdentityConfig;
use crate::model::session::Session;
use async_trait::async_trait;
use log::{error, info};
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;

const SIGN_IN_ENDPOINT: &str = "accounts:signInWithPassword";
const SIGN_UP_ENDPOINT: &str = "accounts:signUp";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Identity provider backed by the hosted email/password accounts API.
pub struct FirebaseIdentityProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    sessions: SessionHub,
}

impl FirebaseIdentityProvider {
    pub fn new(config: &IdentityConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.trim().to_string(),
            sessions: SessionHub::new(),
        }
    }

    async fn authenticate(
        &self,
        endpoint: &'static str,
        email: &str,
        password: &str,
    ) -> AuthResult<Session> {
        if self.api_key.is_empty() {
            error!("event=auth_call module=auth status=error endpoint={endpoint} error_code=missing_api_key");
            return Err(AuthError::MissingApiKey);
        }

        let started_at = Instant::now();
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({
                "email": email.trim(),
                "password": password,
                "returnSecureToken": true,
            }))
            .send()
            .await
            .map_err(|err| {
                log_failure(endpoint, started_at, AuthError::Network(err.to_string()))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| {
                log_failure(endpoint, started_at, AuthError::Network(err.to_string()))
            })?;

        if !status.is_success() {
            let err = classify_error(status.as_u16(), &body);
            error!(
                "event=auth_call module=auth status=error endpoint={} http_status={} duration_ms={} error={}",
                endpoint,
                status.as_u16(),
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err);
        }

        let account: AccountResponse = serde_json::from_str(&body).map_err(|err| {
            log_failure(
                endpoint,
                started_at,
                AuthError::MalformedResponse(err.to_string()),
            )
        })?;
        info!(
            "event=auth_call module=auth status=ok endpoint={} duration_ms={}",
            endpoint,
            started_at.elapsed().as_millis()
        );

        let session = Session::new(account.local_id, account.email);
        self.sessions.publish(Some(session.clone()));
        Ok(session)
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Session> {
        self.authenticate(SIGN_IN_ENDPOINT, email, password).await
    }

    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Session> {
        self.authenticate(SIGN_UP_ENDPOINT, email, password).await
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.sessions.publish(None);
        info!("event=sign_out module=auth status=ok");
        Ok(())
    }

    fn subscribe_sessions(&self) -> SessionSubscription {
        self.sessions.subscribe()
    }
}

fn log_failure(endpoint: &str, started_at: Instant, err: AuthError) -> AuthError {
    error!(
        "event=auth_call module=auth status=error endpoint={} duration_ms={} error={}",
        endpoint,
        started_at.elapsed().as_millis(),
        err
    );
    err
}

/// Maps the provider's error code (e.g. `WEAK_PASSWORD : detail`) to `AuthError`.
fn classify_error(status: u16, body: &str) -> AuthError {
    let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) else {
        return AuthError::Provider {
            status,
            code: body.chars().take(120).collect(),
        };
    };

    let message = envelope.error.message;
    let (code, detail) = match message.split_once(" : ") {
        Some((code, detail)) => (code.trim(), detail.trim()),
        None => (message.trim(), ""),
    };

    match code {
        "EMAIL_EXISTS" => AuthError::EmailExists,
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            AuthError::InvalidCredentials
        }
        "INVALID_EMAIL" => AuthError::InvalidEmail,
        "WEAK_PASSWORD" => AuthError::WeakPassword(detail.to_string()),
        "USER_DISABLED" => AuthError::UserDisabled,
        "TOO_MANY_ATTEMPTS_TRY_LATER" => AuthError::TooManyAttempts,
        other => AuthError::Provider {
            status,
            code: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{classify_error, FirebaseIdentityProvider};
    use crate::auth::{AuthError, IdentityProvider};
    use crate::config::IdentityConfig;

    #[test]
    fn provider_codes_map_to_typed_errors() {
        let body = r#"{"error":{"code":400,"message":"EMAIL_EXISTS"}}"#;
        assert_eq!(classify_error(400, body), AuthError::EmailExists);

        let body = r#"{"error":{"code":400,"message":"WEAK_PASSWORD : Password should be at least 6 characters"}}"#;
        assert_eq!(
            classify_error(400, body),
            AuthError::WeakPassword("Password should be at least 6 characters".to_string())
        );

        let body = r#"{"error":{"code":400,"message":"INVALID_LOGIN_CREDENTIALS"}}"#;
        assert_eq!(classify_error(400, body), AuthError::InvalidCredentials);
    }

    #[test]
    fn unreadable_error_body_is_kept_as_provider_error() {
        let err = classify_error(503, "upstream down");
        assert_eq!(
            err,
            AuthError::Provider {
                status: 503,
                code: "upstream down".to_string()
            }
        );
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let provider = FirebaseIdentityProvider::new(&IdentityConfig::default());
        let err = provider.sign_in("a@b.c", "secret").await.unwrap_err();
        assert_eq!(err, AuthError::MissingApiKey);
    }

    #[tokio::test]
    async fn unreachable_provider_is_a_network_error() {
        let provider = FirebaseIdentityProvider::new(&IdentityConfig {
            api_key: "test-key".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
        });
        let mut sessions = provider.subscribe_sessions();
        sessions.next().await;

        let err = provider.sign_in("a@b.c", "secret").await.unwrap_err();
        assert!(matches!(err, AuthError::Network(_)));
        assert!(sessions.try_next().is_none());
    }

    #[tokio::test]
    async fn sign_out_publishes_signed_out_state() {
        let provider = FirebaseIdentityProvider::new(&IdentityConfig::default());
        let mut sessions = provider.subscribe_sessions();
        assert_eq!(sessions.next().await, Some(None));

        provider.sign_out().await.unwrap();
        assert_eq!(sessions.next().await, Some(None));
    }
}
