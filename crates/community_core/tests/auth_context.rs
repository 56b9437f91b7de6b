mod common;

use common::ManualIdentity;
use community_core::route::settle;
use community_core::{AuthContext, GuardState, IdentityProvider, Route, RouteDecision, Session};
use std::sync::atomic::Ordering;

#[tokio::test]
async fn context_is_loading_until_first_event() {
    let provider = ManualIdentity::default();
    let mut auth = AuthContext::init(&provider);

    assert!(auth.is_loading());
    assert_eq!(auth.current_session(), None);

    provider.emit(None);
    auth.changed().await;

    let state = auth.mark_seen();
    assert!(!state.loading);
    assert_eq!(state.current_session, None);
}

#[tokio::test]
async fn loading_never_returns_after_first_event() {
    let provider = ManualIdentity::default();
    let mut auth = AuthContext::init(&provider);

    provider.emit(None);
    auth.changed().await;
    auth.mark_seen();

    provider.sign_in("kim@example.com", "secret1").await.unwrap();
    auth.changed().await;
    let signed_in = auth.mark_seen();
    assert!(!signed_in.loading);
    assert_eq!(
        signed_in
            .current_session
            .as_ref()
            .and_then(|session| session.email.as_deref()),
        Some("kim@example.com")
    );

    provider.sign_out().await.unwrap();
    auth.changed().await;
    let signed_out = auth.mark_seen();
    assert!(!signed_out.loading);
    assert!(signed_out.current_session.is_none());
}

#[tokio::test]
async fn clones_share_one_provider_listener() {
    let provider = ManualIdentity::default();
    let auth = AuthContext::init(&provider);
    let mut reader = auth.clone();

    assert_eq!(provider.subscriptions.load(Ordering::SeqCst), 1);

    provider.emit(Some(Session::new("uid-9", None)));
    reader.changed().await;
    assert_eq!(auth.current_session().map(|session| session.id), Some("uid-9".to_string()));
}

#[tokio::test]
async fn login_then_logout_moves_between_routes() {
    let provider = ManualIdentity::default();
    let mut auth = AuthContext::init(&provider);

    assert_eq!(
        settle(GuardState::from(&auth.state()), "/login"),
        RouteDecision::Placeholder
    );

    provider.emit(None);
    auth.changed().await;
    assert_eq!(
        settle(GuardState::from(&auth.mark_seen()), "/"),
        RouteDecision::Render(Route::Login)
    );

    provider.sign_in("kim@example.com", "secret1").await.unwrap();
    auth.changed().await;
    assert_eq!(
        settle(GuardState::from(&auth.mark_seen()), "/login"),
        RouteDecision::Render(Route::Feed)
    );

    provider.sign_out().await.unwrap();
    auth.changed().await;
    assert_eq!(
        settle(GuardState::from(&auth.mark_seen()), "/"),
        RouteDecision::Render(Route::Login)
    );
    assert_eq!(provider.sign_out_calls.load(Ordering::SeqCst), 1);
}
