//! Sign-out workflows: local logout must always succeed, the cache purge
//! must always run, and hard-failure messages must survive provider echoes.

use session_core::{
    AuthEventKind, HardFailure, KeyValueStore, MockIdentityProvider, MockProfileBackend, Role,
    ScriptedResponse,
};
use workflow_tests::{
    seed_cached_profile, test_profile, test_session, wait_ready, wait_until, Harness,
};

#[tokio::test(start_paused = true)]
async fn sign_out_clears_locally_even_when_the_provider_fails() {
    let provider = MockIdentityProvider::with_session(test_session("user-1"));
    let backend = MockProfileBackend::with_profile(test_profile("user-1", Role::Admin));
    let harness = Harness::spawn(provider, backend);
    let mut rx = harness.watch();
    wait_ready(&mut rx).await;
    assert_eq!(harness.cached_profile_keys(), vec!["profile:user-1"]);

    harness.provider.set_fail_sign_out(true);
    harness.manager.sign_out().await;

    let snapshot = wait_until(&mut rx, |s| !s.is_authenticated()).await;
    assert!(snapshot.profile.is_none());
    assert!(snapshot.auth_error.is_none());
    assert_eq!(harness.provider.sign_out_calls(), 1);
    assert!(harness.cached_profile_keys().is_empty());
}

#[tokio::test(start_paused = true)]
async fn sign_out_purges_every_cached_profile_and_nothing_else() {
    let provider = MockIdentityProvider::with_session(test_session("user-1"));
    let backend = MockProfileBackend::with_profile(test_profile("user-1", Role::Admin));
    let harness = Harness::spawn(provider, backend);
    let mut rx = harness.watch();
    wait_ready(&mut rx).await;

    // A second user's entry left over from an earlier login on this machine.
    seed_cached_profile(&harness, &test_profile("user-2", Role::Viewer))
        .await
        .unwrap();
    harness.store.set("theme:user-1", "dark").await.unwrap();

    harness.manager.sign_out().await;
    wait_until(&mut rx, |s| !s.is_authenticated()).await;

    assert!(harness.cached_profile_keys().is_empty());
    let entries = harness.store.entries.lock().unwrap();
    assert!(entries.contains_key("theme:user-1"));
}

#[tokio::test(start_paused = true)]
async fn forced_sign_out_keeps_its_message_despite_the_provider_echo() {
    let provider = MockIdentityProvider::with_session(test_session("user-1"));
    provider.set_echo_sign_out(true);
    let backend = MockProfileBackend::new();
    backend.respond_with(ScriptedResponse::NotFound);
    let harness = Harness::spawn(provider, backend);
    let mut rx = harness.watch();

    let snapshot = wait_ready(&mut rx).await;
    assert!(!snapshot.is_authenticated());
    assert_eq!(
        snapshot.auth_error.as_deref(),
        Some(HardFailure::NotFound.user_message())
    );

    // The provider's own SignedOut echo must not wipe the message.
    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    assert_eq!(
        harness.manager.snapshot().auth_error.as_deref(),
        Some(HardFailure::NotFound.user_message())
    );

    // The next successful sign-in clears it.
    harness
        .backend
        .respond_with(ScriptedResponse::Profile(test_profile(
            "user-1",
            Role::Admin,
        )));
    harness
        .provider
        .emit(AuthEventKind::SignedIn, Some(test_session("user-1")))
        .await;

    let snapshot = wait_until(&mut rx, |s| s.profile.is_some()).await;
    assert!(snapshot.auth_error.is_none());
    assert!(snapshot.is_admin());
}

#[tokio::test(start_paused = true)]
async fn user_sign_out_clears_a_retained_hard_failure_message() {
    let provider = MockIdentityProvider::with_session(test_session("user-1"));
    let backend = MockProfileBackend::new();
    backend.respond_with(ScriptedResponse::PolicyDenied);
    let harness = Harness::spawn(provider, backend);
    let mut rx = harness.watch();

    let snapshot = wait_ready(&mut rx).await;
    assert!(snapshot.auth_error.is_some());

    harness.manager.sign_out().await;
    let snapshot = wait_until(&mut rx, |s| s.auth_error.is_none()).await;
    assert!(!snapshot.is_authenticated());
}
