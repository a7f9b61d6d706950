// Integration tests for the refresh coordinator: fan-out/fan-in
// deduplication and the unified terminate-session behavior
use invigil::host::routes;
use invigil::session::{RefreshCoordinator, RefreshError, TokenStore};
use invigil::storage::{keys, MemoryStore, StateStore};
use invigil::testing::constants;
use invigil::testing::mock::{MockAuthBackend, RecordingNavigator};
use std::sync::Arc;

struct Rig {
    coordinator: Arc<RefreshCoordinator>,
    backend: Arc<MockAuthBackend>,
    navigator: Arc<RecordingNavigator>,
    tokens: Arc<TokenStore>,
    storage: Arc<MemoryStore>,
}

fn rig(backend: MockAuthBackend, seed_tokens: bool) -> Rig {
    let storage = Arc::new(MemoryStore::new());
    if seed_tokens {
        storage.set(keys::ACCESS_TOKEN, constants::TEST_ACCESS_TOKEN);
        storage.set(keys::REFRESH_TOKEN, constants::TEST_REFRESH_TOKEN);
    }
    let tokens = Arc::new(TokenStore::new(Arc::clone(&storage) as _));
    let backend = Arc::new(backend);
    let navigator = Arc::new(RecordingNavigator::new());
    let coordinator = Arc::new(RefreshCoordinator::new(
        Arc::clone(&tokens),
        Arc::clone(&backend) as _,
        Arc::clone(&navigator) as _,
    ));
    Rig {
        coordinator,
        backend,
        navigator,
        tokens,
        storage,
    }
}

#[tokio::test]
async fn five_concurrent_refreshes_issue_one_network_call() {
    let rig = rig(MockAuthBackend::new(), true);

    let tasks: Vec<_> = (0..5)
        .map(|_| {
            let coordinator = Arc::clone(&rig.coordinator);
            tokio::spawn(async move { coordinator.refresh().await })
        })
        .collect();

    for task in tasks {
        let token = task.await.unwrap().expect("every caller gets the token");
        assert_eq!(token, "fresh-access");
    }

    assert_eq!(rig.backend.refresh_calls(), 1);
    assert_eq!(rig.tokens.access_token().as_deref(), Some("fresh-access"));
    assert_eq!(rig.navigator.redirect_count(), 0);
}

#[tokio::test]
async fn five_concurrent_refreshes_against_failing_backend() {
    let rig = rig(MockAuthBackend::failing(), true);

    let tasks: Vec<_> = (0..5)
        .map(|_| {
            let coordinator = Arc::clone(&rig.coordinator);
            tokio::spawn(async move { coordinator.refresh().await })
        })
        .collect();

    // One network attempt; every caller observes the same termination
    for task in tasks {
        let outcome = task.await.unwrap();
        assert!(matches!(outcome, Err(RefreshError::Rejected(_))));
    }

    assert_eq!(rig.backend.refresh_calls(), 1);
    assert!(!rig.tokens.is_authenticated());
    assert!(rig.tokens.refresh_token().is_none());
    assert_eq!(
        rig.navigator.last_redirect(),
        Some(routes::login_expired())
    );
    assert_eq!(rig.navigator.redirect_count(), 1);
}

#[tokio::test]
async fn missing_refresh_token_terminates_without_network() {
    let rig = rig(MockAuthBackend::new(), false);

    let outcome = rig.coordinator.refresh().await;
    assert!(matches!(outcome, Err(RefreshError::MissingRefreshToken)));
    assert_eq!(rig.backend.refresh_calls(), 0);
    assert_eq!(
        rig.navigator.last_redirect(),
        Some(routes::login_expired())
    );
}

#[tokio::test]
async fn rotated_refresh_token_is_persisted() {
    let rig = rig(MockAuthBackend::new(), true);
    rig.backend.set_rotated_refresh(Some("rotated-refresh"));

    rig.coordinator.refresh().await.unwrap();

    assert_eq!(
        rig.storage.get(keys::REFRESH_TOKEN).as_deref(),
        Some("rotated-refresh")
    );
}

#[tokio::test]
async fn sequential_triggers_each_refresh_again() {
    let rig = rig(MockAuthBackend::new(), true);

    rig.coordinator.refresh().await.unwrap();
    rig.coordinator.refresh().await.unwrap();

    // Deduplication applies to concurrent callers only; separate
    // triggers each get their own exchange
    assert_eq!(rig.backend.refresh_calls(), 2);
}
