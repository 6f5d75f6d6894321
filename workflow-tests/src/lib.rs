//! Shared harness for session lifecycle workflow tests.
//!
//! Wires a [`SessionManager`] to in-process mock collaborators and provides
//! helpers for waiting on published snapshots under Tokio's paused clock.

use session_core::{
    KeyValueStore, MemoryStore, MockIdentityProvider, MockProfileBackend, Profile, Role, Session,
    SessionConfig, SessionManager, Snapshot,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Upper bound on how long a snapshot condition may take. Virtual time:
/// comfortably past the inactivity window plus a full retry ladder.
const WAIT_BUDGET: Duration = Duration::from_secs(3600);

pub struct Harness {
    pub manager: SessionManager,
    pub provider: Arc<MockIdentityProvider>,
    pub backend: Arc<MockProfileBackend>,
    pub store: Arc<MemoryStore>,
}

impl Harness {
    pub fn spawn(provider: MockIdentityProvider, backend: MockProfileBackend) -> Self {
        Self::spawn_with_config(provider, backend, SessionConfig::default())
    }

    pub fn spawn_with_config(
        provider: MockIdentityProvider,
        backend: MockProfileBackend,
        config: SessionConfig,
    ) -> Self {
        init_test_tracing();

        let provider = Arc::new(provider);
        let backend = Arc::new(backend);
        let store = Arc::new(MemoryStore::new());
        let manager =
            SessionManager::spawn(provider.clone(), backend.clone(), store.clone(), config);
        tracing::debug!("Workflow test harness started");

        Self {
            manager,
            provider,
            backend,
            store,
        }
    }

    /// Snapshot receiver positioned at the current state.
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.manager.subscribe()
    }

    /// Cache keys currently held by the store.
    pub fn cached_profile_keys(&self) -> Vec<String> {
        self.store
            .entries
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with("profile:"))
            .cloned()
            .collect()
    }
}

/// Wait until the published snapshot satisfies `predicate`, returning the
/// matching snapshot. Panics if the budget elapses first.
pub async fn wait_until<F>(rx: &mut watch::Receiver<Snapshot>, predicate: F) -> Snapshot
where
    F: Fn(&Snapshot) -> bool,
{
    tokio::time::timeout(WAIT_BUDGET, async {
        loop {
            if predicate(&rx.borrow()) {
                return rx.borrow().clone();
            }
            rx.changed().await.expect("snapshot channel closed");
        }
    })
    .await
    .expect("timed out waiting for snapshot condition")
}

/// Wait until the startup protocol has finished.
pub async fn wait_ready(rx: &mut watch::Receiver<Snapshot>) -> Snapshot {
    wait_until(rx, |s| !s.loading).await
}

/// Seed a cache entry the way a previous login would have left it.
pub async fn seed_cached_profile(harness: &Harness, profile: &Profile) -> anyhow::Result<()> {
    let encoded = serde_json::to_string(profile)?;
    harness
        .store
        .set(&format!("profile:{}", profile.user_id), &encoded)
        .await
}

pub fn test_session(user_id: &str) -> Session {
    Session::new(user_id, uuid::Uuid::new_v4().to_string())
}

pub fn test_profile(user_id: &str, role: Role) -> Profile {
    Profile::new(user_id, "Test User", role)
}

pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
