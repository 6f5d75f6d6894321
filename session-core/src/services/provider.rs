use crate::models::{AuthEvent, AuthEventKind, Session};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// The identity provider the controller consumes. Constructed and injected
/// by the application so tests can substitute a double; the controller
/// never reaches for a global client.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The session the provider currently holds, if any.
    async fn current_session(&self) -> Result<Option<Session>, anyhow::Error>;

    /// Subscribe to provider events. The receiver is consumed by the
    /// lifecycle controller for its whole life; events must be delivered in
    /// order.
    async fn subscribe(&self) -> mpsc::Receiver<AuthEvent>;

    /// Ask the provider to terminate the session. Best-effort: local state
    /// is cleared whether or not this succeeds.
    async fn sign_out(&self) -> Result<(), anyhow::Error>;
}

/// Scriptable provider double. Tests seed the initial session, push events
/// through [`MockIdentityProvider::emit`], and can make `sign_out` fail or
/// echo a `SignedOut` event the way hosted providers do.
pub struct MockIdentityProvider {
    initial_session: Mutex<Option<Session>>,
    initial_error: Mutex<Option<String>>,
    fail_sign_out: AtomicBool,
    echo_sign_out: AtomicBool,
    sign_out_calls: AtomicUsize,
    events_tx: mpsc::Sender<AuthEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<AuthEvent>>>,
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::channel(32);
        Self {
            initial_session: Mutex::new(None),
            initial_error: Mutex::new(None),
            fail_sign_out: AtomicBool::new(false),
            echo_sign_out: AtomicBool::new(false),
            sign_out_calls: AtomicUsize::new(0),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    pub fn with_session(session: Session) -> Self {
        let provider = Self::new();
        *lock(&provider.initial_session) = Some(session);
        provider
    }

    pub fn set_initial_error(&self, message: &str) {
        *lock(&self.initial_error) = Some(message.to_string());
    }

    pub fn set_fail_sign_out(&self, fail: bool) {
        self.fail_sign_out.store(fail, Ordering::SeqCst);
    }

    /// Emit a `SignedOut` event whenever `sign_out` is called, like hosted
    /// providers that notify their own subscription.
    pub fn set_echo_sign_out(&self, echo: bool) {
        self.echo_sign_out.store(echo, Ordering::SeqCst);
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    /// Push one event to the subscriber.
    pub async fn emit(&self, kind: AuthEventKind, session: Option<Session>) {
        if self.events_tx.send(AuthEvent::new(kind, session)).await.is_err() {
            tracing::warn!("No subscriber for emitted auth event");
        }
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn current_session(&self) -> Result<Option<Session>, anyhow::Error> {
        if let Some(message) = lock(&self.initial_error).clone() {
            return Err(anyhow::anyhow!(message));
        }
        Ok(lock(&self.initial_session).clone())
    }

    async fn subscribe(&self) -> mpsc::Receiver<AuthEvent> {
        lock(&self.events_rx).take().unwrap_or_else(|| {
            // Second subscription gets a closed channel.
            let (_tx, rx) = mpsc::channel(1);
            rx
        })
    }

    async fn sign_out(&self) -> Result<(), anyhow::Error> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);

        if self.echo_sign_out.load(Ordering::SeqCst) {
            let _ = self
                .events_tx
                .send(AuthEvent::new(AuthEventKind::SignedOut, None))
                .await;
        }

        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("provider sign-out unavailable"));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
