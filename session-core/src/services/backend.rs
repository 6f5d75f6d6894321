use crate::error::BackendError;
use crate::models::Profile;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// The profile backend the resolution engine queries. Implementations map
/// their driver's failures onto [`BackendError`]; in particular, a "no row"
/// answer that is likely caused by an access policy must surface as
/// `PolicyDenied` rather than `NotFound`.
#[async_trait]
pub trait ProfileBackend: Send + Sync {
    /// Fetch the profile for a user. `Ok(None)` means the query succeeded
    /// but returned no record and no error.
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>, BackendError>;
}

/// One scripted backend answer.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Profile(Profile),
    Empty,
    PolicyDenied,
    NotFound,
    NetworkError(String),
    OtherError(String),
    /// Never settles. The caller's timeout wins the race; the call itself
    /// keeps hanging, like an abandoned in-flight query.
    Hang,
}

/// Scriptable backend double. `enqueue` answers are consumed in order;
/// once the queue is empty every further call gets the sticky
/// `respond_with` answer (`Empty` until set).
pub struct MockProfileBackend {
    script: Mutex<VecDeque<ScriptedResponse>>,
    sticky: Mutex<ScriptedResponse>,
    calls: AtomicU32,
}

impl Default for MockProfileBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProfileBackend {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            sticky: Mutex::new(ScriptedResponse::Empty),
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_profile(profile: Profile) -> Self {
        let backend = Self::new();
        backend.respond_with(ScriptedResponse::Profile(profile));
        backend
    }

    pub fn respond_with(&self, response: ScriptedResponse) {
        *lock(&self.sticky) = response;
    }

    pub fn enqueue(&self, response: ScriptedResponse) {
        lock(&self.script).push_back(response);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileBackend for MockProfileBackend {
    async fn fetch_profile(&self, _user_id: &str) -> Result<Option<Profile>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let response = lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| lock(&self.sticky).clone());

        match response {
            ScriptedResponse::Profile(profile) => Ok(Some(profile)),
            ScriptedResponse::Empty => Ok(None),
            ScriptedResponse::PolicyDenied => Err(BackendError::PolicyDenied),
            ScriptedResponse::NotFound => Err(BackendError::NotFound),
            ScriptedResponse::NetworkError(message) => Err(BackendError::Network(message)),
            ScriptedResponse::OtherError(message) => Err(BackendError::Other(message)),
            ScriptedResponse::Hang => std::future::pending().await,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
