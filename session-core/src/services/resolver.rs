//! Profile resolution engine.
//!
//! Resolves a user id to a best-effort profile: each backend attempt races
//! a fixed timeout, transient failures retry on a linear backoff schedule,
//! and exhausted retries degrade to the cached profile or a least-privilege
//! default. Only a policy denial or a missing row propagates upward, as
//! those are the two outcomes that must end the session.

use crate::config::SessionConfig;
use crate::error::{BackendError, HardFailure};
use crate::models::Profile;
use crate::services::{ProfileBackend, ProfileCache};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

/// Configuration for retry behavior.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Retries allowed after a failing attempt (not counting the attempt
    /// itself).
    pub max_retries: u32,
    /// Backoff step for network failures; attempt `n` waits `step * (n+1)`.
    pub network_backoff_step: Duration,
    /// Backoff step for timeouts and unclassified failures.
    pub failure_backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            network_backoff_step: Duration::from_millis(1000),
            failure_backoff_step: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    /// Create a retry policy with the specified max retries.
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Backoff before the retry that follows failing attempt `attempt`
    /// (0-indexed). Linear: the wait grows by one step per attempt.
    pub fn backoff_duration(&self, attempt: u32, kind: TransientKind) -> Duration {
        let step = match kind {
            TransientKind::Network => self.network_backoff_step,
            TransientKind::Timeout | TransientKind::Unknown => self.failure_backoff_step,
        };
        step * (attempt + 1)
    }
}

/// Retryable failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    Network,
    Timeout,
    Unknown,
}

/// Where a resolved profile came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// Fresh backend data, written through to the cache.
    Fresh,
    /// Last-known-good cache entry served after the backend gave up.
    Cached,
    /// Least-privilege default; no backend data, no cache entry.
    Fallback,
}

/// A successful resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub profile: Profile,
    pub source: ResolutionSource,
}

enum AttemptOutcome {
    Profile(Profile),
    Empty,
    Hard(HardFailure),
    Transient(TransientKind, String),
}

#[derive(Clone)]
pub struct ProfileResolver {
    backend: Arc<dyn ProfileBackend>,
    cache: ProfileCache,
    fetch_timeout: Duration,
    retry: RetryPolicy,
}

impl ProfileResolver {
    pub fn new(
        backend: Arc<dyn ProfileBackend>,
        cache: ProfileCache,
        config: &SessionConfig,
    ) -> Self {
        Self {
            backend,
            cache,
            fetch_timeout: config.profile_fetch_timeout,
            retry: RetryPolicy::with_max_retries(config.max_retries),
        }
    }

    pub fn cache(&self) -> &ProfileCache {
        &self.cache
    }

    /// Resolve a user id to a profile. Returns `Err` only for the two
    /// session-ending failures; every other outcome degrades to a usable
    /// profile.
    pub async fn resolve(&self, user_id: &str) -> Result<Resolution, HardFailure> {
        let mut attempt: u32 = 0;

        loop {
            debug!(user_id = %user_id, attempt = attempt + 1, "Fetching profile");

            let kind = match self.attempt_fetch(user_id).await {
                AttemptOutcome::Profile(profile) => {
                    if attempt > 0 {
                        info!(
                            user_id = %user_id,
                            attempt = attempt + 1,
                            "Profile fetch succeeded after retry"
                        );
                    }
                    self.cache.put(&profile).await;
                    return Ok(Resolution {
                        profile,
                        source: ResolutionSource::Fresh,
                    });
                }
                AttemptOutcome::Empty => {
                    warn!(user_id = %user_id, "Profile query returned no record and no error");
                    break;
                }
                AttemptOutcome::Hard(failure) => {
                    error!(
                        user_id = %user_id,
                        failure = %failure,
                        "Profile fetch failed permanently, not retrying"
                    );
                    return Err(failure);
                }
                AttemptOutcome::Transient(kind, message) => {
                    warn!(
                        user_id = %user_id,
                        attempt = attempt + 1,
                        kind = ?kind,
                        message = %message,
                        "Profile fetch failed"
                    );
                    kind
                }
            };

            if attempt >= self.retry.max_retries {
                warn!(
                    user_id = %user_id,
                    attempt = attempt + 1,
                    "Profile fetch failed after max retries"
                );
                break;
            }

            let backoff = self.retry.backoff_duration(attempt, kind);
            info!(
                user_id = %user_id,
                attempt = attempt + 1,
                backoff_ms = backoff.as_millis() as u64,
                "Retrying profile fetch after backoff"
            );
            sleep(backoff).await;
            attempt += 1;
        }

        if let Some(profile) = self.cache.get(user_id).await {
            warn!(user_id = %user_id, "Serving cached profile after failed resolution");
            return Ok(Resolution {
                profile,
                source: ResolutionSource::Cached,
            });
        }

        warn!(user_id = %user_id, "No cached profile available, serving least-privilege default");
        Ok(Resolution {
            profile: Profile::fallback(user_id),
            source: ResolutionSource::Fallback,
        })
    }

    async fn attempt_fetch(&self, user_id: &str) -> AttemptOutcome {
        let backend = Arc::clone(&self.backend);
        let uid = user_id.to_string();

        // The query runs as its own task: on timeout the race discards the
        // result, it does not stop the underlying call.
        let in_flight = tokio::spawn(async move { backend.fetch_profile(&uid).await });

        match timeout(self.fetch_timeout, in_flight).await {
            Ok(Ok(Ok(Some(profile)))) => AttemptOutcome::Profile(profile),
            Ok(Ok(Ok(None))) => AttemptOutcome::Empty,
            Ok(Ok(Err(BackendError::PolicyDenied))) => {
                AttemptOutcome::Hard(HardFailure::PolicyDenied)
            }
            Ok(Ok(Err(BackendError::NotFound))) => AttemptOutcome::Hard(HardFailure::NotFound),
            Ok(Ok(Err(BackendError::Network(message)))) => {
                AttemptOutcome::Transient(TransientKind::Network, message)
            }
            Ok(Ok(Err(BackendError::Other(message)))) => {
                AttemptOutcome::Transient(TransientKind::Unknown, message)
            }
            Ok(Err(join_error)) => {
                AttemptOutcome::Transient(TransientKind::Unknown, join_error.to_string())
            }
            Err(_) => AttemptOutcome::Transient(
                TransientKind::Timeout,
                format!("no response within {:?}", self.fetch_timeout),
            ),
        }
    }
}
