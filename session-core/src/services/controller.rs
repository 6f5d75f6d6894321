//! Session lifecycle controller.
//!
//! The authoritative state machine: consumes identity-provider events in
//! delivery order, drives profile resolution, and publishes the current
//! `(session, profile, loading, auth_error)` snapshot over a watch channel.
//! All state mutation happens on the controller task; resolutions run as
//! spawned tasks whose results re-enter the loop stamped with the epoch
//! current at launch, so a result from a superseded state can never land.

use crate::config::SessionConfig;
use crate::error::HardFailure;
use crate::models::{AuthEvent, AuthEventKind, Snapshot};
use crate::services::watchdog::{InactivityWatchdog, WatchdogHandle};
use crate::services::{
    IdentityProvider, KeyValueStore, ProfileBackend, ProfileCache, ProfileResolver, Resolution,
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Requests handled by the controller loop.
#[derive(Debug)]
pub(crate) enum Command {
    SignOut,
}

#[derive(Debug, Clone, Copy)]
enum ResolveTrigger {
    SignIn,
    UserUpdate,
}

struct ResolutionOutcome {
    epoch: u64,
    trigger: ResolveTrigger,
    user_id: String,
    result: Result<Resolution, HardFailure>,
}

/// Cloneable application-facing handle. Spawns the controller and watchdog
/// tasks; exposes the published snapshot, the sign-out operation, and the
/// activity input port.
#[derive(Clone)]
pub struct SessionManager {
    snapshot_rx: watch::Receiver<Snapshot>,
    commands_tx: mpsc::Sender<Command>,
    activity_tx: mpsc::Sender<()>,
    shutdown: CancellationToken,
}

impl SessionManager {
    pub fn spawn(
        provider: Arc<dyn IdentityProvider>,
        backend: Arc<dyn ProfileBackend>,
        store: Arc<dyn KeyValueStore>,
        config: SessionConfig,
    ) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::initial());
        let (commands_tx, commands_rx) = mpsc::channel(16);
        let (activity_tx, activity_rx) = mpsc::channel(64);
        let (outcomes_tx, outcomes_rx) = mpsc::channel(16);
        let shutdown = CancellationToken::new();

        let cache = ProfileCache::new(store);
        let resolver = ProfileResolver::new(backend, cache.clone(), &config);

        let (watchdog, watchdog_handle) = InactivityWatchdog::new(
            config.inactivity_timeout,
            config.activity_coalesce_window,
            activity_rx,
            commands_tx.clone(),
            shutdown.clone(),
        );
        tokio::spawn(watchdog.run());

        let controller = LifecycleController {
            provider,
            resolver,
            cache,
            watchdog: watchdog_handle,
            state: Snapshot::initial(),
            snapshot_tx,
            commands_rx,
            outcomes_tx,
            outcomes_rx,
            epoch: 0,
            sticky_error: false,
            shutdown: shutdown.clone(),
        };
        tokio::spawn(controller.run());

        Self {
            snapshot_rx,
            commands_tx,
            activity_tx,
            shutdown,
        }
    }

    /// Watch every published state change.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_rx.clone()
    }

    /// The most recently published state.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Request sign-out. Local state is always cleared, whatever the
    /// provider answers.
    pub async fn sign_out(&self) {
        if self.commands_tx.send(Command::SignOut).await.is_err() {
            warn!("Sign-out requested after controller shutdown");
        }
    }

    /// Push one user-activity tick. Ticks are coalesced downstream; a full
    /// channel only means fresher ticks are already queued, so drops are
    /// harmless.
    pub fn activity(&self) {
        let _ = self.activity_tx.try_send(());
    }

    /// Stop the controller and watchdog tasks. Does not sign the user out.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

struct LifecycleController {
    provider: Arc<dyn IdentityProvider>,
    resolver: ProfileResolver,
    cache: ProfileCache,
    watchdog: WatchdogHandle,
    state: Snapshot,
    snapshot_tx: watch::Sender<Snapshot>,
    commands_rx: mpsc::Receiver<Command>,
    outcomes_tx: mpsc::Sender<ResolutionOutcome>,
    outcomes_rx: mpsc::Receiver<ResolutionOutcome>,
    epoch: u64,
    sticky_error: bool,
    shutdown: CancellationToken,
}

impl LifecycleController {
    async fn run(mut self) {
        // Subscribe before the startup query so events arriving in between
        // buffer instead of getting lost.
        let mut events = self.provider.subscribe().await;
        self.initialize().await;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!("Lifecycle controller shutting down");
                    break;
                }
                event = events.recv() => {
                    match event {
                        Some(event) => self.handle_event(event).await,
                        None => {
                            debug!("Provider event stream closed, controller exiting");
                            break;
                        }
                    }
                }
                Some(command) = self.commands_rx.recv() => {
                    match command {
                        Command::SignOut => self.sign_out().await,
                    }
                }
                Some(outcome) = self.outcomes_rx.recv() => {
                    self.apply_resolution(outcome).await;
                }
            }
        }
    }

    async fn initialize(&mut self) {
        info!("Session lifecycle controller starting");

        match self.provider.current_session().await {
            Err(e) => {
                error!(error = %e, "Failed to read initial session from provider");
                self.state.auth_error = Some("Failed to initialize authentication".to_string());
                self.state.loading = false;
                self.publish();
            }
            Ok(None) => {
                debug!("No existing session at startup");
                self.state.loading = false;
                self.publish();
            }
            Ok(Some(session)) => {
                info!(user_id = %session.user_id, "Existing session found, resolving profile");
                let user_id = session.user_id.clone();
                self.state.session = Some(session);

                // Startup is the one place resolution blocks the loop; the
                // event subscription buffers behind it.
                match self.resolver.resolve(&user_id).await {
                    Ok(resolution) => {
                        self.state.profile = Some(resolution.profile);
                        self.state.auth_error = None;
                        self.sticky_error = false;
                        self.state.loading = false;
                        self.publish();
                        self.watchdog.arm();
                    }
                    Err(failure) => {
                        error!(
                            user_id = %user_id,
                            failure = %failure,
                            "Profile unavailable at startup, forcing sign-out"
                        );
                        self.force_sign_out(failure).await;
                    }
                }
            }
        }
    }

    async fn handle_event(&mut self, event: AuthEvent) {
        info!(kind = %event.kind, "Auth state change");

        match event.kind {
            AuthEventKind::SignedIn | AuthEventKind::TokenRefreshed => {
                self.epoch += 1;
                // Publish the new session immediately; the profile follows
                // once resolution lands.
                self.state.session = event.session.clone();
                self.publish();

                match event.session {
                    Some(session) => {
                        self.spawn_resolution(session.user_id, ResolveTrigger::SignIn)
                    }
                    None => warn!("Sign-in event carried no session"),
                }
            }
            AuthEventKind::SignedOut => {
                self.epoch += 1;
                self.watchdog.disarm();
                self.state.session = None;
                self.state.profile = None;
                if !self.sticky_error {
                    self.state.auth_error = None;
                }
                self.state.loading = false;
                self.publish();
            }
            AuthEventKind::UserUpdated => {
                let user_id = event
                    .session
                    .map(|s| s.user_id)
                    .or_else(|| self.state.user_id().map(str::to_string));

                match user_id {
                    Some(user_id) => {
                        self.epoch += 1;
                        self.spawn_resolution(user_id, ResolveTrigger::UserUpdate);
                    }
                    None => debug!("User update event with no current user"),
                }
            }
            AuthEventKind::Other(kind) => {
                debug!(kind = %kind, "Ignoring unhandled auth event");
            }
        }
    }

    fn spawn_resolution(&self, user_id: String, trigger: ResolveTrigger) {
        let resolver = self.resolver.clone();
        let outcomes_tx = self.outcomes_tx.clone();
        let epoch = self.epoch;

        tokio::spawn(async move {
            let result = resolver.resolve(&user_id).await;
            let _ = outcomes_tx
                .send(ResolutionOutcome {
                    epoch,
                    trigger,
                    user_id,
                    result,
                })
                .await;
        });
    }

    async fn apply_resolution(&mut self, outcome: ResolutionOutcome) {
        if outcome.epoch != self.epoch {
            debug!(
                user_id = %outcome.user_id,
                "Discarding resolution result from a superseded state"
            );
            return;
        }

        match (outcome.trigger, outcome.result) {
            (ResolveTrigger::SignIn, Ok(resolution)) => {
                self.state.profile = Some(resolution.profile);
                self.state.auth_error = None;
                self.sticky_error = false;
                self.state.loading = false;
                self.publish();
                self.watchdog.arm();
            }
            (ResolveTrigger::SignIn, Err(failure)) => {
                error!(
                    user_id = %outcome.user_id,
                    failure = %failure,
                    "Profile unavailable after sign-in, forcing sign-out"
                );
                self.force_sign_out(failure).await;
            }
            (ResolveTrigger::UserUpdate, Ok(resolution)) => {
                self.state.profile = Some(resolution.profile);
                self.publish();
            }
            (ResolveTrigger::UserUpdate, Err(failure)) => {
                // Stale-but-valid beats no data for an in-place refresh.
                warn!(
                    user_id = %outcome.user_id,
                    failure = %failure,
                    "Keeping previously published profile after failed refresh"
                );
            }
        }
    }

    /// Hard-failure exit: the provider session is terminated and the error
    /// stays published until the next successful sign-in. The message is
    /// marked sticky so the provider's own `SignedOut` echo cannot wipe it.
    async fn force_sign_out(&mut self, failure: HardFailure) {
        self.epoch += 1;
        self.watchdog.disarm();

        if let Err(e) = self.provider.sign_out().await {
            error!(error = %e, "Provider sign-out failed during forced sign-out");
        }

        self.state.session = None;
        self.state.profile = None;
        self.state.auth_error = Some(failure.user_message().to_string());
        self.sticky_error = true;
        self.state.loading = false;
        self.publish();
    }

    async fn sign_out(&mut self) {
        info!("Signing out");
        self.epoch += 1;

        // 1. Stop the inactivity deadline.
        self.watchdog.disarm();

        // 2. Best-effort provider sign-out.
        if let Err(e) = self.provider.sign_out().await {
            error!(error = %e, "Provider sign-out failed, clearing local session anyway");
        }

        // 3. Local logout always succeeds.
        self.state.session = None;
        self.state.profile = None;
        self.state.auth_error = None;
        self.sticky_error = false;
        self.state.loading = false;
        self.publish();

        self.cache.purge_all().await;
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.state.clone());
    }
}
