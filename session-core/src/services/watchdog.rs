//! Inactivity watchdog.
//!
//! Owns the single scheduled sign-out deadline. Armed by the controller
//! while a session is present, fed coalesced activity ticks from any
//! upstream source, and disarmed whenever the session goes away; a deadline
//! never survives a session boundary.

use crate::services::controller::Command;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub(crate) enum WatchdogCommand {
    Arm,
    Disarm,
}

/// Controller-side handle. Arm/disarm are fire-and-forget; a full control
/// channel only means an equivalent command is already queued.
#[derive(Clone)]
pub(crate) struct WatchdogHandle {
    control_tx: mpsc::Sender<WatchdogCommand>,
}

impl WatchdogHandle {
    pub(crate) fn arm(&self) {
        if self.control_tx.try_send(WatchdogCommand::Arm).is_err() {
            warn!("Watchdog control channel full, dropping arm request");
        }
    }

    pub(crate) fn disarm(&self) {
        if self.control_tx.try_send(WatchdogCommand::Disarm).is_err() {
            warn!("Watchdog control channel full, dropping disarm request");
        }
    }
}

pub(crate) struct InactivityWatchdog {
    timeout: Duration,
    coalesce_window: Duration,
    control_rx: mpsc::Receiver<WatchdogCommand>,
    activity_rx: mpsc::Receiver<()>,
    sign_out_tx: mpsc::Sender<Command>,
    shutdown: CancellationToken,
}

impl InactivityWatchdog {
    pub(crate) fn new(
        timeout: Duration,
        coalesce_window: Duration,
        activity_rx: mpsc::Receiver<()>,
        sign_out_tx: mpsc::Sender<Command>,
        shutdown: CancellationToken,
    ) -> (Self, WatchdogHandle) {
        let (control_tx, control_rx) = mpsc::channel(16);
        let watchdog = Self {
            timeout,
            coalesce_window,
            control_rx,
            activity_rx,
            sign_out_tx,
            shutdown,
        };
        (watchdog, WatchdogHandle { control_tx })
    }

    pub(crate) async fn run(mut self) {
        let mut deadline: Option<Instant> = None;
        let mut last_reset: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!("Watchdog shutting down");
                    break;
                }
                cmd = self.control_rx.recv() => {
                    match cmd {
                        Some(WatchdogCommand::Arm) => {
                            let now = Instant::now();
                            deadline = Some(now + self.timeout);
                            last_reset = Some(now);
                            debug!(timeout_secs = self.timeout.as_secs(), "Watchdog armed");
                        }
                        Some(WatchdogCommand::Disarm) => {
                            deadline = None;
                            last_reset = None;
                            debug!("Watchdog disarmed");
                        }
                        None => break,
                    }
                }
                tick = self.activity_rx.recv() => {
                    match tick {
                        Some(()) => {
                            if deadline.is_some() {
                                let now = Instant::now();
                                if should_reset(last_reset, now, self.coalesce_window) {
                                    deadline = Some(now + self.timeout);
                                    last_reset = Some(now);
                                }
                            }
                        }
                        None => break,
                    }
                }
                _ = wait_for(deadline) => {
                    deadline = None;
                    last_reset = None;
                    warn!("Inactivity timeout elapsed, requesting sign-out");
                    if self.sign_out_tx.send(Command::SignOut).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Whether an activity signal at `now` performs a reset. At most one reset
/// per coalescing window, regardless of how many raw signals arrive.
fn should_reset(last_reset: Option<Instant>, now: Instant, window: Duration) -> bool {
    match last_reset {
        None => true,
        Some(previous) => now.duration_since(previous) >= window,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_should_reset_coalesces_within_window() {
        let window = Duration::from_secs(1);
        let start = Instant::now();

        assert!(should_reset(None, start, window));
        assert!(!should_reset(
            Some(start),
            start + Duration::from_millis(400),
            window
        ));
        assert!(should_reset(Some(start), start + window, window));
        assert!(should_reset(
            Some(start),
            start + Duration::from_secs(5),
            window
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_requests_sign_out_exactly_once() {
        let (_activity_tx, activity_rx) = mpsc::channel(16);
        let (sign_out_tx, mut sign_out_rx) = mpsc::channel(4);
        let shutdown = CancellationToken::new();
        let (watchdog, handle) = InactivityWatchdog::new(
            Duration::from_secs(60),
            Duration::from_secs(1),
            activity_rx,
            sign_out_tx,
            shutdown.clone(),
        );
        let task = tokio::spawn(watchdog.run());

        handle.arm();
        let command = sign_out_rx.recv().await;
        assert!(matches!(command, Some(Command::SignOut)));

        // Deadline fired once and was dropped; nothing further arrives.
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(sign_out_rx.try_recv().is_err());

        shutdown.cancel();
        let _ = task.await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_postpones_deadline() {
        let (activity_tx, activity_rx) = mpsc::channel(16);
        let (sign_out_tx, mut sign_out_rx) = mpsc::channel(4);
        let shutdown = CancellationToken::new();
        let (watchdog, handle) = InactivityWatchdog::new(
            Duration::from_secs(60),
            Duration::from_secs(1),
            activity_rx,
            sign_out_tx,
            shutdown.clone(),
        );
        let task = tokio::spawn(watchdog.run());

        handle.arm();
        tokio::task::yield_now().await;

        // Activity at t+40s pushes the deadline to t+100s.
        tokio::time::sleep(Duration::from_secs(40)).await;
        activity_tx.send(()).await.unwrap();
        tokio::task::yield_now().await;

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(sign_out_rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(matches!(sign_out_rx.try_recv(), Ok(Command::SignOut)));

        shutdown.cancel();
        let _ = task.await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_drops_pending_deadline() {
        let (_activity_tx, activity_rx) = mpsc::channel(16);
        let (sign_out_tx, mut sign_out_rx) = mpsc::channel(4);
        let shutdown = CancellationToken::new();
        let (watchdog, handle) = InactivityWatchdog::new(
            Duration::from_secs(60),
            Duration::from_secs(1),
            activity_rx,
            sign_out_tx,
            shutdown.clone(),
        );
        let task = tokio::spawn(watchdog.run());

        handle.arm();
        tokio::task::yield_now().await;
        handle.disarm();
        tokio::task::yield_now().await;

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(sign_out_rx.try_recv().is_err());

        shutdown.cancel();
        let _ = task.await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_while_disarmed_does_not_schedule() {
        let (activity_tx, activity_rx) = mpsc::channel(16);
        let (sign_out_tx, mut sign_out_rx) = mpsc::channel(4);
        let shutdown = CancellationToken::new();
        let (watchdog, _handle) = InactivityWatchdog::new(
            Duration::from_secs(60),
            Duration::from_secs(1),
            activity_rx,
            sign_out_tx,
            shutdown.clone(),
        );
        let task = tokio::spawn(watchdog.run());

        activity_tx.send(()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(sign_out_rx.try_recv().is_err());

        shutdown.cancel();
        let _ = task.await;
    }
}
