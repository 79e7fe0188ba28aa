//! Owns at most one polling run and publishes its outcome.
//!
//! The latest [`PollResult`] lives in a `watch` channel: subscribers see the
//! current value immediately and are woken only for newer ones. `None` means
//! no run has finished since the slot was last cleared.
//!
//! The active run handle and the result slot share one mutex. Whoever holds
//! the current run id is the only one allowed to publish a terminal result,
//! which is what keeps a superseded or stopped task from writing over a newer
//! session's state.

use super::device_flow::{poll_until_complete, redact, Cancelled, DeviceAuthSession};
use super::result::PollResult;
use super::transport::{DeviceAuthTransport, TransportConnector};
use crate::api::config::DEFAULT_POLL_INTERVAL;
use crate::api::ApiError;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Why a run could not be started. Never published as a [`PollResult`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("device code is empty")]
    MissingCode,
    #[error("hostname is empty")]
    MissingHostname,
    #[error("failed to create transport: {0}")]
    Transport(#[from] ApiError),
}

struct ActiveRun {
    id: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct RunState {
    active: Option<ActiveRun>,
    next_id: u64,
}

struct Shared {
    state: Mutex<RunState>,
    results: watch::Sender<Option<PollResult>>,
    /// Every value written to the slot, in order. The watch channel conflates.
    #[cfg(test)]
    published: Mutex<Vec<Option<PollResult>>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, value: Option<PollResult>) {
        #[cfg(test)]
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(value.clone());
        self.results.send_replace(value);
    }

    /// Publish `result` if `run_id` is still the active run. Returns whether it was.
    fn finish(&self, run_id: u64, result: PollResult) -> bool {
        let mut state = self.lock();
        if state.active.as_ref().map(|run| run.id) != Some(run_id) {
            return false;
        }
        state.active = None;
        self.publish(Some(result));
        true
    }
}

/// Device authorization polling engine.
///
/// Must be used from within a tokio runtime: `start` spawns the polling task.
pub struct DeviceAuthEngine<C: TransportConnector> {
    connector: C,
    poll_interval: Duration,
    shared: Arc<Shared>,
}

impl<C: TransportConnector> DeviceAuthEngine<C> {
    pub fn new(connector: C) -> Self {
        let (results, _) = watch::channel(None);
        Self {
            connector,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shared: Arc::new(Shared {
                state: Mutex::new(RunState::default()),
                results,
                #[cfg(test)]
                published: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Start polling `code` on `hostname`, superseding any running session.
    ///
    /// The previous run is cancelled and gets its `Cancelled` result, then the
    /// result slot is cleared before the new task is spawned. Malformed input
    /// is refused without touching the running session.
    pub fn start(&self, code: &str, hostname: &str, expires_in_secs: u64) -> Result<(), EngineError> {
        if code.trim().is_empty() {
            return Err(EngineError::MissingCode);
        }
        if hostname.trim().is_empty() {
            return Err(EngineError::MissingHostname);
        }

        let transport = self.connector.connect(hostname)?;
        let session = DeviceAuthSession::new(code, hostname, expires_in_secs);

        let mut state = self.shared.lock();
        if let Some(previous) = state.active.take() {
            tracing::info!("Superseding device auth run {}", previous.id);
            previous.cancel.cancel();
            self.shared.publish(Some(PollResult::Cancelled));
        }
        self.shared.publish(None);

        state.next_id += 1;
        let id = state.next_id;
        let cancel = CancellationToken::new();

        tracing::info!(
            "Starting device auth run {} for code {} on {} (expires at {})",
            id,
            redact(session.code()),
            session.hostname(),
            session.expires_at()
        );

        let handle = tokio::spawn(drive(
            Arc::clone(&self.shared),
            id,
            session,
            transport,
            self.poll_interval,
            cancel.clone(),
        ));

        state.active = Some(ActiveRun { id, cancel, handle });
        Ok(())
    }

    /// Cancel the running session, if any, and publish `Cancelled`.
    ///
    /// `Cancelled` is published even when nothing was running.
    pub fn stop(&self) {
        let mut state = self.shared.lock();
        match state.active.take() {
            Some(run) => {
                tracing::info!("Stopping device auth run {}", run.id);
                run.cancel.cancel();
            }
            None => tracing::debug!("Stop requested with no active device auth run"),
        }
        self.shared.publish(Some(PollResult::Cancelled));
    }

    /// Clear the published result without affecting a running session.
    pub fn reset_result(&self) {
        let _state = self.shared.lock();
        self.shared.publish(None);
    }

    /// Tear the engine down. Subscribers see the channel close once the
    /// cancelled task has unwound.
    pub fn shutdown(self) {
        tracing::debug!("Shutting down device auth engine");
        // Drop does the work.
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<PollResult>> {
        self.shared.results.subscribe()
    }

    pub fn current_result(&self) -> Option<PollResult> {
        self.shared.results.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().active.is_some()
    }

    fn teardown(&self) {
        if let Some(run) = self.shared.lock().active.take() {
            tracing::debug!("Aborting device auth run {}", run.id);
            run.cancel.cancel();
            run.handle.abort();
        }
    }
}

impl<C: TransportConnector> Drop for DeviceAuthEngine<C> {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn drive<T: DeviceAuthTransport>(
    shared: Arc<Shared>,
    run_id: u64,
    session: DeviceAuthSession,
    transport: T,
    interval: Duration,
    cancel: CancellationToken,
) {
    let result = match poll_until_complete(&transport, &session, interval, &cancel).await {
        Ok(result) => result,
        Err(Cancelled) => {
            tracing::debug!("Device auth run {} observed cancellation", run_id);
            PollResult::Cancelled
        }
    };

    if shared.finish(run_id, result) {
        tracing::info!("Device auth run {} finished", run_id);
    }
}
