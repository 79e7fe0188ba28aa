use super::transport::DeviceAuthTransport;
use crate::api::{ApiError, DeviceAuthPoll};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) type Outcome = Result<DeviceAuthPoll, ApiError>;

/// In-memory transport that replays a fixed list of outcomes.
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Outcome>>,
    fallback: Outcome,
    latency: Duration,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn always(outcome: Outcome) -> Self {
        Self::script(Vec::new(), outcome)
    }

    /// Replay `outcomes` in order, then answer `then` forever.
    pub fn script(outcomes: Vec<Outcome>, then: Outcome) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            fallback: then,
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DeviceAuthTransport for ScriptedTransport {
    async fn poll_device_auth(&self, _code: &str) -> Result<DeviceAuthPoll, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        outcome
    }
}

/// Connector handing every session the same shared transport.
pub(crate) fn connector_for(
    transport: Arc<ScriptedTransport>,
) -> impl Fn(&str) -> Result<Arc<ScriptedTransport>, ApiError> + Send + Sync + 'static {
    move |_hostname: &str| Ok(Arc::clone(&transport))
}

pub(crate) fn not_found() -> ApiError {
    ApiError::Http {
        status: 404,
        message: None,
    }
}
