//! Host side of a sign-in run.
//!
//! Maps start/stop requests onto the polling engine and waits for the
//! result, turning Ctrl+C into a stop request.

use anyhow::{Context, Result};
use pangolin_core::api::{AuthConfig, HttpConnector};
use pangolin_core::auth::{DeviceAuthEngine, PollResult, TransportConnector};

pub struct SignInHost<C: TransportConnector> {
    engine: DeviceAuthEngine<C>,
}

impl SignInHost<HttpConnector> {
    pub fn from_config(config: &AuthConfig) -> Self {
        let engine = DeviceAuthEngine::new(HttpConnector::new(config.request_timeout))
            .with_poll_interval(config.poll_interval);
        Self::new(engine)
    }
}

impl<C: TransportConnector> SignInHost<C> {
    pub fn new(engine: DeviceAuthEngine<C>) -> Self {
        Self { engine }
    }

    pub fn on_start_requested(&self, code: &str, hostname: &str, expires_in_secs: u64) -> Result<()> {
        self.engine
            .start(code, hostname, expires_in_secs)
            .context("Failed to start device authorization")
    }

    pub fn on_stop_requested(&self) {
        self.engine.stop();
    }

    /// Block until the engine publishes a result.
    pub async fn wait_for_result(&self) -> Result<PollResult> {
        let mut results = self.engine.subscribe();
        loop {
            if let Some(result) = results.borrow_and_update().clone() {
                return Ok(result);
            }

            tokio::select! {
                changed = results.changed() => {
                    changed.context("Sign-in result channel closed")?;
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received Ctrl+C, cancelling sign-in");
                    self.on_stop_requested();
                }
            }
        }
    }

    pub fn shutdown(self) {
        self.engine.shutdown();
    }
}
