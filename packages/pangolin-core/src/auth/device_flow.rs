//! Device authorization flow.
//!
//! A client asks the server for a short-lived device code, the user approves
//! it in a browser, and the client polls until the server reports the code
//! as verified. This module holds one polling run; [`DeviceAuthEngine`]
//! decides when runs start and stop.
//!
//! [`DeviceAuthEngine`]: super::DeviceAuthEngine

use super::result::PollResult;
use super::transport::DeviceAuthTransport;
use crate::api::{ApiError, DeviceAuthPoll, PangolinClient};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

/// Published when the server verifies a code but hands back no credential.
pub const VERIFIED_WITHOUT_TOKEN: &str = "Device auth verified but no token received";

/// Returned to the caller once a device code has been issued.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAuthStarted {
    pub verification_url: String,
    pub code: String,
    pub hostname: String,
    pub expires_in_seconds: u64,
}

/// Request a device code and return where the user should approve it.
///
/// If the `browser` feature is enabled and `open_browser` is set, this will
/// also try to open the verification URL in the default browser.
pub async fn request_device_code(
    client: &PangolinClient,
    application_name: &str,
    device_name: &str,
    open_browser: bool,
) -> Result<DeviceAuthStarted, ApiError> {
    let start = client
        .start_device_auth(application_name, device_name)
        .await?;
    let url = client.verification_url(&start.code)?.to_string();

    tracing::info!("Verification URL generated: {}", url);

    #[cfg(feature = "browser")]
    if open_browser {
        if let Err(e) = webbrowser::open(&url) {
            tracing::warn!(
                "Failed to open browser automatically: {}. User can use the manual link.",
                e
            );
        }
    }
    #[cfg(not(feature = "browser"))]
    let _ = open_browser;

    Ok(DeviceAuthStarted {
        verification_url: url,
        code: start.code,
        hostname: client.base_url().to_string(),
        expires_in_seconds: start.expires_in_seconds,
    })
}

/// One polling attempt for a device code.
#[derive(Debug, Clone)]
pub struct DeviceAuthSession {
    code: String,
    hostname: String,
    started_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    deadline: Instant,
}

impl DeviceAuthSession {
    pub fn new(code: impl Into<String>, hostname: impl Into<String>, expires_in_secs: u64) -> Self {
        let started_at = Utc::now();
        let expires_at = i64::try_from(expires_in_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|ttl| started_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let now = Instant::now();
        let deadline = now
            .checked_add(Duration::from_secs(expires_in_secs))
            .unwrap_or_else(|| now + Duration::from_secs(86400 * 365 * 30));

        Self {
            code: code.into(),
            hostname: hostname.into(),
            started_at,
            expires_at,
            deadline,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Measured against the monotonic clock captured at creation, not
    /// against the number of polls made.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// The run was cancelled at a suspension point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PollStep {
    Pending,
    Done(PollResult),
}

/// Poll until the code is verified, fails hard or expires.
///
/// Cancellation is checked at both suspension points (the wait and the
/// request) and comes back as `Err(Cancelled)` rather than a result, so the
/// caller decides whether and where `Cancelled` is published.
pub(crate) async fn poll_until_complete<T: DeviceAuthTransport>(
    transport: &T,
    session: &DeviceAuthSession,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<PollResult, Cancelled> {
    let mut attempt: u64 = 0;

    while !session.is_expired() {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Cancelled),
            _ = sleep(interval) => {}
        }

        attempt += 1;
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Cancelled),
            outcome = transport.poll_device_auth(session.code()) => outcome,
        };

        if let PollStep::Done(result) = classify(outcome, session, attempt) {
            return Ok(result);
        }

        if session.is_expired() {
            break;
        }
    }

    tracing::info!(
        "Device code {} expired after {} attempts",
        redact(session.code()),
        attempt
    );
    Ok(PollResult::Timeout)
}

/// Decide whether one poll outcome ends the run.
pub(crate) fn classify(
    outcome: Result<DeviceAuthPoll, ApiError>,
    session: &DeviceAuthSession,
    attempt: u64,
) -> PollStep {
    match outcome {
        Ok(poll) if poll.response.verified => match poll.token.filter(|t| !t.is_empty()) {
            Some(token) => {
                tracing::info!(
                    "Device code {} verified on attempt {}",
                    redact(session.code()),
                    attempt
                );
                PollStep::Done(PollResult::Success {
                    token,
                    hostname: session.hostname().to_string(),
                })
            }
            None => {
                tracing::error!("{}", VERIFIED_WITHOUT_TOKEN);
                PollStep::Done(PollResult::error(VERIFIED_WITHOUT_TOKEN))
            }
        },
        Ok(_) => {
            tracing::debug!("Attempt {}: not verified yet", attempt);
            PollStep::Pending
        }
        Err(e) if e.is_not_found() => {
            tracing::debug!("Attempt {}: verification record not created yet", attempt);
            PollStep::Pending
        }
        Err(e @ ApiError::Http { .. }) => {
            tracing::error!("Device auth poll failed: {}", e);
            PollStep::Done(PollResult::error(e.user_message()))
        }
        Err(ApiError::Network(cause)) => {
            tracing::warn!("Attempt {}: network error, will retry: {}", attempt, cause);
            PollStep::Pending
        }
        Err(e) => {
            tracing::warn!("Attempt {}: unexpected poll failure, will retry: {}", attempt, e);
            PollStep::Pending
        }
    }
}

/// Enough of a code or token to correlate log lines without leaking it.
pub(crate) fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    format!("{}***", prefix)
}
