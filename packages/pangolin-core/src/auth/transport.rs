//! The network-facing seam of the polling engine.
//!
//! The engine never talks HTTP itself. It asks a [`TransportConnector`] for a
//! transport bound to the session's hostname and then calls
//! [`DeviceAuthTransport::poll_device_auth`] once per tick.

use crate::api::{ApiError, DeviceAuthPoll};
use std::future::Future;
use std::sync::Arc;

/// Issues one verification request for a device code.
///
/// Implementations must bound each call with their own timeout so a stalled
/// connection cannot hold the polling loop forever.
pub trait DeviceAuthTransport: Send + Sync + 'static {
    fn poll_device_auth(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<DeviceAuthPoll, ApiError>> + Send;
}

impl<T: DeviceAuthTransport> DeviceAuthTransport for Arc<T> {
    fn poll_device_auth(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<DeviceAuthPoll, ApiError>> + Send {
        (**self).poll_device_auth(code)
    }
}

/// Builds a fresh transport for every started session.
pub trait TransportConnector: Send + Sync + 'static {
    type Transport: DeviceAuthTransport;

    fn connect(&self, hostname: &str) -> Result<Self::Transport, ApiError>;
}

impl<F, T> TransportConnector for F
where
    F: Fn(&str) -> Result<T, ApiError> + Send + Sync + 'static,
    T: DeviceAuthTransport,
{
    type Transport = T;

    fn connect(&self, hostname: &str) -> Result<T, ApiError> {
        self(hostname)
    }
}
