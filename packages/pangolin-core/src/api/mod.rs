//! Pangolin API access.
//!
//! Provides the HTTP client for the device authorization endpoints, the
//! response envelopes and the endpoint configuration.

mod client;
pub mod config;
mod error;
mod types;

pub use client::{HttpConnector, PangolinClient};
pub use config::{load_auth_config, AuthConfig, ConfigSource};
pub use error::ApiError;
pub use types::{ApiResponse, DeviceAuthPoll, DeviceAuthPollResponse, DeviceAuthStart};
