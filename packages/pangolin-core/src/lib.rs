//! Pangolin Core Library
//!
//! This crate provides the sign-in machinery for Pangolin clients:
//! - Device authorization (request a code, poll until it is verified)
//! - An HTTP client for the Pangolin API
//! - Endpoint configuration (environment, config file, defaults)
//!
//! # Features
//!
//! - `browser` (default): Automatically open the verification page in a browser
//!
//! # Example
//!
//! ```no_run
//! use pangolin_core::{api, auth};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = api::load_auth_config();
//!     let client = api::PangolinClient::with_timeout(&config.hostname, config.request_timeout)?;
//!
//!     // Ask for a device code
//!     let started = auth::request_device_code(&client, "Pangolin CLI", "laptop", true).await?;
//!     println!("Visit: {}", started.verification_url);
//!
//!     // Poll until it is verified
//!     let engine = auth::DeviceAuthEngine::new(api::HttpConnector::new(config.request_timeout))
//!         .with_poll_interval(config.poll_interval);
//!     let mut results = engine.subscribe();
//!     engine.start(&started.code, &config.hostname, started.expires_in_seconds)?;
//!
//!     let result = loop {
//!         if let Some(result) = results.borrow_and_update().clone() {
//!             break result;
//!         }
//!         results.changed().await?;
//!     };
//!     println!("{}", result);
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;

// Re-export commonly used types
pub use api::{ApiError, AuthConfig, ConfigSource, HttpConnector, PangolinClient};
pub use auth::{DeviceAuthEngine, DeviceAuthSession, EngineError, PollResult};
