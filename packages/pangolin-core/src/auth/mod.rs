//! Device authorization sign-in.
//!
//! Provides the polling engine, its result type and the transport seam it
//! polls through.

mod device_flow;
mod engine;
mod result;
#[cfg(test)]
mod testing;
mod transport;

pub use device_flow::{
    request_device_code, DeviceAuthSession, DeviceAuthStarted, VERIFIED_WITHOUT_TOKEN,
};
pub use engine::{DeviceAuthEngine, EngineError};
pub use result::PollResult;
pub use transport::{DeviceAuthTransport, TransportConnector};
