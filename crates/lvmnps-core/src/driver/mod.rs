// ── Power switch driver seam ──
//
// A driver owns the wire protocol for one switch. The core only calls it
// through a `DeviceHandle`, which serialises access behind a per-device
// lock and bounds every call with a timeout, so drivers themselves may
// block for as long as the network does.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{DeviceConfig, FleetSettings};
use crate::error::CoreError;
use crate::model::PowerState;

mod switch;

#[cfg(test)]
pub(crate) mod mock;

pub use switch::{SwitchDriver, SwitchDriverFactory};

/// Failure reported by a driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl DriverError {
    /// The link to the device is gone or unusable.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<lvmnps_api::Error> for DriverError {
    fn from(err: lvmnps_api::Error) -> Self {
        match err {
            lvmnps_api::Error::Authentication { message } => Self::Auth(message),
            lvmnps_api::Error::Transport(e) => Self::Transport(e.to_string()),
            lvmnps_api::Error::Tls(msg) => Self::Transport(format!("TLS: {msg}")),
            lvmnps_api::Error::Status { status, body } if status >= 500 => {
                Self::Transport(format!("HTTP {status}: {body}"))
            }
            lvmnps_api::Error::Status { status, body } => {
                Self::Rejected(format!("HTTP {status}: {body}"))
            }
            lvmnps_api::Error::InvalidUrl(e) => Self::Protocol(format!("invalid URL: {e}")),
            lvmnps_api::Error::Deserialization { message, .. } => Self::Protocol(message),
        }
    }
}

/// Wire protocol for one networked power switch.
///
/// Outlet indices are 1-based. Implementations translate to whatever the
/// device uses on the wire.
#[async_trait]
pub trait PowerDriver: Send {
    /// Open the connection and authenticate. Returns the outlet count the
    /// device reports.
    async fn connect(&mut self) -> Result<usize, DriverError>;

    /// Close the connection.
    async fn disconnect(&mut self) -> Result<(), DriverError>;

    /// Read every outlet, in index order.
    async fn read_outlets(&mut self) -> Result<Vec<PowerState>, DriverError>;

    /// Switch an outlet and return the state the device reports afterwards.
    async fn write_outlet(&mut self, index: u32, on: bool) -> Result<PowerState, DriverError>;

    /// Power-cycle an outlet.
    async fn cycle_outlet(&mut self, index: u32) -> Result<(), DriverError>;

    /// Drop local session state without talking to the device.
    fn reset(&mut self);
}

/// Builds drivers for newly registered devices.
pub trait DriverFactory: Send + Sync {
    fn build(
        &self,
        config: &DeviceConfig,
        settings: &FleetSettings,
    ) -> Result<Box<dyn PowerDriver>, CoreError>;
}

impl<F> DriverFactory for F
where
    F: Fn(&DeviceConfig) -> Result<Box<dyn PowerDriver>, CoreError> + Send + Sync,
{
    fn build(
        &self,
        config: &DeviceConfig,
        _settings: &FleetSettings,
    ) -> Result<Box<dyn PowerDriver>, CoreError> {
        self(config)
    }
}
