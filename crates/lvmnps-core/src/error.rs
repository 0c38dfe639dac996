// ── Core error types ──
//
// User-facing errors from lvmnps-core. Consumers never see HTTP status
// codes directly: driver failures arrive wrapped in `Connect`/`Device`
// with the device name attached.

use thiserror::Error;

use crate::driver::DriverError;
use crate::model::{ConnectionStatus, FleetState};

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Registry errors ──────────────────────────────────────────────
    #[error("A device named '{name}' is already registered")]
    DuplicateName { name: String },

    #[error("Device not found: {name}")]
    NotFound { name: String },

    #[error("Device '{name}' is {status}; disconnect it before removing")]
    DeviceInUse {
        name: String,
        status: ConnectionStatus,
    },

    // ── Device errors ────────────────────────────────────────────────
    #[error("Device '{name}' is not connected (status: {status})")]
    NotConnected {
        name: String,
        status: ConnectionStatus,
    },

    #[error("Outlet {index} does not exist on '{name}' (valid: 1..={count})")]
    InvalidOutlet { name: String, index: u32, count: u32 },

    #[error("Cannot connect to '{name}': {source}")]
    Connect {
        name: String,
        #[source]
        source: DriverError,
    },

    #[error("Device '{name}' failed: {source}")]
    Device {
        name: String,
        #[source]
        source: DriverError,
    },

    #[error("Device '{name}' timed out after {timeout_ms}ms")]
    Timeout { name: String, timeout_ms: u64 },

    // ── Fleet errors ─────────────────────────────────────────────────
    #[error("Another fleet operation is in progress (fleet is {state})")]
    AlreadyInProgress { state: FleetState },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Structural errors reject a single call outright; everything else
    /// describes a device misbehaving.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::DuplicateName { .. }
                | Self::NotFound { .. }
                | Self::DeviceInUse { .. }
                | Self::AlreadyInProgress { .. }
                | Self::Config { .. }
        )
    }

    /// Returns `true` for timeouts, however they were reached.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
