//! Concurrent lifecycle core for a fleet of networked power switches.
//!
//! The crate owns device connections and everything that can go wrong
//! with them; it never reads files or parses command lines:
//!
//! - **[`FleetController`]**: connects and disconnects every registered
//!   switch concurrently, each attempt bounded by its own timeout, and
//!   reports partial failure instead of failing outright. At most one
//!   fleet-wide [`start()`](FleetController::start) /
//!   [`stop()`](FleetController::stop) runs at a time.
//!   [`FleetController::oneshot()`](FleetController::oneshot) wraps a single
//!   CLI request in start/stop.
//!
//! - **[`DeviceRegistry`]** / **[`DeviceHandle`]**: named, insertion-ordered
//!   handles. Each handle serialises its own requests and tracks a
//!   [`ConnectionStatus`] observable through a `watch` channel.
//!
//! - **[`PowerDriver`]**: the wire-protocol seam. [`SwitchDriver`] speaks
//!   the switch REST API through `lvmnps-api`.
//!
//! - **[`Command`]** / **[`CommandGateway`]**: the narrow request interface
//!   for outer front-ends.

pub mod command;
pub mod config;
pub mod controller;
pub mod device;
pub mod driver;
pub mod error;
pub mod model;
pub mod registry;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandGateway, CommandReply, CommandResult};
pub use config::{Credentials, DEFAULT_OUTLETS, DeviceConfig, FleetConfig, FleetSettings, Scheme};
pub use controller::FleetController;
pub use device::{DeviceHandle, DisconnectOutcome};
pub use driver::{DriverError, DriverFactory, PowerDriver, SwitchDriver, SwitchDriverFactory};
pub use error::CoreError;
pub use registry::DeviceRegistry;

pub use model::{
    ConnectionStatus, DesiredState, DeviceSnapshot, DeviceSummary, FailedDevice, FailureKind,
    FleetStartReport, FleetState, FleetStopReport, OutletState, PowerState,
};
