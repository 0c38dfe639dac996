// ── Fleet domain types ──

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Connection state of a single switch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl ConnectionStatus {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Whether a live (or half-built) connection may exist.
    pub fn holds_connection(self) -> bool {
        matches!(self, Self::Connected | Self::Connecting)
    }
}

/// Observed power state of an outlet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PowerState {
    On,
    Off,
    Unknown,
}

impl From<bool> for PowerState {
    fn from(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

/// Requested power state. `Unknown` is never a valid request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DesiredState {
    On,
    Off,
}

impl DesiredState {
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

/// One outlet as read during a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutletState {
    /// 1-based outlet index.
    pub index: u32,
    pub state: PowerState,
}

/// Point-in-time read of a device's connection status and every outlet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub name: String,
    pub status: ConnectionStatus,
    pub outlets: Vec<OutletState>,
    /// Set when the read failed; outlets are then all `Unknown`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeviceSnapshot {
    /// Snapshot with every outlet `Unknown`, used when no read was possible.
    pub fn unknown(name: impl Into<String>, status: ConnectionStatus, outlets: u32) -> Self {
        Self {
            name: name.into(),
            status,
            outlets: (1..=outlets)
                .map(|index| OutletState {
                    index,
                    state: PowerState::Unknown,
                })
                .collect(),
            error: None,
        }
    }
}

/// Entry of `list_devices()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub status: ConnectionStatus,
}

// ── Fleet lifecycle ──────────────────────────────────────────────

/// Lifecycle of the fleet as a whole.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FleetState {
    Idle,
    Starting,
    Ready,
    Stopping,
    Stopped,
}

impl FleetState {
    /// `Starting` and `Stopping` admit no further fleet-wide operation.
    pub fn is_transitional(self) -> bool {
        matches!(self, Self::Starting | Self::Stopping)
    }
}

/// Why a device ended up in `failed` after `start()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FailureKind {
    Timeout,
    Connect,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedDevice {
    pub name: String,
    pub kind: FailureKind,
    pub reason: String,
}

impl FailedDevice {
    pub(crate) fn from_error(name: &str, err: &CoreError) -> Self {
        let kind = if err.is_timeout() {
            FailureKind::Timeout
        } else {
            FailureKind::Connect
        };
        Self {
            name: name.to_owned(),
            kind,
            reason: err.to_string(),
        }
    }

    pub(crate) fn cancelled(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            kind: FailureKind::Cancelled,
            reason: "start cancelled before the device answered".into(),
        }
    }
}

/// Outcome of `start()`. Both lists are sorted by device name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetStartReport {
    pub connected: Vec<String>,
    pub failed: Vec<FailedDevice>,
    /// The operation was cancelled before every device settled.
    #[serde(default)]
    pub cancelled: bool,
}

impl FleetStartReport {
    pub fn total(&self) -> usize {
        self.connected.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }

    pub(crate) fn sort(&mut self) {
        self.connected.sort();
        self.failed.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

/// Outcome of `stop()`. Both lists are sorted by device name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetStopReport {
    /// Disconnected within the grace period.
    pub disconnected: Vec<String>,
    /// Released locally after the grace period ran out (or on cancellation).
    pub forced: Vec<String>,
    #[serde(default)]
    pub cancelled: bool,
}

impl FleetStopReport {
    pub fn is_empty(&self) -> bool {
        self.disconnected.is_empty() && self.forced.is_empty()
    }

    pub(crate) fn sort(&mut self) {
        self.disconnected.sort();
        self.forced.sort();
    }
}
