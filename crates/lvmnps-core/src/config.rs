// ── Runtime fleet configuration ──
//
// These types describe which switches exist and how long the core may
// wait on them. They carry credential data but never touch disk; the
// launcher builds a `FleetConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::CoreError;

/// Outlet count of the common eight-relay web power switch.
pub const DEFAULT_OUTLETS: u32 = 8;

/// URL scheme used to reach a switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

/// Login for a single switch. Opaque to the core; only drivers read it.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            username: "admin".into(),
            password: SecretString::from(String::new()),
        }
    }
}

/// Configuration for one switch.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Unique name within the fleet.
    pub name: String,
    pub host: String,
    pub port: u16,
    pub scheme: Scheme,
    pub credentials: Credentials,
    /// Number of outlets, addressed 1..=outlets.
    pub outlets: u32,
    /// Verify the HTTPS certificate against the system store.
    pub verify_tls: bool,
}

impl DeviceConfig {
    /// A config with the defaults of a factory-fresh switch.
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port: 80,
            scheme: Scheme::default(),
            credentials: Credentials::default(),
            outlets: DEFAULT_OUTLETS,
            verify_tls: false,
        }
    }

    pub fn with_outlets(mut self, outlets: u32) -> Self {
        self.outlets = outlets;
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.credentials = Credentials {
            username: username.into(),
            password,
        };
        self
    }

    /// Root URL of the switch, e.g. `http://10.0.0.10:80/`.
    pub fn base_url(&self) -> Result<Url, CoreError> {
        let raw = format!("{}://{}:{}/", self.scheme, self.host, self.port);
        raw.parse().map_err(|e| CoreError::Config {
            message: format!("invalid address for '{}' ({raw}): {e}", self.name),
        })
    }
}

/// Timeouts applied by the fleet controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FleetSettings {
    /// Per-device bound on connect + authentication during `start()`.
    pub connect_timeout: Duration,
    /// Per-device bound on a graceful disconnect during `stop()`.
    pub shutdown_grace: Duration,
    /// Bound on each outlet or status request, lock wait included.
    pub request_timeout: Duration,
}

impl Default for FleetSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Everything needed to build a [`FleetController`](crate::FleetController).
#[derive(Debug, Clone, Default)]
pub struct FleetConfig {
    pub devices: Vec<DeviceConfig>,
    pub settings: FleetSettings,
}
