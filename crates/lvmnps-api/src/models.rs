// Wire types for the switch REST API.

use serde::{Deserialize, Serialize};

/// One relay as reported by `GET /restapi/relay/outlets/`.
///
/// Firmware versions differ in which extra fields they include, so
/// everything beyond `state` is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outlet {
    #[serde(default)]
    pub name: String,
    pub state: bool,
    #[serde(default)]
    pub physical_state: Option<bool>,
    #[serde(default)]
    pub locked: bool,
}
