// ── Command API ──
//
// Everything an outer request front-end can ask of the fleet flows
// through a unified `Command` enum. Partial fleet failures come back as
// warnings next to a successful result; structural errors are `Err`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::controller::FleetController;
use crate::error::CoreError;
use crate::model::{
    DesiredState, DeviceSnapshot, DeviceSummary, FleetStartReport, FleetStopReport, OutletState,
};

/// All requests accepted by a [`CommandGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // ── Fleet lifecycle ──────────────────────────────────────────────
    /// Connect the fleet. `None` uses the configured connect timeout.
    Start { timeout: Option<Duration> },
    /// Disconnect the fleet. `None` uses the configured shutdown grace.
    Stop { grace: Option<Duration> },

    // ── Outlet control ───────────────────────────────────────────────
    SetOutlet {
        device: String,
        outlet: u32,
        state: DesiredState,
    },
    CycleOutlet {
        device: String,
        outlet: u32,
    },

    // ── Queries ──────────────────────────────────────────────────────
    Status { device: Option<String> },
    List,
}

/// Result of a successfully executed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    Started(FleetStartReport),
    Stopped(FleetStopReport),
    Outlet(OutletState),
    Cycled { device: String, outlet: u32 },
    Status(BTreeMap<String, DeviceSnapshot>),
    Devices(Vec<DeviceSummary>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub result: CommandResult,
    /// Per-device problems that did not fail the command.
    pub warnings: Vec<String>,
}

impl CommandReply {
    fn ok(result: CommandResult) -> Self {
        Self {
            result,
            warnings: Vec::new(),
        }
    }
}

/// Narrow interface an outer request front-end talks to.
#[async_trait]
pub trait CommandGateway: Send + Sync {
    async fn execute(&self, command: Command) -> Result<CommandReply, CoreError>;
}

#[async_trait]
impl CommandGateway for FleetController {
    async fn execute(&self, command: Command) -> Result<CommandReply, CoreError> {
        debug!(?command, "executing command");
        let settings = *self.settings();
        match command {
            Command::Start { timeout } => {
                let report = self
                    .start(timeout.unwrap_or(settings.connect_timeout))
                    .await?;
                let warnings = report
                    .failed
                    .iter()
                    .map(|f| format!("{}: {}", f.name, f.reason))
                    .collect();
                Ok(CommandReply {
                    result: CommandResult::Started(report),
                    warnings,
                })
            }
            Command::Stop { grace } => {
                let report = self
                    .stop(grace.unwrap_or(settings.shutdown_grace))
                    .await?;
                let warnings = report
                    .forced
                    .iter()
                    .map(|name| format!("{name}: disconnect forced"))
                    .collect();
                Ok(CommandReply {
                    result: CommandResult::Stopped(report),
                    warnings,
                })
            }
            Command::SetOutlet {
                device,
                outlet,
                state,
            } => {
                let observed = self.set_outlet(&device, outlet, state).await?;
                Ok(CommandReply::ok(CommandResult::Outlet(observed)))
            }
            Command::CycleOutlet { device, outlet } => {
                self.cycle_outlet(&device, outlet).await?;
                Ok(CommandReply::ok(CommandResult::Cycled { device, outlet }))
            }
            Command::Status { device } => {
                let status = self.get_status(device.as_deref()).await?;
                let warnings = status
                    .values()
                    .filter_map(|s| s.error.as_ref().map(|e| format!("{}: {e}", s.name)))
                    .collect();
                Ok(CommandReply {
                    result: CommandResult::Status(status),
                    warnings,
                })
            }
            Command::List => Ok(CommandReply::ok(CommandResult::Devices(
                self.list_devices().await,
            ))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::{DeviceConfig, FleetSettings};
    use crate::driver::PowerDriver;
    use crate::driver::mock::{Behavior, MockDriver};
    use crate::model::{FleetState, PowerState};
    use crate::registry::DeviceRegistry;

    fn mock_factory(_: &DeviceConfig) -> Result<Box<dyn PowerDriver>, CoreError> {
        Ok(MockDriver::new(8).boxed())
    }

    fn gateway() -> FleetController {
        let mut registry = DeviceRegistry::new();
        registry
            .register(DeviceConfig::new("good", "10.0.0.1"), MockDriver::new(8).boxed())
            .unwrap();
        registry
            .register(
                DeviceConfig::new("bad", "10.0.0.2"),
                MockDriver::new(8).on_connect(Behavior::Deny).boxed(),
            )
            .unwrap();
        let settings = FleetSettings {
            connect_timeout: Duration::from_millis(100),
            shutdown_grace: Duration::from_millis(100),
            request_timeout: Duration::from_millis(100),
        };
        FleetController::new(registry, settings, Arc::new(mock_factory))
    }

    #[tokio::test(start_paused = true)]
    async fn partial_start_failure_is_a_warning() {
        let gw = gateway();
        let reply = gw.execute(Command::Start { timeout: None }).await.unwrap();

        let CommandResult::Started(report) = reply.result else {
            panic!("expected Started, got {:?}", reply.result);
        };
        assert_eq!(report.connected, vec!["good"]);
        assert_eq!(reply.warnings.len(), 1);
        assert!(reply.warnings[0].starts_with("bad: "));
        assert_eq!(gw.state(), FleetState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn structural_errors_fail_the_command() {
        let gw = gateway();
        gw.execute(Command::Start { timeout: None }).await.unwrap();

        let err = gw
            .execute(Command::SetOutlet {
                device: "ghost".into(),
                outlet: 1,
                state: DesiredState::On,
            })
            .await
            .unwrap_err();
        assert!(err.is_structural());
    }

    #[tokio::test(start_paused = true)]
    async fn set_outlet_and_status_round_trip() {
        let gw = gateway();
        gw.execute(Command::Start { timeout: None }).await.unwrap();

        let reply = gw
            .execute(Command::SetOutlet {
                device: "good".into(),
                outlet: 2,
                state: DesiredState::On,
            })
            .await
            .unwrap();
        assert_eq!(
            reply.result,
            CommandResult::Outlet(OutletState {
                index: 2,
                state: PowerState::On
            })
        );

        let reply = gw
            .execute(Command::Status {
                device: Some("good".into()),
            })
            .await
            .unwrap();
        let CommandResult::Status(status) = reply.result else {
            panic!("expected Status");
        };
        assert_eq!(status["good"].outlets[1].state, PowerState::On);
        assert!(reply.warnings.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_reports_the_outlet() {
        let gw = gateway();
        gw.execute(Command::Start { timeout: None }).await.unwrap();

        let reply = gw
            .execute(Command::CycleOutlet {
                device: "good".into(),
                outlet: 3,
            })
            .await
            .unwrap();
        assert_eq!(
            reply.result,
            CommandResult::Cycled {
                device: "good".into(),
                outlet: 3
            }
        );

        let err = gw
            .execute(Command::CycleOutlet {
                device: "bad".into(),
                outlet: 3,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotConnected { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn list_and_stop() {
        let gw = gateway();
        gw.execute(Command::Start { timeout: None }).await.unwrap();

        let reply = gw.execute(Command::List).await.unwrap();
        let CommandResult::Devices(devices) = reply.result else {
            panic!("expected Devices");
        };
        assert_eq!(devices.len(), 2);

        let reply = gw.execute(Command::Stop { grace: None }).await.unwrap();
        let CommandResult::Stopped(report) = reply.result else {
            panic!("expected Stopped");
        };
        assert_eq!(report.disconnected, vec!["good"]);
        assert!(reply.warnings.is_empty());
    }
}
