//! Command dispatch: routes CLI commands to handlers.

pub mod actor;
pub mod devices;
pub mod outlet;
pub mod status;

use lvmnps_config::{load_config, to_fleet_config};
use lvmnps_core::{CommandReply, CommandResult, DesiredState, FleetConfig};

use crate::cli::{Cli, Command, CompletionsArgs, GlobalOpts};
use crate::error::CliError;

/// Dispatch a command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    tracing::debug!(command = ?cmd, "dispatching command");
    match cmd {
        Command::Actor => actor::run(load_fleet_config(global)?, global).await,
        Command::List => devices::list(load_fleet_config(global)?, global).await,
        Command::Status(args) => status::handle(load_fleet_config(global)?, args, global).await,
        Command::On(args) => {
            outlet::set(load_fleet_config(global)?, args, DesiredState::On, global).await
        }
        Command::Off(args) => {
            outlet::set(load_fleet_config(global)?, args, DesiredState::Off, global).await
        }
        Command::Cycle(args) => outlet::cycle(load_fleet_config(global)?, args, global).await,
        // Completions need no configuration
        Command::Completions(args) => {
            completions(&args);
            Ok(())
        }
    }
}

fn completions(args: &CompletionsArgs) {
    use clap::CommandFactory;
    use clap_complete::generate;

    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "lvmnps", &mut std::io::stdout());
}

fn load_fleet_config(global: &GlobalOpts) -> Result<FleetConfig, CliError> {
    let config = load_config(global.config.as_deref())?;
    let fleet = to_fleet_config(&config)?;
    tracing::debug!(switches = fleet.devices.len(), "configuration loaded");
    Ok(fleet)
}

/// Log the per-device problems a command tolerated.
pub(crate) fn log_warnings(reply: &CommandReply) {
    for warning in &reply.warnings {
        tracing::warn!("{warning}");
    }
}

pub(crate) fn unexpected(result: &CommandResult) -> CliError {
    CliError::UnexpectedReply {
        reply: format!("{result:?}"),
    }
}

/// Keep only the named switch so one-shot commands contact nothing else.
pub(crate) fn narrow(mut fleet: FleetConfig, device: &str) -> Result<FleetConfig, CliError> {
    fleet.devices.retain(|d| d.name == device);
    if fleet.devices.is_empty() {
        return Err(CliError::NotFound {
            identifier: device.to_owned(),
        });
    }
    Ok(fleet)
}
