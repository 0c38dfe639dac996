//! `lvmnps on|off|cycle DEVICE OUTLET`: one-shot outlet control.

use serde::Serialize;

use lvmnps_core::{
    Command, CommandGateway, CommandResult, CoreError, DesiredState, FailedDevice, FleetConfig,
    FleetController, PowerState,
};

use crate::cli::{GlobalOpts, OutletArgs};
use crate::error::CliError;
use crate::output;

use super::{log_warnings, narrow, unexpected};

#[derive(Debug, Serialize)]
struct OutletReport {
    device: String,
    outlet: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<PowerState>,
    action: &'static str,
}

pub async fn set(
    fleet: FleetConfig,
    args: OutletArgs,
    desired: DesiredState,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let fleet = narrow(fleet, &args.device)?;
    let command = Command::SetOutlet {
        device: args.device.clone(),
        outlet: args.outlet,
        state: desired,
    };
    let (result, failures) = FleetController::oneshot(fleet, |c| async move {
        let result = c.execute(command).await;
        Ok((result, c.start_failures().await))
    })
    .await?;
    let reply = result.map_err(|e| explain(e, &failures))?;
    log_warnings(&reply);
    let observed = match reply.result {
        CommandResult::Outlet(observed) => observed,
        other => return Err(unexpected(&other)),
    };

    if observed.state != PowerState::from(desired.is_on()) {
        tracing::warn!(
            device = %args.device,
            outlet = observed.index,
            requested = %desired,
            observed = %observed.state,
            "switch did not apply the requested state"
        );
    }
    report(
        &OutletReport {
            device: args.device,
            outlet: observed.index,
            state: Some(observed.state),
            action: if desired.is_on() { "on" } else { "off" },
        },
        global,
    )
}

pub async fn cycle(
    fleet: FleetConfig,
    args: OutletArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let fleet = narrow(fleet, &args.device)?;
    let command = Command::CycleOutlet {
        device: args.device,
        outlet: args.outlet,
    };
    let (result, failures) = FleetController::oneshot(fleet, |c| async move {
        let result = c.execute(command).await;
        Ok((result, c.start_failures().await))
    })
    .await?;
    let reply = result.map_err(|e| explain(e, &failures))?;
    log_warnings(&reply);
    let (device, outlet) = match reply.result {
        CommandResult::Cycled { device, outlet } => (device, outlet),
        other => return Err(unexpected(&other)),
    };

    report(
        &OutletReport {
            device,
            outlet,
            state: None,
            action: "cycle",
        },
        global,
    )
}

/// A request on a switch that never connected is better explained by
/// why it failed to connect.
fn explain(err: CoreError, failures: &[FailedDevice]) -> CliError {
    if let CoreError::NotConnected { ref name, .. } = err {
        if let Some(failed) = failures.iter().find(|f| &f.name == name) {
            return CliError::NotConnected {
                device: name.clone(),
                status: "failed".into(),
                hint: failed.reason.clone(),
            };
        }
    }
    err.into()
}

fn report(r: &OutletReport, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        r,
        |r| match r.state {
            Some(state) => format!(
                "{} outlet {}: {}",
                r.device,
                r.outlet,
                output::paint_power(state, color)
            ),
            None => format!("{} outlet {}: cycled", r.device, r.outlet),
        },
        |r| {
            let state = r.state.map_or_else(|| r.action.to_owned(), |s| s.to_string());
            format!("{} {} {state}", r.device, r.outlet)
        },
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
