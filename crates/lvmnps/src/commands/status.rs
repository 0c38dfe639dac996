//! `lvmnps status [DEVICE]`: one-shot start, read, stop.

use tabled::Tabled;

use lvmnps_core::{
    Command, CommandGateway, CommandResult, DeviceSnapshot, FleetConfig, FleetController,
};

use crate::cli::{GlobalOpts, StatusArgs};
use crate::error::CliError;
use crate::output;

use super::{log_warnings, narrow, unexpected};

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Switch")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Outlets")]
    outlets: String,
    #[tabled(rename = "Error")]
    error: String,
}

fn outlets_line(s: &DeviceSnapshot, color: bool) -> String {
    s.outlets
        .iter()
        .map(|o| format!("{}:{}", o.index, output::paint_power(o.state, color)))
        .collect::<Vec<_>>()
        .join(" ")
}

pub async fn handle(
    fleet: FleetConfig,
    args: StatusArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let fleet = match args.device.as_deref() {
        Some(device) => narrow(fleet, device)?,
        None => fleet,
    };

    let (reply, failures) = FleetController::oneshot(fleet, |c| async move {
        let reply = c.execute(Command::Status { device: None }).await?;
        Ok((reply, c.start_failures().await))
    })
    .await?;
    log_warnings(&reply);
    let mut status = match reply.result {
        CommandResult::Status(status) => status,
        other => return Err(unexpected(&other)),
    };
    // Snapshots of switches that failed to start still carry the reason.
    for failed in failures {
        if let Some(snapshot) = status.get_mut(&failed.name) {
            snapshot.error.get_or_insert(failed.reason);
        }
    }

    let snapshots: Vec<DeviceSnapshot> = status.into_values().collect();
    let color = output::should_color(&global.color);
    let out = output::render_list(
        &global.output,
        &snapshots,
        |s| StatusRow {
            name: s.name.clone(),
            status: output::paint_status(s.status, color),
            outlets: outlets_line(s, color),
            error: s.error.clone().unwrap_or_default(),
        },
        |s| format!("{} {} {}", s.name, s.status, outlets_line(s, false)),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
