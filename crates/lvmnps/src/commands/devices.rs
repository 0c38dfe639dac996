//! `lvmnps list`: configured switches, no network.

use tabled::Tabled;

use lvmnps_core::{DeviceSummary, FleetConfig, FleetController};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Port")]
    port: u16,
    #[tabled(rename = "Status")]
    status: String,
}

pub async fn list(fleet: FleetConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let controller = FleetController::from_config(fleet)?;
    let devices = controller.list_devices().await;
    let color = output::should_color(&global.color);

    let out = output::render_list(
        &global.output,
        &devices,
        |d: &DeviceSummary| DeviceRow {
            name: d.name.clone(),
            host: d.host.clone(),
            port: d.port,
            status: output::paint_status(d.status, color),
        },
        |d| format!("{} {}:{}", d.name, d.host, d.port),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
