//! Long-running actor mode: connect the fleet, serve until Ctrl-C, stop.

use std::future::Future;

use tokio::signal;
use tracing::{info, warn};

use lvmnps_core::{
    Command, CommandGateway, CommandResult, CoreError, FleetConfig, FleetController,
    FleetStartReport, FleetStopReport,
};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::{log_warnings, unexpected};

pub async fn run(fleet: FleetConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let controller = FleetController::from_config(fleet)?;

    let (reply, interrupted) =
        interruptible(&controller, controller.execute(Command::Start { timeout: None })).await?;
    log_warnings(&reply);
    let report = match reply.result {
        CommandResult::Started(report) => report,
        other => return Err(unexpected(&other)),
    };
    log_start(&report);

    if interrupted {
        warn!("interrupted during startup");
    } else {
        info!("fleet ready; press Ctrl-C to stop");
        signal::ctrl_c().await?;
        info!("shutdown requested");
    }

    let (reply, _) =
        interruptible(&controller, controller.execute(Command::Stop { grace: None })).await?;
    log_warnings(&reply);
    let report = match reply.result {
        CommandResult::Stopped(report) => report,
        other => return Err(unexpected(&other)),
    };
    log_stop(&report);

    let summary = output::render_single(
        &global.output,
        &report,
        |r| format!("{} disconnected, {} forced", r.disconnected.len(), r.forced.len()),
        |r| format!("{} {}", r.disconnected.len(), r.forced.len()),
    )?;
    output::print_output(&summary, global.quiet);
    Ok(())
}

/// Run a fleet-wide operation; on Ctrl-C, cancel it and collect its
/// partial report. Returns whether an interrupt arrived.
async fn interruptible<T>(
    controller: &FleetController,
    op: impl Future<Output = Result<T, CoreError>>,
) -> Result<(T, bool), CliError> {
    tokio::pin!(op);
    tokio::select! {
        result = &mut op => Ok((result?, false)),
        _ = signal::ctrl_c() => {
            controller.cancel_in_flight().await;
            Ok((op.await?, true))
        }
    }
}

fn log_start(report: &FleetStartReport) {
    if !report.is_clean() {
        warn!(
            unavailable = report.failed.len(),
            total = report.total(),
            "fleet started with unavailable switches"
        );
    }
    info!(
        connected = report.connected.len(),
        failed = report.failed.len(),
        cancelled = report.cancelled,
        "startup complete"
    );
}

fn log_stop(report: &FleetStopReport) {
    info!(
        disconnected = report.disconnected.len(),
        forced = report.forced.len(),
        "shutdown complete"
    );
}
