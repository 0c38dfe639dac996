// ── Fleet controller ──
//
// Drives every registered switch through startup and shutdown, fans
// outlet and status requests out to device handles, and keeps at most
// one fleet-wide start/stop in flight.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::future::join_all;
use futures_util::stream::FuturesUnordered;
use tokio::sync::{Mutex, RwLock, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{DeviceConfig, FleetConfig, FleetSettings};
use crate::device::{DisconnectOutcome, millis};
use crate::driver::{DriverFactory, SwitchDriverFactory};
use crate::error::CoreError;
use crate::model::{
    DesiredState, DeviceSnapshot, DeviceSummary, FailedDevice, FleetStartReport, FleetState,
    FleetStopReport, OutletState,
};
use crate::registry::DeviceRegistry;

// ── FleetController ──────────────────────────────────────────────

/// Entry point for the command gateway and the CLI.
///
/// Cheaply cloneable via `Arc<FleetInner>`.
#[derive(Clone)]
pub struct FleetController {
    inner: Arc<FleetInner>,
}

struct FleetInner {
    registry: RwLock<DeviceRegistry>,
    settings: FleetSettings,
    factory: Arc<dyn DriverFactory>,
    state: watch::Sender<FleetState>,
    /// Token of the running fleet-wide operation, replaced per operation.
    cancel_op: Mutex<CancellationToken>,
    /// Devices that failed during the most recent `start()`.
    start_failures: Mutex<Vec<FailedDevice>>,
}

impl FleetController {
    pub fn new(
        registry: DeviceRegistry,
        settings: FleetSettings,
        factory: Arc<dyn DriverFactory>,
    ) -> Self {
        let (state, _) = watch::channel(FleetState::Idle);
        Self {
            inner: Arc::new(FleetInner {
                registry: RwLock::new(registry),
                settings,
                factory,
                state,
                cancel_op: Mutex::new(CancellationToken::new()),
                start_failures: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Build a controller for real switches.
    pub fn from_config(config: FleetConfig) -> Result<Self, CoreError> {
        Self::with_factory(config, Arc::new(SwitchDriverFactory))
    }

    /// Build a controller whose drivers come from `factory`.
    pub fn with_factory(
        config: FleetConfig,
        factory: Arc<dyn DriverFactory>,
    ) -> Result<Self, CoreError> {
        let mut registry = DeviceRegistry::new();
        for device in config.devices {
            let driver = factory.build(&device, &config.settings)?;
            registry.register(device, driver)?;
        }
        Ok(Self::new(registry, config.settings, factory))
    }

    pub fn settings(&self) -> &FleetSettings {
        &self.inner.settings
    }

    // ── Fleet lifecycle ──────────────────────────────────────────

    /// Connect every registered device that is not already connected,
    /// each bounded by `per_device`.
    ///
    /// Returns once every attempt has settled. Device failures land in
    /// the report; only a concurrent fleet operation is an error.
    pub async fn start(&self, per_device: Duration) -> Result<FleetStartReport, CoreError> {
        let (transition, cancel) = self.begin(FleetState::Starting, FleetState::Ready).await?;
        let registry = self.inner.registry.read().await;

        let mut report = FleetStartReport::default();
        let mut outstanding = BTreeMap::new();
        let mut pending = FuturesUnordered::new();
        for handle in registry.handles() {
            if handle.status().is_connected() {
                report.connected.push(handle.name().to_owned());
            } else {
                outstanding.insert(handle.name().to_owned(), Arc::clone(&handle));
                pending.push(async move {
                    let result = handle.connect(per_device).await;
                    (handle, result)
                });
            }
        }
        info!(
            devices = outstanding.len(),
            already_connected = report.connected.len(),
            timeout_ms = millis(per_device),
            "starting fleet"
        );

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                next = pending.next() => match next {
                    Some((handle, Ok(()))) => {
                        outstanding.remove(handle.name());
                        report.connected.push(handle.name().to_owned());
                    }
                    Some((handle, Err(e))) => {
                        outstanding.remove(handle.name());
                        warn!(device = %handle.name(), error = %e, "device failed to start");
                        report.failed.push(FailedDevice::from_error(handle.name(), &e));
                    }
                    None => break,
                }
            }
        }

        // Dropping the unfinished attempts marks their handles failed.
        drop(pending);
        for name in outstanding.keys() {
            warn!(device = %name, "start cancelled before device settled");
            report.failed.push(FailedDevice::cancelled(name));
        }
        report.sort();
        *self.inner.start_failures.lock().await = report.failed.clone();

        info!(
            connected = report.connected.len(),
            failed = report.failed.len(),
            cancelled = report.cancelled,
            "fleet started"
        );
        drop(transition);
        Ok(report)
    }

    /// Disconnect every device holding a connection, each allowed up to
    /// `grace` before it is released locally.
    ///
    /// Idempotent: devices already disconnected or failed are skipped.
    pub async fn stop(&self, grace: Duration) -> Result<FleetStopReport, CoreError> {
        let (transition, cancel) = self.begin(FleetState::Stopping, FleetState::Stopped).await?;
        let registry = self.inner.registry.read().await;

        let mut report = FleetStopReport::default();
        let mut outstanding = BTreeMap::new();
        let mut pending = FuturesUnordered::new();
        for handle in registry.handles() {
            if !handle.status().holds_connection() {
                continue;
            }
            outstanding.insert(handle.name().to_owned(), Arc::clone(&handle));
            pending.push(async move {
                let outcome = handle.disconnect(grace).await;
                (handle, outcome)
            });
        }
        info!(
            devices = outstanding.len(),
            grace_ms = millis(grace),
            "stopping fleet"
        );

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                next = pending.next() => match next {
                    Some((handle, outcome)) => {
                        outstanding.remove(handle.name());
                        match outcome {
                            DisconnectOutcome::Graceful => report.disconnected.push(handle.name().to_owned()),
                            DisconnectOutcome::Forced => report.forced.push(handle.name().to_owned()),
                            DisconnectOutcome::Skipped => {}
                        }
                    }
                    None => break,
                }
            }
        }

        drop(pending);
        for (name, handle) in outstanding {
            handle.force_disconnected();
            report.forced.push(name);
        }
        report.sort();

        info!(
            disconnected = report.disconnected.len(),
            forced = report.forced.len(),
            cancelled = report.cancelled,
            "fleet stopped"
        );
        drop(transition);
        Ok(report)
    }

    /// Cancel the running fleet-wide operation, if any. It returns a
    /// partial report as soon as it notices.
    pub async fn cancel_in_flight(&self) {
        let token = self.inner.cancel_op.lock().await;
        if !token.is_cancelled() {
            debug!(state = %self.state(), "cancelling in-flight fleet operation");
            token.cancel();
        }
    }

    /// Claim the `next` transitional state, or fail if another fleet-wide
    /// operation holds one.
    async fn begin(
        &self,
        next: FleetState,
        terminal: FleetState,
    ) -> Result<(Transition<'_>, CancellationToken), CoreError> {
        let mut current = next;
        let claimed = self.inner.state.send_if_modified(|state| {
            current = *state;
            if state.is_transitional() {
                false
            } else {
                *state = next;
                true
            }
        });
        if !claimed {
            return Err(CoreError::AlreadyInProgress { state: current });
        }
        let transition = Transition {
            state: &self.inner.state,
            terminal,
        };

        let token = CancellationToken::new();
        *self.inner.cancel_op.lock().await = token.clone();
        debug!(from = %current, to = %next, "fleet transition");
        Ok((transition, token))
    }

    // ── Device requests ──────────────────────────────────────────

    pub async fn set_outlet(
        &self,
        device: &str,
        outlet: u32,
        state: DesiredState,
    ) -> Result<OutletState, CoreError> {
        let handle = self.inner.registry.read().await.lookup(device)?;
        handle
            .set_outlet(outlet, state, self.inner.settings.request_timeout)
            .await
    }

    pub async fn cycle_outlet(&self, device: &str, outlet: u32) -> Result<(), CoreError> {
        let handle = self.inner.registry.read().await.lookup(device)?;
        handle
            .cycle_outlet(outlet, self.inner.settings.request_timeout)
            .await
    }

    /// Status of one device, or of every registered device when `device`
    /// is `None`.
    ///
    /// For a single device a failed read is returned as the error. For the
    /// whole fleet it is recorded in that device's snapshot instead, so
    /// one bad switch never hides the others.
    ///
    /// Not a start/stop transition and not reached by
    /// [`cancel_in_flight`](Self::cancel_in_flight); every read is bounded
    /// by the request timeout instead.
    pub async fn get_status(
        &self,
        device: Option<&str>,
    ) -> Result<BTreeMap<String, DeviceSnapshot>, CoreError> {
        let limit = self.inner.settings.request_timeout;
        let registry = self.inner.registry.read().await;

        if let Some(name) = device {
            let snapshot = registry.lookup(name)?.get_status(limit).await?;
            return Ok(BTreeMap::from([(snapshot.name.clone(), snapshot)]));
        }

        let reads = registry.handles().into_iter().map(|handle| async move {
            match handle.get_status(limit).await {
                Ok(snapshot) => snapshot,
                Err(e) => DeviceSnapshot {
                    error: Some(e.to_string()),
                    ..handle.unknown_snapshot()
                },
            }
        });
        Ok(join_all(reads)
            .await
            .into_iter()
            .map(|snapshot| (snapshot.name.clone(), snapshot))
            .collect())
    }

    // ── Registry administration ──────────────────────────────────

    /// Registered devices in registration order. Never touches the network.
    pub async fn list_devices(&self) -> Vec<DeviceSummary> {
        self.inner.registry.read().await.list()
    }

    /// Add a device. Waits for any running fleet-wide operation to finish.
    pub async fn register_device(&self, config: DeviceConfig) -> Result<(), CoreError> {
        let driver = self.inner.factory.build(&config, &self.inner.settings)?;
        let mut registry = self.inner.registry.write().await;
        let handle = registry.register(config, driver)?;
        info!(device = %handle.name(), "device registered");
        Ok(())
    }

    /// Remove a device that holds no connection.
    pub async fn remove_device(&self, name: &str) -> Result<(), CoreError> {
        self.inner.registry.write().await.remove(name)?;
        info!(device = %name, "device removed");
        Ok(())
    }

    /// Disconnect a single device within the shutdown grace period.
    pub async fn disconnect_device(&self, name: &str) -> Result<DisconnectOutcome, CoreError> {
        let handle = self.inner.registry.read().await.lookup(name)?;
        Ok(handle.disconnect(self.inner.settings.shutdown_grace).await)
    }

    // ── One-shot convenience ─────────────────────────────────────

    /// One-shot: start, run closure, stop.
    ///
    /// Start failures are logged and left for the closure to discover
    /// through [`start_failures`](Self::start_failures).
    pub async fn oneshot<F, Fut, T>(config: FleetConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(FleetController) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let controller = Self::from_config(config)?;
        controller.start(controller.settings().connect_timeout).await?;
        let result = f(controller.clone()).await;
        controller.stop(controller.settings().shutdown_grace).await?;
        result
    }

    // ── State observation ────────────────────────────────────────

    pub fn state(&self) -> FleetState {
        *self.inner.state.borrow()
    }

    /// Subscribe to fleet lifecycle changes.
    pub fn subscribe_state(&self) -> watch::Receiver<FleetState> {
        self.inner.state.subscribe()
    }

    /// Devices that failed during the most recent `start()`.
    pub async fn start_failures(&self) -> Vec<FailedDevice> {
        self.inner.start_failures.lock().await.clone()
    }
}

/// Holds the fleet in a transitional state; moves it to `terminal` when
/// finished or dropped.
struct Transition<'a> {
    state: &'a watch::Sender<FleetState>,
    terminal: FleetState,
}

impl Drop for Transition<'_> {
    fn drop(&mut self) {
        self.state.send_replace(self.terminal);
    }
}
